//! Error and Result types for the write engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for write-engine operations.
pub type Result<T> = std::result::Result<T, DrfError>;

/// The error type for write-engine operations.
#[derive(Debug, Error)]
pub enum DrfError {
    /// Channel configuration or derived quantity was rejected (cadence
    /// divisibility, zero rate, unsupported element type, a sample time
    /// outside the representable range, ...).
    #[error("Invalid channel configuration: {0}")]
    ConfigInvalid(String),

    /// An existing channel was opened with an incompatible configuration.
    #[error("Channel property conflict on {field}: existing {existing}, requested {requested}")]
    PropertiesConflict {
        /// Name of the diverging property.
        field: &'static str,
        /// Value recorded in the existing channel property file.
        existing: String,
        /// Value derived from the requested configuration.
        requested: String,
    },

    /// The planned data file already exists on disk; the engine never clobbers.
    #[error("Data file already exists: {0}")]
    FileExists(PathBuf),

    /// A write started before the next expected sample index.
    #[error("Overlapping write: requested index {requested} is before next expected index {next_expected}")]
    Overlap {
        /// First global index of the rejected write.
        requested: u64,
        /// Smallest global index the channel still accepts.
        next_expected: u64,
    },

    /// Non-monotonic indices or offsets within a single write call.
    #[error("Invalid write ordering: {0}")]
    Order(String),

    /// A write was requested past the end of the open file's cadence window.
    #[error("Write of {samples} samples at index {start} exceeds file capacity {capacity}")]
    OutOfFileCapacity {
        /// First global index of the rejected append.
        start: u64,
        /// Number of samples in the rejected append.
        samples: u64,
        /// Total sample capacity of the file's cadence window.
        capacity: u64,
    },

    /// Flat sample buffer length is not a whole number of rows.
    #[error("Buffer of {len} elements is not a whole number of {num_subchannels}-wide rows")]
    ShapeMismatch {
        /// Element count of the supplied buffer.
        len: usize,
        /// Configured row width of the channel.
        num_subchannels: usize,
    },

    /// Underlying HDF5 library error.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A should-never-happen internal condition; indicates a bug.
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),
}

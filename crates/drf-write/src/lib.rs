//! Write engine for the Digital RF time-indexed HDF5 sample store.
//!
//! Accepts successive blocks of fixed-width sample vectors tagged with a
//! monotonic global sample index, partitions them deterministically across
//! a subdirectory/file hierarchy driven by wall-clock cadences, and
//! persists each partition as a self-describing HDF5 dataset with the
//! invariants downstream readers rely on for seeking.
//!
//! # Components
//!
//! - [`SampleRate`]: exact rational conversion between global sample
//!   indexes and unix/calendar time
//! - [`ChannelLayout`]: deterministic index-to-path planning
//! - [`ChannelWriter`]: the top-level writer state machine
//! - [`ChannelProperties`]: the immutable channel property file
//! - [`Iq`]: the complex sample element
//!
//! # Example
//!
//! ```rust,ignore
//! use drf_write::{ChannelConfig, ChannelWriter, SampleRate};
//!
//! // A 200 Hz single-subchannel channel, one hour per subdirectory,
//! // one second per file.
//! let rate = SampleRate::new(200, 1)?;
//! let mut config = ChannelConfig::new(3600, 1000, rate, 1);
//! config.uuid = "sensor-7".to_string();
//! config.is_continuous = true;
//!
//! let mut writer = ChannelWriter::<i16>::create("/data/ch0", config, start_index)?;
//! writer.write(&samples)?;
//! writer.close()?;
//! ```

#![deny(missing_docs)]

pub mod dtype;
pub mod error;
pub mod layout;
pub mod store;
pub mod time;

pub use dtype::{Iq, SampleDtype, ScalarKind};
pub use error::{DrfError, Result};
pub use layout::{ChannelLayout, WriteSlot};
pub use store::{ChannelConfig, ChannelProperties, ChannelWriter, DIGITAL_RF_VERSION, EPOCH};
pub use time::{CivilTime, SampleRate};

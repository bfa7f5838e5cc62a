//! Channel store: configuration, the per-file writer, the channel-level
//! state machine, and the channel property file.
//!
//! # Architecture
//!
//! ```text
//! Client → ChannelWriter (slicing, rotation, overlap checks)
//!            → ChannelLayout (index → subdir/file placement)
//!            → FileWriter   (one HDF5 file per cadence window)
//!            → ChannelProperties (drf_properties.h5, once per channel)
//! ```

use crate::error::{DrfError, Result};
use crate::time::SampleRate;
use hdf5::types::VarLenUnicode;
use hdf5::Group;
use std::time::{SystemTime, UNIX_EPOCH};

mod channel;
mod file;
mod properties;

pub use channel::ChannelWriter;
pub use properties::ChannelProperties;

/// Format version recorded in every file this engine produces.
pub const DIGITAL_RF_VERSION: &str = "2.0";

/// Epoch string recorded in every file; all sample indexes count from it.
pub const EPOCH: &str = "1970-01-01T00:00:00Z";

/// Name of the channel property file in the channel root.
pub const PROPERTIES_FILE_NAME: &str = "drf_properties.h5";

pub(crate) const TIME_DESCRIPTION: &str = "All times in this format are in samples since the \
     epoch, where the exact sample rate in Hz is sample_rate_numerator / sample_rate_denominator";

/// Immutable per-channel configuration, fixed at first open.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Wall-clock seconds of data per subdirectory.
    pub subdir_cadence_secs: u64,
    /// Wall-clock milliseconds of data per file. Must divide evenly into
    /// the subdirectory cadence.
    pub file_cadence_millisecs: u64,
    /// Exact rational sample rate.
    pub sample_rate: SampleRate,
    /// Row width of the sample dataset. At least 1.
    pub num_subchannels: usize,
    /// Continuous mode: one run per file, inter-write gaps zero-filled.
    pub is_continuous: bool,
    /// Gzip level for the sample dataset, 0 (off) through 9.
    pub compression_level: u8,
    /// Enable the Fletcher-32 checksum filter on the sample dataset.
    pub checksum: bool,
    /// Opaque channel identifier echoed into every file.
    pub uuid: String,
    /// Emit a heartbeat to the progress sink on each new subdirectory.
    pub marching_periods: bool,
}

impl ChannelConfig {
    /// Creates a configuration with the given cadences, rate, and row
    /// width; the remaining fields default to a plain uncompressed gapped
    /// channel.
    pub fn new(
        subdir_cadence_secs: u64,
        file_cadence_millisecs: u64,
        sample_rate: SampleRate,
        num_subchannels: usize,
    ) -> Self {
        Self {
            subdir_cadence_secs,
            file_cadence_millisecs,
            sample_rate,
            num_subchannels,
            is_continuous: false,
            compression_level: 0,
            checksum: false,
            uuid: String::new(),
            marching_periods: false,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` on a zero cadence, a subdirectory cadence
    /// that is not a whole number of file cadences, a zero row width, or a
    /// compression level above 9.
    pub fn validate(&self) -> Result<()> {
        if self.subdir_cadence_secs == 0 {
            return Err(DrfError::ConfigInvalid(
                "subdir_cadence_secs must be at least 1".to_string(),
            ));
        }
        if self.file_cadence_millisecs == 0 {
            return Err(DrfError::ConfigInvalid(
                "file_cadence_millisecs must be at least 1".to_string(),
            ));
        }
        if self.subdir_cadence_secs * 1000 % self.file_cadence_millisecs != 0 {
            return Err(DrfError::ConfigInvalid(format!(
                "subdir cadence of {} s is not a whole number of {} ms files",
                self.subdir_cadence_secs, self.file_cadence_millisecs
            )));
        }
        if self.num_subchannels == 0 {
            return Err(DrfError::ConfigInvalid(
                "num_subchannels must be at least 1".to_string(),
            ));
        }
        if self.compression_level > 9 {
            return Err(DrfError::ConfigInvalid(format!(
                "compression level {} is out of range 0-9",
                self.compression_level
            )));
        }
        Ok(())
    }
}

/// Unix seconds right now, 0 if the clock predates the epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub(crate) fn write_u64_attr(group: &Group, name: &str, value: u64) -> Result<()> {
    group.new_attr::<u64>().create(name)?.write_scalar(&value)?;
    Ok(())
}

pub(crate) fn write_i32_attr(group: &Group, name: &str, value: i32) -> Result<()> {
    group.new_attr::<i32>().create(name)?.write_scalar(&value)?;
    Ok(())
}

pub(crate) fn write_i64_attr(group: &Group, name: &str, value: i64) -> Result<()> {
    group.new_attr::<i64>().create(name)?.write_scalar(&value)?;
    Ok(())
}

pub(crate) fn write_f64_attr(group: &Group, name: &str, value: f64) -> Result<()> {
    group.new_attr::<f64>().create(name)?.write_scalar(&value)?;
    Ok(())
}

pub(crate) fn write_str_attr(group: &Group, name: &str, value: &str) -> Result<()> {
    let value: VarLenUnicode = value.parse().map_err(|err| {
        DrfError::ConfigInvalid(format!("attribute {} is not valid unicode: {}", name, err))
    })?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

pub(crate) fn read_u64_attr(group: &Group, name: &str) -> Result<u64> {
    Ok(group.attr(name)?.read_scalar::<u64>()?)
}

pub(crate) fn read_i32_attr(group: &Group, name: &str) -> Result<i32> {
    Ok(group.attr(name)?.read_scalar::<i32>()?)
}

pub(crate) fn read_i64_attr(group: &Group, name: &str) -> Result<i64> {
    Ok(group.attr(name)?.read_scalar::<i64>()?)
}

pub(crate) fn read_str_attr(group: &Group, name: &str) -> Result<String> {
    Ok(group.attr(name)?.read_scalar::<VarLenUnicode>()?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChannelConfig {
        ChannelConfig::new(3600, 1000, SampleRate::new(200, 1).unwrap(), 1)
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_cadence_divisibility() {
        let mut cfg = config();
        cfg.file_cadence_millisecs = 7;
        assert!(matches!(
            cfg.validate(),
            Err(DrfError::ConfigInvalid(_))
        ));
        // 3600 s splits into 400 files of 9 s each.
        cfg.file_cadence_millisecs = 9000;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_fields_rejected() {
        let mut cfg = config();
        cfg.subdir_cadence_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.num_subchannels = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.compression_level = 10;
        assert!(cfg.validate().is_err());
    }
}

//! The channel property file, `drf_properties.h5`.
//!
//! Written once into the channel root when a channel is first created, and
//! immutable afterwards: reopening a channel loads the recorded properties
//! and compares them field by field against the requested configuration,
//! failing with `PropertiesConflict` on any divergence.

use crate::dtype::SampleDtype;
use crate::error::{DrfError, Result};
use crate::store::{
    read_i32_attr, read_i64_attr, read_str_attr, read_u64_attr, write_f64_attr, write_i32_attr,
    write_i64_attr, write_str_attr, write_u64_attr, ChannelConfig, DIGITAL_RF_VERSION, EPOCH,
    PROPERTIES_FILE_NAME, TIME_DESCRIPTION,
};
use std::fmt::Display;
use std::path::Path;
use tracing::debug;

/// The channel-level properties recorded in `drf_properties.h5`.
///
/// Covers the immutable channel contract: cadences, exact sample rate,
/// element shape, and identity. Compression level and checksum are
/// per-file shaping knobs and deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProperties {
    /// Wall-clock seconds of data per subdirectory.
    pub subdir_cadence_secs: u64,
    /// Wall-clock milliseconds of data per file.
    pub file_cadence_millisecs: u64,
    /// Exact sample rate numerator in Hz.
    pub sample_rate_numerator: u64,
    /// Exact sample rate denominator in Hz.
    pub sample_rate_denominator: u64,
    /// Whether elements are complex I/Q pairs.
    pub is_complex: bool,
    /// Whether the channel is written in continuous mode.
    pub is_continuous: bool,
    /// Row width of the sample dataset.
    pub num_subchannels: usize,
    /// Opaque channel identifier.
    pub uuid: String,
    /// Format version of the channel.
    pub version: String,
    /// `H5Tget_class`-style class of the stored element.
    pub h5_class: i64,
    /// `H5Tget_size`-style element size in bytes.
    pub h5_size: u64,
    /// `H5Tget_precision`-style scalar precision in bits.
    pub h5_precision: u64,
    /// `H5Tget_offset`-style bit offset of the stored element.
    pub h5_offset: u64,
    /// `H5Tget_order`-style byte order of the stored element.
    pub h5_order: i64,
}

impl ChannelProperties {
    /// Derives the properties of a channel from its configuration and
    /// element classification.
    pub fn new(config: &ChannelConfig, dtype: &SampleDtype) -> Self {
        Self {
            subdir_cadence_secs: config.subdir_cadence_secs,
            file_cadence_millisecs: config.file_cadence_millisecs,
            sample_rate_numerator: config.sample_rate.numerator(),
            sample_rate_denominator: config.sample_rate.denominator(),
            is_complex: dtype.is_complex(),
            is_continuous: config.is_continuous,
            num_subchannels: config.num_subchannels,
            uuid: config.uuid.clone(),
            version: DIGITAL_RF_VERSION.to_string(),
            h5_class: dtype.h5_class(),
            h5_size: dtype.h5_size(),
            h5_precision: dtype.h5_precision(),
            h5_offset: dtype.h5_offset(),
            h5_order: dtype.h5_order(),
        }
    }

    /// Writes the property file if the channel is new, or verifies it
    /// against these properties if one already exists.
    ///
    /// # Errors
    ///
    /// Returns `PropertiesConflict` naming the first diverging field.
    pub fn ensure(&self, channel_dir: &Path) -> Result<()> {
        let path = channel_dir.join(PROPERTIES_FILE_NAME);
        if path.exists() {
            let existing = Self::read(&path)?;
            self.verify_matches(&existing)
        } else {
            debug!(file = %path.display(), "writing channel properties");
            self.write(&path)
        }
    }

    /// Reads a property file back.
    pub fn read(path: &Path) -> Result<Self> {
        let file = hdf5::File::open(path)?;
        Ok(Self {
            subdir_cadence_secs: read_u64_attr(&file, "subdir_cadence_secs")?,
            file_cadence_millisecs: read_u64_attr(&file, "file_cadence_millisecs")?,
            sample_rate_numerator: read_u64_attr(&file, "sample_rate_numerator")?,
            sample_rate_denominator: read_u64_attr(&file, "sample_rate_denominator")?,
            is_complex: read_i32_attr(&file, "is_complex")? != 0,
            is_continuous: read_i32_attr(&file, "is_continuous")? != 0,
            num_subchannels: read_i32_attr(&file, "num_subchannels")? as usize,
            uuid: read_str_attr(&file, "uuid_str")?,
            version: read_str_attr(&file, "digital_rf_version")?,
            h5_class: read_i64_attr(&file, "H5Tget_class")?,
            h5_size: read_u64_attr(&file, "H5Tget_size")?,
            h5_precision: read_u64_attr(&file, "H5Tget_precision")?,
            h5_offset: read_u64_attr(&file, "H5Tget_offset")?,
            h5_order: read_i64_attr(&file, "H5Tget_order")?,
        })
    }

    fn write(&self, path: &Path) -> Result<()> {
        let file = hdf5::File::create_excl(path)?;
        write_u64_attr(&file, "subdir_cadence_secs", self.subdir_cadence_secs)?;
        write_u64_attr(&file, "file_cadence_millisecs", self.file_cadence_millisecs)?;
        write_u64_attr(&file, "sample_rate_numerator", self.sample_rate_numerator)?;
        write_u64_attr(
            &file,
            "sample_rate_denominator",
            self.sample_rate_denominator,
        )?;
        write_f64_attr(
            &file,
            "samples_per_second",
            self.sample_rate_numerator as f64 / self.sample_rate_denominator as f64,
        )?;
        write_i32_attr(&file, "is_complex", self.is_complex as i32)?;
        write_i32_attr(&file, "is_continuous", self.is_continuous as i32)?;
        write_i32_attr(&file, "num_subchannels", self.num_subchannels as i32)?;
        write_str_attr(&file, "uuid_str", &self.uuid)?;
        write_str_attr(&file, "epoch", EPOCH)?;
        write_str_attr(&file, "digital_rf_time_description", TIME_DESCRIPTION)?;
        write_str_attr(&file, "digital_rf_version", &self.version)?;
        write_i64_attr(&file, "H5Tget_class", self.h5_class)?;
        write_u64_attr(&file, "H5Tget_size", self.h5_size)?;
        write_u64_attr(&file, "H5Tget_precision", self.h5_precision)?;
        write_u64_attr(&file, "H5Tget_offset", self.h5_offset)?;
        write_i64_attr(&file, "H5Tget_order", self.h5_order)?;
        file.flush()?;
        Ok(())
    }

    fn verify_matches(&self, existing: &Self) -> Result<()> {
        check("subdir_cadence_secs", existing.subdir_cadence_secs, self.subdir_cadence_secs)?;
        check(
            "file_cadence_millisecs",
            existing.file_cadence_millisecs,
            self.file_cadence_millisecs,
        )?;
        check(
            "sample_rate_numerator",
            existing.sample_rate_numerator,
            self.sample_rate_numerator,
        )?;
        check(
            "sample_rate_denominator",
            existing.sample_rate_denominator,
            self.sample_rate_denominator,
        )?;
        check("is_complex", existing.is_complex, self.is_complex)?;
        check("is_continuous", existing.is_continuous, self.is_continuous)?;
        check("num_subchannels", existing.num_subchannels, self.num_subchannels)?;
        check("uuid_str", &existing.uuid, &self.uuid)?;
        check("digital_rf_version", &existing.version, &self.version)?;
        check("H5Tget_class", existing.h5_class, self.h5_class)?;
        check("H5Tget_size", existing.h5_size, self.h5_size)?;
        check("H5Tget_precision", existing.h5_precision, self.h5_precision)?;
        check("H5Tget_offset", existing.h5_offset, self.h5_offset)?;
        check("H5Tget_order", existing.h5_order, self.h5_order)?;
        Ok(())
    }
}

fn check<V: PartialEq + Display>(field: &'static str, existing: V, requested: V) -> Result<()> {
    if existing != requested {
        return Err(DrfError::PropertiesConflict {
            field,
            existing: existing.to_string(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SampleRate;
    use tempfile::TempDir;

    fn properties() -> ChannelProperties {
        let mut config = ChannelConfig::new(3600, 1000, SampleRate::new(200, 1).unwrap(), 2);
        config.uuid = "test-uuid".to_string();
        config.is_continuous = true;
        let dtype = SampleDtype::of::<i16>().unwrap();
        ChannelProperties::new(&config, &dtype)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let props = properties();
        props.ensure(temp_dir.path()).unwrap();

        let read = ChannelProperties::read(&temp_dir.path().join(PROPERTIES_FILE_NAME)).unwrap();
        assert_eq!(read, props);
    }

    #[test]
    fn test_reopen_with_same_config() {
        let temp_dir = TempDir::new().unwrap();
        let props = properties();
        props.ensure(temp_dir.path()).unwrap();
        props.ensure(temp_dir.path()).unwrap();
    }

    #[test]
    fn test_conflict_names_the_field() {
        let temp_dir = TempDir::new().unwrap();
        properties().ensure(temp_dir.path()).unwrap();

        let mut changed = properties();
        changed.sample_rate_numerator = 100;
        match changed.ensure(temp_dir.path()) {
            Err(DrfError::PropertiesConflict { field, .. }) => {
                assert_eq!(field, "sample_rate_numerator");
            }
            other => panic!("expected PropertiesConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_uuid_is_part_of_the_contract() {
        let temp_dir = TempDir::new().unwrap();
        properties().ensure(temp_dir.path()).unwrap();

        let mut changed = properties();
        changed.uuid = "other-uuid".to_string();
        assert!(matches!(
            changed.ensure(temp_dir.path()),
            Err(DrfError::PropertiesConflict { field: "uuid_str", .. })
        ));
    }
}

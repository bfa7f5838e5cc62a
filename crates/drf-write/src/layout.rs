//! Deterministic mapping from global sample indexes to the on-disk layout.
//!
//! A channel directory is partitioned twice: into subdirectories covering
//! `subdir_cadence_secs` of wall-clock time each, and within them into data
//! files covering `file_cadence_millisecs` each:
//!
//! ```text
//! <channel>/
//!   drf_properties.h5
//!   2014-03-09T12-30-00/          subdir cadence boundary (UTC)
//!     rf@1394368200.000.h5        file cadence boundary (unix second.milli)
//!     rf@1394368201.000.h5
//!     ...
//! ```
//!
//! Both boundaries are rederived from the exact rational sample rate on
//! every query, so rates whose cadence does not divide into an integer
//! sample count stay drift-free over years of operation.

use crate::time::{CivilTime, SampleRate};
use std::path::{Path, PathBuf};

/// File extension of every data file.
pub const DATA_FILE_EXTENSION: &str = "h5";

/// Prefix of every data file name.
pub const DATA_FILE_PREFIX: &str = "rf@";

/// Plans subdirectory and file placement for one channel.
#[derive(Debug, Clone)]
pub struct ChannelLayout {
    /// Root channel directory.
    channel_dir: PathBuf,
    /// Wall-clock seconds of data per subdirectory.
    subdir_cadence_secs: u64,
    /// Wall-clock milliseconds of data per file.
    file_cadence_millisecs: u64,
    /// Exact sample rate of the channel.
    rate: SampleRate,
}

/// Placement of one global sample index in the directory hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSlot {
    /// Absolute path of the subdirectory covering the sample.
    pub subdir: PathBuf,
    /// Absolute path of the data file covering the sample.
    pub file_path: PathBuf,
    /// Global index of the first sample that can land in this file.
    pub file_first_index: u64,
    /// Offset of the sample within the file's cadence window.
    pub index_in_file: u64,
    /// Samples remaining in the file from this index to the window end.
    pub file_remaining: u64,
    /// Samples remaining in the subdirectory from this index.
    pub subdir_remaining: u64,
}

impl ChannelLayout {
    /// Creates a layout for the given channel directory and cadences.
    ///
    /// Cadence validity (nonzero, subdir divisible into whole files) is the
    /// channel configuration's concern; the layout assumes it holds.
    pub fn new(
        channel_dir: impl AsRef<Path>,
        subdir_cadence_secs: u64,
        file_cadence_millisecs: u64,
        rate: SampleRate,
    ) -> Self {
        Self {
            channel_dir: channel_dir.as_ref().to_path_buf(),
            subdir_cadence_secs,
            file_cadence_millisecs,
            rate,
        }
    }

    /// Returns the root channel directory.
    pub fn channel_dir(&self) -> &Path {
        &self.channel_dir
    }

    /// Returns the start second of the subdirectory covering `index`.
    ///
    /// Always an integer multiple of the subdirectory cadence.
    pub fn subdir_start_second(&self, index: u64) -> u64 {
        let window = self.rate.numerator() as u128 * self.subdir_cadence_secs as u128;
        let ticks = index as u128 * self.rate.denominator() as u128;
        (ticks / window) as u64 * self.subdir_cadence_secs
    }

    /// Returns the start millisecond of the file covering `index`.
    ///
    /// Always an integer multiple of the file cadence.
    pub fn file_start_millisecond(&self, index: u64) -> u64 {
        let ticks_ms =
            index as u128 * self.rate.denominator() as u128 * 1000 / self.rate.numerator() as u128;
        (ticks_ms / self.file_cadence_millisecs as u128) as u64 * self.file_cadence_millisecs
    }

    /// Returns the name of the subdirectory covering `index`:
    /// `YYYY-MM-DDTHH-MM-SS` in UTC.
    pub fn subdir_name(&self, index: u64) -> String {
        let civil = CivilTime::from_timestamp(self.subdir_start_second(index), 0);
        format!(
            "{:04}-{:02}-{:02}T{:02}-{:02}-{:02}",
            civil.year, civil.month, civil.day, civil.hour, civil.minute, civil.second
        )
    }

    /// Returns the name of the file covering `index`:
    /// `rf@<second>.<milli>.h5`.
    pub fn file_name(&self, index: u64) -> String {
        let start_ms = self.file_start_millisecond(index);
        format!(
            "{}{}.{:03}.{}",
            DATA_FILE_PREFIX,
            start_ms / 1000,
            start_ms % 1000,
            DATA_FILE_EXTENSION
        )
    }

    /// Plans the placement of `index`, with the remaining capacity of both
    /// the file and the subdirectory measured in samples.
    pub fn slot(&self, index: u64) -> WriteSlot {
        let file_start_ms = self.file_start_millisecond(index);
        let file_first_index = self.first_index_at_millisecond(file_start_ms as u128);
        let file_end_index = self
            .first_index_at_millisecond(file_start_ms as u128 + self.file_cadence_millisecs as u128);

        let subdir_start = self.subdir_start_second(index);
        let subdir_end_index = self
            .first_index_at_millisecond((subdir_start as u128 + self.subdir_cadence_secs as u128) * 1000);

        let subdir = self.channel_dir.join(self.subdir_name(index));
        let file_path = subdir.join(self.file_name(index));
        WriteSlot {
            subdir,
            file_path,
            file_first_index,
            index_in_file: index - file_first_index,
            file_remaining: file_end_index - index,
            subdir_remaining: subdir_end_index - index,
        }
    }

    /// Returns the exact per-file sample count when the rate divides the
    /// file cadence evenly, `None` when file boundaries are fractional.
    pub fn file_cadence_samples(&self) -> Option<u64> {
        let ticks = self.rate.numerator() as u128 * self.file_cadence_millisecs as u128;
        let per_second = self.rate.denominator() as u128 * 1000;
        if ticks % per_second == 0 {
            Some((ticks / per_second) as u64)
        } else {
            None
        }
    }

    /// Smallest global index at or after the given absolute millisecond.
    fn first_index_at_millisecond(&self, millisecond: u128) -> u64 {
        let numer = millisecond * self.rate.numerator() as u128;
        let denom = self.rate.denominator() as u128 * 1000;
        (numer.div_ceil(denom)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(num: u64, den: u64, subdir_secs: u64, file_ms: u64) -> ChannelLayout {
        let rate = SampleRate::new(num, den).unwrap();
        ChannelLayout::new("/data/ch0", subdir_secs, file_ms, rate)
    }

    #[test]
    fn test_subdir_name_at_epoch() {
        let layout = layout(200, 1, 3600, 1000);
        assert_eq!(layout.subdir_name(0), "1970-01-01T00-00-00");
        assert_eq!(layout.subdir_name(199), "1970-01-01T00-00-00");
        // 200 Hz, one hour per subdir: sample 720_000 starts the next one.
        assert_eq!(layout.subdir_name(720_000), "1970-01-01T01-00-00");
    }

    #[test]
    fn test_file_name_cadence() {
        let layout = layout(200, 1, 3600, 1000);
        assert_eq!(layout.file_name(0), "rf@0.000.h5");
        assert_eq!(layout.file_name(199), "rf@0.000.h5");
        assert_eq!(layout.file_name(200), "rf@1.000.h5");
    }

    #[test]
    fn test_sub_second_file_cadence() {
        let layout = layout(1000, 1, 2, 400);
        assert_eq!(layout.file_name(0), "rf@0.000.h5");
        assert_eq!(layout.file_name(400), "rf@0.400.h5");
        assert_eq!(layout.file_name(850), "rf@0.800.h5");
    }

    #[test]
    fn test_slot_file_inside_subdir() {
        let layout = layout(200, 1, 2, 500);
        let slot = layout.slot(750);
        assert_eq!(
            slot.subdir,
            PathBuf::from("/data/ch0/1970-01-01T00-00-02")
        );
        assert_eq!(slot.file_path, slot.subdir.join("rf@3.500.h5"));
        assert_eq!(slot.file_path.parent(), Some(slot.subdir.as_path()));
    }

    #[test]
    fn test_slot_capacities_even_rate() {
        let layout = layout(200, 1, 3600, 1000);
        assert_eq!(layout.file_cadence_samples(), Some(200));
        let slot = layout.slot(450);
        assert_eq!(slot.file_first_index, 400);
        assert_eq!(slot.index_in_file, 50);
        assert_eq!(slot.file_remaining, 150);
        // One hour of 200 Hz data per subdir.
        assert_eq!(slot.subdir_remaining, 720_000 - 450);
    }

    #[test]
    fn test_fractional_file_boundaries() {
        // 3 Hz with 500 ms files: samples at 0, 333.3, 666.6, 1000 ms ...
        // land in alternating 2/1 sample windows that must be rederived
        // exactly per query.
        let layout = layout(3, 1, 10, 500);
        assert_eq!(layout.file_cadence_samples(), None);

        let slot0 = layout.slot(0);
        assert_eq!(slot0.file_first_index, 0);
        assert_eq!(slot0.file_remaining, 2); // samples 0 and 1 before 500 ms

        let slot2 = layout.slot(2);
        assert_eq!(slot2.file_first_index, 2);
        assert_eq!(slot2.index_in_file, 0);
        assert_eq!(slot2.file_remaining, 1); // sample 2 alone in [500, 1000) ms

        let slot3 = layout.slot(3);
        assert_eq!(slot3.file_first_index, 3);
        assert_eq!(layout.file_name(3), "rf@1.000.h5");
    }

    #[test]
    fn test_historical_start_is_allowed() {
        // Start indexes in the past simply produce historical timestamps.
        let layout = layout(1, 1, 86_400, 3_600_000);
        assert_eq!(layout.subdir_name(0), "1970-01-01T00-00-00");
        let slot = layout.slot(90_000);
        assert_eq!(
            slot.subdir,
            PathBuf::from("/data/ch0/1970-01-02T00-00-00")
        );
        assert_eq!(slot.file_path, slot.subdir.join("rf@90000.000.h5"));
    }
}

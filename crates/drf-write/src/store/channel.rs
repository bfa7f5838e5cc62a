//! Top-level channel writer state machine.
//!
//! A [`ChannelWriter`] accepts successive blocks of samples tagged with a
//! monotonic global sample index, slices them along file and subdirectory
//! cadence boundaries, and drives one [`FileWriter`](super::file::FileWriter)
//! at a time. Writers are single-threaded values: one writer per channel
//! directory, exclusive access per call.
//!
//! # Example
//!
//! ```rust,ignore
//! use drf_write::{ChannelConfig, ChannelWriter, SampleRate};
//!
//! let rate = SampleRate::new(200, 1)?;
//! let mut config = ChannelConfig::new(3600, 1000, rate, 1);
//! config.uuid = "sensor-7".to_string();
//!
//! let mut writer = ChannelWriter::<i16>::create("/data/ch0", config, 0)?;
//! writer.write(&samples)?;
//! writer.close()?;
//! ```

use crate::dtype::SampleDtype;
use crate::error::{DrfError, Result};
use crate::layout::{ChannelLayout, WriteSlot};
use crate::store::file::FileWriter;
use crate::store::{unix_now, ChannelConfig, ChannelProperties};
use hdf5::H5Type;
use ndarray::{s, ArrayView2};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writer for one channel directory.
///
/// Owns at most one open data file; samples flow strictly forward. All
/// entry points require exclusive access, and two writers on the same
/// channel directory are not supported.
pub struct ChannelWriter<T: H5Type + Copy + Default> {
    config: ChannelConfig,
    dtype: SampleDtype,
    layout: ChannelLayout,
    /// Unix second of the channel's start index, echoed into every file.
    init_utc_timestamp: u64,
    /// Global index of the next sample if the stream stayed contiguous.
    next_expected_index: u64,
    /// Largest global index persisted so far, None before the first write.
    last_written_index: Option<u64>,
    open_file: Option<FileWriter<T>>,
    last_file_written: Option<PathBuf>,
    last_dir_written: Option<PathBuf>,
    last_write_time: Option<u64>,
    progress: Box<dyn Write + Send>,
}

impl<T: H5Type + Copy + Default> ChannelWriter<T> {
    /// Opens a channel directory for writing, creating it if absent.
    ///
    /// Emits `drf_properties.h5` into the channel root on first creation;
    /// on a preexisting channel every recorded property is compared against
    /// the requested configuration.
    ///
    /// Start indexes in the past are allowed and produce subdirectories
    /// with historical timestamps.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for a rejected configuration or element
    /// type, `PropertiesConflict` when the channel already exists with a
    /// different configuration, and `Io`/`Hdf5` for filesystem failures.
    pub fn create(
        channel_dir: impl AsRef<Path>,
        config: ChannelConfig,
        start_global_index: u64,
    ) -> Result<Self> {
        config.validate()?;
        let dtype = SampleDtype::of::<T>()?;
        let channel_dir = channel_dir.as_ref().to_path_buf();
        fs::create_dir_all(&channel_dir)?;
        ChannelProperties::new(&config, &dtype).ensure(&channel_dir)?;

        let layout = ChannelLayout::new(
            &channel_dir,
            config.subdir_cadence_secs,
            config.file_cadence_millisecs,
            config.sample_rate,
        );
        let (init_utc_timestamp, _) = config.sample_rate.index_to_timestamp(start_global_index)?;
        info!(
            channel = %channel_dir.display(),
            start_index = start_global_index,
            "opened channel for writing"
        );
        Ok(Self {
            config,
            dtype,
            layout,
            init_utc_timestamp,
            next_expected_index: start_global_index,
            last_written_index: None,
            open_file: None,
            last_file_written: None,
            last_dir_written: None,
            last_write_time: None,
            progress: Box::new(io::stderr()),
        })
    }

    /// Writes one continuous block starting at the next expected index.
    ///
    /// Equivalent to `write_blocks(data, &[next_expected_index()], &[0])`.
    pub fn write(&mut self, data: &[T]) -> Result<()> {
        let start = self.next_expected_index;
        self.write_blocks(data, &[start], &[0])
    }

    /// Writes `global_indices.len()` runs out of one flat sample buffer.
    ///
    /// Run `j` starts at buffer row `block_offsets[j]`, ends before row
    /// `block_offsets[j + 1]` (the last run extends to the end of the
    /// buffer), and begins at global sample `global_indices[j]`.
    ///
    /// # Arguments
    ///
    /// * `data` - row-major buffer of `n * num_subchannels` elements
    /// * `global_indices` - strictly increasing run start indexes
    /// * `block_offsets` - strictly increasing buffer row offsets, first 0
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` for a ragged buffer, `Order` for malformed run
    /// boundaries, `Overlap` for a write into the past, `FileExists` when
    /// a planned file is already on disk, plus `Io`/`Hdf5` passthrough.
    /// On any error the open file is closed best-effort and the channel
    /// bookkeeping is untouched, so retrying at a later index is safe.
    pub fn write_blocks(
        &mut self,
        data: &[T],
        global_indices: &[u64],
        block_offsets: &[u64],
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let subchannels = self.config.num_subchannels;
        if data.len() % subchannels != 0 {
            return Err(DrfError::ShapeMismatch {
                len: data.len(),
                num_subchannels: subchannels,
            });
        }
        let n_samples = (data.len() / subchannels) as u64;
        self.check_run_bounds(global_indices, block_offsets, n_samples)?;

        let view = ArrayView2::from_shape((n_samples as usize, subchannels), data).map_err(|_| {
            DrfError::ShapeMismatch {
                len: data.len(),
                num_subchannels: subchannels,
            }
        })?;

        if let Err(err) = self.write_runs(view, global_indices, block_offsets, n_samples) {
            // Seal the partially written file so a retry cannot land in it;
            // bookkeeping below stays untouched.
            if let Some(file) = self.open_file.take() {
                if let Err(close_err) = file.close() {
                    warn!("Failed to close data file after write error: {:?}", close_err);
                }
            }
            return Err(err);
        }

        let last = global_indices.len() - 1;
        self.next_expected_index = global_indices[last] + (n_samples - block_offsets[last]);
        self.last_written_index = Some(self.next_expected_index - 1);
        self.last_write_time = Some(unix_now());
        Ok(())
    }

    /// Returns the global index of the next sample of a contiguous stream.
    pub fn next_expected_index(&self) -> u64 {
        self.next_expected_index
    }

    /// Returns the largest global index written, None before any write.
    pub fn last_written_index(&self) -> Option<u64> {
        self.last_written_index
    }

    /// Returns the path of the most recently written data file.
    pub fn last_file_written(&self) -> Option<&Path> {
        self.last_file_written.as_deref()
    }

    /// Returns the path of the most recently written subdirectory.
    pub fn last_dir_written(&self) -> Option<&Path> {
        self.last_dir_written.as_deref()
    }

    /// Returns the wall-clock unix second of the last successful write.
    pub fn last_write_time(&self) -> Option<u64> {
        self.last_write_time
    }

    /// Replaces the marching-periods heartbeat sink (stderr by default).
    pub fn set_progress_sink(&mut self, sink: Box<dyn Write + Send>) {
        self.progress = sink;
    }

    /// Flushes and closes the open data file, consuming the writer.
    pub fn close(mut self) -> Result<()> {
        if let Some(file) = self.open_file.take() {
            file.close()?;
        }
        Ok(())
    }

    fn check_run_bounds(
        &self,
        global_indices: &[u64],
        block_offsets: &[u64],
        n_samples: u64,
    ) -> Result<()> {
        if global_indices.is_empty() || global_indices.len() != block_offsets.len() {
            return Err(DrfError::Order(format!(
                "global index and block offset arrays must be the same nonzero length, got {} and {}",
                global_indices.len(),
                block_offsets.len()
            )));
        }
        if block_offsets[0] != 0 {
            return Err(DrfError::Order(format!(
                "first block offset must be 0, got {}",
                block_offsets[0]
            )));
        }
        for j in 1..global_indices.len() {
            if block_offsets[j] <= block_offsets[j - 1] {
                return Err(DrfError::Order(format!(
                    "block offsets must be strictly increasing, got {} after {}",
                    block_offsets[j],
                    block_offsets[j - 1]
                )));
            }
            if global_indices[j] <= global_indices[j - 1] {
                return Err(DrfError::Order(format!(
                    "global indices must be strictly increasing, got {} after {}",
                    global_indices[j],
                    global_indices[j - 1]
                )));
            }
            // Gaps may be inserted between runs, never removed: indexes must
            // advance at least as fast as buffer rows.
            if global_indices[j] - global_indices[j - 1] < block_offsets[j] - block_offsets[j - 1] {
                return Err(DrfError::Order(format!(
                    "run at index {} would overlap the previous run",
                    global_indices[j]
                )));
            }
        }
        if let Some(&last) = block_offsets.last() {
            if last >= n_samples {
                return Err(DrfError::Order(format!(
                    "block offset {} is out of range for {} samples",
                    last, n_samples
                )));
            }
        }
        if global_indices[0] < self.next_expected_index {
            return Err(DrfError::Overlap {
                requested: global_indices[0],
                next_expected: self.next_expected_index,
            });
        }
        Ok(())
    }

    fn write_runs(
        &mut self,
        view: ArrayView2<'_, T>,
        global_indices: &[u64],
        block_offsets: &[u64],
        n_samples: u64,
    ) -> Result<()> {
        for (j, &start) in global_indices.iter().enumerate() {
            let mut global = start;
            let mut cursor = block_offsets[j];
            let run_end = block_offsets
                .get(j + 1)
                .copied()
                .unwrap_or(n_samples);
            while cursor < run_end {
                let slot = self.layout.slot(global);
                let rotate = match &self.open_file {
                    Some(file) => file.path() != slot.file_path,
                    None => true,
                };
                if rotate {
                    self.rotate_file(&slot)?;
                }
                let file = match self.open_file.as_mut() {
                    Some(file) => file,
                    None => {
                        return Err(DrfError::InternalInvariant(
                            "no open file after rotation".to_string(),
                        ))
                    }
                };
                let take = (run_end - cursor).min(slot.file_remaining);
                let rows = view.slice(s![cursor as usize..(cursor + take) as usize, ..]);
                file.append(global, rows)?;
                global += take;
                cursor += take;
            }
        }
        Ok(())
    }

    /// Closes the open file and opens the planned one in its place.
    fn rotate_file(&mut self, slot: &WriteSlot) -> Result<()> {
        if let Some(file) = self.open_file.take() {
            file.close()?;
        }
        fs::create_dir_all(&slot.subdir)?;
        if slot.file_path.exists() {
            return Err(DrfError::FileExists(slot.file_path.clone()));
        }
        let capacity = slot.index_in_file + slot.file_remaining;
        let file = FileWriter::create(
            &slot.file_path,
            &self.config,
            &self.dtype,
            slot.file_first_index,
            capacity,
            self.init_utc_timestamp,
        )?;

        let entered_new_subdir = self.last_dir_written.as_deref() != Some(slot.subdir.as_path());
        if entered_new_subdir && self.config.marching_periods {
            // Heartbeat only; a broken sink must not fail the write.
            let _ = self.progress.write_all(b".");
            let _ = self.progress.flush();
        }

        self.last_file_written = Some(slot.file_path.clone());
        self.last_dir_written = Some(slot.subdir.clone());
        self.open_file = Some(file);
        Ok(())
    }
}

impl<T: H5Type + Copy + Default> Drop for ChannelWriter<T> {
    fn drop(&mut self) {
        // Best effort to seal the open file.
        if let Some(file) = self.open_file.take() {
            if let Err(err) = file.close() {
                warn!("Failed to close data file on drop: {:?}", err);
            }
        }
    }
}

//! Writer for one data file covering one file-cadence window.
//!
//! A data file holds two datasets:
//!
//! - `rf_data`: 2-D, resizable along axis 0, `num_subchannels` wide, the
//!   configured element type, chunked, optionally gzip-compressed and
//!   Fletcher-32 checksummed.
//! - `rf_data_index`: `(K, 2)` of `u64`, one row
//!   `(global_sample_index, row_within_rf_data)` per contiguous run.
//!
//! Consecutive index rows delimit runs; the final run extends to the end of
//! `rf_data`. In continuous mode a file holds exactly one run and interior
//! gaps are zero-filled. Lifecycle is `Closed -> Open -> Closed` with no
//! reopen: once closed, a file is immutable.

use crate::dtype::SampleDtype;
use crate::error::{DrfError, Result};
use crate::store::{
    write_f64_attr, write_i32_attr, write_str_attr, write_u64_attr, unix_now, ChannelConfig,
    DIGITAL_RF_VERSION, EPOCH, TIME_DESCRIPTION,
};
use hdf5::{Dataset, H5Type};
use ndarray::{arr2, s, Array2, ArrayView2};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the sample dataset in every data file.
pub const DATA_DATASET: &str = "rf_data";

/// Name of the contiguous-run index dataset in every data file.
pub const INDEX_DATASET: &str = "rf_data_index";

/// Upper bound on the sample-dataset chunk, in bytes per chunk.
const CHUNK_TARGET_BYTES: usize = 4 * 1024 * 1024;

const INDEX_CHUNK_ROWS: usize = 128;

/// Open handle on one data file.
pub(crate) struct FileWriter<T: H5Type + Copy + Default> {
    data: Dataset,
    index: Dataset,
    file: hdf5::File,
    path: PathBuf,
    file_first_index: u64,
    capacity: u64,
    /// Global index of the first sample written to this file; fixes the
    /// zero-fill base in continuous mode. No zero prefill happens before it.
    base_index: Option<u64>,
    /// Global index that would extend the last run without a break.
    next_contiguous: Option<u64>,
    rows: u64,
    index_rows: u64,
    num_subchannels: usize,
    is_continuous: bool,
    _element: PhantomData<T>,
}

impl<T: H5Type + Copy + Default> FileWriter<T> {
    /// Creates the file, writes the channel attributes, and creates both
    /// datasets. Fails if the path already exists.
    pub(crate) fn create(
        path: &Path,
        config: &ChannelConfig,
        dtype: &SampleDtype,
        file_first_index: u64,
        capacity: u64,
        init_utc_timestamp: u64,
    ) -> Result<Self> {
        let file = hdf5::File::create_excl(path)?;
        write_file_attrs(&file, config, dtype, init_utc_timestamp)?;

        let row_bytes = dtype.element_size() * config.num_subchannels;
        let chunk_rows = chunk_rows(capacity, row_bytes);
        let mut builder = file
            .new_dataset::<T>()
            .shape((0.., config.num_subchannels))
            .chunk((chunk_rows, config.num_subchannels));
        if config.compression_level > 0 {
            builder = builder.deflate(config.compression_level);
        }
        if config.checksum {
            builder = builder.fletcher32();
        }
        let data = builder.create(DATA_DATASET)?;

        let index = file
            .new_dataset::<u64>()
            .shape((0.., 2))
            .chunk((INDEX_CHUNK_ROWS, 2))
            .create(INDEX_DATASET)?;

        debug!(
            file = %path.display(),
            first_index = file_first_index,
            capacity,
            "created data file"
        );

        Ok(Self {
            data,
            index,
            file,
            path: path.to_path_buf(),
            file_first_index,
            capacity,
            base_index: None,
            next_contiguous: None,
            rows: 0,
            index_rows: 0,
            num_subchannels: config.num_subchannels,
            is_continuous: config.is_continuous,
            _element: PhantomData,
        })
    }

    /// Returns the path of the open file.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one run of samples starting at the given global index.
    ///
    /// The channel writer guarantees runs arrive strictly sorted and inside
    /// the file's cadence window; violations are its bugs, not the
    /// caller's, and surface as `OutOfFileCapacity` or
    /// `InternalInvariant`.
    pub(crate) fn append(&mut self, start: u64, samples: ArrayView2<'_, T>) -> Result<()> {
        let n = samples.nrows() as u64;
        let room = start
            .checked_sub(self.file_first_index)
            .and_then(|offset| self.capacity.checked_sub(offset));
        if room.map_or(true, |room| n > room) {
            return Err(DrfError::OutOfFileCapacity {
                start,
                samples: n,
                capacity: self.capacity,
            });
        }
        if let Some(next) = self.next_contiguous {
            if start < next {
                return Err(DrfError::InternalInvariant(format!(
                    "run at {} precedes the end of the previous run at {}",
                    start, next
                )));
            }
        }

        let offset;
        let mut index_entry = None;
        if self.is_continuous {
            match self.base_index {
                None => {
                    // First run fixes the base; the window before it is
                    // never zero-prefilled.
                    self.base_index = Some(start);
                    offset = 0;
                    index_entry = Some((start, 0));
                }
                Some(base) => {
                    offset = start - base;
                    if offset > self.rows {
                        self.zero_fill(self.rows, offset)?;
                    }
                }
            }
        } else {
            offset = self.rows;
            if self.next_contiguous != Some(start) {
                index_entry = Some((start, offset));
            }
        }

        let end = offset + n;
        self.data.resize((end as usize, self.num_subchannels))?;
        self.data
            .write_slice(samples, s![offset as usize..end as usize, ..])?;
        if let Some((global, row)) = index_entry {
            self.push_index(global, row)?;
        }
        self.rows = end;
        self.next_contiguous = Some(start + n);
        Ok(())
    }

    /// Flushes and closes the file; it is immutable afterwards.
    pub(crate) fn close(self) -> Result<()> {
        debug!(file = %self.path.display(), rows = self.rows, "closing data file");
        self.file.flush()?;
        Ok(())
    }

    /// Extends `rf_data` with zero rows over `[from, to)`.
    fn zero_fill(&mut self, from: u64, to: u64) -> Result<()> {
        let zeros = Array2::<T>::default(((to - from) as usize, self.num_subchannels));
        self.data.resize((to as usize, self.num_subchannels))?;
        self.data
            .write_slice(zeros.view(), s![from as usize..to as usize, ..])?;
        Ok(())
    }

    fn push_index(&mut self, global: u64, row_in_file: u64) -> Result<()> {
        let next = self.index_rows + 1;
        self.index.resize((next as usize, 2))?;
        let entry = arr2(&[[global, row_in_file]]);
        self.index
            .write_slice(entry.view(), s![self.index_rows as usize..next as usize, ..])?;
        self.index_rows = next;
        Ok(())
    }
}

fn chunk_rows(capacity: u64, row_bytes: usize) -> usize {
    let by_bytes = (CHUNK_TARGET_BYTES / row_bytes.max(1)).max(1) as u64;
    capacity.clamp(1, by_bytes) as usize
}

fn write_file_attrs(
    file: &hdf5::File,
    config: &ChannelConfig,
    dtype: &SampleDtype,
    init_utc_timestamp: u64,
) -> Result<()> {
    write_u64_attr(file, "subdir_cadence_secs", config.subdir_cadence_secs)?;
    write_u64_attr(
        file,
        "file_cadence_millisecs",
        config.file_cadence_millisecs,
    )?;
    write_u64_attr(
        file,
        "sample_rate_numerator",
        config.sample_rate.numerator(),
    )?;
    write_u64_attr(
        file,
        "sample_rate_denominator",
        config.sample_rate.denominator(),
    )?;
    write_f64_attr(file, "samples_per_second", config.sample_rate.as_f64())?;
    write_i32_attr(file, "is_complex", dtype.is_complex() as i32)?;
    write_i32_attr(file, "is_continuous", config.is_continuous as i32)?;
    write_i32_attr(file, "num_subchannels", config.num_subchannels as i32)?;
    write_str_attr(file, "uuid_str", &config.uuid)?;
    write_str_attr(file, "epoch", EPOCH)?;
    write_str_attr(file, "digital_rf_time_description", TIME_DESCRIPTION)?;
    write_str_attr(file, "digital_rf_version", DIGITAL_RF_VERSION)?;
    write_u64_attr(file, "computer_time", unix_now())?;
    write_u64_attr(file, "init_utc_timestamp", init_utc_timestamp)?;
    Ok(())
}

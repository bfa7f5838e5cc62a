//! Property tests for rational time arithmetic and path planning.
//!
//! Uses proptest to verify the exact index/time round-trip and the cadence
//! bookkeeping of the path planner for arbitrary rates and indexes.

use drf_write::{ChannelLayout, SampleRate};
use proptest::prelude::*;

/// Rates up to 1 MHz with denominators up to 1000, the range real channels
/// use; keeps 128-bit intermediates comfortably in range.
fn rate_strategy() -> impl Strategy<Value = SampleRate> {
    (1u64..=1_000_000, 1u64..=1_000)
        .prop_map(|(num, den)| SampleRate::new(num, den).unwrap())
}

/// File cadences that divide one second, so any subdir cadence is valid and
/// whole-kHz rates give an exact per-file sample count.
fn file_cadence_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        Just(1000u64),
        Just(500u64),
        Just(200u64),
        Just(100u64),
        Just(40u64),
        Just(8u64),
    ]
}

proptest! {
    #[test]
    fn timestamp_roundtrip(rate in rate_strategy(), index in 0u64..(1u64 << 52)) {
        let (second, picosecond) = rate.index_to_timestamp(index).unwrap();
        prop_assert_eq!(rate.timestamp_to_index(second, picosecond).unwrap(), index);
    }

    #[test]
    fn picosecond_stays_subsecond(rate in rate_strategy(), index in 0u64..(1u64 << 52)) {
        let (_, picosecond) = rate.index_to_timestamp(index).unwrap();
        prop_assert!(picosecond < 1_000_000_000_000);
    }

    #[test]
    fn roundtrip_or_rejection_at_full_range(
        num in 1u64..=1_000_000,
        den in 1u64..=1_000_000,
        index in 0u64..=u64::MAX,
    ) {
        // Over the whole 64-bit index range the conversion either round-trips
        // exactly or rejects both directions; it never wraps.
        let rate = SampleRate::new(num, den).unwrap();
        match rate.index_to_timestamp(index) {
            Ok((second, picosecond)) => {
                prop_assert_eq!(rate.timestamp_to_index(second, picosecond).unwrap(), index);
            }
            Err(_) => {
                // Only reachable when the sample time exceeds 64-bit
                // seconds, which needs a sub-unity rate.
                prop_assert!(den > num);
            }
        }
    }

    #[test]
    fn planned_file_lies_inside_its_subdir(
        rate in rate_strategy(),
        subdir_cadence_secs in 1u64..=7200,
        file_cadence_millisecs in file_cadence_strategy(),
        index in 0u64..(1u64 << 40),
    ) {
        let layout = ChannelLayout::new(
            "/data/ch0",
            subdir_cadence_secs,
            file_cadence_millisecs,
            rate,
        );
        let slot = layout.slot(index);

        prop_assert_eq!(slot.file_path.parent(), Some(slot.subdir.as_path()));

        // The file's start millisecond falls inside the subdir's window.
        let subdir_start = layout.subdir_start_second(index);
        let file_start_ms = layout.file_start_millisecond(index);
        prop_assert!(file_start_ms >= subdir_start * 1000);
        prop_assert!(file_start_ms < (subdir_start + subdir_cadence_secs) * 1000);

        // Both cadence boundaries are integer multiples of their cadence.
        prop_assert_eq!(subdir_start % subdir_cadence_secs, 0);
        prop_assert_eq!(file_start_ms % file_cadence_millisecs, 0);

        // The sample itself is inside the file window.
        prop_assert!(slot.file_first_index <= index);
        prop_assert!(slot.file_remaining >= 1);
        prop_assert!(slot.subdir_remaining >= slot.file_remaining);
    }

    #[test]
    fn even_rates_give_constant_file_capacity(
        rate_khz in 1u64..=1_000,
        file_cadence_millisecs in file_cadence_strategy(),
        index in 0u64..(1u64 << 48),
    ) {
        // Whole-kHz rates divide every cadence that divides one second.
        let rate = SampleRate::new(rate_khz * 1000, 1).unwrap();
        let layout = ChannelLayout::new("/data/ch0", 3600, file_cadence_millisecs, rate);

        let per_file = layout.file_cadence_samples().unwrap();
        prop_assert_eq!(per_file, rate_khz * file_cadence_millisecs);

        let slot = layout.slot(index);
        prop_assert_eq!(slot.file_remaining + slot.index_in_file, per_file);
    }
}

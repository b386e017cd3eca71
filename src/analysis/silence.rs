//! Silence detection over bucketed amplitudes

use crate::domain::model::{SilenceDetectionConfig, SilenceRange};

/// Padded ranges shorter than this are treated as noise
pub const MIN_RANGE_DURATION_MS: i64 = 10;

/// Find runs of buckets at or below `config.threshold`.
///
/// Bucket `i` covers `[i, i + 1) * total / len` ms; endpoints are rounded to
/// the nearest millisecond. A run is admitted only when its duration is at
/// least `config.min_silence_ms`. A run still open at the last bucket ends at
/// `total_duration_ms` and is flagged `reaches_end`. No padding is applied.
pub fn find_silence(
    amplitudes: &[f32],
    total_duration_ms: i64,
    config: &SilenceDetectionConfig,
) -> Vec<SilenceRange> {
    if amplitudes.is_empty() || total_duration_ms <= 0 {
        return Vec::new();
    }

    let ms_per_bucket = total_duration_ms as f64 / amplitudes.len() as f64;
    let edge = |bucket: usize| (bucket as f64 * ms_per_bucket).round() as i64;
    let admit = |start_ms: i64, end_ms: i64| {
        end_ms > start_ms && end_ms - start_ms >= config.min_silence_ms
    };

    let mut ranges = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, value) in amplitudes.iter().enumerate() {
        if value.abs() <= config.threshold {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            let (start_ms, end_ms) = (edge(start), edge(i));
            if admit(start_ms, end_ms) {
                ranges.push(SilenceRange::new(start_ms, end_ms));
            }
        }
    }

    if let Some(start) = run_start {
        let start_ms = edge(start);
        if admit(start_ms, total_duration_ms) {
            ranges.push(SilenceRange {
                start_ms,
                end_ms: total_duration_ms,
                reaches_end: true,
            });
        }
    }

    ranges
}

/// Shrink each range inward by the padding, clamp to `[0, total]` and drop
/// anything shorter than [`MIN_RANGE_DURATION_MS`]. Ranges never invert.
pub fn apply_padding_and_filter(
    ranges: &[SilenceRange],
    padding_start_ms: i64,
    padding_end_ms: i64,
    total_duration_ms: i64,
) -> Vec<SilenceRange> {
    let total = total_duration_ms.max(0);
    ranges
        .iter()
        .filter_map(|range| {
            let clamped_start = range.start_ms.clamp(0, total);
            let clamped_end = range.end_ms.clamp(clamped_start, total);
            let start = (clamped_start + padding_start_ms.max(0)).min(clamped_end);
            let end = (clamped_end - padding_end_ms.max(0)).max(start);
            (end - start >= MIN_RANGE_DURATION_MS).then_some(SilenceRange {
                start_ms: start,
                end_ms: end,
                reaches_end: range.reaches_end,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: f32, min_silence_ms: i64) -> SilenceDetectionConfig {
        SilenceDetectionConfig {
            threshold,
            min_silence_ms,
            ..SilenceDetectionConfig::default()
        }
    }

    fn spans(ranges: &[SilenceRange]) -> Vec<(i64, i64)> {
        ranges.iter().map(|r| (r.start_ms, r.end_ms)).collect()
    }

    #[test]
    fn test_single_interior_run() {
        let ranges = find_silence(&[0.5, 0.01, 0.01, 0.01, 0.5], 500, &config(0.02, 50));
        assert_eq!(spans(&ranges), vec![(100, 400)]);
        assert!(!ranges[0].reaches_end);
    }

    #[test]
    fn test_leading_run_over_fractional_buckets() {
        let ranges = find_silence(&[0.1, 0.0, 0.0, 0.5], 1_000, &config(0.2, 200));
        assert_eq!(spans(&ranges), vec![(0, 750)]);
    }

    #[test]
    fn test_trailing_run_flagged() {
        let ranges = find_silence(&[0.5, 0.5, 0.0, 0.0], 400, &config(0.02, 100));
        assert_eq!(spans(&ranges), vec![(200, 400)]);
        assert!(ranges[0].reaches_end);
    }

    #[test]
    fn test_short_runs_rejected() {
        let ranges = find_silence(&[0.0, 0.5, 0.0, 0.0, 0.5], 500, &config(0.02, 150));
        assert_eq!(spans(&ranges), vec![(200, 400)]);
    }

    #[test]
    fn test_negative_amplitudes_use_magnitude() {
        let ranges = find_silence(&[-0.5, -0.01, 0.01, -0.5], 400, &config(0.02, 0));
        assert_eq!(spans(&ranges), vec![(100, 300)]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(find_silence(&[], 1_000, &config(0.02, 0)).is_empty());
        assert!(find_silence(&[0.0, 0.0], 0, &config(0.02, 0)).is_empty());
    }

    #[test]
    fn test_ranges_sorted_and_long_enough() {
        let waveform: Vec<f32> = (0..1_000)
            .map(|i| if (i / 7) % 3 == 0 { 0.6 } else { 0.001 })
            .collect();
        for min_silence_ms in [0, 30, 70, 140] {
            let ranges = find_silence(&waveform, 10_000, &config(0.01, min_silence_ms));
            for pair in ranges.windows(2) {
                assert!(pair[0].end_ms <= pair[1].start_ms);
            }
            for range in &ranges {
                assert!(range.start_ms < range.end_ms);
                assert!(range.duration_ms() >= min_silence_ms);
            }
        }
    }

    #[test]
    fn test_padding_shrinks_inward() {
        let padded = apply_padding_and_filter(&[SilenceRange::new(1_000, 4_000)], 500, 500, 10_000);
        assert_eq!(spans(&padded), vec![(1_500, 3_500)]);
    }

    #[test]
    fn test_padding_never_inverts_and_drops_noise() {
        let ranges = [SilenceRange::new(1_000, 1_200), SilenceRange::new(2_000, 2_015)];
        let padded = apply_padding_and_filter(&ranges, 150, 150, 10_000);
        assert!(padded.is_empty());

        let padded = apply_padding_and_filter(&ranges, 0, 190, 10_000);
        assert_eq!(spans(&padded), vec![(1_000, 1_010)]);
    }

    #[test]
    fn test_padding_clamps_to_bounds() {
        let ranges = [SilenceRange::new(-200, 300), SilenceRange::new(9_800, 10_400)];
        let padded = apply_padding_and_filter(&ranges, 0, 0, 10_000);
        assert_eq!(spans(&padded), vec![(0, 300), (9_800, 10_000)]);
        for range in &padded {
            assert!(range.start_ms <= range.end_ms);
            assert!(range.start_ms >= 0 && range.end_ms <= 10_000);
        }
    }
}

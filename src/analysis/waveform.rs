//! Waveform processing over 16-bit PCM
//!
//! Pure arithmetic: nothing here performs I/O. Buckets are max-pooled, never
//! averaged, so short peaks survive every resolution change.

use crate::domain::errors::AnalysisError;

/// Full-fidelity resolution used by extraction and silence detection
pub const ENGINE_BUCKETS_PER_SECOND: i64 = 100;

/// Display resolution before clamping
pub const UI_BUCKETS_PER_SECOND: i64 = 10;
pub const UI_MIN_BUCKETS: usize = 500;
pub const UI_MAX_BUCKETS: usize = 5000;

const FULL_SCALE: f32 = 32768.0;
const BYTES_PER_SAMPLE: usize = 2;

/// One decoded PCM buffer and where it sits on the clip timeline
#[derive(Debug, Clone, Copy)]
pub struct PcmBufferInfo<'a> {
    /// 16-bit little-endian interleaved samples
    pub data: &'a [u8],
    pub start_time_us: i64,
    pub total_duration_us: i64,
    pub sample_rate: u32,
    pub channel_count: u32,
}

/// Largest absolute sample value in `buffer` (0..=32768).
///
/// `bytes_per_frame` is the stride of one interleaved frame; every channel
/// within a frame is inspected. A trailing partial frame is ignored.
pub fn find_peak(buffer: &[u8], bytes_per_frame: usize) -> i32 {
    let stride = bytes_per_frame.max(BYTES_PER_SAMPLE);
    buffer
        .chunks_exact(stride)
        .flat_map(|frame| frame.chunks_exact(BYTES_PER_SAMPLE))
        .map(|s| i32::from(i16::from_le_bytes([s[0], s[1]])).abs())
        .max()
        .unwrap_or(0)
}

/// Bucket slot for an absolute timestamp: `floor(t * n / total)`, clamped
pub fn bucket_index(time_us: i64, total_duration_us: i64, bucket_count: usize) -> usize {
    if bucket_count == 0 || total_duration_us <= 0 || time_us <= 0 {
        return 0;
    }
    let index = (i128::from(time_us) * bucket_count as i128) / i128::from(total_duration_us);
    (index.max(0) as usize).min(bucket_count - 1)
}

/// Max-pool every frame of `info` into `buckets`.
///
/// A frame's amplitude is its loudest channel, scaled to `[0, 1]`. Frame
/// timestamps derive from the buffer start, so the result does not depend on
/// how the decoder chunked its output.
pub fn update_buckets(info: &PcmBufferInfo<'_>, buckets: &mut [f32]) {
    if buckets.is_empty() || info.sample_rate == 0 || info.channel_count == 0 {
        return;
    }
    let frame_bytes = info.channel_count as usize * BYTES_PER_SAMPLE;
    let sample_rate = i64::from(info.sample_rate);

    for (frame_index, frame) in info.data.chunks_exact(frame_bytes).enumerate() {
        let offset_us = frame_index as i64 * 1_000_000 / sample_rate;
        let slot = bucket_index(
            info.start_time_us + offset_us,
            info.total_duration_us,
            buckets.len(),
        );
        let amplitude = find_peak(frame, frame_bytes) as f32 / FULL_SCALE;
        if amplitude > buckets[slot] {
            buckets[slot] = amplitude;
        }
    }
}

/// Scale so the largest bucket becomes exactly 1.0; all-zero input is left alone
pub fn normalize(buckets: &mut [f32]) {
    let max = buckets.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for value in buckets.iter_mut() {
            *value /= max;
        }
    }
}

/// Max-pool `source` into `target_count` buckets.
///
/// Returns an unmodified copy when `target_count >= source.len()`.
pub fn downsample(source: &[f32], target_count: usize) -> Result<Vec<f32>, AnalysisError> {
    if target_count == 0 {
        return Err(AnalysisError::InvalidBucketCount(target_count));
    }
    if target_count >= source.len() {
        return Ok(source.to_vec());
    }

    let len = source.len();
    let pooled = (0..target_count)
        .map(|i| {
            let from = i * len / target_count;
            let to = ((i + 1) * len / target_count).max(from + 1);
            source[from..to].iter().copied().fold(0.0f32, f32::max)
        })
        .collect();
    Ok(pooled)
}

/// Extend the first and last non-zero values out to the array edges.
///
/// Decoder priming and trailing padding show up as zero buckets at the
/// edges; they are codec artefacts, not silence.
pub fn fill_edge_buckets(buckets: &mut [f32]) {
    let first = match buckets.iter().position(|v| *v != 0.0) {
        Some(i) => i,
        None => return,
    };
    let last = buckets.iter().rposition(|v| *v != 0.0).unwrap_or(first);

    let head = buckets[first];
    let tail = buckets[last];
    buckets[..first].iter_mut().for_each(|v| *v = head);
    buckets[last + 1..].iter_mut().for_each(|v| *v = tail);
}

/// Engine resolution for a clip: 100 buckets per second, at least one
pub fn engine_bucket_count(duration_ms: i64) -> usize {
    (duration_ms * ENGINE_BUCKETS_PER_SECOND / 1000).max(1) as usize
}

/// Display resolution for a clip: 10 buckets per second within [500, 5000]
pub fn ui_bucket_count(duration_ms: i64) -> usize {
    let count = (duration_ms.max(0) * UI_BUCKETS_PER_SECOND / 1000) as usize;
    count.clamp(UI_MIN_BUCKETS, UI_MAX_BUCKETS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_peak_all_zeros() {
        assert_eq!(find_peak(&[0u8; 100], 4), 0);
    }

    #[test]
    fn test_find_peak_positive_values() {
        let buffer = [0x01, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x7F, 0x00, 0x00];
        assert_eq!(find_peak(&buffer, 4), 32767);
    }

    #[test]
    fn test_find_peak_most_negative_sample() {
        assert_eq!(find_peak(&[0x00, 0x80, 0x00, 0x00], 4), 32768);
    }

    #[test]
    fn test_find_peak_reads_every_channel() {
        // Left silent, right at 0x1000
        assert_eq!(find_peak(&[0x00, 0x00, 0x00, 0x10], 4), 4096);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0, 1000, 10), 0);
        assert_eq!(bucket_index(500, 1000, 10), 5);
        assert_eq!(bucket_index(999, 1000, 10), 9);
        assert_eq!(bucket_index(1000, 1000, 10), 9);
        assert_eq!(bucket_index(1200, 1000, 10), 9);
        assert_eq!(bucket_index(-5, 1000, 10), 0);
        assert_eq!(bucket_index(10, 0, 10), 0);
    }

    #[test]
    fn test_update_buckets_max_pools() {
        // 1 kHz mono, 4 frames over 4 ms into 2 buckets
        let samples: [i16; 4] = [100, -3000, 50, 20];
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buckets = vec![0.0f32; 2];
        update_buckets(
            &PcmBufferInfo {
                data: &data,
                start_time_us: 0,
                total_duration_us: 4_000,
                sample_rate: 1_000,
                channel_count: 1,
            },
            &mut buckets,
        );
        assert_eq!(buckets[0], 3000.0 / 32768.0);
        assert_eq!(buckets[1], 50.0 / 32768.0);
    }

    #[test]
    fn test_update_buckets_independent_of_chunking() {
        let samples: Vec<i16> = (0..400).map(|i| ((i * 97) % 20_000) as i16 - 10_000).collect();
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        fn info(data: &[u8], start_time_us: i64) -> PcmBufferInfo<'_> {
            PcmBufferInfo {
                data,
                start_time_us,
                total_duration_us: 100_000,
                sample_rate: 4_000,
                channel_count: 1,
            }
        }

        let mut whole = vec![0.0f32; 10];
        update_buckets(&info(&data, 0), &mut whole);

        let mut chunked = vec![0.0f32; 10];
        for (i, chunk) in data.chunks(160).enumerate() {
            update_buckets(&info(chunk, i as i64 * 20_000), &mut chunked);
        }
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_normalize() {
        let mut buckets = vec![0.1f32, 0.5, 0.2];
        normalize(&mut buckets);
        assert!((buckets[0] - 0.2).abs() < 0.001);
        assert_eq!(buckets[1], 1.0);
        assert!((buckets[2] - 0.4).abs() < 0.001);
    }

    #[test]
    fn test_normalize_all_zeros_unchanged() {
        let mut buckets = vec![0.0f32; 3];
        normalize(&mut buckets);
        assert_eq!(buckets, vec![0.0; 3]);
    }

    #[test]
    fn test_downsample_rejects_zero() {
        assert_eq!(
            downsample(&[0.1, 0.2], 0),
            Err(AnalysisError::InvalidBucketCount(0))
        );
    }

    #[test]
    fn test_downsample_passthrough() {
        let source = vec![0.1, 0.7, 0.3];
        assert_eq!(downsample(&source, 3).unwrap(), source);
        assert_eq!(downsample(&source, 10).unwrap(), source);
    }

    #[test]
    fn test_downsample_keeps_peaks() {
        let source = vec![0.1, 0.9, 0.2, 0.3, 0.0, 0.4];
        assert_eq!(downsample(&source, 3).unwrap(), vec![0.9, 0.3, 0.4]);
        assert_eq!(downsample(&source, 4).unwrap(), vec![0.1, 0.9, 0.3, 0.4]);
    }

    #[test]
    fn test_fill_edge_buckets() {
        let mut buckets = vec![0.0, 0.0, 0.3, 0.0, 0.5, 0.0];
        fill_edge_buckets(&mut buckets);
        assert_eq!(buckets, vec![0.3, 0.3, 0.3, 0.0, 0.5, 0.5]);

        let mut silent = vec![0.0; 4];
        fill_edge_buckets(&mut silent);
        assert_eq!(silent, vec![0.0; 4]);
    }

    #[test]
    fn test_bucket_counts() {
        assert_eq!(ui_bucket_count(1_000), 500);
        assert_eq!(ui_bucket_count(100_000), 1_000);
        assert_eq!(ui_bucket_count(1_000_000), 5_000);
        assert_eq!(engine_bucket_count(1_000), 100);
        assert_eq!(engine_bucket_count(100_000), 10_000);
        assert_eq!(engine_bucket_count(0), 1);
    }
}

//! One-sample duration estimate used to space consecutive segments

/// Used when neither audio sample rate nor video frame rate is known (30 fps)
pub const DEFAULT_SAMPLE_DURATION_US: i64 = 33_333;

/// Samples per AAC frame, the common case for compressed audio
pub const AUDIO_FRAME_SAMPLES: i64 = 1024;

/// Larger of one audio frame and one video frame, over the kinds being kept.
///
/// Zero or missing rates are ignored.
pub fn one_sample_duration_us(sample_rate: Option<u32>, frame_rate: Option<f32>) -> i64 {
    let audio = sample_rate
        .filter(|rate| *rate > 0)
        .map(|rate| AUDIO_FRAME_SAMPLES * 1_000_000 / i64::from(rate));
    let video = frame_rate
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .map(|fps| (1_000_000.0 / f64::from(fps)).round() as i64);

    match (audio, video) {
        (Some(a), Some(v)) => a.max(v),
        (Some(a), None) => a,
        (None, Some(v)) => v,
        (None, None) => DEFAULT_SAMPLE_DURATION_US,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_when_unknown() {
        assert_eq!(one_sample_duration_us(None, None), DEFAULT_SAMPLE_DURATION_US);
        assert_eq!(one_sample_duration_us(Some(0), Some(0.0)), DEFAULT_SAMPLE_DURATION_US);
    }

    #[test]
    fn test_video_only() {
        assert_eq!(one_sample_duration_us(None, Some(25.0)), 40_000);
    }

    #[test]
    fn test_audio_only() {
        assert_eq!(one_sample_duration_us(Some(48_000), None), 21_333);
    }

    #[test]
    fn test_larger_of_both() {
        assert_eq!(one_sample_duration_us(Some(48_000), Some(30.0)), 33_333);
        assert_eq!(one_sample_duration_us(Some(8_000), Some(60.0)), 128_000);
    }
}

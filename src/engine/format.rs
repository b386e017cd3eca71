//! Output track format normalization
//!
//! Containers sometimes attach keys to a track that do not belong to its
//! kind (an audio track carrying frame-rate or dimensions, say), and some
//! muxers reject such formats. The output format is therefore rebuilt field
//! by field from the track kind instead of being copied wholesale.

use crate::domain::model::{TrackFormat, TrackKind};

/// Fallback when the source does not report a maximum sample size
pub const DEFAULT_MAX_SAMPLE_SIZE: usize = 1024 * 1024;

/// Build the format declared to the Muxer for a track of `kind`
pub fn output_format(kind: TrackKind, source: &TrackFormat) -> TrackFormat {
    let mut format = TrackFormat {
        mime_type: source.mime_type.clone(),
        codec_name: source.codec_name.clone(),
        duration_us: source.duration_us,
        bit_rate: source.bit_rate,
        language: source.language.clone(),
        title: source.title.clone(),
        max_sample_size: Some(source.max_sample_size.unwrap_or(DEFAULT_MAX_SAMPLE_SIZE)),
        codec_private: source.codec_private.clone(),
        ..TrackFormat::default()
    };

    match kind {
        TrackKind::Video => {
            format.width = source.width;
            format.height = source.height;
            format.frame_rate = source.frame_rate;
            format.i_frame_interval = source.i_frame_interval;
            format.rotation_degrees = source.rotation_degrees;
        }
        TrackKind::Audio => {
            format.sample_rate = source.sample_rate;
            format.channel_count = source.channel_count;
        }
        TrackKind::Other => {}
    }

    format
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_format() -> TrackFormat {
        TrackFormat {
            mime_type: "audio/mp4a-latm".to_string(),
            codec_name: Some("aac".to_string()),
            duration_us: Some(5_000_000),
            bit_rate: Some(128_000),
            language: Some("eng".to_string()),
            width: Some(1920),
            height: Some(1080),
            frame_rate: Some(30.0),
            rotation_degrees: Some(90),
            sample_rate: Some(44_100),
            channel_count: Some(2),
            codec_private: vec![vec![0x12, 0x10]],
            ..TrackFormat::default()
        }
    }

    #[test]
    fn test_audio_drops_video_keys() {
        let format = output_format(TrackKind::Audio, &noisy_format());
        assert_eq!(format.width, None);
        assert_eq!(format.height, None);
        assert_eq!(format.frame_rate, None);
        assert_eq!(format.rotation_degrees, None);
        assert_eq!(format.sample_rate, Some(44_100));
        assert_eq!(format.channel_count, Some(2));
        assert_eq!(format.codec_private, vec![vec![0x12, 0x10]]);
        assert_eq!(format.language.as_deref(), Some("eng"));
    }

    #[test]
    fn test_video_drops_audio_keys() {
        let mut source = noisy_format();
        source.mime_type = "video/avc".to_string();
        let format = output_format(TrackKind::Video, &source);
        assert_eq!(format.sample_rate, None);
        assert_eq!(format.channel_count, None);
        assert_eq!(format.width, Some(1920));
        assert_eq!(format.rotation_degrees, Some(90));
    }

    #[test]
    fn test_default_max_sample_size() {
        let format = output_format(TrackKind::Other, &TrackFormat::default());
        assert_eq!(format.max_sample_size, Some(DEFAULT_MAX_SAMPLE_SIZE));
    }
}

//! Integration tests for waveform extraction, caching and silence detection

use splicer_cli::adapters::memory::{MemoryPcm, MemoryPcmSource};
use splicer_cli::analysis::waveform::{downsample, normalize, ui_bucket_count};
use splicer_cli::analysis::{ExtractionProgress, FileWaveformCache, WaveformExtractor};
use splicer_cli::domain::errors::AnalysisError;
use splicer_cli::domain::model::{MediaClip, MediaMetadata, SegmentAction, SilenceDetectionConfig, SilenceRange};
use splicer_cli::domain::rules::segments::{apply_detection_ranges, detect_silence, DetectionMode};
use splicer_cli::engine::CancelFlag;
use tempfile::TempDir;

// Test utilities

const RATE: u32 = 8_000;
const HALF_SCALE: i16 = 16_384;

/// Ten seconds of mono PCM: sound at [0, 2) s and [5, 10) s
fn speech_with_pause() -> MemoryPcm {
    MemoryPcm::with_loud_spans(RATE, 10_000, HALF_SCALE, &[(0, 2_000), (5_000, 10_000)])
}

fn source_with(pcm: MemoryPcm) -> MemoryPcmSource {
    MemoryPcmSource::new().with("talk.m4a", pcm)
}

fn range(start_ms: i64, end_ms: i64) -> SilenceRange {
    SilenceRange::new(start_ms, end_ms)
}

// Extraction

#[test]
fn test_extract_engine_resolution_buckets() {
    let source = source_with(speech_with_pause());
    let waveform = WaveformExtractor::new(&source, CancelFlag::new())
        .extract("talk.m4a")
        .unwrap();

    assert_eq!(waveform.duration_us, 10_000_000);
    assert_eq!(waveform.raw_amplitudes.len(), 1_000);
    assert_eq!(waveform.max_amplitude, 0.5);
    assert_eq!(waveform.raw_amplitudes[0], 0.5);
    assert_eq!(waveform.raw_amplitudes[199], 0.5);
    assert_eq!(waveform.raw_amplitudes[200], 0.0);
    assert_eq!(waveform.raw_amplitudes[499], 0.0);
    assert_eq!(waveform.raw_amplitudes[500], 0.5);
    assert_eq!(waveform.raw_amplitudes[999], 0.5);
}

#[test]
fn test_extraction_independent_of_chunking() {
    let coarse = source_with(speech_with_pause().with_chunk_frames(4_096));
    let fine = source_with(speech_with_pause().with_chunk_frames(333));

    let a = WaveformExtractor::new(&coarse, CancelFlag::new()).extract("talk.m4a").unwrap();
    let b = WaveformExtractor::new(&fine, CancelFlag::new()).extract("talk.m4a").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_edge_zero_buckets_are_filled() {
    // Priming silence at the start is a codec artefact, not a pause
    let pcm = MemoryPcm::with_loud_spans(RATE, 2_000, HALF_SCALE, &[(100, 2_000)]);
    let source = source_with(pcm);
    let waveform = WaveformExtractor::new(&source, CancelFlag::new()).extract("talk.m4a").unwrap();
    assert!(waveform.raw_amplitudes.iter().all(|v| *v == 0.5));
}

#[test]
fn test_progress_reports_normalized_previews() {
    let source = source_with(speech_with_pause());
    let mut reports: Vec<ExtractionProgress> = Vec::new();
    {
        let mut extractor =
            WaveformExtractor::new(&source, CancelFlag::new()).on_progress(|p| reports.push(p.clone()));
        extractor.extract("talk.m4a").unwrap();
    }

    assert!(!reports.is_empty());
    assert!(reports.len() <= 10);
    assert!(reports.windows(2).all(|w| w[0].processed_us < w[1].processed_us));
    for report in &reports {
        assert_eq!(report.total_us, 10_000_000);
        assert_eq!(report.preview.len(), 1_000);
        assert_eq!(report.preview.iter().copied().fold(0.0f32, f32::max), 1.0);
        assert!((0.0..=1.0).contains(&report.fraction()));
    }
}

#[test]
fn test_cancel_from_progress_callback() {
    let source = source_with(speech_with_pause());
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();

    let result = WaveformExtractor::new(&source, cancel)
        .on_progress(move |_| trigger.cancel())
        .extract("talk.m4a");
    assert_eq!(result, Err(AnalysisError::Cancelled));
}

#[test]
fn test_source_without_audio() {
    let source = MemoryPcmSource::new().with_silent_source("clip.mp4");
    let result = WaveformExtractor::new(&source, CancelFlag::new()).extract("clip.mp4");
    assert_eq!(result, Err(AnalysisError::NoAudioTrack("clip.mp4".to_string())));

    let missing = WaveformExtractor::new(&source, CancelFlag::new()).extract("other.mp4");
    assert!(matches!(missing, Err(AnalysisError::Decode(_))));
}

#[test]
fn test_display_buckets_from_raw() {
    let source = source_with(speech_with_pause());
    let waveform = WaveformExtractor::new(&source, CancelFlag::new()).extract("talk.m4a").unwrap();

    let mut display = waveform.raw_amplitudes.clone();
    normalize(&mut display);
    let display = downsample(&display, ui_bucket_count(waveform.duration_ms())).unwrap();
    assert_eq!(display.len(), 500);
    assert_eq!(display[0], 1.0);
    assert_eq!(display[150], 0.0);
    // Raw amplitudes stay unnormalized
    assert_eq!(waveform.max_amplitude, 0.5);
}

// Cache

#[test]
fn test_cached_extraction_skips_decoding() {
    let dir = TempDir::new().unwrap();
    let cache = FileWaveformCache::new(dir.path()).unwrap();

    let source = source_with(speech_with_pause());
    let first = WaveformExtractor::new(&source, CancelFlag::new())
        .extract_cached(&cache, "talk.m4a", 10_000, 0, 0)
        .unwrap();

    // A source that cannot decode anything proves the second result came from disk
    let empty = MemoryPcmSource::new();
    let second = WaveformExtractor::new(&empty, CancelFlag::new())
        .extract_cached(&cache, "talk.m4a", 10_000, 0, 0)
        .unwrap();
    assert_eq!(first, second);

    // Different identity, different key
    let miss = WaveformExtractor::new(&empty, CancelFlag::new()).extract_cached(&cache, "talk.m4a", 10_000, 1920, 1080);
    assert!(miss.is_err());
}

#[test]
fn test_corrupt_cache_entry_is_a_miss() {
    let dir = TempDir::new().unwrap();
    let cache = FileWaveformCache::new(dir.path()).unwrap();
    let key = splicer_cli::analysis::cache_key("talk.m4a", 10_000, 0, 0);
    std::fs::write(cache.entry_path(&key), b"not a waveform").unwrap();

    let source = source_with(speech_with_pause());
    let waveform = WaveformExtractor::new(&source, CancelFlag::new())
        .extract_cached(&cache, "talk.m4a", 10_000, 0, 0)
        .unwrap();
    assert_eq!(waveform.raw_amplitudes.len(), 1_000);
}

#[test]
fn test_eviction_removes_stale_entries() {
    let dir = TempDir::new().unwrap();
    let cache = FileWaveformCache::new(dir.path()).unwrap();
    let source = source_with(speech_with_pause());
    WaveformExtractor::new(&source, CancelFlag::new())
        .extract_cached(&cache, "talk.m4a", 10_000, 0, 0)
        .unwrap();

    assert_eq!(cache.evict_older_than(chrono::Duration::days(7)).unwrap(), 0);
    // A negative age puts the cutoff in the future
    assert_eq!(cache.evict_older_than(chrono::Duration::days(-1)).unwrap(), 1);
    let key = splicer_cli::analysis::cache_key("talk.m4a", 10_000, 0, 0);
    assert!(!cache.entry_path(&key).exists());
}

// Silence detection over extracted waveforms

#[test]
fn test_detect_pause_and_discard_it() {
    let source = source_with(speech_with_pause());
    let waveform = WaveformExtractor::new(&source, CancelFlag::new()).extract("talk.m4a").unwrap();

    let stages = detect_silence(&waveform, &SilenceDetectionConfig::default(), 0);
    assert_eq!(stages.raw, vec![range(2_000, 5_000)]);
    assert_eq!(stages.final_ranges, vec![range(2_000, 5_000)]);

    let metadata = MediaMetadata {
        duration_us: waveform.duration_us,
        sample_rate: RATE,
        channel_count: 1,
        audio_mime: Some("audio/mp4a-latm".to_string()),
        ..MediaMetadata::default()
    };
    let clip = MediaClip::from_metadata("talk.m4a", &metadata).unwrap();
    let clip = apply_detection_ranges(&clip, &stages.final_ranges, 0, DetectionMode::DiscardRanges);

    let layout: Vec<(i64, i64, SegmentAction)> = clip
        .segments
        .iter()
        .map(|s| (s.start_ms, s.end_ms, s.action))
        .collect();
    assert_eq!(
        layout,
        vec![
            (0, 2_000, SegmentAction::Keep),
            (2_000, 5_000, SegmentAction::Discard),
            (5_000, 10_000, SegmentAction::Keep),
        ]
    );
}

#[test]
fn test_short_sound_between_silences_is_merged() {
    // Pauses at [2, 5) s and [6, 6.3) s separated by one second of sound
    let pcm = MemoryPcm::with_loud_spans(
        RATE,
        10_000,
        HALF_SCALE,
        &[(0, 2_000), (5_000, 6_000), (6_300, 10_000)],
    );
    let source = source_with(pcm);
    let waveform = WaveformExtractor::new(&source, CancelFlag::new()).extract("talk.m4a").unwrap();
    let config = SilenceDetectionConfig::default();

    let separate = detect_silence(&waveform, &config, 0);
    assert_eq!(separate.raw, vec![range(2_000, 5_000), range(6_000, 6_300)]);
    // The 300 ms pause is below the 500 ms minimum
    assert_eq!(separate.final_ranges, vec![range(2_000, 5_000)]);

    let merged = detect_silence(&waveform, &config, 1_500);
    assert_eq!(merged.noise_merged, vec![range(2_000, 6_300)]);
    assert_eq!(merged.final_ranges, vec![range(2_000, 6_300)]);
}

#[test]
fn test_padding_keeps_context_around_speech() {
    let source = source_with(speech_with_pause());
    let waveform = WaveformExtractor::new(&source, CancelFlag::new()).extract("talk.m4a").unwrap();
    let config = SilenceDetectionConfig {
        padding_start_ms: 100,
        padding_end_ms: 200,
        ..SilenceDetectionConfig::default()
    };

    let stages = detect_silence(&waveform, &config, 0);
    assert_eq!(stages.duration_filtered, vec![range(2_000, 5_000)]);
    assert_eq!(stages.final_ranges, vec![range(2_100, 4_800)]);
}

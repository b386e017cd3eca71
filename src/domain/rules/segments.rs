// Segment policy - Turning detected silence into KEEP/DISCARD segments
//
// Detection itself stays pure and unopinionated. Everything here is caller
// policy layered on top of it: merging ranges separated by short noise,
// dropping short silences and rebuilding a clip's segment list.

use uuid::Uuid;

use crate::analysis::silence::{apply_padding_and_filter, find_silence};
use crate::domain::model::*;

/// How detected ranges become segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    /// Ranges become DISCARD, the gaps between them KEEP
    #[default]
    DiscardRanges,
    /// Split at every range start, all pieces KEEP
    SplitAtBoundaries,
}

/// Intermediate results of the silence pipeline, kept for preview
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionStages {
    /// Threshold-only runs
    pub raw: Vec<SilenceRange>,
    /// After merging ranges separated by short noise
    pub noise_merged: Vec<SilenceRange>,
    /// After dropping silences shorter than the configured minimum
    pub duration_filtered: Vec<SilenceRange>,
    /// Padded ranges ready to apply
    pub final_ranges: Vec<SilenceRange>,
}

/// Merge ranges whose gap is shorter than `min_segment_ms`.
///
/// Merging is greedy left to right, so a chain of short gaps collapses into
/// one range. A leading gap shorter than the minimum pulls the first range
/// to 0 and a trailing gap extends the last range to the end.
pub fn merge_close_silences(
    ranges: &[SilenceRange],
    min_segment_ms: i64,
    total_duration_ms: i64,
) -> Vec<SilenceRange> {
    if min_segment_ms <= 0 || ranges.is_empty() {
        return ranges.to_vec();
    }

    let mut merged = Vec::with_capacity(ranges.len());
    let mut current = ranges[0];
    if current.start_ms < min_segment_ms {
        current.start_ms = 0;
    }

    for next in &ranges[1..] {
        if next.start_ms - current.end_ms < min_segment_ms {
            current.end_ms = current.end_ms.max(next.end_ms);
            current.reaches_end |= next.reaches_end;
        } else {
            merged.push(current);
            current = *next;
        }
    }

    if total_duration_ms - current.end_ms < min_segment_ms {
        current.end_ms = total_duration_ms.max(current.end_ms);
        current.reaches_end = true;
    }
    merged.push(current);
    merged
}

/// Drop silences shorter than `min_silence_ms`; ranges touching the end are exempt
pub fn filter_short_silences(ranges: &[SilenceRange], min_silence_ms: i64) -> Vec<SilenceRange> {
    ranges
        .iter()
        .filter(|r| r.reaches_end || r.duration_ms() >= min_silence_ms)
        .copied()
        .collect()
}

/// Full caller-side pipeline: raw detection, noise merge, duration filter, padding
pub fn detect_silence(
    waveform: &WaveformResult,
    config: &SilenceDetectionConfig,
    min_segment_ms: i64,
) -> DetectionStages {
    let total_duration_ms = waveform.duration_ms();
    let raw_config = SilenceDetectionConfig {
        min_silence_ms: 0,
        ..*config
    };

    let raw = find_silence(&waveform.raw_amplitudes, total_duration_ms, &raw_config);
    let noise_merged = merge_close_silences(&raw, min_segment_ms, total_duration_ms);
    let duration_filtered = filter_short_silences(&noise_merged, config.min_silence_ms);
    let final_ranges = apply_padding_and_filter(
        &duration_filtered,
        config.padding_start_ms,
        config.padding_end_ms,
        total_duration_ms,
    );

    DetectionStages {
        raw,
        noise_merged,
        duration_filtered,
        final_ranges,
    }
}

/// Rebuild `clip`'s segments from detected ranges.
///
/// The returned clip always has at least one KEEP segment.
pub fn apply_detection_ranges(
    clip: &MediaClip,
    ranges: &[SilenceRange],
    min_keep_ms: i64,
    mode: DetectionMode,
) -> MediaClip {
    let segments = match mode {
        DetectionMode::SplitAtBoundaries => split_at_boundaries(clip.duration_ms, ranges),
        DetectionMode::DiscardRanges => discard_ranges(clip.duration_ms, ranges, min_keep_ms),
    };

    let segments = if segments.iter().any(|s| s.action == SegmentAction::Keep) {
        segments
    } else {
        vec![segment(0, clip.duration_ms, SegmentAction::Keep)]
    };

    MediaClip {
        segments,
        ..clip.clone()
    }
}

fn segment(start_ms: i64, end_ms: i64, action: SegmentAction) -> Segment {
    Segment {
        id: Uuid::new_v4(),
        start_ms,
        end_ms,
        action,
    }
}

fn discard_ranges(clip_end: i64, ranges: &[SilenceRange], min_keep_ms: i64) -> Vec<Segment> {
    let mut raw: Vec<Segment> = Vec::new();
    let mut cursor = 0;

    for range in ranges {
        let silence_start = range.start_ms.clamp(0, clip_end);
        let silence_end = range.end_ms.clamp(0, clip_end);
        if silence_end <= cursor {
            continue;
        }

        // Snap slivers at either edge of the clip into the silence
        let start = if silence_start < min_keep_ms { 0 } else { silence_start };
        let end = if clip_end - silence_end < min_keep_ms {
            clip_end
        } else {
            silence_end
        };
        let start = start.max(cursor);

        if start > cursor {
            raw.push(segment(cursor, start, SegmentAction::Keep));
        }
        if end > start {
            raw.push(segment(start, end, SegmentAction::Discard));
        }
        cursor = end.max(cursor);
    }

    if cursor < clip_end {
        let tail_is_sliver = clip_end - cursor < min_keep_ms;
        match raw.last_mut() {
            Some(last) if tail_is_sliver && last.action == SegmentAction::Discard => {
                last.end_ms = clip_end;
            }
            _ => raw.push(segment(cursor, clip_end, SegmentAction::Keep)),
        }
    }

    merge_adjacent_same_action(raw)
}

fn split_at_boundaries(clip_end: i64, ranges: &[SilenceRange]) -> Vec<Segment> {
    let mut points: Vec<i64> = ranges
        .iter()
        .map(|r| r.start_ms)
        .filter(|p| *p > 0 && *p < clip_end)
        .collect();
    points.sort_unstable();
    points.dedup();

    let mut segments = Vec::with_capacity(points.len() + 1);
    let mut cursor = 0;
    for point in points {
        segments.push(segment(cursor, point, SegmentAction::Keep));
        cursor = point;
    }
    segments.push(segment(cursor, clip_end, SegmentAction::Keep));
    segments
}

fn merge_adjacent_same_action(segments: Vec<Segment>) -> Vec<Segment> {
    let mut result: Vec<Segment> = Vec::with_capacity(segments.len());
    for next in segments {
        match result.last_mut() {
            Some(current) if current.action == next.action => current.end_ms = next.end_ms,
            _ => result.push(next),
        }
    }
    result
}

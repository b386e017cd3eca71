// Domain models - Core types and data structures

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::RemuxError;

pub const US_PER_MS: i64 = 1_000;

/// Track classification derived from the declared MIME prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Other,
}

impl TrackKind {
    /// Classify a MIME type: `video/*`, `audio/*`, everything else is `Other`
    pub fn from_mime(mime_type: &str) -> Self {
        let lower = mime_type.to_ascii_lowercase();
        if lower.starts_with("video/") {
            TrackKind::Video
        } else if lower.starts_with("audio/") {
            TrackKind::Audio
        } else {
            TrackKind::Other
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Other => write!(f, "other"),
        }
    }
}

/// Immutable snapshot of one track, captured at inspection time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: u32,
    pub mime_type: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Coded width and height of a video track, when the Demuxer reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    /// Sample rate and channel count of an audio track, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<(u32, u32)>,
}

impl TrackDescriptor {
    /// Create a descriptor, classifying the track from its MIME type
    pub fn new(id: u32, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let kind = TrackKind::from_mime(&mime_type);
        Self {
            id,
            mime_type,
            kind,
            language: None,
            title: None,
            dimensions: None,
            audio_format: None,
        }
    }

    /// Copy the size or audio layout of `format` onto the descriptor
    pub fn with_format_details(mut self, format: &TrackFormat) -> Self {
        match self.kind {
            TrackKind::Video => {
                if let (Some(width), Some(height)) = (format.width, format.height) {
                    self.dimensions = Some((width, height));
                }
            }
            TrackKind::Audio => {
                if let (Some(rate), Some(channels)) = (format.sample_rate, format.channel_count) {
                    self.audio_format = Some((rate, channels));
                }
            }
            TrackKind::Other => {}
        }
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Format details a Demuxer reports for a track.
///
/// This is the raw, possibly noisy view of the source; output formats are
/// rebuilt from it field by field before they reach a Muxer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackFormat {
    pub mime_type: String,
    /// Collaborator-specific codec identifier (e.g. libav codec name)
    pub codec_name: Option<String>,
    pub duration_us: Option<i64>,
    pub bit_rate: Option<u64>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rotation_degrees: Option<i32>,
    pub frame_rate: Option<f32>,
    pub i_frame_interval: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u32>,
    pub max_sample_size: Option<usize>,
    /// Codec-specific setup data (SPS/PPS, AudioSpecificConfig, ...)
    pub codec_private: Vec<Vec<u8>>,
}

/// Aggregate per-clip descriptor produced once per source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_us: i64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f32,
    pub rotation: i32,
    pub sample_rate: u32,
    pub channel_count: u32,
    pub video_mime: Option<String>,
    pub audio_mime: Option<String>,
    pub tracks: Vec<TrackDescriptor>,
}

impl MediaMetadata {
    pub fn duration_ms(&self) -> i64 {
        self.duration_us / US_PER_MS
    }

    /// Display dimensions after applying the rotation hint
    pub fn normalized_dimensions(&self) -> (u32, u32) {
        self.rotated((self.width, self.height))
    }

    /// `(width, height)` as displayed under this clip's rotation hint
    pub fn rotated(&self, (width, height): (u32, u32)) -> (u32, u32) {
        if self.rotation.rem_euclid(180) == 90 {
            (height, width)
        } else {
            (width, height)
        }
    }

    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }

    /// Tracks of `kind`, in container order
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &TrackDescriptor> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }
}

/// Which tracks of a source survive into the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSelection {
    pub keep_audio: bool,
    pub keep_video: bool,
    /// Explicit track ids; when present they override the kind flags for
    /// picking tracks, while the flags still name the kinds being merged
    pub selected_track_ids: Option<BTreeSet<u32>>,
}

impl Default for TrackSelection {
    fn default() -> Self {
        Self {
            keep_audio: true,
            keep_video: true,
            selected_track_ids: None,
        }
    }
}

impl TrackSelection {
    pub fn new(keep_audio: bool, keep_video: bool) -> Self {
        Self {
            keep_audio,
            keep_video,
            selected_track_ids: None,
        }
    }

    pub fn with_tracks(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.selected_track_ids = Some(ids.into_iter().collect());
        self
    }

    /// Kinds the caller asked for through the keep flags, video first
    pub fn requested_kinds(&self) -> Vec<TrackKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.keep_video {
            kinds.push(TrackKind::Video);
        }
        if self.keep_audio {
            kinds.push(TrackKind::Audio);
        }
        kinds
    }

    /// Kinds that reach the output: the requested ones plus any kind an
    /// explicit id pulls in from `tracks`, video first
    pub fn copied_kinds(&self, tracks: &[TrackDescriptor]) -> Vec<TrackKind> {
        let mut kinds = self.requested_kinds();
        for track in tracks.iter().filter(|t| self.is_selected(t)) {
            if track.kind != TrackKind::Other && !kinds.contains(&track.kind) {
                kinds.push(track.kind);
            }
        }
        kinds.sort();
        kinds
    }

    pub fn is_selected(&self, track: &TrackDescriptor) -> bool {
        match &self.selected_track_ids {
            Some(ids) => ids.contains(&track.id),
            None => match track.kind {
                TrackKind::Video => self.keep_video,
                TrackKind::Audio => self.keep_audio,
                TrackKind::Other => false,
            },
        }
    }
}

/// What to do with a segment on export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SegmentAction {
    Keep,
    Discard,
}

/// A time range of a clip marked for keeping or discarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub start_ms: i64,
    pub end_ms: i64,
    pub action: SegmentAction,
}

impl Segment {
    /// Create a segment with a fresh id, rejecting empty or negative ranges
    pub fn new(start_ms: i64, end_ms: i64, action: SegmentAction) -> Result<Self, RemuxError> {
        if start_ms < 0 || end_ms <= start_ms {
            return Err(RemuxError::InvalidRange { start_ms, end_ms });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            start_ms,
            end_ms,
            action,
        })
    }

    pub fn keep(start_ms: i64, end_ms: i64) -> Result<Self, RemuxError> {
        Self::new(start_ms, end_ms, SegmentAction::Keep)
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// One source clip in an editing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaClip {
    pub id: Uuid,
    /// Source reference (path or URI) handed to the Demuxer
    pub source: String,
    pub file_name: String,
    pub duration_ms: i64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub video_mime: Option<String>,
    #[serde(default)]
    pub audio_mime: Option<String>,
    #[serde(default)]
    pub sample_rate: u32,
    #[serde(default)]
    pub channel_count: u32,
    #[serde(default)]
    pub fps: f32,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub is_audio_only: bool,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub available_tracks: Vec<TrackDescriptor>,
}

impl MediaClip {
    /// Build a clip with exactly one KEEP segment spanning its whole duration
    pub fn from_metadata(source: impl Into<String>, metadata: &MediaMetadata) -> Result<Self, RemuxError> {
        let source = source.into();
        let file_name = std::path::Path::new(&source)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.clone());
        let duration_ms = metadata.duration_ms();
        let segments = vec![Segment::keep(0, duration_ms)?];

        Ok(Self {
            id: Uuid::new_v4(),
            source,
            file_name,
            duration_ms,
            width: metadata.width,
            height: metadata.height,
            video_mime: metadata.video_mime.clone(),
            audio_mime: metadata.audio_mime.clone(),
            sample_rate: metadata.sample_rate,
            channel_count: metadata.channel_count,
            fps: metadata.frame_rate,
            rotation: metadata.rotation,
            is_audio_only: metadata.video_mime.is_none(),
            segments,
            available_tracks: metadata.tracks.clone(),
        })
    }

    /// KEEP segments in timeline order
    pub fn keep_segments(&self) -> Vec<&Segment> {
        let mut keep: Vec<&Segment> = self
            .segments
            .iter()
            .filter(|s| s.action == SegmentAction::Keep)
            .collect();
        keep.sort_by_key(|s| s.start_ms);
        keep
    }

    /// Metadata view used by merge validation
    pub fn to_metadata(&self) -> MediaMetadata {
        MediaMetadata {
            duration_us: self.duration_ms * US_PER_MS,
            width: self.width,
            height: self.height,
            frame_rate: self.fps,
            rotation: self.rotation,
            sample_rate: self.sample_rate,
            channel_count: self.channel_count,
            video_mime: self.video_mime.clone(),
            audio_mime: self.audio_mime.clone(),
            tracks: self.available_tracks.clone(),
        }
    }
}

/// Per-sample flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub is_sync_sample: bool,
}

/// One compressed sample, alive only between a Demuxer read and a Muxer write
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub track_id: u32,
    pub presentation_time_us: i64,
    /// Decode timestamp when the container reports one distinct from presentation
    pub decode_time_us: Option<i64>,
    pub data: Vec<u8>,
    pub flags: SampleFlags,
}

impl Sample {
    pub fn new(track_id: u32, presentation_time_us: i64, is_sync_sample: bool, data: Vec<u8>) -> Self {
        Self {
            track_id,
            presentation_time_us,
            decode_time_us: None,
            data,
            flags: SampleFlags { is_sync_sample },
        }
    }

    pub fn is_sync(&self) -> bool {
        self.flags.is_sync_sample
    }
}

/// Bucketed peak amplitudes from one pass over a clip's audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformResult {
    /// Max-pooled peaks in `[0, 1]`, 100 buckets per second
    pub raw_amplitudes: Vec<f32>,
    pub max_amplitude: f32,
    pub duration_us: i64,
}

impl WaveformResult {
    pub fn duration_ms(&self) -> i64 {
        self.duration_us / US_PER_MS
    }
}

/// A detected silent span, `start_ms < end_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceRange {
    pub start_ms: i64,
    pub end_ms: i64,
    /// The run reached the end of the waveform
    #[serde(default)]
    pub reaches_end: bool,
}

impl SilenceRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self {
            start_ms,
            end_ms,
            reaches_end: false,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Silence detection knobs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceDetectionConfig {
    pub threshold: f32,
    pub min_silence_ms: i64,
    pub padding_start_ms: i64,
    pub padding_end_ms: i64,
}

impl Default for SilenceDetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            min_silence_ms: 500,
            padding_start_ms: 0,
            padding_end_ms: 0,
        }
    }
}

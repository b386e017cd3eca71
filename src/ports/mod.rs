// Ports - Interface definitions (contracts)
//
// Demuxer/Muxer/PCM handles are plain owned values. Dropping a handle is the
// `close`/`release` step and must free every native resource it holds, so
// the engine releases them on success, error and cancellation alike.

use async_trait::async_trait;

use crate::domain::errors::*;
use crate::domain::model::*;

pub type PortResult<T> = Result<T, PortError>;

/// An open source container
pub trait Demuxer {
    /// Reference this handle was opened from
    fn source_ref(&self) -> &str;

    /// Every track the container exposes, in container order
    fn tracks(&self) -> Vec<TrackDescriptor>;

    /// Format details for one track, as reported by the container
    fn track_format(&self, track_id: u32) -> Option<TrackFormat>;

    /// Container-level duration, when known
    fn duration_us(&self) -> Option<i64>;

    /// Restrict `read_next_sample` to these tracks
    fn select_tracks(&mut self, track_ids: &[u32]) -> PortResult<()>;

    /// Position the read cursor on the nearest sync sample at or before `time_us`
    fn seek_to(&mut self, track_id: u32, time_us: i64) -> PortResult<()>;

    /// Next sample of a selected track in container order, `None` at end of stream
    fn read_next_sample(&mut self) -> PortResult<Option<Sample>>;
}

/// Opens Demuxers
pub trait MediaSource {
    fn open(&self, source_ref: &str) -> PortResult<Box<dyn Demuxer>>;

    /// Cheap accessibility check used when restoring sessions
    fn is_accessible(&self, source_ref: &str) -> bool;
}

/// An open destination container
pub trait Muxer {
    /// Declare an output track; returns its index
    fn add_track(&mut self, format: &TrackFormat) -> PortResult<usize>;

    /// Orientation hint applied to video tracks, in degrees
    fn set_orientation_hint(&mut self, degrees: i32) -> PortResult<()>;

    fn start(&mut self) -> PortResult<()>;

    /// Write one sample whose timestamps are already in output time
    fn write_sample(&mut self, track_index: usize, sample: &Sample) -> PortResult<()>;

    /// Flush trailing index structures. Only meaningful after `start`.
    fn stop(&mut self) -> PortResult<()>;
}

/// Opens Muxers and removes what they leave behind
pub trait MediaSink {
    fn open(&self, dest_ref: &str) -> PortResult<Box<dyn Muxer>>;

    /// Remove a destination; succeeds when it is already absent
    fn discard(&self, dest_ref: &str) -> PortResult<()>;
}

/// Stream parameters of a PCM decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmStreamInfo {
    pub sample_rate: u32,
    pub channel_count: u32,
    pub duration_us: i64,
}

/// A run of 16-bit little-endian interleaved PCM frames
#[derive(Debug, Clone, PartialEq)]
pub struct PcmChunk {
    pub data: Vec<u8>,
    pub presentation_time_us: i64,
}

/// A running audio decode producing 16-bit interleaved PCM
pub trait PcmDecoder {
    fn stream_info(&self) -> PcmStreamInfo;

    /// Next decoded chunk, `None` once the stream is drained
    fn next_chunk(&mut self) -> PortResult<Option<PcmChunk>>;
}

/// Opens PCM decoders on the first audio track of a source
pub trait PcmSource {
    /// `Ok(None)` when the source has no audio track
    fn open(&self, source_ref: &str) -> PortResult<Option<Box<dyn PcmDecoder>>>;
}

/// Content-addressed storage for waveform results
pub trait WaveformCache {
    /// `None` on any miss, including unreadable or outdated entries
    fn load(&self, key: &str) -> Option<WaveformResult>;

    /// All-or-nothing write of one entry
    fn store(&self, key: &str, waveform: &WaveformResult) -> PortResult<()>;
}

/// Persistence of the clip list between runs
#[async_trait]
pub trait SessionPort: Send + Sync {
    /// Save clips, replacing any previous session
    async fn save(&self, clips: &[MediaClip]) -> PortResult<()>;

    /// Restore saved clips; `None` when nothing was saved
    async fn restore(&self) -> PortResult<Option<SavedSession>>;
}

/// A restored session
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSession {
    pub saved_at: chrono::DateTime<chrono::Utc>,
    pub clips: Vec<MediaClip>,
}

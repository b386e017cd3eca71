// Domain errors - Failure taxonomy for inspection, validation, mapping and remuxing

use thiserror::Error;

use crate::domain::model::TrackKind;

/// Failure reported by a Demuxer/Muxer/decoder collaborator.
///
/// Collaborators never retry; the reason is carried verbatim so the caller
/// can decide whether re-running the whole operation makes sense.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortError {
    /// The source or destination could not be opened at all
    #[error("cannot open {reference}: {reason}")]
    Open { reference: String, reason: String },
    /// The container or codec is refused by the collaborator
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Read/write failure while streaming
    #[error("I/O failure: {0}")]
    Io(String),
    /// Operation called in the wrong lifecycle state (e.g. write before start)
    #[error("invalid state: {0}")]
    State(String),
}

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        PortError::Io(err.to_string())
    }
}

/// Track enumeration failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InspectionError {
    /// Unresolvable reference, permission denial or corrupt header
    #[error("source unreadable: {source_ref}: {reason}")]
    SourceUnreadable { source_ref: String, reason: String },
    /// The source opened fine but exposes zero tracks
    #[error("no tracks found in {source_ref}")]
    NoTracks { source_ref: String },
}

/// Structural incompatibilities between clips that are about to be concatenated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("no clips to merge")]
    NoClips,
    #[error("clip {clip_index} has no track of the requested kinds")]
    NoMatchingTracks { clip_index: usize },
    #[error("codec mismatch for {kind} in clip {clip_index}: expected {expected}, found {found}")]
    CodecMismatch {
        kind: TrackKind,
        expected: String,
        found: String,
        clip_index: usize,
    },
    #[error("dimension mismatch in clip {clip_index}: expected {}x{}, found {}x{}", expected.0, expected.1, found.0, found.1)]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
        clip_index: usize,
    },
    #[error("audio format mismatch in clip {clip_index}: expected {} Hz/{} ch, found {} Hz/{} ch", expected.0, expected.1, found.0, found.1)]
    AudioFormatMismatch {
        expected: (u32, u32),
        found: (u32, u32),
        clip_index: usize,
    },
    #[error("clip {clip_index} has no selected {kind} track")]
    MissingSelectedTrack { clip_index: usize, kind: TrackKind },
}

/// Timeline violations detected while rebasing sample timestamps
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("non-monotonic timestamps on output track {track}: {current_us}us after {previous_us}us")]
    NonMonotonicSource {
        track: usize,
        previous_us: i64,
        current_us: i64,
    },
}

/// Failure of a cut or merge operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemuxError {
    #[error("invalid range: end ({end_ms} ms) must be greater than start ({start_ms} ms)")]
    InvalidRange { start_ms: i64, end_ms: i64 },
    #[error(transparent)]
    Inspection(#[from] InspectionError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    /// The operation stopped after output was opened. `partial` is true when
    /// the output could not be removed and must be cleaned up by the caller.
    #[error("remux aborted ({}): {reason}", if *partial { "partial output left behind" } else { "output removed" })]
    Aborted { partial: bool, reason: String },
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Waveform and silence analysis failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("bucket count must be positive, got {0}")]
    InvalidBucketCount(usize),
    #[error("analysis cancelled")]
    Cancelled,
    #[error("no audio track in {0}")]
    NoAudioTrack(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

impl From<PortError> for AnalysisError {
    fn from(err: PortError) -> Self {
        AnalysisError::Decode(err.to_string())
    }
}

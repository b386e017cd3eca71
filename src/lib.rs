//! Splicer media library
//!
//! Lossless cutting and concatenation of media containers by sample copy,
//! plus audio waveform extraction and silence detection.
//!
//! The engine talks to media only through the traits in [`ports`]; the
//! `libav` adapter backs them with FFmpeg and the `memory` adapter with
//! in-process fixtures.

pub mod adapters;
pub mod analysis;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod planner;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::{AnalysisError, InspectionError, MergeError, PortError, RemuxError};
pub use domain::model::{MediaClip, MediaMetadata, Sample, TrackDescriptor, TrackFormat, WaveformResult};
pub use engine::{CancelFlag, RemuxOptions, RemuxOrchestrator, RemuxReport, SegmentExport};
pub use error::{SplicerError, SplicerResult};

/// Initialize the FFmpeg libraries
pub fn init() -> SplicerResult<()> {
    ffmpeg_next::init()?;
    Ok(())
}

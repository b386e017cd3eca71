//! Core remux engine module
//!
//! Cuts and merges are stream copies: samples travel from a Demuxer to a
//! Muxer untouched, only their timestamps are rebased.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::errors::RemuxError;
use crate::domain::model::TrackSelection;

pub mod copier;
pub mod format;
pub mod gap;
pub mod inspector;
pub mod orchestrator;
pub mod time_mapper;

pub use inspector::TrackInspector;
pub use orchestrator::RemuxOrchestrator;
pub use time_mapper::{SampleTimeMapper, TimeMappingContext};

/// Cooperative cancellation signal, checked between samples and chunks
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller options for a cut or merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemuxOptions {
    pub keep_audio: bool,
    pub keep_video: bool,
    pub selected_tracks: Option<BTreeSet<u32>>,
    /// Orientation hint for video outputs; merges default to the first clip's rotation
    pub rotation_override: Option<i32>,
}

impl Default for RemuxOptions {
    fn default() -> Self {
        Self {
            keep_audio: true,
            keep_video: true,
            selected_tracks: None,
            rotation_override: None,
        }
    }
}

impl RemuxOptions {
    pub fn selection(&self) -> TrackSelection {
        TrackSelection {
            keep_audio: self.keep_audio,
            keep_video: self.keep_video,
            selected_track_ids: self.selected_tracks.clone(),
        }
    }
}

/// Summary of a finished cut or merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemuxReport {
    pub output: String,
    pub tracks: usize,
    pub segments: usize,
    pub samples_written: u64,
    /// Output timeline length including the final sample's estimated duration
    pub duration_us: i64,
}

/// One KEEP segment that could not be written to its own file
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFailure {
    /// Position among the clip's KEEP segments
    pub index: usize,
    pub start_ms: i64,
    pub end_ms: i64,
    pub output: String,
    pub error: RemuxError,
}

/// Result of writing every KEEP segment of a clip to a file of its own
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentExport {
    pub written: Vec<RemuxReport>,
    pub failures: Vec<SegmentFailure>,
}

impl SegmentExport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

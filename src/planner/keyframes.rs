//! Sync sample scan of the first video track

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::errors::AnalysisError;
use crate::domain::model::TrackKind;
use crate::engine::CancelFlag;
use crate::ports::Demuxer;

/// Stop after this many keyframes
pub const MAX_KEYFRAMES: usize = 3_000;
/// Stop after reading this many samples
pub const MAX_PROBED_SAMPLES: usize = 15_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyframeScan {
    pub track_id: Option<u32>,
    /// Sync sample times in ms, ascending
    pub keyframes_ms: Vec<i64>,
    pub samples_probed: usize,
    /// A cap was hit before the end of the stream
    pub truncated: bool,
}

pub struct KeyframeProbe;

impl KeyframeProbe {
    /// List the sync samples of the first video track.
    ///
    /// Audio-only sources yield an empty scan. The demuxer is left
    /// positioned somewhere inside the stream.
    pub fn scan(demuxer: &mut dyn Demuxer, cancel: &CancelFlag) -> Result<KeyframeScan, AnalysisError> {
        let track_id = match demuxer
            .tracks()
            .into_iter()
            .find(|t| TrackKind::from_mime(&t.mime_type) == TrackKind::Video)
        {
            Some(track) => track.id,
            None => {
                debug!("{}: no video track to probe", demuxer.source_ref());
                return Ok(KeyframeScan::default());
            }
        };

        demuxer.select_tracks(&[track_id])?;
        demuxer.seek_to(track_id, 0)?;

        let mut scan = KeyframeScan {
            track_id: Some(track_id),
            ..KeyframeScan::default()
        };
        while let Some(sample) = demuxer.read_next_sample()? {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            scan.samples_probed += 1;
            if sample.is_sync() {
                scan.keyframes_ms.push(sample.presentation_time_us / 1_000);
            }
            if scan.keyframes_ms.len() >= MAX_KEYFRAMES || scan.samples_probed >= MAX_PROBED_SAMPLES {
                scan.truncated = true;
                warn!(
                    "Keyframe probe of {} stopped after {} samples",
                    demuxer.source_ref(),
                    scan.samples_probed
                );
                break;
            }
        }

        scan.keyframes_ms.sort_unstable();
        scan.keyframes_ms.dedup();
        info!(
            "{}: {} keyframes in {} samples",
            demuxer.source_ref(),
            scan.keyframes_ms.len(),
            scan.samples_probed
        );
        Ok(scan)
    }
}

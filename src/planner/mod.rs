//! Keyframe probing and cut preview planning
//!
//! A lossless cut can only start and end on sync samples. The planner lists
//! where those are and shows which window a requested cut will really copy.

use serde::{Deserialize, Serialize};

pub mod keyframes;

pub use keyframes::{KeyframeProbe, KeyframeScan, MAX_KEYFRAMES, MAX_PROBED_SAMPLES};

/// The window a cut request turns into once snapped to sync samples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutPreview {
    pub requested_start_ms: i64,
    pub requested_end_ms: i64,
    /// Sync sample at or before the requested start
    pub start_ms: i64,
    /// First sync sample at or after the requested end; `None` runs to the end of the stream
    pub end_ms: Option<i64>,
}

impl CutPreview {
    /// Extra milliseconds copied before the requested start
    pub fn lead_in_ms(&self) -> i64 {
        self.requested_start_ms - self.start_ms
    }

    /// Extra milliseconds copied after the requested end, when bounded
    pub fn overrun_ms(&self) -> Option<i64> {
        self.end_ms.map(|end| end - self.requested_end_ms)
    }
}

/// Snap `[start_ms, end_ms]` to the sorted sync times in `keyframes`.
///
/// Without keyframes (audio only) every sample is a cut point and the
/// request is returned unchanged.
pub fn plan_cut(keyframes: &[i64], start_ms: i64, end_ms: i64) -> CutPreview {
    if keyframes.is_empty() {
        return CutPreview {
            requested_start_ms: start_ms,
            requested_end_ms: end_ms,
            start_ms,
            end_ms: Some(end_ms),
        };
    }

    let start = keyframes
        .iter()
        .copied()
        .filter(|k| *k <= start_ms)
        .max()
        .unwrap_or(keyframes[0].min(start_ms));
    let end = keyframes.iter().copied().find(|k| *k >= end_ms);

    CutPreview {
        requested_start_ms: start_ms,
        requested_end_ms: end_ms,
        start_ms: start,
        end_ms: end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_cut_widens_both_edges() {
        let preview = plan_cut(&[0, 2_000, 4_000], 500, 1_800);
        assert_eq!(preview.start_ms, 0);
        assert_eq!(preview.end_ms, Some(2_000));
        assert_eq!(preview.lead_in_ms(), 500);
        assert_eq!(preview.overrun_ms(), Some(200));
    }

    #[test]
    fn test_plan_cut_exact_keyframes() {
        let preview = plan_cut(&[0, 2_000, 4_000], 2_000, 4_000);
        assert_eq!(preview.start_ms, 2_000);
        assert_eq!(preview.end_ms, Some(4_000));
        assert_eq!(preview.lead_in_ms(), 0);
    }

    #[test]
    fn test_plan_cut_past_last_keyframe_runs_to_end() {
        let preview = plan_cut(&[0, 2_000], 2_500, 3_000);
        assert_eq!(preview.start_ms, 2_000);
        assert_eq!(preview.end_ms, None);
        assert_eq!(preview.overrun_ms(), None);
    }

    #[test]
    fn test_plan_cut_without_keyframes() {
        let preview = plan_cut(&[], 250, 750);
        assert_eq!(preview.start_ms, 250);
        assert_eq!(preview.end_ms, Some(750));
    }
}

//! Streaming one source segment into an open Muxer

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::errors::{MappingError, PortError};
use crate::domain::model::Sample;
use crate::engine::time_mapper::{SampleTimeMapper, TimeMappingContext};
use crate::engine::CancelFlag;
use crate::ports::{Demuxer, Muxer};

/// Why a segment copy stopped early
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CopyFailure {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("cancelled")]
    Cancelled,
}

/// Requested source range; `end_us: None` copies to the end of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentWindow {
    pub start_us: i64,
    pub end_us: Option<i64>,
}

impl SegmentWindow {
    pub fn whole() -> Self {
        Self {
            start_us: 0,
            end_us: None,
        }
    }

    pub fn from_ms(start_ms: i64, end_ms: i64) -> Self {
        Self {
            start_us: start_ms * 1_000,
            end_us: Some(end_ms * 1_000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentStats {
    /// Source time mapped onto the segment's output base
    pub anchor_us: Option<i64>,
    /// Reference sync sample the end was widened to
    pub widened_end_us: Option<i64>,
    pub samples_written: u64,
    pub dropped_pre_roll: u64,
}

/// Copies the samples of one window.
///
/// The window starts at the first sample read after seeking to the sync
/// sample at or before `start_us`. Past `end_us`, the reference track is
/// copied up to and including its next sync sample; samples of other tracks
/// are held back until that sample is known and then kept only if they do
/// not go past it. Without a reference track every sample is a cut point and
/// each track simply stops after `end_us`.
pub struct SegmentCopier<'a> {
    /// Source track id to output track index
    pub track_map: &'a HashMap<u32, usize>,
    /// Track whose sync samples define cut points, normally the first video track
    pub reference_track: Option<u32>,
    pub cancel: &'a CancelFlag,
}

impl SegmentCopier<'_> {
    pub fn copy(
        &self,
        demuxer: &mut dyn Demuxer,
        muxer: &mut dyn Muxer,
        window: SegmentWindow,
        context: &mut TimeMappingContext,
    ) -> Result<SegmentStats, CopyFailure> {
        let seek_track = self
            .reference_track
            .or_else(|| self.track_map.keys().min().copied());
        if let Some(track) = seek_track {
            demuxer.seek_to(track, window.start_us)?;
        }

        let mut stats = SegmentStats::default();
        let mut mapper: Option<SampleTimeMapper> = None;
        let mut pending: Vec<(usize, Sample)> = Vec::new();
        let mut seen: HashSet<u32> = HashSet::new();
        let mut done: HashSet<u32> = HashSet::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(CopyFailure::Cancelled);
            }
            let sample = match demuxer.read_next_sample()? {
                Some(sample) => sample,
                None => break,
            };
            let out = match self.track_map.get(&sample.track_id) {
                Some(out) => *out,
                None => continue,
            };

            let segment_mapper = *mapper.get_or_insert_with(|| {
                SampleTimeMapper::new(sample.presentation_time_us)
            });
            if sample.presentation_time_us < segment_mapper.anchor_us() {
                stats.dropped_pre_roll += 1;
                continue;
            }

            let track = sample.track_id;
            seen.insert(track);
            if done.contains(&track) {
                continue;
            }

            let end_us = match window.end_us {
                Some(end_us) => end_us,
                None => {
                    self.emit(&segment_mapper, out, &sample, muxer, context, &mut stats)?;
                    continue;
                }
            };
            let pts = sample.presentation_time_us;

            if Some(track) == self.reference_track {
                self.emit(&segment_mapper, out, &sample, muxer, context, &mut stats)?;
                if pts >= end_us && sample.is_sync() {
                    stats.widened_end_us = Some(pts);
                    done.insert(track);
                    for (held_out, held) in pending.drain(..) {
                        if held.presentation_time_us <= pts {
                            self.emit(&segment_mapper, held_out, &held, muxer, context, &mut stats)?;
                        } else {
                            done.insert(held.track_id);
                        }
                    }
                }
            } else if let Some(boundary_us) = stats.widened_end_us {
                if pts <= boundary_us {
                    self.emit(&segment_mapper, out, &sample, muxer, context, &mut stats)?;
                } else {
                    done.insert(track);
                }
            } else if self.reference_track.is_none() {
                if pts <= end_us {
                    self.emit(&segment_mapper, out, &sample, muxer, context, &mut stats)?;
                } else {
                    done.insert(track);
                }
            } else if pts <= end_us {
                self.emit(&segment_mapper, out, &sample, muxer, context, &mut stats)?;
            } else {
                pending.push((out, sample));
            }

            let reference_finished = self.reference_track.is_none() || stats.widened_end_us.is_some();
            if reference_finished && seen.iter().all(|t| done.contains(t)) {
                break;
            }
        }

        // No sync sample after the end: everything read is part of the cut
        if let Some(segment_mapper) = mapper {
            for (held_out, held) in pending.drain(..) {
                self.emit(&segment_mapper, held_out, &held, muxer, context, &mut stats)?;
            }
        }

        if stats.dropped_pre_roll > 0 {
            warn!(
                "Dropped {} samples before the segment start",
                stats.dropped_pre_roll
            );
        }
        stats.anchor_us = mapper.map(|m| m.anchor_us());
        debug!(
            "Segment copied: anchor {:?}, widened end {:?}, {} samples",
            stats.anchor_us, stats.widened_end_us, stats.samples_written
        );
        Ok(stats)
    }

    fn emit(
        &self,
        mapper: &SampleTimeMapper,
        out: usize,
        sample: &Sample,
        muxer: &mut dyn Muxer,
        context: &mut TimeMappingContext,
        stats: &mut SegmentStats,
    ) -> Result<(), CopyFailure> {
        let mapped = mapper.map_sample(out, sample, context)?;
        muxer.write_sample(out, &mapped)?;
        stats.samples_written += 1;
        Ok(())
    }
}

//! Cut and merge orchestration
//!
//! Every input is opened and inspected, and the whole set validated, before
//! the destination is created. Once the Muxer exists any failure removes the
//! output again and surfaces as `RemuxError::Aborted`.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::domain::errors::{MergeError, RemuxError};
use crate::domain::model::*;
use crate::domain::rules::MergeValidator;
use crate::engine::copier::{CopyFailure, SegmentCopier, SegmentWindow};
use crate::engine::format::output_format;
use crate::engine::gap::one_sample_duration_us;
use crate::engine::inspector::TrackInspector;
use crate::engine::time_mapper::TimeMappingContext;
use crate::engine::{CancelFlag, RemuxOptions, RemuxReport, SegmentExport, SegmentFailure};
use crate::output::OutputGuard;
use crate::ports::{Demuxer, MediaSink, MediaSource, Muxer};

/// One input and the windows to export from it, in output order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipJob {
    pub source_ref: String,
    pub windows: Vec<SegmentWindow>,
}

struct OpenedClip {
    demuxer: Box<dyn Demuxer>,
    metadata: MediaMetadata,
    windows: Vec<SegmentWindow>,
}

/// Output tracks, taken from the first input's selected tracks
#[derive(Debug, Clone)]
struct OutputLayout {
    tracks: Vec<TrackDescriptor>,
}

impl OutputLayout {
    fn from_reference(reference: &MediaMetadata, selection: &TrackSelection) -> Self {
        Self {
            tracks: TrackInspector::select(&reference.tracks, selection),
        }
    }

    /// Pair the n-th selected track of each kind in `clip` with the n-th output track of that kind
    fn map_clip(&self, clip: &MediaMetadata, selection: &TrackSelection) -> HashMap<u32, usize> {
        let selected = TrackInspector::select(&clip.tracks, selection);
        let mut map = HashMap::new();
        for kind in [TrackKind::Video, TrackKind::Audio, TrackKind::Other] {
            let outputs = self
                .tracks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.kind == kind)
                .map(|(i, _)| i);
            let inputs = selected.iter().filter(|t| t.kind == kind);
            for (output, input) in outputs.zip(inputs) {
                map.insert(input.id, output);
            }
        }
        map
    }

    fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }

    fn first_of_kind(&self, kind: TrackKind) -> Option<usize> {
        self.tracks.iter().position(|t| t.kind == kind)
    }
}

#[derive(Debug, Default)]
struct WriteSummary {
    segments: usize,
    samples_written: u64,
    duration_us: i64,
}

/// Drives Demuxers and a Muxer through cuts and merges
pub struct RemuxOrchestrator<'a> {
    source: &'a dyn MediaSource,
    sink: &'a dyn MediaSink,
    cancel: CancelFlag,
}

impl<'a> RemuxOrchestrator<'a> {
    pub fn new(source: &'a dyn MediaSource, sink: &'a dyn MediaSink, cancel: CancelFlag) -> Self {
        Self {
            source,
            sink,
            cancel,
        }
    }

    /// Copy `[start_ms, end_ms]` of `input`, widened to sync samples, into `output`
    pub fn cut(
        &self,
        input: &str,
        output: &str,
        start_ms: i64,
        end_ms: i64,
        options: &RemuxOptions,
    ) -> Result<RemuxReport, RemuxError> {
        if start_ms < 0 || end_ms <= start_ms {
            return Err(RemuxError::InvalidRange { start_ms, end_ms });
        }
        let job = ClipJob {
            source_ref: input.to_string(),
            windows: vec![SegmentWindow::from_ms(start_ms, end_ms)],
        };
        self.run(vec![job], output, options)
    }

    /// Concatenate whole inputs into `output`
    pub fn merge(
        &self,
        inputs: &[String],
        output: &str,
        options: &RemuxOptions,
    ) -> Result<RemuxReport, RemuxError> {
        let jobs = inputs
            .iter()
            .map(|source_ref| ClipJob {
                source_ref: source_ref.clone(),
                windows: vec![SegmentWindow::whole()],
            })
            .collect();
        self.run(jobs, output, options)
    }

    /// Export every KEEP segment of every clip, in clip then timeline order
    pub fn export(
        &self,
        clips: &[MediaClip],
        output: &str,
        options: &RemuxOptions,
    ) -> Result<RemuxReport, RemuxError> {
        let mut jobs = Vec::with_capacity(clips.len());
        for clip in clips {
            let mut windows = Vec::new();
            for segment in clip.keep_segments() {
                if segment.start_ms < 0 || segment.end_ms <= segment.start_ms {
                    return Err(RemuxError::InvalidRange {
                        start_ms: segment.start_ms,
                        end_ms: segment.end_ms,
                    });
                }
                windows.push(SegmentWindow::from_ms(segment.start_ms, segment.end_ms));
            }
            if !windows.is_empty() {
                jobs.push(ClipJob {
                    source_ref: clip.source.clone(),
                    windows,
                });
            }
        }
        self.run(jobs, output, options)
    }

    /// Cut every KEEP segment of `clip` into its own file, named by `output_for`.
    ///
    /// A failed segment does not stop the ones after it; failures are
    /// collected in the returned [`SegmentExport`]. Cancellation stops the loop.
    pub fn export_separately(
        &self,
        clip: &MediaClip,
        output_for: impl Fn(&Segment) -> String,
        options: &RemuxOptions,
    ) -> Result<SegmentExport, RemuxError> {
        let segments = clip.keep_segments();
        if segments.is_empty() {
            return Err(MergeError::NoClips.into());
        }

        let mut export = SegmentExport::default();
        for (index, segment) in segments.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(RemuxError::Aborted {
                    partial: false,
                    reason: "cancelled".to_string(),
                });
            }
            let output = output_for(segment);
            debug!(
                "Segment {}/{} of {} -> {}",
                index + 1,
                segments.len(),
                clip.source,
                output
            );
            match self.cut(&clip.source, &output, segment.start_ms, segment.end_ms, options) {
                Ok(report) => export.written.push(report),
                Err(error) => {
                    warn!("Segment {} of {} failed: {}", index + 1, clip.source, error);
                    export.failures.push(SegmentFailure {
                        index,
                        start_ms: segment.start_ms,
                        end_ms: segment.end_ms,
                        output,
                        error,
                    });
                }
            }
        }
        Ok(export)
    }

    /// Validate, then write `jobs` into `output`
    pub fn run(
        &self,
        jobs: Vec<ClipJob>,
        output: &str,
        options: &RemuxOptions,
    ) -> Result<RemuxReport, RemuxError> {
        if jobs.is_empty() {
            return Err(MergeError::NoClips.into());
        }
        let selection = options.selection();

        let mut clips = Vec::with_capacity(jobs.len());
        for job in jobs {
            let demuxer = TrackInspector::open(self.source, &job.source_ref)?;
            let metadata = TrackInspector::describe(demuxer.as_ref())?;
            clips.push(OpenedClip {
                demuxer,
                metadata,
                windows: job.windows,
            });
        }

        let all_metadata: Vec<MediaMetadata> = clips.iter().map(|c| c.metadata.clone()).collect();
        MergeValidator::validate(&all_metadata, &selection)?;

        let layout = OutputLayout::from_reference(&clips[0].metadata, &selection);
        if layout.tracks.is_empty() {
            return Err(MergeError::NoMatchingTracks { clip_index: 0 }.into());
        }
        let track_maps: Vec<HashMap<u32, usize>> = clips
            .iter()
            .map(|c| layout.map_clip(&c.metadata, &selection))
            .collect();

        let rotation = options.rotation_override.or({
            let reference = clips[0].metadata.rotation;
            (reference != 0).then_some(reference)
        });
        let formats = self.output_formats(&layout, clips[0].demuxer.as_ref(), rotation);

        if self.cancel.is_cancelled() {
            return Err(RemuxError::Aborted {
                partial: false,
                reason: "cancelled".to_string(),
            });
        }

        info!(
            "Remuxing {} input(s) into {} ({} tracks)",
            clips.len(),
            output,
            formats.len()
        );
        let mut muxer = self
            .sink
            .open(output)
            .map_err(|e| RemuxError::Unsupported(format!("cannot open {output}: {e}")))?;
        let guard = OutputGuard::new(self.sink, output);

        let written = self.write_all(
            muxer.as_mut(),
            &mut clips,
            &layout,
            &formats,
            &track_maps,
            rotation,
        );
        // Release the destination before it may be removed
        drop(muxer);

        match written {
            Ok(summary) => {
                guard.commit();
                info!(
                    "Wrote {}: {} segments, {} samples, {} ms",
                    output,
                    summary.segments,
                    summary.samples_written,
                    summary.duration_us / 1000
                );
                Ok(RemuxReport {
                    output: output.to_string(),
                    tracks: formats.len(),
                    segments: summary.segments,
                    samples_written: summary.samples_written,
                    duration_us: summary.duration_us,
                })
            }
            Err(failure) => {
                let partial = guard.abort();
                error!("Remux into {} aborted: {}", output, failure);
                Err(RemuxError::Aborted {
                    partial,
                    reason: failure.to_string(),
                })
            }
        }
    }

    fn output_formats(
        &self,
        layout: &OutputLayout,
        reference: &dyn Demuxer,
        rotation: Option<i32>,
    ) -> Vec<TrackFormat> {
        layout
            .tracks
            .iter()
            .map(|track| {
                let mut source = reference.track_format(track.id).unwrap_or_default();
                if source.mime_type.is_empty() {
                    source.mime_type = track.mime_type.clone();
                }
                if source.language.is_none() {
                    source.language = track.language.clone();
                }
                if source.title.is_none() {
                    source.title = track.title.clone();
                }
                let mut format = output_format(track.kind, &source);
                if track.kind == TrackKind::Video && rotation.is_some() {
                    format.rotation_degrees = rotation;
                }
                format
            })
            .collect()
    }

    fn write_all(
        &self,
        muxer: &mut dyn Muxer,
        clips: &mut [OpenedClip],
        layout: &OutputLayout,
        formats: &[TrackFormat],
        track_maps: &[HashMap<u32, usize>],
        rotation: Option<i32>,
    ) -> Result<WriteSummary, CopyFailure> {
        let mut muxer_index = Vec::with_capacity(formats.len());
        for format in formats {
            muxer_index.push(muxer.add_track(format)?);
        }
        if let Some(degrees) = rotation.filter(|_| layout.has_kind(TrackKind::Video)) {
            muxer.set_orientation_hint(degrees)?;
        }
        muxer.start()?;

        let mut context = TimeMappingContext::new(formats.len());
        let mut summary = WriteSummary::default();
        let reference_output = layout.first_of_kind(TrackKind::Video);

        for (clip_index, (clip, map)) in clips.iter_mut().zip(track_maps).enumerate() {
            let map: HashMap<u32, usize> = map.iter().map(|(id, out)| (*id, muxer_index[*out])).collect();
            let mut ids: Vec<u32> = map.keys().copied().collect();
            ids.sort_unstable();
            clip.demuxer.select_tracks(&ids)?;

            let reference_track = reference_output.and_then(|out| {
                let target = muxer_index[out];
                map.iter().find(|(_, o)| **o == target).map(|(id, _)| *id)
            });
            let gap_us = one_sample_duration_us(
                layout
                    .has_kind(TrackKind::Audio)
                    .then_some(clip.metadata.sample_rate),
                layout
                    .has_kind(TrackKind::Video)
                    .then_some(clip.metadata.frame_rate),
            );
            let copier = SegmentCopier {
                track_map: &map,
                reference_track,
                cancel: &self.cancel,
            };

            for window in &clip.windows {
                debug!(
                    "Clip {} window {:?} at output {} us",
                    clip_index,
                    window,
                    context.output_base_us()
                );
                let stats = copier.copy(clip.demuxer.as_mut(), muxer, *window, &mut context)?;
                context.finish_segment(gap_us);
                summary.segments += 1;
                summary.samples_written += stats.samples_written;
            }
        }

        muxer.stop()?;
        summary.duration_us = context.output_base_us();
        Ok(summary)
    }
}

//! Track enumeration over an open Demuxer

use tracing::{debug, info};

use crate::domain::errors::InspectionError;
use crate::domain::model::*;
use crate::ports::{Demuxer, MediaSource};

pub struct TrackInspector;

impl TrackInspector {
    /// Open `source_ref`, reporting any failure as an unreadable source
    pub fn open(source: &dyn MediaSource, source_ref: &str) -> Result<Box<dyn Demuxer>, InspectionError> {
        source
            .open(source_ref)
            .map_err(|e| InspectionError::SourceUnreadable {
                source_ref: source_ref.to_string(),
                reason: e.to_string(),
            })
    }

    /// Every track of the demuxer, classified by MIME prefix
    pub fn inspect(demuxer: &dyn Demuxer) -> Result<Vec<TrackDescriptor>, InspectionError> {
        let tracks: Vec<TrackDescriptor> = demuxer
            .tracks()
            .into_iter()
            .map(|t| {
                let descriptor = TrackDescriptor {
                    kind: TrackKind::from_mime(&t.mime_type),
                    ..t
                };
                match demuxer.track_format(descriptor.id) {
                    Some(format) => descriptor.with_format_details(&format),
                    None => descriptor,
                }
            })
            .collect();

        if tracks.is_empty() {
            return Err(InspectionError::NoTracks {
                source_ref: demuxer.source_ref().to_string(),
            });
        }
        debug!("{}: {} tracks", demuxer.source_ref(), tracks.len());
        Ok(tracks)
    }

    /// Aggregate metadata: primary video/audio details plus every track
    pub fn describe(demuxer: &dyn Demuxer) -> Result<MediaMetadata, InspectionError> {
        let tracks = Self::inspect(demuxer)?;
        let format_of = |kind: TrackKind| {
            tracks
                .iter()
                .find(|t| t.kind == kind)
                .map(|t| (t, demuxer.track_format(t.id).unwrap_or_default()))
        };
        let video = format_of(TrackKind::Video);
        let audio = format_of(TrackKind::Audio);

        let track_durations = tracks
            .iter()
            .filter_map(|t| demuxer.track_format(t.id).and_then(|f| f.duration_us))
            .max();
        let duration_us = demuxer.duration_us().or(track_durations).unwrap_or(0);

        let (width, height, frame_rate, rotation) = video
            .as_ref()
            .map(|(_, f)| {
                (
                    f.width.unwrap_or(0),
                    f.height.unwrap_or(0),
                    f.frame_rate.unwrap_or(0.0),
                    f.rotation_degrees.unwrap_or(0),
                )
            })
            .unwrap_or((0, 0, 0.0, 0));
        let (sample_rate, channel_count) = audio
            .as_ref()
            .map(|(_, f)| (f.sample_rate.unwrap_or(0), f.channel_count.unwrap_or(0)))
            .unwrap_or((0, 0));

        let metadata = MediaMetadata {
            duration_us,
            width,
            height,
            frame_rate,
            rotation,
            sample_rate,
            channel_count,
            video_mime: video.as_ref().map(|(t, _)| t.mime_type.clone()),
            audio_mime: audio.as_ref().map(|(t, _)| t.mime_type.clone()),
            tracks: tracks.clone(),
        };
        info!(
            "Inspected {}: {} ms, {}x{}, {} tracks",
            demuxer.source_ref(),
            metadata.duration_ms(),
            metadata.width,
            metadata.height,
            metadata.tracks.len()
        );
        Ok(metadata)
    }

    /// Tracks surviving `selection`, in container order
    pub fn select(tracks: &[TrackDescriptor], selection: &TrackSelection) -> Vec<TrackDescriptor> {
        tracks
            .iter()
            .filter(|t| selection.is_selected(t))
            .cloned()
            .collect()
    }
}

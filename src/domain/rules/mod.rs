// Domain rules - Business logic and policies

pub mod segments;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Business rules for concatenating clips without re-encoding.
///
/// Every clip is compared against the first one. Validation is pure: it
/// touches no collaborator and can be run any number of times before the
/// first byte of output exists.
pub struct MergeValidator;

impl MergeValidator {
    /// Check that `clips` can be concatenated with the given track selection.
    ///
    /// The kinds checked are the ones that will be copied: explicit track ids
    /// may pull in a kind whose keep flag is off.
    pub fn validate(clips: &[MediaMetadata], selection: &TrackSelection) -> Result<(), MergeError> {
        let reference = clips.first().ok_or(MergeError::NoClips)?;
        let kinds = selection.copied_kinds(&reference.tracks);

        for (clip_index, clip) in clips.iter().enumerate() {
            Self::check_requested_kinds(clip, clip_index, &kinds)?;
            Self::check_selected_tracks(clip, clip_index, &kinds, selection)?;

            if clip_index == 0 {
                continue;
            }

            for kind in &kinds {
                Self::check_codec(reference, clip, clip_index, *kind, selection)?;
            }
            if kinds.contains(&TrackKind::Video) {
                Self::check_dimensions(reference, clip, clip_index, selection)?;
            }
            if kinds.contains(&TrackKind::Audio) {
                Self::check_audio_format(reference, clip, clip_index, selection)?;
            }
        }

        Ok(())
    }

    /// The track of `kind` a merge will actually copy from `clip`
    pub fn chosen_track<'a>(
        clip: &'a MediaMetadata,
        kind: TrackKind,
        selection: &TrackSelection,
    ) -> Option<&'a TrackDescriptor> {
        clip.tracks_of(kind).find(|t| match &selection.selected_track_ids {
            Some(ids) => ids.contains(&t.id),
            None => true,
        })
    }

    fn check_requested_kinds(
        clip: &MediaMetadata,
        clip_index: usize,
        kinds: &[TrackKind],
    ) -> Result<(), MergeError> {
        if kinds.iter().any(|kind| clip.has_kind(*kind)) {
            Ok(())
        } else {
            Err(MergeError::NoMatchingTracks { clip_index })
        }
    }

    fn check_selected_tracks(
        clip: &MediaMetadata,
        clip_index: usize,
        kinds: &[TrackKind],
        selection: &TrackSelection,
    ) -> Result<(), MergeError> {
        if selection.selected_track_ids.is_none() {
            return Ok(());
        }
        for kind in kinds {
            if Self::chosen_track(clip, *kind, selection).is_none() {
                return Err(MergeError::MissingSelectedTrack {
                    clip_index,
                    kind: *kind,
                });
            }
        }
        Ok(())
    }

    fn check_codec(
        reference: &MediaMetadata,
        clip: &MediaMetadata,
        clip_index: usize,
        kind: TrackKind,
        selection: &TrackSelection,
    ) -> Result<(), MergeError> {
        let mime_of = |m: &MediaMetadata| {
            Self::chosen_track(m, kind, selection).map(|t| t.mime_type.to_ascii_lowercase())
        };
        let expected = mime_of(reference);
        let found = mime_of(clip);
        if expected == found {
            return Ok(());
        }
        Err(MergeError::CodecMismatch {
            kind,
            expected: expected.unwrap_or_else(|| "none".to_string()),
            found: found.unwrap_or_else(|| "none".to_string()),
            clip_index,
        })
    }

    /// Display size of the video track `clip` contributes
    fn chosen_dimensions(clip: &MediaMetadata, selection: &TrackSelection) -> Option<(u32, u32)> {
        let track = Self::chosen_track(clip, TrackKind::Video, selection)?;
        let coded = track.dimensions.unwrap_or((clip.width, clip.height));
        Some(clip.rotated(coded))
    }

    /// Sample rate and channel count of the audio track `clip` contributes
    fn chosen_audio_format(clip: &MediaMetadata, selection: &TrackSelection) -> Option<(u32, u32)> {
        let track = Self::chosen_track(clip, TrackKind::Audio, selection)?;
        Some(
            track
                .audio_format
                .unwrap_or((clip.sample_rate, clip.channel_count)),
        )
    }

    fn check_dimensions(
        reference: &MediaMetadata,
        clip: &MediaMetadata,
        clip_index: usize,
        selection: &TrackSelection,
    ) -> Result<(), MergeError> {
        let (Some(expected), Some(found)) = (
            Self::chosen_dimensions(reference, selection),
            Self::chosen_dimensions(clip, selection),
        ) else {
            return Ok(());
        };
        if expected != found {
            return Err(MergeError::DimensionMismatch {
                expected,
                found,
                clip_index,
            });
        }
        Ok(())
    }

    fn check_audio_format(
        reference: &MediaMetadata,
        clip: &MediaMetadata,
        clip_index: usize,
        selection: &TrackSelection,
    ) -> Result<(), MergeError> {
        let (Some(expected), Some(found)) = (
            Self::chosen_audio_format(reference, selection),
            Self::chosen_audio_format(clip, selection),
        ) else {
            return Ok(());
        };
        if expected != found {
            return Err(MergeError::AudioFormatMismatch {
                expected,
                found,
                clip_index,
            });
        }
        Ok(())
    }
}

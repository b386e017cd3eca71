// LibAV demuxer - container reading over ffmpeg_next::format::context::Input

use std::collections::HashSet;

use ffmpeg_next::{self as ffmpeg, codec, format, media, rescale, Packet, Rational, Rescale};
use tracing::{debug, info, warn};

use super::{io_error, mime_for_codec, open_error, read_extradata};
use crate::domain::errors::PortError;
use crate::domain::model::*;
use crate::ports::*;

/// Opens files through libavformat
#[derive(Debug, Clone, Copy, Default)]
pub struct LibavSource;

impl LibavSource {
    pub fn new() -> Self {
        Self
    }
}

impl MediaSource for LibavSource {
    fn open(&self, source_ref: &str) -> PortResult<Box<dyn Demuxer>> {
        let input = format::input(&source_ref).map_err(|e| open_error(source_ref, e))?;
        info!(
            "Opened {} ({}, {} streams)",
            source_ref,
            input.format().name(),
            input.nb_streams()
        );
        Ok(Box::new(LibavDemuxer::new(source_ref, input)))
    }

    fn is_accessible(&self, source_ref: &str) -> bool {
        std::fs::File::open(source_ref).is_ok()
    }
}

/// Track ids are libav stream indices
pub struct LibavDemuxer {
    source_ref: String,
    input: format::context::Input,
    time_bases: Vec<Rational>,
    selected: Option<HashSet<u32>>,
}

impl LibavDemuxer {
    pub fn new(source_ref: &str, input: format::context::Input) -> Self {
        let time_bases = input.streams().map(|s| s.time_base()).collect();
        Self {
            source_ref: source_ref.to_string(),
            input,
            time_bases,
            selected: None,
        }
    }

    fn to_us(&self, index: usize, ts: i64) -> i64 {
        match self.time_bases.get(index) {
            Some(tb) if tb.denominator() != 0 => ts.rescale(*tb, rescale::TIME_BASE),
            _ => ts,
        }
    }
}

fn tag(metadata: &ffmpeg::DictionaryRef<'_>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Demuxer for LibavDemuxer {
    fn source_ref(&self) -> &str {
        &self.source_ref
    }

    fn tracks(&self) -> Vec<TrackDescriptor> {
        self.input
            .streams()
            .map(|stream| {
                let params = stream.parameters();
                let mime = mime_for_codec(params.id(), params.medium());
                let metadata = stream.metadata();
                let mut descriptor = TrackDescriptor::new(stream.index() as u32, mime);
                descriptor.language = tag(&metadata, "language").filter(|l| l != "und");
                descriptor.title = tag(&metadata, "title").or_else(|| tag(&metadata, "handler_name"));
                descriptor
            })
            .collect()
    }

    fn track_format(&self, track_id: u32) -> Option<TrackFormat> {
        let stream = self.input.stream(track_id as usize)?;
        let params = stream.parameters();
        let medium = params.medium();
        let metadata = stream.metadata();

        let mut format = TrackFormat {
            mime_type: mime_for_codec(params.id(), medium),
            codec_name: Some(params.id().name().to_string()),
            duration_us: (stream.duration() > 0)
                .then(|| self.to_us(stream.index(), stream.duration())),
            language: tag(&metadata, "language").filter(|l| l != "und"),
            title: tag(&metadata, "title"),
            ..TrackFormat::default()
        };

        let extradata = read_extradata(&params);
        if !extradata.is_empty() {
            format.codec_private.push(extradata);
        }

        let context = match codec::context::Context::from_parameters(params) {
            Ok(context) => context,
            Err(e) => {
                warn!("{}: no codec context for track {}: {}", self.source_ref, track_id, e);
                return Some(format);
            }
        };
        match medium {
            media::Type::Video => {
                if let Ok(video) = context.decoder().video() {
                    format.width = Some(video.width());
                    format.height = Some(video.height());
                    format.bit_rate = (video.bit_rate() > 0).then(|| video.bit_rate() as u64);
                }
                let rate = stream.avg_frame_rate();
                if rate.denominator() != 0 && rate.numerator() > 0 {
                    format.frame_rate = Some(f64::from(rate) as f32);
                }
                format.rotation_degrees = tag(&metadata, "rotate").and_then(|r| r.parse().ok());
            }
            media::Type::Audio => {
                if let Ok(audio) = context.decoder().audio() {
                    format.sample_rate = Some(audio.rate());
                    format.channel_count = Some(audio.ch_layout().channels() as u32);
                    format.bit_rate = (audio.bit_rate() > 0).then(|| audio.bit_rate() as u64);
                }
            }
            _ => {}
        }
        Some(format)
    }

    fn duration_us(&self) -> Option<i64> {
        // Container duration is already in AV_TIME_BASE (microseconds)
        let duration = self.input.duration();
        (duration > 0).then_some(duration)
    }

    fn select_tracks(&mut self, track_ids: &[u32]) -> PortResult<()> {
        let streams = self.input.nb_streams();
        if let Some(unknown) = track_ids.iter().find(|id| **id >= streams) {
            return Err(PortError::State(format!(
                "{}: no stream {}",
                self.source_ref, unknown
            )));
        }
        self.selected = Some(track_ids.iter().copied().collect());
        Ok(())
    }

    /// libavformat seeks on the default stream; `track_id` is only logged
    fn seek_to(&mut self, track_id: u32, time_us: i64) -> PortResult<()> {
        debug!("{}: seek track {} to {} us", self.source_ref, track_id, time_us);
        self.input
            .seek(time_us, ..time_us)
            .map_err(|e| io_error(&self.source_ref, e))
    }

    fn read_next_sample(&mut self) -> PortResult<Option<Sample>> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => return Err(io_error(&self.source_ref, e)),
            }

            let index = packet.stream();
            let track_id = index as u32;
            if let Some(selected) = &self.selected {
                if !selected.contains(&track_id) {
                    continue;
                }
            }
            let pts = match packet.pts().or(packet.dts()) {
                Some(pts) => pts,
                None => {
                    warn!("{}: skipping untimed packet on stream {}", self.source_ref, index);
                    continue;
                }
            };

            return Ok(Some(Sample {
                track_id,
                presentation_time_us: self.to_us(index, pts),
                decode_time_us: packet.dts().map(|dts| self.to_us(index, dts)),
                data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                flags: SampleFlags {
                    is_sync_sample: packet.is_key(),
                },
            }));
        }
    }
}

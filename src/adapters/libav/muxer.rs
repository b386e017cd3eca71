// LibAV muxer - stream-copy container writing over ffmpeg_next::format::context::Output

use std::io::ErrorKind;

use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::{self as ffmpeg, codec, decoder, encoder, format, packet, rescale, Packet, Rational, Rescale};
use tracing::{debug, info};

use super::{codec_by_name, codec_for_mime, io_error, open_error, write_extradata};
use crate::domain::errors::PortError;
use crate::domain::model::*;
use crate::ports::*;

/// Creates files through libavformat, guessing the container from the extension
#[derive(Debug, Clone, Copy, Default)]
pub struct LibavSink;

impl LibavSink {
    pub fn new() -> Self {
        Self
    }
}

impl MediaSink for LibavSink {
    fn open(&self, dest_ref: &str) -> PortResult<Box<dyn Muxer>> {
        let output = format::output(&dest_ref).map_err(|e| open_error(dest_ref, e))?;
        debug!("Created {} ({})", dest_ref, output.format().name());
        Ok(Box::new(LibavMuxer {
            dest_ref: dest_ref.to_string(),
            output,
            time_bases: Vec::new(),
            kinds: Vec::new(),
            tags: Vec::new(),
            orientation: None,
            started: false,
            stopped: false,
        }))
    }

    fn discard(&self, dest_ref: &str) -> PortResult<()> {
        match std::fs::remove_file(dest_ref) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct LibavMuxer {
    dest_ref: String,
    output: format::context::Output,
    time_bases: Vec<Rational>,
    kinds: Vec<TrackKind>,
    /// Stream metadata, written just before the header
    tags: Vec<Vec<(&'static str, String)>>,
    orientation: Option<i32>,
    started: bool,
    stopped: bool,
}

/// Stream parameters for a copied track, filled field by field from `format`
fn stream_parameters(kind: TrackKind, codec_id: codec::Id, format: &TrackFormat) -> PortResult<codec::Parameters> {
    let context = match decoder::find(codec_id).or_else(|| encoder::find(codec_id)) {
        Some(codec) => codec::context::Context::new_with_codec(codec),
        None => return Err(PortError::Unsupported(format!("{codec_id:?} is not available in libav"))),
    };
    let bit_rate = format.bit_rate.unwrap_or(0) as usize;
    let unsupported = |e: ffmpeg::Error| PortError::Unsupported(format!("{}: {}", format.mime_type, e));

    match kind {
        TrackKind::Video => {
            let mut video = context.encoder().video().map_err(unsupported)?;
            video.set_width(format.width.unwrap_or(0));
            video.set_height(format.height.unwrap_or(0));
            video.set_bit_rate(bit_rate);
            Ok(codec::Parameters::from(&video))
        }
        TrackKind::Audio => {
            let mut audio = context.encoder().audio().map_err(unsupported)?;
            audio.set_rate(format.sample_rate.unwrap_or(0) as i32);
            audio.set_ch_layout(ChannelLayout::default_for_channels(format.channel_count.unwrap_or(2)));
            audio.set_bit_rate(bit_rate);
            Ok(codec::Parameters::from(&audio))
        }
        TrackKind::Other => Ok(codec::Parameters::from(&context.encoder())),
    }
}

impl LibavMuxer {
    fn codec_of(&self, format: &TrackFormat) -> PortResult<codec::Id> {
        codec_for_mime(&format.mime_type)
            .or_else(|| format.codec_name.as_deref().and_then(codec_by_name))
            .ok_or_else(|| PortError::Unsupported(format!("no codec for {}", format.mime_type)))
    }

    fn apply_tags(&mut self) {
        for (index, (kind, tags)) in self.kinds.iter().zip(&self.tags).enumerate() {
            let mut metadata = ffmpeg::Dictionary::new();
            for (key, value) in tags {
                metadata.set(key, value);
            }
            if let (TrackKind::Video, Some(degrees)) = (kind, self.orientation) {
                metadata.set("rotate", &degrees.rem_euclid(360).to_string());
            }
            if let Some(mut stream) = self.output.stream_mut(index) {
                stream.set_metadata(metadata);
            }
        }
    }
}

impl Muxer for LibavMuxer {
    fn add_track(&mut self, format: &TrackFormat) -> PortResult<usize> {
        if self.started {
            return Err(PortError::State("add_track after start".to_string()));
        }
        let kind = TrackKind::from_mime(&format.mime_type);
        let codec_id = self.codec_of(format)?;

        let parameters = stream_parameters(kind, codec_id, format)?;

        let mut stream = self
            .output
            .add_stream(encoder::find(codec::Id::None))
            .map_err(|e| io_error(&self.dest_ref, e))?;
        stream.set_parameters(parameters);
        stream.set_time_base(rescale::TIME_BASE);
        let index = stream.index();

        let mut tags = Vec::new();
        if let Some(language) = &format.language {
            tags.push(("language", language.clone()));
        }
        if let Some(title) = &format.title {
            tags.push(("title", title.clone()));
        }

        write_extradata(&mut self.output, index, &format.codec_private.concat())?;

        self.kinds.push(kind);
        self.tags.push(tags);
        debug!("{}: track {} = {} ({})", self.dest_ref, index, format.mime_type, kind);
        Ok(index)
    }

    fn set_orientation_hint(&mut self, degrees: i32) -> PortResult<()> {
        if self.started {
            return Err(PortError::State("orientation hint after start".to_string()));
        }
        self.orientation = Some(degrees);
        Ok(())
    }

    fn start(&mut self) -> PortResult<()> {
        if self.kinds.is_empty() {
            return Err(PortError::State("start without tracks".to_string()));
        }
        self.apply_tags();
        self.output
            .write_header()
            .map_err(|e| PortError::Unsupported(format!("{}: {}", self.dest_ref, e)))?;
        // The muxer may have replaced the requested time bases
        self.time_bases = self.output.streams().map(|s| s.time_base()).collect();
        self.started = true;
        info!("Writing {} ({} tracks)", self.dest_ref, self.kinds.len());
        Ok(())
    }

    fn write_sample(&mut self, track_index: usize, sample: &Sample) -> PortResult<()> {
        if !self.started || self.stopped {
            return Err(PortError::State("write outside start/stop".to_string()));
        }
        let time_base = *self
            .time_bases
            .get(track_index)
            .ok_or_else(|| PortError::State(format!("unknown output track {track_index}")))?;

        let pts = sample.presentation_time_us.rescale(rescale::TIME_BASE, time_base);
        let dts = sample
            .decode_time_us
            .map(|dts| dts.rescale(rescale::TIME_BASE, time_base))
            .unwrap_or(pts);

        let mut out = Packet::copy(&sample.data);
        out.set_stream(track_index);
        out.set_pts(Some(pts));
        out.set_dts(Some(dts));
        if sample.is_sync() {
            out.set_flags(packet::Flags::KEY);
        }
        out.write_interleaved(&mut self.output)
            .map_err(|e| io_error(&self.dest_ref, e))
    }

    fn stop(&mut self) -> PortResult<()> {
        if !self.started {
            return Err(PortError::State("stop before start".to_string()));
        }
        if self.stopped {
            return Ok(());
        }
        self.output
            .write_trailer()
            .map_err(|e| io_error(&self.dest_ref, e))?;
        self.stopped = true;
        debug!("Finalized {}", self.dest_ref);
        Ok(())
    }
}

// LibAV PCM decoder - first audio stream decoded and converted to packed s16

use std::collections::VecDeque;

use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::frame::audio::Audio as AudioFrame;
use ffmpeg_next::{self as ffmpeg, codec, format, media, rescale, Packet, Rational, Rescale};
use tracing::{debug, info};

use super::{io_error, open_error};
use crate::domain::errors::PortError;
use crate::ports::*;

const TARGET_FORMAT: format::Sample = format::Sample::I16(SampleType::Packed);

#[derive(Debug, Clone, Copy, Default)]
pub struct LibavPcmSource;

impl LibavPcmSource {
    pub fn new() -> Self {
        Self
    }
}

impl PcmSource for LibavPcmSource {
    fn open(&self, source_ref: &str) -> PortResult<Option<Box<dyn PcmDecoder>>> {
        let input = format::input(&source_ref).map_err(|e| open_error(source_ref, e))?;
        let Some(stream) = input.streams().best(media::Type::Audio) else {
            debug!("{}: no audio stream", source_ref);
            return Ok(None);
        };
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let stream_duration = stream.duration();

        let context = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_error(source_ref, e))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| open_error(source_ref, e))?;

        let duration_us = if stream_duration > 0 {
            stream_duration.rescale(time_base, rescale::TIME_BASE)
        } else {
            input.duration().max(0)
        };
        let info = PcmStreamInfo {
            sample_rate: decoder.rate(),
            channel_count: decoder.ch_layout().channels() as u32,
            duration_us,
        };
        info!(
            "Decoding audio stream {} of {} ({} Hz, {} ch)",
            stream_index, source_ref, info.sample_rate, info.channel_count
        );

        Ok(Some(Box::new(LibavPcmDecoder {
            source_ref: source_ref.to_string(),
            input,
            stream_index,
            time_base,
            decoder,
            resampler: None,
            info,
            decoded_frames: 0,
            pending: VecDeque::new(),
            drained: false,
        })))
    }
}

pub struct LibavPcmDecoder {
    source_ref: String,
    input: format::context::Input,
    stream_index: usize,
    time_base: Rational,
    decoder: codec::decoder::Audio,
    resampler: Option<resampling::Context>,
    info: PcmStreamInfo,
    /// Frames converted so far, used to time frames without a timestamp
    decoded_frames: u64,
    pending: VecDeque<PcmChunk>,
    drained: bool,
}

impl LibavPcmDecoder {
    fn receive_frames(&mut self) -> PortResult<()> {
        let mut frame = AudioFrame::empty();
        while self.decoder.receive_frame(&mut frame).is_ok() {
            let chunk = self.convert(&frame)?;
            if !chunk.data.is_empty() {
                self.pending.push_back(chunk);
            }
        }
        Ok(())
    }

    fn convert(&mut self, frame: &AudioFrame) -> PortResult<PcmChunk> {
        let rate = u64::from(self.info.sample_rate.max(1));
        let presentation_time_us = match frame.pts() {
            Some(pts) => pts.rescale(self.time_base, rescale::TIME_BASE),
            None => (self.decoded_frames * 1_000_000 / rate) as i64,
        };

        let converted;
        let packed = if frame.format() == TARGET_FORMAT {
            frame
        } else {
            if self.resampler.is_none() {
                // Mono must be declared explicitly or swr guesses the layout
                let mono = frame.ch_layout().channels() < 2;
                let layout = || if mono { ChannelLayout::MONO } else { frame.ch_layout() };
                let created = resampling::Context::get2(
                    frame.format(),
                    layout(),
                    frame.rate(),
                    TARGET_FORMAT,
                    layout(),
                    frame.rate(),
                )
                .map_err(|e| io_error(&self.source_ref, e))?;
                self.resampler = Some(created);
            }
            let resampler = self
                .resampler
                .as_mut()
                .ok_or_else(|| PortError::State("resampler missing".to_string()))?;
            let mut out = AudioFrame::empty();
            resampler
                .run(frame, &mut out)
                .map_err(|e| io_error(&self.source_ref, e))?;
            converted = out;
            &converted
        };

        let channels = self.info.channel_count.max(1) as usize;
        let bytes = (packed.samples() * channels * 2).min(packed.data(0).len());
        self.decoded_frames += packed.samples() as u64;
        Ok(PcmChunk {
            data: packed.data(0)[..bytes].to_vec(),
            presentation_time_us,
        })
    }
}

impl PcmDecoder for LibavPcmDecoder {
    fn stream_info(&self) -> PcmStreamInfo {
        self.info
    }

    fn next_chunk(&mut self) -> PortResult<Option<PcmChunk>> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Ok(Some(chunk));
            }
            if self.drained {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| io_error(&self.source_ref, e))?;
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| io_error(&self.source_ref, e))?;
                    self.drained = true;
                }
                Err(e) => return Err(io_error(&self.source_ref, e)),
            }
            self.receive_frames()?;
        }
    }
}

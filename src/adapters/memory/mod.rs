// In-memory adapters - deterministic Demuxer/Muxer/PCM collaborators
//
// Deterministic collaborators for the integration tests. Sources are described
// track by track with synthetic sample runs; sinks record every call so the
// written timeline can be inspected afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::errors::PortError;
use crate::domain::model::*;
use crate::engine::gap::AUDIO_FRAME_SAMPLES;
use crate::ports::*;

/// A synthetic container: tracks plus samples in container order
#[derive(Debug, Clone, Default)]
pub struct MemoryMedia {
    tracks: Vec<(TrackDescriptor, TrackFormat)>,
    samples: Vec<Sample>,
    duration_us: Option<i64>,
    fail_reads_after: Option<usize>,
}

impl MemoryMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, descriptor: TrackDescriptor, format: TrackFormat) -> Self {
        self.tracks.push((descriptor, format));
        self
    }

    /// Append samples as-is; the caller controls interleaving
    pub fn with_samples(mut self, samples: impl IntoIterator<Item = Sample>) -> Self {
        self.samples.extend(samples);
        self
    }

    /// Add a video track with one frame every `1/fps` s and a sync frame every `gop_ms`
    pub fn with_video(
        self,
        track_id: u32,
        mime_type: &str,
        (width, height): (u32, u32),
        fps: f32,
        duration_ms: i64,
        gop_ms: i64,
    ) -> Self {
        let frame_us = (1_000_000.0 / f64::from(fps)).round() as i64;
        let format = TrackFormat {
            mime_type: mime_type.to_string(),
            duration_us: Some(duration_ms * 1_000),
            width: Some(width),
            height: Some(height),
            frame_rate: Some(fps),
            codec_private: vec![vec![0, 0, 0, 1, 0x67], vec![0, 0, 0, 1, 0x68]],
            ..TrackFormat::default()
        };
        let mut samples = Vec::new();
        let mut pts = 0;
        let mut next_sync = 0;
        while pts < duration_ms * 1_000 {
            let is_sync = pts >= next_sync;
            if is_sync {
                next_sync += gop_ms.max(1) * 1_000;
            }
            samples.push(Sample::new(track_id, pts, is_sync, vec![track_id as u8; 16]));
            pts += frame_us;
        }
        self.with_track(TrackDescriptor::new(track_id, mime_type), format)
            .interleave(samples)
    }

    /// Add an audio track of 1024-sample frames, every one a sync sample
    pub fn with_audio(
        self,
        track_id: u32,
        mime_type: &str,
        sample_rate: u32,
        channel_count: u32,
        duration_ms: i64,
    ) -> Self {
        let format = TrackFormat {
            mime_type: mime_type.to_string(),
            duration_us: Some(duration_ms * 1_000),
            sample_rate: Some(sample_rate),
            channel_count: Some(channel_count),
            codec_private: vec![vec![0x12, 0x10]],
            ..TrackFormat::default()
        };
        let rate = i64::from(sample_rate.max(1));
        let mut samples = Vec::new();
        let mut frame = 0i64;
        loop {
            let pts = frame * AUDIO_FRAME_SAMPLES * 1_000_000 / rate;
            if pts >= duration_ms * 1_000 {
                break;
            }
            samples.push(Sample::new(track_id, pts, true, vec![track_id as u8; 8]));
            frame += 1;
        }
        self.with_track(TrackDescriptor::new(track_id, mime_type), format)
            .interleave(samples)
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        for (descriptor, format) in &mut self.tracks {
            if descriptor.kind == TrackKind::Video {
                format.rotation_degrees = Some(degrees);
            }
        }
        self
    }

    pub fn with_duration_us(mut self, duration_us: i64) -> Self {
        self.duration_us = Some(duration_us);
        self
    }

    /// Make every read after the first `count` samples fail
    pub fn failing_reads_after(mut self, count: usize) -> Self {
        self.fail_reads_after = Some(count);
        self
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Merge `samples` into container order by presentation time; ties keep existing samples first
    fn interleave(mut self, samples: Vec<Sample>) -> Self {
        self.samples.extend(samples);
        self.samples.sort_by_key(|s| s.presentation_time_us);
        self
    }
}

/// Opens [`MemoryDemuxer`]s over registered media
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    media: HashMap<String, MemoryMedia>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_ref: impl Into<String>, media: MemoryMedia) {
        self.media.insert(source_ref.into(), media);
    }

    pub fn with(mut self, source_ref: impl Into<String>, media: MemoryMedia) -> Self {
        self.insert(source_ref, media);
        self
    }
}

impl MediaSource for MemorySource {
    fn open(&self, source_ref: &str) -> PortResult<Box<dyn Demuxer>> {
        let media = self.media.get(source_ref).ok_or_else(|| PortError::Open {
            reference: source_ref.to_string(),
            reason: "no such source".to_string(),
        })?;
        Ok(Box::new(MemoryDemuxer {
            source_ref: source_ref.to_string(),
            media: media.clone(),
            selected: None,
            position: 0,
            reads: 0,
        }))
    }

    fn is_accessible(&self, source_ref: &str) -> bool {
        self.media.contains_key(source_ref)
    }
}

pub struct MemoryDemuxer {
    source_ref: String,
    media: MemoryMedia,
    selected: Option<HashSet<u32>>,
    position: usize,
    reads: usize,
}

impl Demuxer for MemoryDemuxer {
    fn source_ref(&self) -> &str {
        &self.source_ref
    }

    fn tracks(&self) -> Vec<TrackDescriptor> {
        self.media.tracks.iter().map(|(d, _)| d.clone()).collect()
    }

    fn track_format(&self, track_id: u32) -> Option<TrackFormat> {
        self.media
            .tracks
            .iter()
            .find(|(d, _)| d.id == track_id)
            .map(|(_, f)| f.clone())
    }

    fn duration_us(&self) -> Option<i64> {
        self.media.duration_us
    }

    fn select_tracks(&mut self, track_ids: &[u32]) -> PortResult<()> {
        if let Some(unknown) = track_ids
            .iter()
            .find(|id| !self.media.tracks.iter().any(|(d, _)| d.id == **id))
        {
            return Err(PortError::State(format!("unknown track {unknown}")));
        }
        self.selected = Some(track_ids.iter().copied().collect());
        Ok(())
    }

    fn seek_to(&mut self, track_id: u32, time_us: i64) -> PortResult<()> {
        self.position = self
            .media
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.track_id == track_id && s.is_sync() && s.presentation_time_us <= time_us)
            .map(|(i, _)| i)
            .last()
            .unwrap_or(0);
        Ok(())
    }

    fn read_next_sample(&mut self) -> PortResult<Option<Sample>> {
        while let Some(sample) = self.media.samples.get(self.position) {
            self.position += 1;
            let wanted = self
                .selected
                .as_ref()
                .map_or(true, |ids| ids.contains(&sample.track_id));
            if !wanted {
                continue;
            }
            if self.media.fail_reads_after.is_some_and(|limit| self.reads >= limit) {
                return Err(PortError::Io(format!("{}: read error", self.source_ref)));
            }
            self.reads += 1;
            return Ok(Some(sample.clone()));
        }
        Ok(None)
    }
}

/// Everything a [`MemoryMuxer`] was asked to do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryOutput {
    pub tracks: Vec<TrackFormat>,
    pub orientation_hint: Option<i32>,
    pub samples: Vec<(usize, Sample)>,
    pub started: bool,
    pub stopped: bool,
}

impl MemoryOutput {
    /// Written samples of one output track, in write order
    pub fn track_samples(&self, track_index: usize) -> Vec<&Sample> {
        self.samples
            .iter()
            .filter(|(i, _)| *i == track_index)
            .map(|(_, s)| s)
            .collect()
    }
}

#[derive(Debug, Default)]
struct SinkState {
    outputs: HashMap<String, MemoryOutput>,
    fail_writes_after: Option<usize>,
    undeletable: bool,
    refuse_open: bool,
}

/// Records outputs in shared state; clones observe the same outputs
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

fn lock(state: &Mutex<SinkState>) -> MutexGuard<'_, SinkState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write after the first `count` samples
    pub fn failing_writes_after(self, count: usize) -> Self {
        lock(&self.state).fail_writes_after = Some(count);
        self
    }

    /// Refuse to discard outputs, as a read-only destination would
    pub fn undeletable(self) -> Self {
        lock(&self.state).undeletable = true;
        self
    }

    pub fn refusing_open(self) -> Self {
        lock(&self.state).refuse_open = true;
        self
    }

    pub fn output(&self, dest_ref: &str) -> Option<MemoryOutput> {
        lock(&self.state).outputs.get(dest_ref).cloned()
    }

    pub fn exists(&self, dest_ref: &str) -> bool {
        lock(&self.state).outputs.contains_key(dest_ref)
    }
}

impl MediaSink for MemorySink {
    fn open(&self, dest_ref: &str) -> PortResult<Box<dyn Muxer>> {
        let mut state = lock(&self.state);
        if state.refuse_open {
            return Err(PortError::Open {
                reference: dest_ref.to_string(),
                reason: "read-only destination".to_string(),
            });
        }
        state.outputs.insert(dest_ref.to_string(), MemoryOutput::default());
        Ok(Box::new(MemoryMuxer {
            dest_ref: dest_ref.to_string(),
            state: Arc::clone(&self.state),
            writes: 0,
        }))
    }

    fn discard(&self, dest_ref: &str) -> PortResult<()> {
        let mut state = lock(&self.state);
        if state.undeletable && state.outputs.contains_key(dest_ref) {
            return Err(PortError::Io(format!("{dest_ref}: permission denied")));
        }
        state.outputs.remove(dest_ref);
        Ok(())
    }
}

pub struct MemoryMuxer {
    dest_ref: String,
    state: Arc<Mutex<SinkState>>,
    writes: usize,
}

impl MemoryMuxer {
    fn with_output<T>(&self, f: impl FnOnce(&mut MemoryOutput) -> PortResult<T>) -> PortResult<T> {
        let mut state = lock(&self.state);
        let output = state
            .outputs
            .get_mut(&self.dest_ref)
            .ok_or_else(|| PortError::State(format!("{} was removed", self.dest_ref)))?;
        f(output)
    }
}

impl Muxer for MemoryMuxer {
    fn add_track(&mut self, format: &TrackFormat) -> PortResult<usize> {
        self.with_output(|output| {
            if output.started {
                return Err(PortError::State("add_track after start".to_string()));
            }
            output.tracks.push(format.clone());
            Ok(output.tracks.len() - 1)
        })
    }

    fn set_orientation_hint(&mut self, degrees: i32) -> PortResult<()> {
        self.with_output(|output| {
            output.orientation_hint = Some(degrees);
            Ok(())
        })
    }

    fn start(&mut self) -> PortResult<()> {
        self.with_output(|output| {
            if output.tracks.is_empty() {
                return Err(PortError::State("start without tracks".to_string()));
            }
            output.started = true;
            Ok(())
        })
    }

    fn write_sample(&mut self, track_index: usize, sample: &Sample) -> PortResult<()> {
        let limit = lock(&self.state).fail_writes_after;
        if limit.is_some_and(|limit| self.writes >= limit) {
            return Err(PortError::Io(format!("{}: disk full", self.dest_ref)));
        }
        self.with_output(|output| {
            if !output.started || output.stopped {
                return Err(PortError::State("write outside start/stop".to_string()));
            }
            if track_index >= output.tracks.len() {
                return Err(PortError::State(format!("unknown output track {track_index}")));
            }
            output.samples.push((track_index, sample.clone()));
            Ok(())
        })?;
        self.writes += 1;
        Ok(())
    }

    fn stop(&mut self) -> PortResult<()> {
        self.with_output(|output| {
            if !output.started {
                return Err(PortError::State("stop before start".to_string()));
            }
            output.stopped = true;
            Ok(())
        })
    }
}

/// Interleaved 16-bit PCM served in fixed-size chunks
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPcm {
    pub sample_rate: u32,
    pub channel_count: u32,
    /// Interleaved samples, `channel_count` per frame
    pub samples: Vec<i16>,
    pub chunk_frames: usize,
}

impl MemoryPcm {
    /// Mono PCM built from per-frame values
    pub fn mono(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channel_count: 1,
            samples,
            chunk_frames: 1024,
        }
    }

    /// Mono PCM with `value` during the given `[start_ms, end_ms)` spans and zero elsewhere
    pub fn with_loud_spans(sample_rate: u32, duration_ms: i64, value: i16, spans: &[(i64, i64)]) -> Self {
        let frames = (duration_ms * i64::from(sample_rate) / 1_000) as usize;
        let samples = (0..frames)
            .map(|i| {
                let ms = i as i64 * 1_000 / i64::from(sample_rate);
                if spans.iter().any(|(s, e)| ms >= *s && ms < *e) {
                    value
                } else {
                    0
                }
            })
            .collect();
        Self::mono(sample_rate, samples)
    }

    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    fn frame_count(&self) -> usize {
        self.samples.len() / self.channel_count.max(1) as usize
    }
}

/// Opens [`MemoryPcmDecoder`]s; sources registered without PCM have no audio
#[derive(Debug, Clone, Default)]
pub struct MemoryPcmSource {
    sources: HashMap<String, Option<MemoryPcm>>,
}

impl MemoryPcmSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source_ref: impl Into<String>, pcm: MemoryPcm) -> Self {
        self.sources.insert(source_ref.into(), Some(pcm));
        self
    }

    pub fn with_silent_source(mut self, source_ref: impl Into<String>) -> Self {
        self.sources.insert(source_ref.into(), None);
        self
    }
}

impl PcmSource for MemoryPcmSource {
    fn open(&self, source_ref: &str) -> PortResult<Option<Box<dyn PcmDecoder>>> {
        let entry = self.sources.get(source_ref).ok_or_else(|| PortError::Open {
            reference: source_ref.to_string(),
            reason: "no such source".to_string(),
        })?;
        Ok(entry.clone().map(|pcm| {
            Box::new(MemoryPcmDecoder {
                pcm,
                next_frame: 0,
            }) as Box<dyn PcmDecoder>
        }))
    }
}

pub struct MemoryPcmDecoder {
    pcm: MemoryPcm,
    next_frame: usize,
}

impl PcmDecoder for MemoryPcmDecoder {
    fn stream_info(&self) -> PcmStreamInfo {
        let rate = u64::from(self.pcm.sample_rate.max(1));
        PcmStreamInfo {
            sample_rate: self.pcm.sample_rate,
            channel_count: self.pcm.channel_count,
            duration_us: (self.pcm.frame_count() as u64 * 1_000_000 / rate) as i64,
        }
    }

    fn next_chunk(&mut self) -> PortResult<Option<PcmChunk>> {
        let total = self.pcm.frame_count();
        if self.next_frame >= total {
            return Ok(None);
        }
        let channels = self.pcm.channel_count.max(1) as usize;
        let end = (self.next_frame + self.pcm.chunk_frames).min(total);
        let data = self.pcm.samples[self.next_frame * channels..end * channels]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let presentation_time_us =
            (self.next_frame as u64 * 1_000_000 / u64::from(self.pcm.sample_rate.max(1))) as i64;
        self.next_frame = end;
        Ok(Some(PcmChunk {
            data,
            presentation_time_us,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_video_sync_spacing() {
        let media = MemoryMedia::new().with_video(1, "video/avc", (640, 360), 25.0, 1_000, 400);
        let syncs: Vec<i64> = media
            .samples()
            .iter()
            .filter(|s| s.is_sync())
            .map(|s| s.presentation_time_us)
            .collect();
        assert_eq!(media.samples().len(), 25);
        assert_eq!(syncs, vec![0, 400_000, 800_000]);
    }

    #[test]
    fn test_seek_lands_on_previous_sync() {
        let source = MemorySource::new().with(
            "a",
            MemoryMedia::new().with_video(1, "video/avc", (640, 360), 25.0, 2_000, 1_000),
        );
        let mut demuxer = source.open("a").unwrap();
        demuxer.seek_to(1, 1_500_000).unwrap();
        let first = demuxer.read_next_sample().unwrap().unwrap();
        assert_eq!(first.presentation_time_us, 1_000_000);
        assert!(first.is_sync());
    }

    #[test]
    fn test_selection_filters_reads() {
        let source = MemorySource::new().with(
            "a",
            MemoryMedia::new()
                .with_video(1, "video/avc", (640, 360), 25.0, 200, 1_000)
                .with_audio(2, "audio/mp4a-latm", 48_000, 2, 200),
        );
        let mut demuxer = source.open("a").unwrap();
        demuxer.select_tracks(&[2]).unwrap();
        while let Some(sample) = demuxer.read_next_sample().unwrap() {
            assert_eq!(sample.track_id, 2);
        }
        assert!(demuxer.select_tracks(&[9]).is_err());
    }

    #[test]
    fn test_sink_discard_and_undeletable() {
        let sink = MemorySink::new();
        sink.open("out").unwrap();
        assert!(sink.exists("out"));
        sink.discard("out").unwrap();
        assert!(!sink.exists("out"));
        assert!(sink.discard("out").is_ok());

        let locked = MemorySink::new().undeletable();
        locked.open("out").unwrap();
        assert!(locked.discard("out").is_err());
        assert!(locked.exists("out"));
    }

    #[test]
    fn test_muxer_lifecycle_enforced() {
        let sink = MemorySink::new();
        let mut muxer = sink.open("out").unwrap();
        let sample = Sample::new(1, 0, true, vec![1]);
        assert!(muxer.write_sample(0, &sample).is_err());
        let idx = muxer.add_track(&TrackFormat::default()).unwrap();
        muxer.start().unwrap();
        muxer.write_sample(idx, &sample).unwrap();
        assert!(muxer.write_sample(5, &sample).is_err());
        muxer.stop().unwrap();
        let output = sink.output("out").unwrap();
        assert!(output.stopped);
        assert_eq!(output.track_samples(0).len(), 1);
    }

    #[test]
    fn test_pcm_chunks_cover_stream() {
        let source = MemoryPcmSource::new()
            .with("a", MemoryPcm::mono(1_000, vec![1; 2_500]).with_chunk_frames(1_000))
            .with_silent_source("b");
        let mut decoder = source.open("a").unwrap().unwrap();
        assert_eq!(decoder.stream_info().duration_us, 2_500_000);
        let mut starts = Vec::new();
        let mut bytes = 0;
        while let Some(chunk) = decoder.next_chunk().unwrap() {
            starts.push(chunk.presentation_time_us);
            bytes += chunk.data.len();
        }
        assert_eq!(starts, vec![0, 1_000_000, 2_000_000]);
        assert_eq!(bytes, 5_000);
        assert!(source.open("b").unwrap().is_none());
        assert!(source.open("missing").is_err());
    }
}

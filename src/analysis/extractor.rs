//! Waveform extraction driver
//!
//! Pulls PCM from a [`PcmDecoder`] and feeds it through the bucket
//! arithmetic at engine resolution (100 buckets per second).

use tracing::{debug, info, warn};

use crate::analysis::cache::cache_key;
use crate::analysis::waveform::{engine_bucket_count, fill_edge_buckets, normalize, update_buckets, PcmBufferInfo};
use crate::domain::errors::AnalysisError;
use crate::domain::model::WaveformResult;
use crate::engine::CancelFlag;
use crate::ports::{PcmSource, WaveformCache};

/// Snapshot handed to progress observers
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionProgress {
    pub processed_us: i64,
    pub total_us: i64,
    /// Normalized copy of the buckets filled so far
    pub preview: Vec<f32>,
}

impl ExtractionProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_us <= 0 {
            return 0.0;
        }
        (self.processed_us as f64 / self.total_us as f64).clamp(0.0, 1.0)
    }
}

type ProgressFn<'a> = Box<dyn FnMut(&ExtractionProgress) + 'a>;

pub struct WaveformExtractor<'a> {
    source: &'a dyn PcmSource,
    cancel: CancelFlag,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> WaveformExtractor<'a> {
    pub fn new(source: &'a dyn PcmSource, cancel: CancelFlag) -> Self {
        Self {
            source,
            cancel,
            progress: None,
        }
    }

    /// Receive roughly ten snapshots over the course of an extraction
    pub fn on_progress(mut self, callback: impl FnMut(&ExtractionProgress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Decode the first audio track of `source_ref` into engine-resolution buckets
    pub fn extract(&mut self, source_ref: &str) -> Result<WaveformResult, AnalysisError> {
        let mut decoder = self
            .source
            .open(source_ref)?
            .ok_or_else(|| AnalysisError::NoAudioTrack(source_ref.to_string()))?;
        let stream = decoder.stream_info();
        if stream.duration_us <= 0 {
            return Err(AnalysisError::Decode(format!(
                "{source_ref}: audio duration unknown"
            )));
        }

        let mut buckets = vec![0.0f32; engine_bucket_count(stream.duration_us / 1000)];
        info!(
            "Extracting waveform from {} ({} Hz, {} ch, {} buckets)",
            source_ref,
            stream.sample_rate,
            stream.channel_count,
            buckets.len()
        );

        let progress_interval_us = (stream.duration_us / 10).max(1);
        let mut last_report_us = 0i64;
        let mut chunks = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                warn!("Waveform extraction of {} cancelled", source_ref);
                return Err(AnalysisError::Cancelled);
            }
            let chunk = match decoder.next_chunk()? {
                Some(chunk) => chunk,
                None => break,
            };
            chunks += 1;

            update_buckets(
                &PcmBufferInfo {
                    data: &chunk.data,
                    start_time_us: chunk.presentation_time_us,
                    total_duration_us: stream.duration_us,
                    sample_rate: stream.sample_rate,
                    channel_count: stream.channel_count,
                },
                &mut buckets,
            );

            if chunk.presentation_time_us - last_report_us > progress_interval_us {
                last_report_us = chunk.presentation_time_us;
                if let Some(callback) = self.progress.as_mut() {
                    let mut preview = buckets.clone();
                    normalize(&mut preview);
                    callback(&ExtractionProgress {
                        processed_us: chunk.presentation_time_us,
                        total_us: stream.duration_us,
                        preview,
                    });
                }
            }
        }

        fill_edge_buckets(&mut buckets);
        let max_amplitude = buckets.iter().copied().fold(0.0f32, f32::max);
        debug!("Decoded {} PCM chunks, peak {:.3}", chunks, max_amplitude);

        Ok(WaveformResult {
            raw_amplitudes: buckets,
            max_amplitude,
            duration_us: stream.duration_us,
        })
    }

    /// Serve from `cache` when possible, otherwise extract and store.
    ///
    /// A failed store is logged and otherwise ignored.
    pub fn extract_cached(
        &mut self,
        cache: &dyn WaveformCache,
        source_ref: &str,
        duration_ms: i64,
        width: u32,
        height: u32,
    ) -> Result<WaveformResult, AnalysisError> {
        let key = cache_key(source_ref, duration_ms, width, height);
        if let Some(hit) = cache.load(&key) {
            debug!("Waveform cache hit for {}", source_ref);
            return Ok(hit);
        }

        let waveform = self.extract(source_ref)?;
        if let Err(e) = cache.store(&key, &waveform) {
            warn!("Failed to cache waveform for {}: {}", source_ref, e);
        }
        Ok(waveform)
    }
}

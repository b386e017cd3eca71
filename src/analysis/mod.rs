//! Waveform and silence analysis
//!
//! `waveform` and `silence` are pure functions over PCM and bucket arrays.
//! `extractor` drives a decoder through them and `cache` persists results.

pub mod cache;
pub mod extractor;
pub mod silence;
pub mod waveform;

pub use cache::{cache_key, FileWaveformCache};
pub use extractor::{ExtractionProgress, WaveformExtractor};
pub use silence::{apply_padding_and_filter, find_silence};

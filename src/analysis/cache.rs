//! On-disk waveform cache
//!
//! Entries are content-addressed by a SHA-256 of the source identity and
//! written through a temp file in the same directory followed by a rename,
//! so readers only ever see a complete entry or none at all.
//!
//! Layout, all little-endian:
//! `version: u32 | duration_us: u64 | max_amplitude: f32 | count: u32 | count x f32`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::errors::PortError;
use crate::domain::model::WaveformResult;
use crate::ports::{PortResult, WaveformCache};

/// Layout version this build reads and writes
pub const CACHE_VERSION: u32 = 3;

const HEADER_LEN: usize = 4 + 8 + 4 + 4;
const FILE_PREFIX: &str = "waveform_";
const FILE_SUFFIX: &str = ".v3.bin";

/// Cache key for a source: hex SHA-256 of `"{source}_{duration_ms}_{width}x{height}"`
pub fn cache_key(source_ref: &str, duration_ms: i64, width: u32, height: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{source_ref}_{duration_ms}_{width}x{height}").as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn encode(waveform: &WaveformResult) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + waveform.raw_amplitudes.len() * 4);
    bytes.extend_from_slice(&CACHE_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(waveform.duration_us.max(0) as u64).to_le_bytes());
    bytes.extend_from_slice(&waveform.max_amplitude.to_le_bytes());
    bytes.extend_from_slice(&(waveform.raw_amplitudes.len() as u32).to_le_bytes());
    for value in &waveform.raw_amplitudes {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode an entry; any other version, truncation or trailing garbage is `None`
pub fn decode(bytes: &[u8]) -> Option<WaveformResult> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

    if u32_at(0) != CACHE_VERSION {
        return None;
    }
    let mut duration = [0u8; 8];
    duration.copy_from_slice(&bytes[4..12]);
    let duration_us = i64::try_from(u64::from_le_bytes(duration)).ok()?;
    let max_amplitude = f32::from_bits(u32_at(12));
    let count = u32_at(16) as usize;

    let body = &bytes[HEADER_LEN..];
    if body.len() != count.checked_mul(4)? {
        return None;
    }
    let raw_amplitudes = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Some(WaveformResult {
        raw_amplitudes,
        max_amplitude,
        duration_us,
    })
}

/// Waveform cache rooted at one directory
#[derive(Debug, Clone)]
pub struct FileWaveformCache {
    dir: PathBuf,
}

impl FileWaveformCache {
    /// Open the cache, creating its directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> PortResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{key}{FILE_SUFFIX}"))
    }

    /// Delete entries last modified before `now - max_age`; returns how many went
    pub fn evict_older_than(&self, max_age: Duration) -> PortResult<usize> {
        let cutoff = Utc::now() - max_age;
        let mut removed = 0;

        for entry in WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            if !name.starts_with(FILE_PREFIX) {
                continue;
            }
            let modified: DateTime<Utc> = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(time) => time.into(),
                None => continue,
            };
            if modified < cutoff {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to evict {}: {}", entry.path().display(), e),
                }
            }
        }

        debug!("Evicted {} waveform cache entries", removed);
        Ok(removed)
    }
}

impl WaveformCache for FileWaveformCache {
    fn load(&self, key: &str) -> Option<WaveformResult> {
        let path = self.entry_path(key);
        let bytes = fs::read(&path).ok()?;
        let decoded = decode(&bytes);
        if decoded.is_none() {
            warn!("Ignoring unreadable waveform cache entry {}", path.display());
        }
        decoded
    }

    fn store(&self, key: &str, waveform: &WaveformResult) -> PortResult<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(&encode(waveform))?;
        temp.as_file().sync_all()?;
        temp.persist(self.entry_path(key))
            .map_err(|e| PortError::Io(e.error.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn waveform() -> WaveformResult {
        WaveformResult {
            raw_amplitudes: vec![0.0, 0.25, 1.0, 0.5],
            max_amplitude: 1.0,
            duration_us: 40_000,
        }
    }

    #[test]
    fn test_cache_key_is_stable_hex() {
        let key = cache_key("/media/a.mp4", 1_000, 1920, 1080);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("/media/a.mp4", 1_000, 1920, 1080));
        assert_ne!(key, cache_key("/media/a.mp4", 1_001, 1920, 1080));
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&waveform());
        assert_eq!(bytes.len(), HEADER_LEN + 16);
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..12], &40_000u64.to_le_bytes());
        assert_eq!(&bytes[16..20], &4u32.to_le_bytes());
        assert_eq!(decode(&bytes), Some(waveform()));
    }

    #[test]
    fn test_other_version_is_a_miss() {
        let mut bytes = encode(&waveform());
        bytes[0..4].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(decode(&bytes), None);
    }

    #[test]
    fn test_truncated_entry_is_a_miss() {
        let bytes = encode(&waveform());
        assert_eq!(decode(&bytes[..bytes.len() - 1]), None);
        assert_eq!(decode(&bytes[..10]), None);
    }

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = FileWaveformCache::new(dir.path().join("waveforms")).unwrap();
        let key = cache_key("clip.mp4", 40, 0, 0);

        assert_eq!(cache.load(&key), None);
        cache.store(&key, &waveform()).unwrap();
        assert_eq!(cache.load(&key), Some(waveform()));
        assert!(cache
            .entry_path(&key)
            .to_string_lossy()
            .ends_with(".v3.bin"));

        // Only the entry remains; the temp file was renamed into place
        let files: Vec<_> = fs::read_dir(cache.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = FileWaveformCache::new(dir.path()).unwrap();
        fs::write(cache.entry_path("bad"), b"not a waveform").unwrap();
        assert_eq!(cache.load("bad"), None);
    }

    #[test]
    fn test_eviction() {
        let dir = TempDir::new().unwrap();
        let cache = FileWaveformCache::new(dir.path()).unwrap();
        cache.store("fresh", &waveform()).unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"keep").unwrap();

        assert_eq!(cache.evict_older_than(Duration::days(1)).unwrap(), 0);
        assert_eq!(cache.evict_older_than(Duration::seconds(-60)).unwrap(), 1);
        assert_eq!(cache.load("fresh"), None);
        assert!(dir.path().join("unrelated.txt").exists());
    }
}

// TOML config adapter - Configuration file model and loading

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::model::SilenceDetectionConfig;
use crate::error::{SplicerError, SplicerResult};

/// File name looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "splicer.toml";

/// Default silence detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceDefaults {
    pub threshold: f32,
    pub min_silence_ms: i64,
    pub padding_start_ms: i64,
    pub padding_end_ms: i64,
    /// Kept stretches shorter than this are absorbed into the surrounding silence
    pub min_segment_ms: i64,
}

impl Default for SilenceDefaults {
    fn default() -> Self {
        let detection = SilenceDetectionConfig::default();
        Self {
            threshold: detection.threshold,
            min_silence_ms: detection.min_silence_ms,
            padding_start_ms: detection.padding_start_ms,
            padding_end_ms: detection.padding_end_ms,
            min_segment_ms: 0,
        }
    }
}

impl SilenceDefaults {
    pub fn detection_config(&self) -> SilenceDetectionConfig {
        SilenceDetectionConfig {
            threshold: self.threshold,
            min_silence_ms: self.min_silence_ms,
            padding_start_ms: self.padding_start_ms,
            padding_end_ms: self.padding_end_ms,
        }
    }
}

/// Default track kinds kept by cut and merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemuxDefaults {
    pub keep_audio: bool,
    pub keep_video: bool,
}

impl Default for RemuxDefaults {
    fn default() -> Self {
        Self {
            keep_audio: true,
            keep_video: true,
        }
    }
}

/// Contents of `splicer.toml`; every key is optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplicerConfig {
    pub log_level: String,
    /// `pretty`, `compact` or `json`
    pub log_format: String,
    pub cache_dir: Option<PathBuf>,
    pub cache_max_age_days: u32,
    /// Session file; defaults to `session.json` inside the cache directory
    pub session_file: Option<PathBuf>,
    pub silence: SilenceDefaults,
    pub remux: RemuxDefaults,
}

impl Default for SplicerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            cache_dir: None,
            cache_max_age_days: 7,
            session_file: None,
            silence: SilenceDefaults::default(),
            remux: RemuxDefaults::default(),
        }
    }
}

impl SplicerConfig {
    pub fn from_toml_str(content: &str) -> SplicerResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> SplicerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SplicerResult<String> {
        toml::to_string_pretty(self).map_err(|e| SplicerError::Config(e.to_string()))
    }

    /// Configured cache directory, else `splicer` under the system temp directory
    pub fn cache_dir_or_default(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("splicer"))
    }

    pub fn session_file_or_default(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| self.cache_dir_or_default().join("session.json"))
    }
}

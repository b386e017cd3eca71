//! Configuration initialization and hierarchy management
//!
//! Precedence, highest first: command-line flags, `SPLICER_*` environment
//! variables, the config file, built-in defaults.

use std::path::{Path, PathBuf};

use crate::adapters::toml_config::{SplicerConfig, DEFAULT_CONFIG_FILE};
use crate::cli::Cli;
use crate::error::{SplicerError, SplicerResult};
use crate::utils::{LogFormat, LoggingConfig};

pub const ENV_LOG_LEVEL: &str = "SPLICER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SPLICER_LOG_FORMAT";
pub const ENV_CACHE_DIR: &str = "SPLICER_CACHE_DIR";

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

impl From<&Cli> for ConfigOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            log_level: cli.log_level.clone(),
            log_format: cli.log_format.clone(),
            cache_dir: cli.cache_dir.clone(),
        }
    }
}

/// Resolve the effective configuration for this invocation
pub fn resolve_config(cli: &Cli) -> SplicerResult<SplicerConfig> {
    let file_config = load_config_file(cli.config.as_deref())?;
    resolve_with(file_config, |key| std::env::var(key).ok(), &ConfigOverrides::from(cli))
}

/// An explicit `--config` must exist; otherwise `./splicer.toml` is used when present
fn load_config_file(explicit: Option<&Path>) -> SplicerResult<SplicerConfig> {
    match explicit {
        Some(path) => SplicerConfig::load(path).map_err(|e| {
            SplicerError::Config(format!("cannot load {}: {}", path.display(), e))
        }),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.is_file() {
                SplicerConfig::load(default_path)
            } else {
                Ok(SplicerConfig::default())
            }
        }
    }
}

/// Layer environment and command-line values over `file_config`
pub fn resolve_with(
    file_config: SplicerConfig,
    env: impl Fn(&str) -> Option<String>,
    overrides: &ConfigOverrides,
) -> SplicerResult<SplicerConfig> {
    let mut config = file_config;

    if let Some(level) = env(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
        config.log_level = level;
    }
    if let Some(format) = env(ENV_LOG_FORMAT).filter(|v| !v.trim().is_empty()) {
        config.log_format = format;
    }
    if let Some(dir) = env(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
        config.cache_dir = Some(PathBuf::from(dir));
    }

    if let Some(level) = &overrides.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &overrides.log_format {
        config.log_format = format.clone();
    }
    if let Some(dir) = &overrides.cache_dir {
        config.cache_dir = Some(dir.clone());
    }

    config.log_format.parse::<LogFormat>()?;
    if !(0.0..=1.0).contains(&config.silence.threshold) {
        return Err(SplicerError::Config(format!(
            "silence.threshold must be within 0.0..=1.0, got {}",
            config.silence.threshold
        )));
    }
    Ok(config)
}

/// Logging settings of a resolved configuration
pub fn logging_config(config: &SplicerConfig) -> SplicerResult<LoggingConfig> {
    Ok(LoggingConfig {
        level: config.log_level.clone(),
        format: config.log_format.parse()?,
    })
}

//! Error handling module for Splicer

use thiserror::Error;

use crate::domain::errors::{AnalysisError, InspectionError, MappingError, MergeError, PortError, RemuxError};

/// Main error type for Splicer operations
#[derive(Error, Debug)]
pub enum SplicerError {
    /// Invalid time format
    #[error("Invalid time format: {time}. Expected HH:MM:SS.ms, MM:SS.ms, or seconds")]
    InvalidTimeFormat { time: String },

    /// Configuration could not be resolved
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Inspection(#[from] InspectionError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Remux(#[from] RemuxError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// FFmpeg error
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for Splicer operations
pub type SplicerResult<T> = std::result::Result<T, SplicerError>;

//! Common utilities and helpers

pub mod logging;
pub mod path;
pub mod time;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use time::{format_duration_ms, format_filename_duration, parse_time};

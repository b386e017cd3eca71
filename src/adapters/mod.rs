// Adapters - External system implementations

pub mod json_session;
pub mod libav;
pub mod memory;
pub mod toml_config;

// Re-export adapters
pub use json_session::JsonSessionStore;
pub use libav::{LibavPcmSource, LibavSink, LibavSource};
pub use memory::{MemoryMedia, MemoryPcm, MemoryPcmSource, MemorySink, MemorySource};
pub use toml_config::SplicerConfig;

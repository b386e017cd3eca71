//! CLI module for Splicer
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

/// Splicer lossless media cutter
///
/// Cuts and joins media files by copying compressed samples, without
/// re-encoding. Cut points snap to the nearest keyframes.
#[derive(Parser, Debug)]
#[command(name = "splicer")]
#[command(about = "Splicer - lossless cutting, merging and silence detection")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level or filter directive (overrides SPLICER_LOG_LEVEL and the config file)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Configuration file (default: ./splicer.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Waveform cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show tracks and stream parameters of a media file
    Inspect(args::InspectArgs),
    /// List keyframes and preview where a cut would land
    Keyframes(args::KeyframesArgs),
    /// Copy a time range into a new file without re-encoding
    Cut(args::CutArgs),
    /// Concatenate compatible files without re-encoding
    Merge(args::MergeArgs),
    /// Extract the audio waveform
    Waveform(args::WaveformArgs),
    /// Detect silent ranges and optionally export what remains
    Silence(args::SilenceArgs),
    /// Manage the saved clip list
    Session(args::SessionArgs),
}

//! Command-line argument definitions

use clap::{Args, Subcommand, ValueEnum};

use crate::domain::rules::segments::DetectionMode;

/// Track selection shared by cut, merge and exports
#[derive(Args, Debug, Clone, Default)]
pub struct TrackArgs {
    /// Drop audio tracks
    #[arg(long)]
    pub no_audio: bool,

    /// Drop video tracks
    #[arg(long)]
    pub no_video: bool,

    /// Keep only these track ids (repeatable); overrides --no-audio/--no-video
    #[arg(long = "track")]
    pub tracks: Vec<u32>,

    /// Orientation hint for the output video, in degrees
    #[arg(long)]
    pub rotation: Option<i32>,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input media file path
    #[arg(short, long)]
    pub input: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the keyframes command
#[derive(Args, Debug)]
pub struct KeyframesArgs {
    /// Input media file path
    #[arg(short, long)]
    pub input: String,

    /// Requested cut start (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long, requires = "end")]
    pub start: Option<String>,

    /// Requested cut end (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long, requires = "start")]
    pub end: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cut command
#[derive(Args, Debug)]
pub struct CutArgs {
    /// Input media file path
    #[arg(short, long)]
    pub input: String,

    /// Start time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub start: String,

    /// End time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub end: String,

    /// Output file path (default: auto-generated next to the input)
    #[arg(short, long)]
    pub output: Option<String>,

    #[command(flatten)]
    pub tracks: TrackArgs,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the merge command
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input files, in output order
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    /// Output file path (default: `<first input>_merged`)
    #[arg(short, long)]
    pub output: Option<String>,

    #[command(flatten)]
    pub tracks: TrackArgs,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the waveform command
#[derive(Args, Debug)]
pub struct WaveformArgs {
    /// Input media file path
    #[arg(short, long)]
    pub input: String,

    /// Number of display buckets (default: 10 per second, clamped to 500..=5000)
    #[arg(long)]
    pub buckets: Option<usize>,

    /// Always decode, ignoring and not updating the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// What detected silence turns into
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SilenceMode {
    /// Silent ranges are discarded
    #[default]
    Discard,
    /// Split at each silent range, keeping everything
    Split,
}

impl From<SilenceMode> for DetectionMode {
    fn from(mode: SilenceMode) -> Self {
        match mode {
            SilenceMode::Discard => DetectionMode::DiscardRanges,
            SilenceMode::Split => DetectionMode::SplitAtBoundaries,
        }
    }
}

/// Arguments for the silence command
#[derive(Args, Debug)]
pub struct SilenceArgs {
    /// Input media file path
    #[arg(short, long)]
    pub input: String,

    /// Amplitude below which audio counts as silent (0.0-1.0)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Shortest silence to report, in ms
    #[arg(long)]
    pub min_silence_ms: Option<i64>,

    /// Shrink each range at its start, in ms
    #[arg(long)]
    pub padding_start_ms: Option<i64>,

    /// Shrink each range at its end, in ms
    #[arg(long)]
    pub padding_end_ms: Option<i64>,

    /// Shortest sound kept between two silences, in ms
    #[arg(long)]
    pub min_segment_ms: Option<i64>,

    #[arg(long, value_enum, default_value_t = SilenceMode::Discard)]
    pub mode: SilenceMode,

    /// Export the kept segments to this file
    #[arg(long)]
    pub export: Option<String>,

    /// Add the resulting clip to the saved session
    #[arg(long)]
    pub save_session: bool,

    #[command(flatten)]
    pub tracks: TrackArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the session command
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Print the saved clips
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Append files to the saved clips
    Add {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<String>,
    },
    /// Export the KEEP segments of every saved clip, merged into one file by default
    Export {
        /// Merged output file (defaults to `<first clip>_merged`)
        #[arg(short, long, conflicts_with = "separate")]
        output: Option<String>,

        /// Write every KEEP segment to its own file next to its source
        #[arg(long)]
        separate: bool,

        #[command(flatten)]
        tracks: TrackArgs,
    },
    /// Forget every saved clip
    Clear,
}

//! Splicer CLI
//!
//! Lossless, re-encode-free cutting and merging of media files.
//!
//! # Usage
//!
//! ```bash
//! splicer cut --input talk.mp4 --start 00:01:00 --end 00:02:30
//! splicer merge part1.mp4 part2.mp4 --output full.mp4
//! splicer silence --input podcast.m4a --export tight.m4a
//! splicer inspect --input talk.mp4 --json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use splicer_cli::cli::{commands, Cli};
use splicer_cli::config_initialization::{logging_config, resolve_config};
use splicer_cli::engine::CancelFlag;
use splicer_cli::utils::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = resolve_config(&cli).context("Failed to load configuration")?;
    init_logging(&logging_config(&config)?)?;
    splicer_cli::init().context("Failed to initialize FFmpeg")?;

    info!("Starting Splicer");

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current sample");
            on_interrupt.cancel();
        }
    });

    commands::run(cli.command, config, cancel).await?;

    info!("Splicer completed successfully");
    Ok(())
}

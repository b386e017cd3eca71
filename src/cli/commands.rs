//! Command implementations

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::adapters::libav::{LibavPcmSource, LibavSink, LibavSource};
use crate::adapters::toml_config::SplicerConfig;
use crate::adapters::JsonSessionStore;
use crate::analysis::waveform::{downsample, normalize, ui_bucket_count};
use crate::analysis::{ExtractionProgress, FileWaveformCache, WaveformExtractor};
use crate::cli::args::{
    CutArgs, InspectArgs, KeyframesArgs, MergeArgs, SessionAction, SessionArgs, SilenceArgs,
    TrackArgs, WaveformArgs,
};
use crate::cli::Commands;
use crate::domain::errors::{MergeError, RemuxError};
use crate::domain::model::{MediaClip, MediaMetadata, Segment, SegmentAction, WaveformResult};
use crate::domain::rules::segments::{apply_detection_ranges, detect_silence};
use crate::engine::{
    CancelFlag, RemuxOptions, RemuxOrchestrator, RemuxReport, SegmentExport, TrackInspector,
};
use crate::planner::{plan_cut, KeyframeProbe};
use crate::ports::SessionPort;
use crate::utils::path::{default_cut_output, default_merge_output, same_file};
use crate::utils::{format_duration_ms, parse_time};

/// Dispatch a parsed command
pub async fn run(command: Commands, config: SplicerConfig, cancel: CancelFlag) -> Result<()> {
    match command {
        Commands::Inspect(args) => blocking(move || inspect(args)).await,
        Commands::Keyframes(args) => blocking(move || keyframes(args, cancel)).await,
        Commands::Cut(args) => blocking(move || cut(args, config, cancel)).await,
        Commands::Merge(args) => blocking(move || merge(args, config, cancel)).await,
        Commands::Waveform(args) => blocking(move || waveform(args, config, cancel)).await,
        Commands::Silence(args) => silence(args, config, cancel).await,
        Commands::Session(args) => session(args, config, cancel).await,
    }
}

/// Run libav-bound work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("worker thread panicked")?
}

/// Caller options from the config defaults narrowed by command-line flags
pub fn remux_options(config: &SplicerConfig, tracks: &TrackArgs) -> RemuxOptions {
    RemuxOptions {
        keep_audio: config.remux.keep_audio && !tracks.no_audio,
        keep_video: config.remux.keep_video && !tracks.no_video,
        selected_tracks: if tracks.tracks.is_empty() {
            None
        } else {
            Some(tracks.tracks.iter().copied().collect::<BTreeSet<u32>>())
        },
        rotation_override: tracks.rotation,
    }
}

fn describe(input: &str) -> Result<MediaMetadata> {
    let source = LibavSource::new();
    let demuxer = TrackInspector::open(&source, input)?;
    let metadata = TrackInspector::describe(demuxer.as_ref())
        .with_context(|| format!("Failed to inspect {input}"))?;
    Ok(metadata)
}

/// Execute the inspect command
pub fn inspect(args: InspectArgs) -> Result<()> {
    info!("Inspecting: {}", args.input);
    let metadata = describe(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        display_metadata(&args.input, &metadata);
    }
    Ok(())
}

fn display_metadata(input: &str, metadata: &MediaMetadata) {
    println!("File: {input}");
    println!("Duration: {}", format_duration_ms(metadata.duration_ms()));
    if let Some(mime) = &metadata.video_mime {
        let (width, height) = metadata.normalized_dimensions();
        println!(
            "Video: {} {}x{} @ {:.2} fps, rotation {}°",
            mime, width, height, metadata.frame_rate, metadata.rotation
        );
    }
    if let Some(mime) = &metadata.audio_mime {
        println!(
            "Audio: {} {} Hz, {} channel(s)",
            mime, metadata.sample_rate, metadata.channel_count
        );
    }
    println!();
    println!("Tracks:");
    for track in &metadata.tracks {
        let mut line = format!("  #{} {:?} {}", track.id, track.kind, track.mime_type);
        if let Some(language) = &track.language {
            line.push_str(&format!(" [{language}]"));
        }
        if let Some(title) = &track.title {
            line.push_str(&format!(" \"{title}\""));
        }
        println!("{line}");
    }
}

/// Execute the keyframes command
pub fn keyframes(args: KeyframesArgs, cancel: CancelFlag) -> Result<()> {
    let source = LibavSource::new();
    let mut demuxer = TrackInspector::open(&source, &args.input)?;
    let scan = KeyframeProbe::scan(demuxer.as_mut(), &cancel)
        .with_context(|| format!("Failed to scan keyframes of {}", args.input))?;

    let preview = match (&args.start, &args.end) {
        (Some(start), Some(end)) => {
            let start_ms = parse_time(start)?;
            let end_ms = parse_time(end)?;
            if end_ms <= start_ms {
                bail!("Start time must be before end time");
            }
            Some(plan_cut(&scan.keyframes_ms, start_ms, end_ms))
        }
        _ => None,
    };

    if args.json {
        let value = json!({ "scan": scan, "preview": preview });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match scan.track_id {
        Some(id) => println!("Video track #{}: {} keyframes", id, scan.keyframes_ms.len()),
        None => println!("No video track; every sample is a sync point"),
    }
    if scan.truncated {
        println!("(scan stopped after {} samples)", scan.samples_probed);
    }
    for ms in &scan.keyframes_ms {
        println!("  {}", format_duration_ms(*ms));
    }
    if let Some(preview) = preview {
        println!();
        println!(
            "Requested {} - {}",
            format_duration_ms(preview.requested_start_ms),
            format_duration_ms(preview.requested_end_ms)
        );
        let end = preview
            .end_ms
            .map(format_duration_ms)
            .unwrap_or_else(|| "end of file".to_string());
        println!("Copied    {} - {}", format_duration_ms(preview.start_ms), end);
        println!("Lead-in {} ms", preview.lead_in_ms());
        if let Some(overrun) = preview.overrun_ms() {
            println!("Overrun {overrun} ms");
        }
    }
    Ok(())
}

/// Execute the cut command
pub fn cut(args: CutArgs, config: SplicerConfig, cancel: CancelFlag) -> Result<()> {
    let start_ms = parse_time(&args.start)?;
    let end_ms = parse_time(&args.end)?;
    if end_ms <= start_ms {
        bail!("Start time must be before end time");
    }

    let options = remux_options(&config, &args.tracks);
    let output = match args.output {
        Some(output) => output,
        None => default_cut_output(&args.input, start_ms, end_ms, !options.keep_video)
            .to_string_lossy()
            .to_string(),
    };
    if same_file(&args.input, &output) {
        bail!("Output would overwrite the input: {output}");
    }

    info!("Cutting {} [{} - {}] -> {}", args.input, start_ms, end_ms, output);
    let source = LibavSource::new();
    let sink = LibavSink::new();
    let report = RemuxOrchestrator::new(&source, &sink, cancel)
        .cut(&args.input, &output, start_ms, end_ms, &options)
        .with_context(|| format!("Failed to cut {}", args.input))?;

    display_report(&report, args.json)
}

/// Execute the merge command
pub fn merge(args: MergeArgs, config: SplicerConfig, cancel: CancelFlag) -> Result<()> {
    let options = remux_options(&config, &args.tracks);
    let output = match args.output {
        Some(output) => output,
        None => default_merge_output(&args.inputs[0], !options.keep_video)
            .to_string_lossy()
            .to_string(),
    };
    if let Some(input) = args.inputs.iter().find(|i| same_file(i, &output)) {
        bail!("Output would overwrite an input: {input}");
    }

    info!("Merging {} files -> {}", args.inputs.len(), output);
    let source = LibavSource::new();
    let sink = LibavSink::new();
    let report = RemuxOrchestrator::new(&source, &sink, cancel)
        .merge(&args.inputs, &output, &options)
        .context("Failed to merge inputs")?;

    display_report(&report, args.json)
}

fn display_report(report: &RemuxReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("✓ Wrote {}", report.output);
        println!(
            "  {} track(s), {} segment(s), {} samples, {}",
            report.tracks,
            report.segments,
            report.samples_written,
            format_duration_ms(report.duration_us / 1000)
        );
    }
    Ok(())
}

/// Extract the waveform of `input`, through the cache unless `use_cache` is false
fn load_waveform(
    input: &str,
    metadata: &MediaMetadata,
    config: &SplicerConfig,
    cancel: CancelFlag,
    use_cache: bool,
) -> Result<WaveformResult> {
    let pcm = LibavPcmSource::new();
    let mut last_percent = 0;
    let mut extractor = WaveformExtractor::new(&pcm, cancel).on_progress(move |p: &ExtractionProgress| {
        let percent = (p.fraction() * 100.0) as u32;
        if percent >= last_percent + 10 {
            last_percent = percent;
            debug!("Waveform extraction {}%", percent);
        }
    });

    let waveform = if use_cache {
        let cache = FileWaveformCache::new(config.cache_dir_or_default())?;
        let max_age = chrono::Duration::days(i64::from(config.cache_max_age_days));
        match cache.evict_older_than(max_age) {
            Ok(0) => {}
            Ok(n) => debug!("Evicted {} stale waveform cache entries", n),
            Err(e) => warn!("Waveform cache eviction failed: {}", e),
        }
        extractor.extract_cached(&cache, input, metadata.duration_ms(), metadata.width, metadata.height)
    } else {
        extractor.extract(input)
    };
    waveform.with_context(|| format!("Failed to extract waveform of {input}"))
}

/// Execute the waveform command
pub fn waveform(args: WaveformArgs, config: SplicerConfig, cancel: CancelFlag) -> Result<()> {
    let metadata = describe(&args.input)?;
    let waveform = load_waveform(&args.input, &metadata, &config, cancel, !args.no_cache)?;

    let bucket_count = args
        .buckets
        .unwrap_or_else(|| ui_bucket_count(waveform.duration_ms()));
    let mut display = waveform.raw_amplitudes.clone();
    normalize(&mut display);
    let display = downsample(&display, bucket_count)?;

    if args.json {
        let value = json!({
            "source": args.input,
            "duration_ms": waveform.duration_ms(),
            "max_amplitude": waveform.max_amplitude,
            "buckets": display,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", args.input);
    println!("Duration: {}", format_duration_ms(waveform.duration_ms()));
    println!("Peak amplitude: {:.3}", waveform.max_amplitude);
    println!("Buckets: {}", display.len());
    println!("{}", sparkline(&display, 72)?);
    Ok(())
}

fn sparkline(buckets: &[f32], width: usize) -> Result<String> {
    const BARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    if buckets.is_empty() {
        return Ok(String::new());
    }
    let columns = downsample(buckets, width.min(buckets.len()))?;
    Ok(columns
        .iter()
        .map(|v| BARS[(v.clamp(0.0, 1.0) * 8.0).round() as usize])
        .collect())
}

/// Execute the silence command
pub async fn silence(args: SilenceArgs, config: SplicerConfig, cancel: CancelFlag) -> Result<()> {
    let session_file = config.session_file_or_default();
    let save_session = args.save_session;

    let clip = blocking(move || detect_and_export(args, config, cancel)).await?;

    if save_session {
        let store = JsonSessionStore::new(session_file);
        let mut clips = store.restore().await?.map(|s| s.clips).unwrap_or_default();
        clips.push(clip);
        store.save(&clips).await?;
        println!("Saved to session {}", store.path().display());
    }
    Ok(())
}

fn detect_and_export(args: SilenceArgs, config: SplicerConfig, cancel: CancelFlag) -> Result<MediaClip> {
    let metadata = describe(&args.input)?;
    let waveform = load_waveform(&args.input, &metadata, &config, cancel.clone(), true)?;

    let mut detection = config.silence.detection_config();
    if let Some(threshold) = args.threshold {
        detection.threshold = threshold;
    }
    if let Some(ms) = args.min_silence_ms {
        detection.min_silence_ms = ms;
    }
    if let Some(ms) = args.padding_start_ms {
        detection.padding_start_ms = ms;
    }
    if let Some(ms) = args.padding_end_ms {
        detection.padding_end_ms = ms;
    }
    let min_segment_ms = args.min_segment_ms.unwrap_or(config.silence.min_segment_ms);

    let stages = detect_silence(&waveform, &detection, min_segment_ms);
    debug!(
        "Silence stages: raw {}, merged {}, filtered {}, final {}",
        stages.raw.len(),
        stages.noise_merged.len(),
        stages.duration_filtered.len(),
        stages.final_ranges.len()
    );

    let clip = MediaClip::from_metadata(&args.input, &metadata)?;
    let clip = apply_detection_ranges(&clip, &stages.final_ranges, min_segment_ms, args.mode.into());

    if args.json {
        let value = json!({
            "source": args.input,
            "config": detection,
            "silences": stages.final_ranges,
            "segments": clip.segments,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} silent range(s) in {}", stages.final_ranges.len(), args.input);
        for range in &stages.final_ranges {
            println!(
                "  {} - {}{}",
                format_duration_ms(range.start_ms),
                format_duration_ms(range.end_ms),
                if range.reaches_end { " (to end)" } else { "" }
            );
        }
        println!("Segments:");
        for segment in &clip.segments {
            let action = match segment.action {
                SegmentAction::Keep => "keep",
                SegmentAction::Discard => "discard",
            };
            println!(
                "  {:<7} {} - {}",
                action,
                format_duration_ms(segment.start_ms),
                format_duration_ms(segment.end_ms)
            );
        }
    }

    if let Some(output) = &args.export {
        if same_file(&args.input, output) {
            bail!("Output would overwrite the input: {output}");
        }
        let options = remux_options(&config, &args.tracks);
        let source = LibavSource::new();
        let sink = LibavSink::new();
        let report = RemuxOrchestrator::new(&source, &sink, cancel)
            .export(std::slice::from_ref(&clip), output, &options)
            .with_context(|| format!("Failed to export segments of {}", args.input))?;
        display_report(&report, false)?;
    }
    Ok(clip)
}

/// Execute a session subcommand
pub async fn session(args: SessionArgs, config: SplicerConfig, cancel: CancelFlag) -> Result<()> {
    let store = JsonSessionStore::new(config.session_file_or_default());

    match args.action {
        SessionAction::Show { json } => {
            let saved = store.restore().await?;
            if json {
                let clips = saved.map(|s| s.clips).unwrap_or_default();
                println!("{}", serde_json::to_string_pretty(&clips)?);
                return Ok(());
            }
            match saved {
                None => println!("No saved session at {}", store.path().display()),
                Some(saved) => {
                    println!("Session saved {}", saved.saved_at.to_rfc3339());
                    for clip in &saved.clips {
                        let kept: i64 = clip.keep_segments().iter().map(|s| s.duration_ms()).sum();
                        println!(
                            "  {} ({}, {} segment(s), {} kept)",
                            clip.file_name,
                            format_duration_ms(clip.duration_ms),
                            clip.segments.len(),
                            format_duration_ms(kept)
                        );
                    }
                }
            }
        }
        SessionAction::Add { inputs } => {
            let added = blocking(move || {
                inputs
                    .iter()
                    .map(|input| Ok(MediaClip::from_metadata(input.as_str(), &describe(input)?)?))
                    .collect::<Result<Vec<MediaClip>>>()
            })
            .await?;
            let mut clips = store.restore().await?.map(|s| s.clips).unwrap_or_default();
            let count = added.len();
            clips.extend(added);
            store.save(&clips).await?;
            println!("Added {} clip(s); session now holds {}", count, clips.len());
        }
        SessionAction::Export {
            output,
            separate,
            tracks,
        } => {
            let clips = store.restore().await?.map(|s| s.clips).unwrap_or_default();
            if clips.is_empty() {
                bail!("No saved clips to export");
            }
            let options = remux_options(&config, &tracks);

            if separate {
                let exports = blocking(move || export_each_segment(&clips, &options, cancel))
                    .await
                    .context("Failed to export session")?;
                return display_segment_exports(&exports);
            }

            let output = match output {
                Some(output) => output,
                None => default_merge_output(&clips[0].source, !options.keep_video)
                    .to_string_lossy()
                    .to_string(),
            };
            if let Some(clip) = clips.iter().find(|c| same_file(&c.source, &output)) {
                bail!("Output would overwrite an input: {}", clip.source);
            }
            let report = blocking(move || {
                let source = LibavSource::new();
                let sink = LibavSink::new();
                Ok(RemuxOrchestrator::new(&source, &sink, cancel).export(&clips, &output, &options)?)
            })
            .await
            .context("Failed to export session")?;
            display_report(&report, false)?;
        }
        SessionAction::Clear => {
            store.save(&[]).await?;
            println!("Session cleared");
        }
    }
    Ok(())
}

/// Cut every KEEP segment of every clip into a file of its own
fn export_each_segment(
    clips: &[MediaClip],
    options: &RemuxOptions,
    cancel: CancelFlag,
) -> Result<Vec<(String, SegmentExport)>> {
    let source = LibavSource::new();
    let sink = LibavSink::new();
    let orchestrator = RemuxOrchestrator::new(&source, &sink, cancel);
    let audio_only = !options.keep_video;

    let mut exports = Vec::with_capacity(clips.len());
    for clip in clips {
        let output_for = |segment: &Segment| {
            default_cut_output(&clip.source, segment.start_ms, segment.end_ms, audio_only)
                .to_string_lossy()
                .to_string()
        };
        match orchestrator.export_separately(clip, output_for, options) {
            Ok(export) => exports.push((clip.source.clone(), export)),
            Err(RemuxError::Merge(MergeError::NoClips)) => {
                warn!("{} has no KEEP segments; skipped", clip.source);
            }
            Err(e) => return Err(e).with_context(|| format!("Export of {} stopped", clip.source)),
        }
    }
    Ok(exports)
}

fn display_segment_exports(exports: &[(String, SegmentExport)]) -> Result<()> {
    let mut written = 0;
    let mut failed = 0;
    for (source, export) in exports {
        println!("{source}");
        for report in &export.written {
            println!(
                "  ✓ {} ({})",
                report.output,
                format_duration_ms(report.duration_us / 1000)
            );
        }
        for failure in &export.failures {
            println!(
                "  ✗ segment {} [{} - {}]: {}",
                failure.index + 1,
                format_duration_ms(failure.start_ms),
                format_duration_ms(failure.end_ms),
                failure.error
            );
        }
        written += export.written.len();
        failed += export.failures.len();
    }
    if failed > 0 {
        bail!("{failed} of {} segment(s) failed", written + failed);
    }
    println!("Wrote {written} segment file(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remux_options_from_flags() {
        let config = SplicerConfig::default();
        let options = remux_options(&config, &TrackArgs::default());
        assert_eq!(options, RemuxOptions::default());

        let flags = TrackArgs {
            no_audio: true,
            no_video: false,
            tracks: vec![3, 1, 3],
            rotation: Some(90),
        };
        let options = remux_options(&config, &flags);
        assert!(!options.keep_audio);
        assert!(options.keep_video);
        assert_eq!(options.selected_tracks, Some(BTreeSet::from([1, 3])));
        assert_eq!(options.rotation_override, Some(90));
    }

    #[test]
    fn test_config_defaults_narrowed_not_widened() {
        let mut config = SplicerConfig::default();
        config.remux.keep_video = false;
        let options = remux_options(&config, &TrackArgs::default());
        assert!(!options.keep_video);
        assert!(options.keep_audio);
    }

    #[test]
    fn test_sparkline() {
        assert_eq!(sparkline(&[], 10).unwrap(), "");
        let line = sparkline(&[0.0, 1.0, 0.0, 1.0], 4).unwrap();
        assert_eq!(line, " █ █");
    }
}

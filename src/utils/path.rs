//! Output path helpers

use std::path::{Path, PathBuf};

use crate::utils::time::format_filename_duration;

/// `<dir>/<stem><suffix>.<ext>`, keeping the input's extension unless one is given
pub fn with_suffix(input: &str, suffix: &str, extension: Option<&str>) -> PathBuf {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let ext = extension
        .map(str::to_string)
        .or_else(|| path.extension().map(|e| e.to_string_lossy().to_lowercase()))
        .unwrap_or_else(|| "mp4".to_string());
    path.with_file_name(format!("{stem}{suffix}.{ext}"))
}

/// Extension forced on outputs that carry no video
pub const AUDIO_ONLY_EXTENSION: &str = "m4a";

fn extension_for(audio_only: bool) -> Option<&'static str> {
    audio_only.then_some(AUDIO_ONLY_EXTENSION)
}

/// Default destination for a cut, e.g. `clip_01m15s-01m30s.mp4`
pub fn default_cut_output(input: &str, start_ms: i64, end_ms: i64, audio_only: bool) -> PathBuf {
    let suffix = format!(
        "_{}-{}",
        format_filename_duration(start_ms),
        format_filename_duration(end_ms)
    );
    with_suffix(input, &suffix, extension_for(audio_only))
}

/// Default destination for a merge, next to the first input
pub fn default_merge_output(first_input: &str, audio_only: bool) -> PathBuf {
    with_suffix(first_input, "_merged", extension_for(audio_only))
}

/// Both paths point at the same file (compared after canonicalization when possible)
pub fn same_file(a: &str, b: &str) -> bool {
    match (Path::new(a).canonicalize(), Path::new(b).canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => Path::new(a) == Path::new(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_output_name() {
        let out = default_cut_output("/videos/holiday.MP4", 75_000, 90_500, false);
        assert_eq!(out, PathBuf::from("/videos/holiday_01m15s-01m30s500ms.mp4"));
        let audio = default_cut_output("/videos/holiday.MP4", 0, 2_000, true);
        assert_eq!(audio, PathBuf::from("/videos/holiday_00s-02s.m4a"));
    }

    #[test]
    fn test_merge_output_name() {
        assert_eq!(default_merge_output("a.mkv", false), PathBuf::from("a_merged.mkv"));
        assert_eq!(default_merge_output("a.mkv", true), PathBuf::from("a_merged.m4a"));
        assert_eq!(with_suffix("noext", "_x", None), PathBuf::from("noext_x.mp4"));
        assert_eq!(with_suffix("a.mp4", "_audio", Some("m4a")), PathBuf::from("a_audio.m4a"));
    }

    #[test]
    fn test_same_file() {
        assert!(same_file("a.mp4", "a.mp4"));
        assert!(!same_file("a.mp4", "b.mp4"));
    }
}

//! Pure construction of the option bundle handed across the engine
//! boundary. No I/O here; everything is testable in isolation.

use std::path::Path;

use regex::Regex;

use crate::domain::DownloadRequest;
use crate::utils::parse_time_to_seconds;

/// Opaque option bundle for one engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// `{directory}/{resolved_name}.%(ext)s`
    pub output_template: String,
    pub format_selector: String,
    /// Container to merge video+audio into; None in audio-only mode.
    pub merge_format: Option<String>,
    pub extract_audio: Option<AudioExtraction>,
    pub embed_subs: bool,
    pub embed_meta: bool,
    pub clip: Option<ClipRange>,
    /// Raw engine directives layered in by the caller.
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: String,
    pub bitrate: String,
}

/// Clip offsets in seconds. An open end means "to the end of the video".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRange {
    pub start_secs: Option<u64>,
    pub end_secs: Option<u64>,
}

/// Labels offered in the power-args dropdown, each mapping to the raw
/// directives it layers into the engine invocation.
pub const POWER_ARGS: &[(&str, &[&str])] = &[
    (
        "Remove Sponsors (SponsorBlock)",
        &[
            "--sponsorblock-remove",
            "sponsor,selfpromo,interaction,intro,outro,music_offtopic",
            "--force-keyframes-at-cuts",
        ],
    ),
    ("Embed Chapters", &["--embed-chapters"]),
    ("Save Thumbnail to Disk (.jpg)", &["--write-thumbnail"]),
    ("Save Description to Disk (.txt)", &["--write-description"]),
    ("Save Metadata to Disk (.json)", &["--write-info-json"]),
    ("Bypass Region Locks (Geo Bypass)", &["--geo-bypass"]),
    ("Limit Download Speed (5 MB/s)", &["--limit-rate", "5M"]),
    ("Restrict Filenames (ASCII Only)", &["--restrict-filenames"]),
    ("Ignore Errors (Skip Unavailable)", &["--ignore-errors"]),
    ("Use Download Date (No Mod Time)", &["--no-mtime"]),
];

/// Directives for a power-arg label, if it is a known one.
pub fn power_arg_directives(label: &str) -> Option<&'static [&'static str]> {
    POWER_ARGS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, args)| *args)
}

pub fn is_audio_only(quality: &str) -> bool {
    quality.contains("Audio Only")
}

fn is_high_res(quality: &str) -> bool {
    ["4K", "2K", "2160p", "1440p"]
        .iter()
        .any(|tag| quality.contains(*tag))
}

/// Container implied by a quality label: mp3 for audio, mkv above
/// 1080p (codecs there rarely fit mp4), mp4 otherwise.
pub fn container_for(quality: &str) -> &'static str {
    if is_audio_only(quality) {
        "mp3"
    } else if is_high_res(quality) {
        "mkv"
    } else {
        "mp4"
    }
}

/// The quality-tier rule table: maps the picker label (plus the
/// compatibility flag) to the engine's format-selector string.
pub fn format_selector(quality: &str, compatibility_mode: bool) -> String {
    if is_audio_only(quality) {
        return "bestaudio/best".to_string();
    }

    // "4K / Best" carries no trailing digits-p, so the regex below
    // would miss it.
    if quality.contains("4K") || quality.contains("Best") {
        return "bestvideo+bestaudio/best".to_string();
    }

    if compatibility_mode {
        return "bestvideo[vcodec^=avc]+bestaudio[acodec^=mp4a]/best[vcodec^=avc]".to_string();
    }

    let height = Regex::new(r"(\d{3,4})p")
        .ok()
        .and_then(|re| re.captures(quality).and_then(|c| c[1].parse::<u32>().ok()));
    if let Some(height) = height {
        // Above 1080p any container goes; at or below, prefer mp4 so
        // the result plays everywhere.
        if height > 1080 {
            return format!(
                "bestvideo[height={h}]+bestaudio/best[height={h}]",
                h = height
            );
        }
        return format!(
            "bestvideo[height={h}][ext=mp4]+bestaudio[ext=m4a]/best[height={h}][ext=mp4]/best[height={h}]",
            h = height
        );
    }

    "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string()
}

/// Map the audio-format choice to the engine's codec name.
fn audio_codec(audio_format: &str) -> &'static str {
    match audio_format {
        "M4A" => "m4a",
        "WAV" => "wav",
        "FLAC" => "flac",
        _ => "mp3",
    }
}

/// A clip range only applies when it is a proper sub-range: a start at
/// (or before) zero combined with an end at (or past) the known duration
/// is a full download.
fn clip_range(
    start: Option<&str>,
    end: Option<&str>,
    total_duration: u64,
) -> Option<ClipRange> {
    let start_secs = start.and_then(parse_time_to_seconds);
    let end_secs = end.and_then(parse_time_to_seconds);

    if start_secs.is_none() && end_secs.is_none() {
        return None;
    }

    let start_is_zero = start_secs.map_or(true, |s| s < 1);
    let end_is_full = match end_secs {
        None => true,
        Some(e) => total_duration > 0 && e >= total_duration.saturating_sub(1),
    };
    if start_is_zero && end_is_full {
        return None;
    }

    Some(ClipRange {
        start_secs,
        end_secs,
    })
}

/// Assemble the full option bundle for one invocation.
pub fn build_engine_options(
    request: &DownloadRequest,
    directory: &Path,
    file_prefix: &str,
) -> EngineOptions {
    let opts = &request.options;
    let audio_only = is_audio_only(&request.quality);

    EngineOptions {
        output_template: format!("{}/{}.%(ext)s", directory.display(), file_prefix),
        format_selector: format_selector(&request.quality, opts.compatibility_mode),
        merge_format: (!audio_only).then(|| opts.container.clone()),
        extract_audio: audio_only.then(|| AudioExtraction {
            codec: audio_codec(&opts.audio_format).to_string(),
            bitrate: opts.audio_bitrate.clone(),
        }),
        embed_subs: opts.embed_subs,
        embed_meta: opts.embed_meta,
        clip: clip_range(
            opts.clip_start.as_deref(),
            opts.clip_end.as_deref(),
            opts.total_duration,
        ),
        extra_args: opts.extra_args.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AdvancedOptions;
    use std::path::PathBuf;

    fn request(quality: &str, options: AdvancedOptions) -> DownloadRequest {
        DownloadRequest {
            url: "https://example.com/watch?v=abc".to_string(),
            directory: PathBuf::from("/tmp"),
            quality: quality.to_string(),
            custom_name: None,
            options,
        }
    }

    #[test]
    fn test_selector_audio_only() {
        assert_eq!(format_selector("Audio Only", false), "bestaudio/best");
        // Compatibility never applies to audio.
        assert_eq!(format_selector("Audio Only", true), "bestaudio/best");
    }

    #[test]
    fn test_selector_best_catches_4k_label() {
        assert_eq!(
            format_selector("4K / Best (MKV/WebM)", false),
            "bestvideo+bestaudio/best"
        );
    }

    #[test]
    fn test_selector_compatibility_mode() {
        assert_eq!(
            format_selector("1080p (MP4 - Fast)", true),
            "bestvideo[vcodec^=avc]+bestaudio[acodec^=mp4a]/best[vcodec^=avc]"
        );
    }

    #[test]
    fn test_selector_low_height_prefers_mp4() {
        assert_eq!(
            format_selector("720p Limit", false),
            "bestvideo[height=720][ext=mp4]+bestaudio[ext=m4a]/best[height=720][ext=mp4]/best[height=720]"
        );
    }

    #[test]
    fn test_selector_high_height_allows_any_container() {
        assert_eq!(
            format_selector("1440p (2K)", false),
            "bestvideo[height=1440]+bestaudio/best[height=1440]"
        );
    }

    #[test]
    fn test_selector_fallback() {
        assert_eq!(
            format_selector("whatever", false),
            "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        );
    }

    #[test]
    fn test_container_for_label() {
        assert_eq!(container_for("Audio Only"), "mp3");
        assert_eq!(container_for("2160p (4K)"), "mkv");
        assert_eq!(container_for("1080p"), "mp4");
    }

    #[test]
    fn test_clip_range_full_video_is_no_clip() {
        assert_eq!(clip_range(None, None, 300), None);
        assert_eq!(clip_range(Some("0:00"), None, 300), None);
        assert_eq!(clip_range(Some("0"), Some("5:00"), 300), None);
        // 4:59 on a 5:00 video still counts as the full range.
        assert_eq!(clip_range(None, Some("4:59"), 300), None);
    }

    #[test]
    fn test_clip_range_proper_subrange() {
        assert_eq!(
            clip_range(Some("0:10"), Some("1:00"), 300),
            Some(ClipRange {
                start_secs: Some(10),
                end_secs: Some(60),
            })
        );
        // Open end with a late start clips from there to the end.
        assert_eq!(
            clip_range(Some("2:00"), None, 300),
            Some(ClipRange {
                start_secs: Some(120),
                end_secs: None,
            })
        );
    }

    #[test]
    fn test_build_audio_only_bundle() {
        let mut options = AdvancedOptions::default();
        options.audio_format = "FLAC".to_string();
        options.audio_bitrate = "320".to_string();
        let opts = build_engine_options(
            &request("Audio Only", options),
            Path::new("/downloads"),
            "song",
        );

        assert_eq!(opts.output_template, "/downloads/song.%(ext)s");
        assert_eq!(opts.merge_format, None);
        assert_eq!(
            opts.extract_audio,
            Some(AudioExtraction {
                codec: "flac".to_string(),
                bitrate: "320".to_string(),
            })
        );
    }

    #[test]
    fn test_build_video_bundle_merges_container() {
        let options = AdvancedOptions {
            container: "mkv".to_string(),
            ..AdvancedOptions::default()
        };
        let opts = build_engine_options(
            &request("2160p (4K)", options),
            Path::new("/downloads"),
            "clip (1)",
        );

        assert_eq!(opts.output_template, "/downloads/clip (1).%(ext)s");
        assert_eq!(opts.merge_format.as_deref(), Some("mkv"));
        assert_eq!(opts.extract_audio, None);
    }

    #[test]
    fn test_power_arg_lookup() {
        assert_eq!(
            power_arg_directives("Embed Chapters"),
            Some(["--embed-chapters"].as_slice())
        );
        assert_eq!(power_arg_directives("Nonsense"), None);
    }
}

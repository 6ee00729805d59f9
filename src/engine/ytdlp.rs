//! yt-dlp subprocess adapter.
//!
//! Metadata comes from `yt-dlp -J`; transfers run with `--newline` and a
//! machine-readable progress template so each stdout line is one
//! progress tick. The abort cell is checked on every tick and an
//! observed abort kills the child process.

use std::path::PathBuf;
use std::process::Stdio;

use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::options::EngineOptions;
use super::{EngineEvent, MediaEngine, TransferOutcome};
use crate::domain::{AbortAction, MediaInfo, ProgressUpdate};

const PROGRESS_MARKER: &str = "tubegrab:";

/// One line per tick: downloaded|total|estimate|speed|eta. Missing
/// fields print as "NA" and parse to None.
const PROGRESS_TEMPLATE: &str = "download:tubegrab:%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";

pub struct YtDlpEngine {
    binary: PathBuf,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl MediaEngine for YtDlpEngine {
    fn fetch_info(&self, url: &str) -> BoxFuture<'static, Option<MediaInfo>> {
        let binary = self.binary.clone();
        let url = url.to_string();
        async move {
            let output = Command::new(&binary)
                .args(["-J", "--no-playlist"])
                .arg(&url)
                .stdin(Stdio::null())
                .output()
                .await;
            let output = match output {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "metadata probe failed to launch");
                    return None;
                }
            };
            if !output.status.success() {
                warn!(status = %output.status, "metadata probe failed");
                return None;
            }
            parse_info_json(&output.stdout)
        }
        .boxed()
    }

    fn download(
        &self,
        url: &str,
        options: EngineOptions,
        abort: watch::Receiver<Option<AbortAction>>,
    ) -> BoxStream<'static, EngineEvent> {
        let binary = self.binary.clone();
        let url = url.to_string();
        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(async move {
            let outcome = run_transfer(binary, url, options, abort, tx.clone()).await;
            let _ = tx.unbounded_send(EngineEvent::Done(outcome));
        });
        rx.boxed()
    }
}

async fn run_transfer(
    binary: PathBuf,
    url: String,
    options: EngineOptions,
    abort: watch::Receiver<Option<AbortAction>>,
    events: mpsc::UnboundedSender<EngineEvent>,
) -> TransferOutcome {
    let args = cli_args(&url, &options);
    debug!(binary = %binary.display(), "launching engine");

    let mut child = match Command::new(&binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return TransferOutcome::Failed(format!(
                "failed to launch {}: {}",
                binary.display(),
                e
            ))
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return TransferOutcome::Failed("engine output unavailable".to_string());
    };

    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut last_error_line = String::new();
    let mut converting_reported = false;

    while !(stdout_done && stderr_done) {
        tokio::select! {
            line = out_lines.next_line(), if !stdout_done => match line {
                Ok(Some(line)) => {
                    // The progress tick is the only point where an abort
                    // request is observed.
                    let abort_action = *abort.borrow();
                    if let Some(action) = abort_action {
                        debug!(?action, "abort observed, terminating engine");
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return TransferOutcome::Aborted(action);
                    }
                    if let Some(update) = parse_progress(&line) {
                        let _ = events.unbounded_send(EngineEvent::Progress(update));
                    } else if !converting_reported && is_postprocessing_line(&line) {
                        converting_reported = true;
                        let _ = events.unbounded_send(EngineEvent::Status(
                            "Download 100%. Processing & converting...".to_string(),
                        ));
                    }
                }
                _ => stdout_done = true,
            },
            line = err_lines.next_line(), if !stderr_done => match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        last_error_line = trimmed.to_string();
                    }
                }
                _ => stderr_done = true,
            },
        }
    }

    let status = match child.wait().await {
        Ok(status) => status,
        Err(e) => return TransferOutcome::Failed(format!("engine wait failed: {}", e)),
    };

    if status.success() {
        return TransferOutcome::Completed;
    }
    // The abort may land just as the engine exits on its own; classify
    // that as an abort so reconciliation still runs.
    if let Some(action) = *abort.borrow() {
        return TransferOutcome::Aborted(action);
    }
    TransferOutcome::Failed(if last_error_line.is_empty() {
        format!("engine exited with {}", status)
    } else {
        last_error_line
    })
}

fn is_postprocessing_line(line: &str) -> bool {
    line.starts_with("[Merger]")
        || line.starts_with("[ExtractAudio]")
        || line.starts_with("[Fixup")
}

/// Translate the option bundle into engine CLI arguments.
fn cli_args(url: &str, options: &EngineOptions) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "--no-playlist".into(),
        "-o".into(),
        options.output_template.clone(),
        "-f".into(),
        options.format_selector.clone(),
    ];

    if let Some(container) = &options.merge_format {
        args.push("--merge-output-format".into());
        args.push(container.clone());
    }
    if let Some(audio) = &options.extract_audio {
        args.push("-x".into());
        args.push("--audio-format".into());
        args.push(audio.codec.clone());
        args.push("--audio-quality".into());
        args.push(audio.bitrate.clone());
    }
    if options.embed_subs {
        args.push("--write-subs".into());
        args.push("--sub-langs".into());
        args.push("en.*".into());
        args.push("--embed-subs".into());
    }
    if options.embed_meta {
        args.push("--embed-metadata".into());
        args.push("--write-thumbnail".into());
    }
    if let Some(clip) = &options.clip {
        let start = clip.start_secs.unwrap_or(0).to_string();
        let end = clip
            .end_secs
            .map(|e| e.to_string())
            .unwrap_or_else(|| "inf".to_string());
        args.push("--download-sections".into());
        args.push(format!("*{}-{}", start, end));
    }

    args.extend(options.extra_args.iter().cloned());
    args.push(url.to_string());
    args
}

/// Parse one progress-template line. Returns None for any other output.
fn parse_progress(line: &str) -> Option<ProgressUpdate> {
    let idx = line.find(PROGRESS_MARKER)?;
    let fields: Vec<&str> = line[idx + PROGRESS_MARKER.len()..].trim().split('|').collect();
    if fields.len() != 5 {
        return None;
    }

    let downloaded = parse_count(fields[0])?;
    // Exact total first, engine estimate as the fallback.
    let total = parse_count(fields[1]).or_else(|| parse_count(fields[2]));
    let speed = fields[3].trim().parse::<f64>().ok();
    let eta_secs = parse_count(fields[4]);

    Some(ProgressUpdate {
        downloaded,
        total,
        speed,
        eta_secs,
    })
}

/// The template prints counts as integers or floats, and "NA" when the
/// engine does not know the value yet.
fn parse_count(field: &str) -> Option<u64> {
    field.trim().parse::<f64>().ok().map(|v| v as u64)
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    vcodec: Option<String>,
    height: Option<u32>,
}

fn parse_info_json(bytes: &[u8]) -> Option<MediaInfo> {
    let info: InfoJson = match serde_json::from_slice(bytes) {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, "metadata JSON did not parse");
            return None;
        }
    };

    let mut heights: Vec<u32> = info
        .formats
        .iter()
        .filter(|f| f.vcodec.as_deref().is_some_and(|v| v != "none"))
        .filter_map(|f| f.height)
        .collect();
    heights.sort_unstable_by(|a, b| b.cmp(a));
    heights.dedup();

    Some(MediaInfo {
        title: info.title.unwrap_or_else(|| "Unknown Title".to_string()),
        thumbnail_url: info.thumbnail,
        duration_secs: info.duration.map(|d| d as u64).unwrap_or(0),
        heights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::options::{AudioExtraction, ClipRange};

    fn bare_options() -> EngineOptions {
        EngineOptions {
            output_template: "/downloads/clip.%(ext)s".to_string(),
            format_selector: "bestvideo+bestaudio/best".to_string(),
            merge_format: Some("mp4".to_string()),
            extract_audio: None,
            embed_subs: false,
            embed_meta: false,
            clip: None,
            extra_args: Vec::new(),
        }
    }

    #[test]
    fn test_parse_progress_full_line() {
        let line = "download:tubegrab:1048576|4194304|NA|52428.8|60";
        let update = parse_progress(line).unwrap();
        assert_eq!(update.downloaded, 1_048_576);
        assert_eq!(update.total, Some(4_194_304));
        assert_eq!(update.speed, Some(52428.8));
        assert_eq!(update.eta_secs, Some(60));
    }

    #[test]
    fn test_parse_progress_falls_back_to_estimate() {
        let line = "download:tubegrab:100|NA|2000.5|NA|NA";
        let update = parse_progress(line).unwrap();
        assert_eq!(update.total, Some(2000));
        assert_eq!(update.speed, None);
        assert_eq!(update.eta_secs, None);
    }

    #[test]
    fn test_parse_progress_rejects_other_output() {
        assert!(parse_progress("[download] Destination: clip.mp4").is_none());
        assert!(parse_progress("[Merger] Merging formats").is_none());
    }

    #[test]
    fn test_postprocessing_detection() {
        assert!(is_postprocessing_line("[Merger] Merging formats into clip.mp4"));
        assert!(is_postprocessing_line("[ExtractAudio] Destination: song.mp3"));
        assert!(!is_postprocessing_line("[download] 42%"));
    }

    #[test]
    fn test_cli_args_video_mode() {
        let args = cli_args("https://example.com/v", &bare_options());
        assert_eq!(args.last().unwrap(), "https://example.com/v");
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-o" && w[1] == "/downloads/clip.%(ext)s"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--merge-output-format" && w[1] == "mp4"));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn test_cli_args_audio_and_clip() {
        let mut options = bare_options();
        options.merge_format = None;
        options.extract_audio = Some(AudioExtraction {
            codec: "mp3".to_string(),
            bitrate: "320".to_string(),
        });
        options.clip = Some(ClipRange {
            start_secs: Some(10),
            end_secs: None,
        });
        options.extra_args = vec!["--geo-bypass".to_string()];

        let args = cli_args("u", &options);
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--audio-format" && w[1] == "mp3"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--audio-quality" && w[1] == "320"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--download-sections" && w[1] == "*10-inf"));
        assert!(args.contains(&"--geo-bypass".to_string()));
    }

    #[test]
    fn test_parse_info_json() {
        let raw = serde_json::json!({
            "title": "A Clip",
            "thumbnail": "https://example.com/t.jpg",
            "duration": 125.4,
            "formats": [
                {"vcodec": "none", "height": null},
                {"vcodec": "avc1", "height": 720},
                {"vcodec": "vp9", "height": 1080},
                {"vcodec": "avc1", "height": 720}
            ]
        });
        let info = parse_info_json(raw.to_string().as_bytes()).unwrap();
        assert_eq!(info.title, "A Clip");
        assert_eq!(info.thumbnail_url.as_deref(), Some("https://example.com/t.jpg"));
        assert_eq!(info.duration_secs, 125);
        assert_eq!(info.heights, vec![1080, 720]);
    }

    #[test]
    fn test_parse_info_json_garbage_is_none() {
        assert!(parse_info_json(b"not json").is_none());
    }
}

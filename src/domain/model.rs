use std::path::PathBuf;

/// Everything the user asked for, frozen at the moment Start was pressed.
/// A paused transfer is resumed by replaying this verbatim (with the
/// resolved file name substituted as `custom_name`).
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub directory: PathBuf,
    /// Quality label as shown in the picker, e.g. "1080p (MP4 - Fast)".
    pub quality: String,
    pub custom_name: Option<String>,
    pub options: AdvancedOptions,
}

/// The advanced-panel option bundle.
#[derive(Debug, Clone)]
pub struct AdvancedOptions {
    /// Preferred container for video downloads ("mp4" / "mkv").
    pub container: String,
    /// Audio codec choice for Audio Only mode ("MP3" / "M4A" / "WAV" / "FLAC").
    pub audio_format: String,
    /// Force H.264/AAC selection for picky players.
    pub compatibility_mode: bool,
    pub audio_bitrate: String,
    pub embed_subs: bool,
    pub embed_meta: bool,
    /// Clip range as entered, "MM:SS" / "H:MM:SS" style. Empty = full video.
    pub clip_start: Option<String>,
    pub clip_end: Option<String>,
    /// Known total duration in seconds, 0 when unknown.
    pub total_duration: u64,
    /// Free-form engine directives layered in from the power-args list.
    pub extra_args: Vec<String>,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            container: "mp4".to_string(),
            audio_format: "MP3".to_string(),
            compatibility_mode: false,
            audio_bitrate: "192".to_string(),
            embed_subs: false,
            embed_meta: true,
            clip_start: None,
            clip_end: None,
            total_duration: 0,
            extra_args: Vec::new(),
        }
    }
}

/// Best-effort metadata returned by the engine's info probe.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_secs: u64,
    /// Distinct video heights on offer, sorted descending.
    pub heights: Vec<u32>,
}

/// Asynchronous abort request, written by the controller and observed by
/// the worker at its next progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortAction {
    /// Terminate and delete every artifact of this transfer.
    Cancel,
    /// Terminate, promote the partial media file, keep sidecars.
    StopAndSave,
}

/// One progress tick from the engine. `total` may be unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressUpdate {
    pub downloaded: u64,
    pub total: Option<u64>,
    pub speed: Option<f64>,
    pub eta_secs: Option<u64>,
}

impl ProgressUpdate {
    pub fn percent(&self) -> f32 {
        match self.total {
            Some(total) if total > 0 => (self.downloaded as f32 / total as f32) * 100.0,
            _ => 0.0,
        }
    }
}

/// Hint for how the UI should render a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

use iced::widget::{
    button, checkbox, column, image as iced_image, pick_list, progress_bar, row, text,
    text_input, Space,
};
use iced::{Color, Element, Length};

use crate::domain::StatusLevel;
use crate::engine::options::POWER_ARGS;

pub const DEFAULT_QUALITY: &str = "1080p (MP4 - Fast)";

pub const AUDIO_FORMATS: &[&str] = &["MP3", "M4A", "WAV", "FLAC"];
pub const BITRATES: &[&str] = &["128", "192", "320"];

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub custom_name: String,
    pub save_path: String,
    pub quality: String,
    pub quality_options: Vec<String>,
    pub show_advanced: bool,
    pub compatibility_mode: bool,
    pub audio_format: String,
    pub audio_bitrate: String,
    pub embed_subs: bool,
    pub embed_meta: bool,
    pub clip_start: String,
    pub clip_end: String,
    pub selected_power_arg: Option<String>,
    pub active_power_args: Vec<String>,
    pub status_message: String,
    pub status_level: StatusLevel,
    pub progress_percent: f32,
    pub is_downloading: bool,
    pub is_paused: bool,
    pub title: String,
    pub thumbnail: Option<iced_image::Handle>,
    pub duration_secs: u64,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            custom_name: String::new(),
            save_path: default_save_path(),
            quality: DEFAULT_QUALITY.to_string(),
            quality_options: vec![
                "1080p (MP4 - Fast)".to_string(),
                "4K / Best (MKV/WebM)".to_string(),
                "720p Limit".to_string(),
                "Audio Only".to_string(),
            ],
            show_advanced: false,
            compatibility_mode: false,
            audio_format: "MP3".to_string(),
            audio_bitrate: "192".to_string(),
            embed_subs: false,
            embed_meta: true,
            clip_start: String::new(),
            clip_end: String::new(),
            selected_power_arg: None,
            active_power_args: Vec::new(),
            status_message: "Ready".to_string(),
            status_level: StatusLevel::Info,
            progress_percent: 0.0,
            is_downloading: false,
            is_paused: false,
            title: String::new(),
            thumbnail: None,
            duration_secs: 0,
        }
    }
}

fn default_save_path() -> String {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match home {
        Some(home) => std::path::Path::new(&home)
            .join("Desktop")
            .display()
            .to_string(),
        None => ".".to_string(),
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    NameChanged(String),
    SavePathChanged(String),
    QualitySelected(String),
    AdvancedToggled(bool),
    CompatibilityToggled(bool),
    AudioFormatSelected(String),
    BitrateSelected(String),
    EmbedSubsToggled(bool),
    EmbedMetaToggled(bool),
    ClipStartChanged(String),
    ClipEndChanged(String),
    PowerArgSelected(String),
    AddPowerArg,
    RemovePowerArg(String),
    // Action buttons, handled by the app.
    PastePressed,
    CheckPressed,
    BrowsePressed,
    StartPressed,
    PauseResumePressed,
    SavePartialPressed,
    CancelPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => self.url = url,
            DownloadMessage::NameChanged(name) => self.custom_name = name,
            DownloadMessage::SavePathChanged(path) => self.save_path = path,
            DownloadMessage::QualitySelected(quality) => {
                // Compatibility only makes sense for plain video tiers.
                if quality.contains("Audio Only") || is_high_res_label(&quality) {
                    self.compatibility_mode = false;
                }
                self.quality = quality;
            }
            DownloadMessage::AdvancedToggled(show) => self.show_advanced = show,
            DownloadMessage::CompatibilityToggled(on) => self.compatibility_mode = on,
            DownloadMessage::AudioFormatSelected(fmt) => self.audio_format = fmt,
            DownloadMessage::BitrateSelected(rate) => self.audio_bitrate = rate,
            DownloadMessage::EmbedSubsToggled(on) => self.embed_subs = on,
            DownloadMessage::EmbedMetaToggled(on) => self.embed_meta = on,
            DownloadMessage::ClipStartChanged(s) => self.clip_start = s,
            DownloadMessage::ClipEndChanged(s) => self.clip_end = s,
            DownloadMessage::PowerArgSelected(label) => {
                self.selected_power_arg = Some(label);
            }
            DownloadMessage::AddPowerArg => {
                if let Some(label) = &self.selected_power_arg {
                    if !self.active_power_args.contains(label) {
                        self.active_power_args.push(label.clone());
                    }
                }
            }
            DownloadMessage::RemovePowerArg(label) => {
                self.active_power_args.retain(|l| l != &label);
            }
            // Action buttons are handled by the app.
            _ => {}
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>, level: StatusLevel) {
        self.status_message = message.into();
        self.status_level = level;
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let mut content = column![
            text("TubeGrab").size(28),
            Space::new().height(Length::Fixed(10.0)),
            text("Video URL:").size(14),
            row![
                text_input("Paste a video URL...", &self.url)
                    .on_input(DownloadMessage::UrlChanged)
                    .padding(8),
                button("Paste").on_press(DownloadMessage::PastePressed),
                button("Check").on_press(DownloadMessage::CheckPressed),
            ]
            .spacing(5),
        ]
        .padding(20)
        .spacing(8);

        if let Some(handle) = &self.thumbnail {
            content = content.push(
                iced_image(handle.clone())
                    .width(Length::Fixed(250.0))
                    .height(Length::Fixed(140.0)),
            );
        }
        if !self.title.is_empty() {
            content = content.push(text(&self.title).size(14));
        }

        content = content
            .push(text("Custom Name (Optional):").size(14))
            .push(
                text_input("Leave empty to use the video title", &self.custom_name)
                    .on_input(DownloadMessage::NameChanged)
                    .padding(8),
            )
            .push(text("Save to:").size(14))
            .push(
                row![
                    text_input("Destination directory", &self.save_path)
                        .on_input(DownloadMessage::SavePathChanged)
                        .padding(8),
                    button("Browse...").on_press(DownloadMessage::BrowsePressed),
                ]
                .spacing(5),
            )
            .push(text("Quality:").size(14))
            .push(pick_list(
                self.quality_options.clone(),
                Some(self.quality.clone()),
                DownloadMessage::QualitySelected,
            ))
            .push(
                checkbox(self.show_advanced).label("Show Advanced Options")
                    .on_toggle(DownloadMessage::AdvancedToggled),
            );

        if self.show_advanced {
            content = content.push(self.advanced_section());
        }

        content = content
            .push(Space::new().height(Length::Fixed(10.0)))
            .push(text(&self.status_message).size(13).color(status_color(self.status_level)))
            .push(progress_bar(0.0..=100.0, self.progress_percent))
            .push(self.button_row());

        content.into()
    }

    fn advanced_section(&self) -> Element<'_, DownloadMessage> {
        let audio_only = self.quality.contains("Audio Only");

        let compat = if audio_only || is_high_res_label(&self.quality) {
            checkbox(self.compatibility_mode).label("Force Compatibility (H.264)")
        } else {
            checkbox(self.compatibility_mode).label("Force Compatibility (H.264)")
                .on_toggle(DownloadMessage::CompatibilityToggled)
        };

        let audio_formats: Vec<String> = AUDIO_FORMATS.iter().map(|f| f.to_string()).collect();
        let audio_picker: Element<'_, DownloadMessage> = if audio_only {
            pick_list(
                audio_formats,
                Some(self.audio_format.clone()),
                DownloadMessage::AudioFormatSelected,
            )
            .into()
        } else {
            text(format!("Audio Format: {}", self.audio_format))
                .size(13)
                .into()
        };

        let bitrates: Vec<String> = BITRATES.iter().map(|b| b.to_string()).collect();
        let power_labels: Vec<String> = POWER_ARGS.iter().map(|(l, _)| l.to_string()).collect();

        let mut active_args = column![].spacing(2);
        for label in &self.active_power_args {
            active_args = active_args.push(
                row![
                    text(label).size(12),
                    button(text("x").size(12))
                        .on_press(DownloadMessage::RemovePowerArg(label.clone())),
                ]
                .spacing(5),
            );
        }

        column![
            compat,
            row![text("Audio Format:").size(13), audio_picker].spacing(5),
            row![
                text("Clip from").size(13),
                text_input("0:00", &self.clip_start)
                    .on_input(DownloadMessage::ClipStartChanged)
                    .width(Length::Fixed(70.0)),
                text("to").size(13),
                text_input("end", &self.clip_end)
                    .on_input(DownloadMessage::ClipEndChanged)
                    .width(Length::Fixed(70.0)),
            ]
            .spacing(5),
            checkbox(self.embed_subs).label("Embed Subtitles (En)")
                .on_toggle(DownloadMessage::EmbedSubsToggled),
            checkbox(self.embed_meta).label("Embed Metadata")
                .on_toggle(DownloadMessage::EmbedMetaToggled),
            row![
                text("MP3 Bitrate:").size(13),
                pick_list(
                    bitrates,
                    Some(self.audio_bitrate.clone()),
                    DownloadMessage::BitrateSelected,
                ),
            ]
            .spacing(5),
            row![
                pick_list(
                    power_labels,
                    self.selected_power_arg.clone(),
                    DownloadMessage::PowerArgSelected,
                ),
                button("+ Add Argument").on_press(DownloadMessage::AddPowerArg),
            ]
            .spacing(5),
            active_args,
        ]
        .spacing(6)
        .into()
    }

    fn button_row(&self) -> Element<'_, DownloadMessage> {
        let busy = self.is_downloading || self.is_paused;

        let start = button("START DOWNLOAD")
            .on_press_maybe((!busy).then_some(DownloadMessage::StartPressed))
            .padding([10, 20]);

        let pause_label = if self.is_paused { "RESUME" } else { "PAUSE" };
        let pause = button(pause_label)
            .on_press_maybe(busy.then_some(DownloadMessage::PauseResumePressed))
            .padding([10, 15]);

        let save_partial = button("SAVE PARTIAL")
            .on_press_maybe(busy.then_some(DownloadMessage::SavePartialPressed))
            .padding([10, 15]);

        let cancel = button("DELETE")
            .on_press_maybe(busy.then_some(DownloadMessage::CancelPressed))
            .padding([10, 15]);

        row![start, pause, save_partial, cancel].spacing(8).into()
    }
}

fn is_high_res_label(quality: &str) -> bool {
    ["4K", "2K", "2160p", "1440p"]
        .iter()
        .any(|tag| quality.contains(*tag))
}

/// Picker label for an available height.
pub fn quality_label(height: u32) -> String {
    match height {
        2160 => "2160p (4K)".to_string(),
        1440 => "1440p (2K)".to_string(),
        1080 => "1080p".to_string(),
        720 => "720p".to_string(),
        480 => "480p".to_string(),
        other => format!("{}p", other),
    }
}

fn status_color(level: StatusLevel) -> Color {
    match level {
        StatusLevel::Info => Color::from_rgb(0.2, 0.2, 0.2),
        StatusLevel::Success => Color::from_rgb(0.0, 0.5, 0.0),
        StatusLevel::Warning => Color::from_rgb(1.0, 0.6, 0.0),
        StatusLevel::Error => Color::from_rgb(0.9, 0.2, 0.2),
    }
}

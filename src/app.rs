use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use iced::widget::image::Handle;
use iced::Task;

use crate::application::{ControllerEvent, DownloadController};
use crate::domain::{AdvancedOptions, DownloadRequest, MediaInfo, StatusLevel};
use crate::engine::options::{container_for, power_arg_directives};
use crate::engine::{MediaEngine, YtDlpEngine};
use crate::preview::{self, Thumbnail};
use crate::ui::{quality_label, DownloadMessage, DownloadView};
use crate::utils;

pub struct DownloadApp {
    view: DownloadView,
    controller: DownloadController,
    // Shared with the controller; used directly for preview probes.
    engine: Arc<dyn MediaEngine>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        let engine: Arc<dyn MediaEngine> = Arc::new(YtDlpEngine::default());
        let controller = DownloadController::new(engine.clone());
        let mut view = DownloadView::default();

        if !utils::is_ffmpeg_installed() {
            view.set_status(
                "FFmpeg not found: high-res merging and audio conversion will fail.",
                StatusLevel::Warning,
            );
        }

        Self {
            view,
            controller,
            engine,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Ui(DownloadMessage),
    Controller(ControllerEvent),
    InfoFetched(Option<MediaInfo>),
    ThumbnailFetched(Option<Thumbnail>),
    ClipboardRead(Option<String>),
    DirectoryPicked(Option<PathBuf>),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::Ui(ui_msg) => {
            app.view.update(ui_msg.clone());
            match ui_msg {
                DownloadMessage::PastePressed => {
                    iced::clipboard::read().map(Message::ClipboardRead)
                }
                DownloadMessage::CheckPressed => fetch_preview(app),
                DownloadMessage::BrowsePressed => Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .pick_folder()
                            .await
                            .map(|handle| handle.path().to_path_buf())
                    },
                    Message::DirectoryPicked,
                ),
                DownloadMessage::StartPressed => start_download(app),
                DownloadMessage::PauseResumePressed => toggle_pause(app),
                DownloadMessage::SavePartialPressed => save_partial(app),
                DownloadMessage::CancelPressed => cancel(app),
                _ => Task::none(),
            }
        }

        Message::ClipboardRead(content) => {
            match content {
                Some(content) => {
                    let content = content.trim().to_string();
                    // Ignore clipboard junk that clearly is not a URL.
                    if content.contains('\n') || content.len() > 250 || content.is_empty() {
                        return Task::none();
                    }
                    app.view.url = content;
                    app.view
                        .set_status("Pasted! Loading preview...", StatusLevel::Success);
                    fetch_preview(app)
                }
                None => Task::none(),
            }
        }

        Message::InfoFetched(info) => match info {
            Some(info) => apply_preview(app, info),
            None => {
                app.view
                    .set_status("Could not load preview", StatusLevel::Warning);
                Task::none()
            }
        },

        Message::ThumbnailFetched(thumbnail) => {
            if let Some(t) = thumbnail {
                app.view.thumbnail = Some(Handle::from_rgba(t.width, t.height, t.rgba));
            }
            Task::none()
        }

        Message::DirectoryPicked(path) => {
            if let Some(path) = path {
                app.view.save_path = path.display().to_string();
            }
            Task::none()
        }

        Message::Controller(event) => {
            app.controller.observe(&event);
            apply_controller_event(app, event);
            Task::none()
        }
    }
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::Ui)
}

fn fetch_preview(app: &mut DownloadApp) -> Task<Message> {
    let url = app.view.url.trim().to_string();
    if url.is_empty() {
        return Task::none();
    }
    app.view.title.clear();
    app.view.thumbnail = None;
    app.view.set_status("Fetching info...", StatusLevel::Info);

    let engine = app.engine.clone();
    Task::perform(
        async move { engine.fetch_info(&url).await },
        Message::InfoFetched,
    )
}

/// Fill the preview pane and rebuild the quality menu from the heights
/// the source actually offers.
fn apply_preview(app: &mut DownloadApp, info: MediaInfo) -> Task<Message> {
    app.view.title = info.title;
    app.view.duration_secs = info.duration_secs;
    app.view.set_status("Ready", StatusLevel::Info);

    if !info.heights.is_empty() {
        let mut options: Vec<String> =
            info.heights.iter().map(|h| quality_label(*h)).collect();
        options.push("Audio Only".to_string());

        let selected = if options.iter().any(|o| o == "1080p") {
            "1080p".to_string()
        } else {
            options[0].clone()
        };
        app.view.quality_options = options;
        app.view.update(DownloadMessage::QualitySelected(selected));
    }

    match info.thumbnail_url {
        Some(thumb_url) => Task::perform(
            async move { preview::fetch_thumbnail(&thumb_url).await },
            Message::ThumbnailFetched,
        ),
        None => Task::none(),
    }
}

fn start_download(app: &mut DownloadApp) -> Task<Message> {
    if app.view.is_downloading || app.view.is_paused {
        return Task::none();
    }

    let quality = app.view.quality.clone();
    let extra_args: Vec<String> = app
        .view
        .active_power_args
        .iter()
        .filter_map(|label| power_arg_directives(label))
        .flat_map(|args| args.iter().map(|a| a.to_string()))
        .collect();

    let non_empty = |s: &str| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    };

    let request = DownloadRequest {
        url: app.view.url.trim().to_string(),
        directory: PathBuf::from(app.view.save_path.trim()),
        quality: quality.clone(),
        custom_name: non_empty(&app.view.custom_name),
        options: AdvancedOptions {
            container: container_for(&quality).to_string(),
            audio_format: app.view.audio_format.clone(),
            compatibility_mode: app.view.compatibility_mode,
            audio_bitrate: app.view.audio_bitrate.clone(),
            embed_subs: app.view.embed_subs,
            embed_meta: app.view.embed_meta,
            clip_start: non_empty(&app.view.clip_start),
            clip_end: non_empty(&app.view.clip_end),
            total_duration: app.view.duration_secs,
            extra_args,
        },
    };

    match app.controller.start(request) {
        Ok(events) => {
            app.view.is_downloading = true;
            app.view.is_paused = false;
            app.view.progress_percent = 0.0;
            app.view.set_status("Starting Download...", StatusLevel::Info);
            Task::stream(events.map(Message::Controller))
        }
        Err(e) => {
            app.view.set_status(e.to_string(), StatusLevel::Error);
            Task::none()
        }
    }
}

fn toggle_pause(app: &mut DownloadApp) -> Task<Message> {
    if !app.controller.is_paused() {
        app.controller.request_pause();
        app.view.is_paused = true;
        app.view
            .set_status("Paused. Press Resume to continue.", StatusLevel::Warning);
        Task::none()
    } else {
        match app.controller.resume() {
            Ok(events) => {
                app.view.is_paused = false;
                app.view.is_downloading = true;
                app.view.set_status("Resuming...", StatusLevel::Info);
                Task::stream(events.map(Message::Controller))
            }
            Err(e) => {
                app.view.is_paused = false;
                app.view.is_downloading = false;
                app.view.set_status(e.to_string(), StatusLevel::Error);
                Task::none()
            }
        }
    }
}

fn save_partial(app: &mut DownloadApp) -> Task<Message> {
    let was_paused = app.controller.is_paused();
    app.controller.stop_and_save_now();
    app.view.is_paused = false;

    if was_paused {
        // Partials were already promoted when the pause happened.
        app.view.is_downloading = false;
        app.view.progress_percent = 0.0;
        app.view.set_status("Partial saved.", StatusLevel::Warning);
    } else if app.view.is_downloading {
        app.view
            .set_status("Stopping and saving partial...", StatusLevel::Warning);
    }
    Task::none()
}

fn cancel(app: &mut DownloadApp) -> Task<Message> {
    if app.controller.is_paused() {
        // No live worker to signal; reconcile the stored prefix now.
        let message = app.controller.manual_cleanup();
        app.view.is_paused = false;
        app.view.is_downloading = false;
        app.view.progress_percent = 0.0;
        app.view.set_status(message, StatusLevel::Error);
    } else {
        app.controller.request_cancel();
    }
    Task::none()
}

fn apply_controller_event(app: &mut DownloadApp, event: ControllerEvent) {
    match event {
        ControllerEvent::TargetResolved { .. } => {}

        ControllerEvent::Progress(update) => {
            app.view.progress_percent = update.percent();
            let percent_text = match update.total {
                Some(total) if total > 0 => format!("{:.1}%", update.percent()),
                _ => "...".to_string(),
            };
            let total_text = match update.total {
                Some(total) if total > 0 => utils::format_bytes(total),
                _ => "?".to_string(),
            };
            let speed_text = utils::format_bytes(update.speed.unwrap_or(0.0) as u64);
            let stats = format!(
                "{} | {} of {} | {}/s | ETA: {}",
                percent_text,
                utils::format_bytes(update.downloaded),
                total_text,
                speed_text,
                utils::format_seconds(update.eta_secs),
            );
            app.view.set_status(stats, StatusLevel::Info);
        }

        ControllerEvent::Status { text, level } => {
            app.view.set_status(text, level);
        }

        ControllerEvent::Finished { success } => {
            // A pause ends the worker too; keep the paused UI in place.
            if app.view.is_paused {
                return;
            }
            app.view.is_downloading = false;
            if success {
                app.view.progress_percent = 100.0;
                app.view.custom_name.clear();
                app.view.clip_start.clear();
                app.view.clip_end.clear();
                app.view
                    .set_status("Download Complete!", StatusLevel::Success);
            } else {
                // The reconciler's status line is already showing.
                app.view.progress_percent = 0.0;
            }
        }

        ControllerEvent::Error(message) => {
            app.view.is_downloading = false;
            app.view.is_paused = false;
            app.view.progress_percent = 0.0;
            app.view.set_status(message, StatusLevel::Error);
        }
    }
}

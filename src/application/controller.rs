//! Download lifecycle controller.
//!
//! Owns the transfer state machine (idle / running / paused) and the
//! single active transfer. The actual work runs as an event stream the
//! UI drives with `iced::Task::stream`; every public operation here is a
//! cheap, non-blocking state mutation. An abort request is written into
//! a watch cell that the engine observes at its next progress tick, so
//! cancellation is deliberate-lag, never instantaneous.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::{AbortAction, AppError, DownloadRequest, ProgressUpdate, StatusLevel};
use crate::engine::options::build_engine_options;
use crate::engine::{EngineEvent, MediaEngine, TransferOutcome};
use crate::storage::{allocator, reconciler};
use crate::utils::sanitize_filename;

/// Events produced by the background worker, in order. `Finished` or
/// `Error` is always the last event of a transfer.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// The target file name is now fixed; recorded for pause/resume.
    TargetResolved {
        directory: PathBuf,
        file_prefix: String,
    },
    Progress(ProgressUpdate),
    Status { text: String, level: StatusLevel },
    /// Transfer over: success, or an abort that has been reconciled.
    Finished { success: bool },
    /// Engine failure, reported verbatim.
    Error(String),
}

/// The one transfer that may be live at a time.
struct ActiveTransfer {
    directory: PathBuf,
    file_prefix: Option<String>,
    abort_tx: watch::Sender<Option<AbortAction>>,
}

/// Saved at pause time so a later resume reuses the identical target
/// name, bypassing the allocator's collision search.
#[derive(Debug, Clone)]
struct ResumeDescriptor {
    request: DownloadRequest,
    directory: PathBuf,
    file_prefix: Option<String>,
}

pub struct DownloadController {
    engine: Arc<dyn MediaEngine>,
    active: Option<ActiveTransfer>,
    resume: Option<ResumeDescriptor>,
    last_request: Option<DownloadRequest>,
    downloading: bool,
    paused: bool,
}

impl DownloadController {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            active: None,
            resume: None,
            last_request: None,
            downloading: false,
            paused: false,
        }
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Begin a fresh transfer. Callers must check `is_downloading()`
    /// first; there is no internal queueing.
    pub fn start(
        &mut self,
        request: DownloadRequest,
    ) -> Result<BoxStream<'static, ControllerEvent>, AppError> {
        if request.url.trim().is_empty() {
            return Err(AppError::EmptyUrl);
        }
        if self.downloading {
            return Err(AppError::TransferInProgress);
        }
        debug!(url = %request.url, "starting transfer");
        self.last_request = Some(request.clone());
        self.resume = None;
        self.paused = false;
        Ok(self.launch(request, false))
    }

    /// Ask the running transfer to terminate and delete its artifacts.
    /// Takes effect at the worker's next progress tick.
    pub fn request_cancel(&mut self) {
        self.resume = None;
        self.paused = false;
        self.signal(AbortAction::Cancel);
    }

    /// Stop-and-save the running transfer and remember how to continue
    /// it: the original request plus the resolved file prefix.
    pub fn request_pause(&mut self) {
        if !self.downloading {
            return;
        }
        let Some(mut request) = self.last_request.clone() else {
            return;
        };
        let Some(active) = &self.active else {
            return;
        };

        let directory = active.directory.clone();
        let file_prefix = active.file_prefix.clone();
        if let Some(prefix) = &file_prefix {
            request.custom_name = Some(prefix.clone());
        }
        self.resume = Some(ResumeDescriptor {
            request,
            directory,
            file_prefix,
        });
        self.paused = true;
        self.signal(AbortAction::StopAndSave);
    }

    /// Continue a paused transfer under its original target name.
    pub fn resume(&mut self) -> Result<BoxStream<'static, ControllerEvent>, AppError> {
        if self.downloading {
            return Err(AppError::TransferInProgress);
        }
        let descriptor = match (self.paused, self.resume.take()) {
            (true, Some(descriptor)) => descriptor,
            _ => {
                self.paused = false;
                return Err(AppError::ResumeDataLost);
            }
        };

        // Re-tag bare media files so the engine's own resume detection
        // picks them up. Idempotent.
        if let Some(prefix) = &descriptor.file_prefix {
            reconciler::restore_partials(&descriptor.directory, prefix);
        }

        debug!("resuming transfer");
        self.paused = false;
        self.last_request = Some(descriptor.request.clone());
        Ok(self.launch(descriptor.request, true))
    }

    /// One-shot partial save: stop-and-save without keeping the resume
    /// descriptor. While paused, the partials are already on disk, so
    /// this just forgets the descriptor.
    pub fn stop_and_save_now(&mut self) {
        if self.paused {
            self.resume = None;
            self.paused = false;
            return;
        }
        if !self.downloading {
            return;
        }
        self.resume = None;
        self.signal(AbortAction::StopAndSave);
    }

    /// Cancel while paused: no live worker to signal, so reconcile the
    /// stored prefix directly. Blocking (grace period + lock retries).
    pub fn manual_cleanup(&mut self) -> String {
        let message = match &self.resume {
            Some(ResumeDescriptor {
                directory,
                file_prefix: Some(prefix),
                ..
            }) => reconciler::cleanup(directory, prefix, AbortAction::Cancel),
            _ => "Cancelled.".to_string(),
        };
        self.resume = None;
        self.paused = false;
        message
    }

    /// Feed every worker event back so the controller can track the
    /// resolved target and clear the transfer when the worker ends.
    pub fn observe(&mut self, event: &ControllerEvent) {
        match event {
            ControllerEvent::TargetResolved {
                directory,
                file_prefix,
            } => {
                if let Some(active) = &mut self.active {
                    active.directory = directory.clone();
                    active.file_prefix = Some(file_prefix.clone());
                }
            }
            ControllerEvent::Finished { .. } | ControllerEvent::Error(_) => {
                self.downloading = false;
                self.active = None;
            }
            _ => {}
        }
    }

    fn launch(
        &mut self,
        request: DownloadRequest,
        is_resume: bool,
    ) -> BoxStream<'static, ControllerEvent> {
        let (abort_tx, abort_rx) = watch::channel(None);
        self.active = Some(ActiveTransfer {
            directory: request.directory.clone(),
            file_prefix: if is_resume {
                request.custom_name.clone()
            } else {
                None
            },
            abort_tx,
        });
        self.downloading = true;
        run_worker(self.engine.clone(), request, abort_rx, is_resume)
    }

    fn signal(&self, action: AbortAction) {
        if let Some(active) = &self.active {
            let _ = active.abort_tx.send(Some(action));
        }
    }
}

// --- Background worker -------------------------------------------------

enum Stage {
    Prepare {
        request: DownloadRequest,
        is_resume: bool,
    },
    FetchTitle {
        request: DownloadRequest,
        is_resume: bool,
    },
    Allocate {
        request: DownloadRequest,
        is_resume: bool,
        base_name: String,
    },
    Transfer {
        events: BoxStream<'static, EngineEvent>,
        directory: PathBuf,
        file_prefix: String,
    },
    Reconcile {
        directory: PathBuf,
        file_prefix: String,
        action: AbortAction,
    },
    Done,
}

struct Worker {
    engine: Arc<dyn MediaEngine>,
    abort_rx: watch::Receiver<Option<AbortAction>>,
    queued: VecDeque<ControllerEvent>,
    stage: Stage,
}

fn status(text: impl Into<String>, level: StatusLevel) -> ControllerEvent {
    ControllerEvent::Status {
        text: text.into(),
        level,
    }
}

/// The whole transfer as an event stream: resolve the file name, run the
/// engine, and on abort reconcile the artifacts before reporting.
fn run_worker(
    engine: Arc<dyn MediaEngine>,
    request: DownloadRequest,
    abort_rx: watch::Receiver<Option<AbortAction>>,
    is_resume: bool,
) -> BoxStream<'static, ControllerEvent> {
    let worker = Worker {
        engine,
        abort_rx,
        queued: VecDeque::new(),
        stage: Stage::Prepare { request, is_resume },
    };

    futures::stream::unfold(worker, |mut worker| async move {
        loop {
            if let Some(event) = worker.queued.pop_front() {
                return Some((event, worker));
            }

            match std::mem::replace(&mut worker.stage, Stage::Done) {
                Stage::Prepare { request, is_resume } => {
                    let custom = request
                        .custom_name
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string);
                    match custom {
                        Some(base_name) => {
                            worker.stage = Stage::Allocate {
                                request,
                                is_resume,
                                base_name,
                            };
                        }
                        None => {
                            worker
                                .queued
                                .push_back(status("Fetching title...", StatusLevel::Info));
                            worker.stage = Stage::FetchTitle { request, is_resume };
                        }
                    }
                }

                Stage::FetchTitle { request, is_resume } => {
                    let base_name = match worker.engine.fetch_info(&request.url).await {
                        Some(info) => sanitize_filename(&info.title),
                        // Probe failed: let the engine name the file from
                        // its own title template.
                        None => "%(title)s".to_string(),
                    };
                    worker.stage = Stage::Allocate {
                        request,
                        is_resume,
                        base_name,
                    };
                }

                Stage::Allocate {
                    request,
                    is_resume,
                    base_name,
                } => {
                    let directory = request.directory.clone();
                    let dir = directory.clone();
                    let resolved = tokio::task::spawn_blocking(move || {
                        allocator::resolve(&dir, &base_name, is_resume)
                    })
                    .await;
                    let file_prefix = match resolved {
                        Ok(prefix) => prefix,
                        Err(e) => {
                            worker.queued.push_back(ControllerEvent::Error(format!(
                                "filename allocation failed: {}",
                                e
                            )));
                            continue;
                        }
                    };

                    worker.queued.push_back(ControllerEvent::TargetResolved {
                        directory: directory.clone(),
                        file_prefix: file_prefix.clone(),
                    });
                    worker
                        .queued
                        .push_back(status("Starting download...", StatusLevel::Info));

                    let options = build_engine_options(&request, &directory, &file_prefix);
                    let events =
                        worker
                            .engine
                            .download(&request.url, options, worker.abort_rx.clone());
                    worker.stage = Stage::Transfer {
                        events,
                        directory,
                        file_prefix,
                    };
                }

                Stage::Transfer {
                    mut events,
                    directory,
                    file_prefix,
                } => match events.next().await {
                    Some(EngineEvent::Progress(update)) => {
                        worker.queued.push_back(ControllerEvent::Progress(update));
                        worker.stage = Stage::Transfer {
                            events,
                            directory,
                            file_prefix,
                        };
                    }
                    Some(EngineEvent::Status(text)) => {
                        worker.queued.push_back(status(text, StatusLevel::Info));
                        worker.stage = Stage::Transfer {
                            events,
                            directory,
                            file_prefix,
                        };
                    }
                    Some(EngineEvent::Done(TransferOutcome::Completed)) => {
                        worker
                            .queued
                            .push_back(ControllerEvent::Finished { success: true });
                    }
                    Some(EngineEvent::Done(TransferOutcome::Aborted(action))) => {
                        worker.stage = Stage::Reconcile {
                            directory,
                            file_prefix,
                            action,
                        };
                    }
                    Some(EngineEvent::Done(TransferOutcome::Failed(message))) => {
                        worker.queued.push_back(ControllerEvent::Error(message));
                    }
                    None => {
                        worker.queued.push_back(ControllerEvent::Error(
                            "engine stream ended unexpectedly".to_string(),
                        ));
                    }
                },

                Stage::Reconcile {
                    directory,
                    file_prefix,
                    action,
                } => {
                    let dir = directory.clone();
                    let prefix = file_prefix.clone();
                    let message =
                        match tokio::task::spawn_blocking(move || {
                            reconciler::cleanup(&dir, &prefix, action)
                        })
                        .await
                        {
                            Ok(message) => message,
                            Err(e) => {
                                warn!(error = %e, "reconciliation task failed");
                                match action {
                                    AbortAction::Cancel => "Cancelled.".to_string(),
                                    AbortAction::StopAndSave => {
                                        "Stopped. Saved partials.".to_string()
                                    }
                                }
                            }
                        };
                    let level = match action {
                        AbortAction::Cancel => StatusLevel::Error,
                        AbortAction::StopAndSave => StatusLevel::Warning,
                    };
                    worker.queued.push_back(status(message, level));
                    worker
                        .queued
                        .push_back(ControllerEvent::Finished { success: false });
                }

                Stage::Done => return None,
            }
        }
    })
    .boxed()
}

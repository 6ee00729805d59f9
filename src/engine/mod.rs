//! Boundary to the external download/extraction engine.
//!
//! The engine is consumed through a narrow trait: a best-effort metadata
//! probe and a download call that streams progress back and observes the
//! abort cell at each tick.

pub mod options;
pub mod ytdlp;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio::sync::watch;

use crate::domain::{AbortAction, MediaInfo, ProgressUpdate};
use options::EngineOptions;

pub use ytdlp::YtDlpEngine;

/// How a transfer ended. Abort is a controlled interruption, not an
/// error; it is the only variant that triggers reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    Aborted(AbortAction),
    Failed(String),
}

/// Events emitted by an in-flight engine invocation. `Done` is always
/// the final event.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Progress(ProgressUpdate),
    Status(String),
    Done(TransferOutcome),
}

pub trait MediaEngine: Send + Sync {
    /// Probe a URL for title, thumbnail, duration and available heights.
    /// Best-effort: any failure yields `None`, never an error.
    fn fetch_info(&self, url: &str) -> BoxFuture<'static, Option<MediaInfo>>;

    /// Run a transfer. The abort cell is read at each progress tick; an
    /// observed abort terminates the engine and ends the stream with
    /// `Done(Aborted(..))`.
    fn download(
        &self,
        url: &str,
        options: EngineOptions,
        abort: watch::Receiver<Option<AbortAction>>,
    ) -> BoxStream<'static, EngineEvent>;
}

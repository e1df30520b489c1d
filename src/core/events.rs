use crate::core::error::{FetchError, ResolveError};
use crate::core::model::{BatchId, BatchOutcome, BatchStatus};

/// Title metadata attached to progress updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaTitle {
    pub title: Option<String>,
    pub playlist_index: Option<u32>,
    pub playlist_count: Option<u32>,
}

impl MediaTitle {
    pub fn named(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Default::default() }
    }

    /// `(index/count) title` for playlist entries, plain title otherwise.
    /// `None` when there is no title to show.
    pub fn display(&self) -> Option<String> {
        let title = self.title.as_deref()?;
        match (self.playlist_index, self.playlist_count) {
            (Some(i), Some(n)) => Some(format!("({}/{}) {}", i, n, title)),
            _ => Some(title.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        total_bytes_estimate: Option<u64>,
        speed: Option<String>,
        eta: Option<String>,
        title: MediaTitle,
    },
    /// `postprocessor` is set when a post-processing stage (merge, audio
    /// extraction, ...) finished rather than the transfer itself.
    Finished {
        total_bytes: Option<u64>,
        downloaded_bytes: Option<u64>,
        title: MediaTitle,
        postprocessor: Option<String>,
    },
}

impl ProgressEvent {
    pub fn title(&self) -> &MediaTitle {
        match self {
            ProgressEvent::Downloading { title, .. } | ProgressEvent::Finished { title, .. } => title,
        }
    }

    pub fn is_item_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Finished { postprocessor: None, .. })
    }
}

/// Human-facing status lines. Wording lives in `i18n`.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    Standby,
    Processing { index: usize, total: usize, url: String },
    TargetSkipped { index: usize, url: String, error: FetchError },
    HaltRequested,
    Halted { processed: usize },
    Completed { total: usize, failed: usize },
    Critical { message: String },
    Resolution(ResolveError),
}

/// Everything the worker reports to the presentation side, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    BatchStatusChanged { batch_id: BatchId, status: BatchStatus },
    TargetStarted { index: usize, total: usize, url: String },
    Progress { index: usize, event: ProgressEvent },
    TargetDone { index: usize },
    TargetFailed { index: usize, url: String, error: FetchError },
    Status(StatusMessage),
    Finished(BatchOutcome),
    ControlsRestored,
}

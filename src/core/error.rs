use std::path::PathBuf;

/// Raised while turning user input into a target list. No batch is started.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("too many links: at most {limit} are accepted in manual mode")]
    TooManyTargets { limit: usize, found: usize },

    #[error("no links were provided")]
    NoTargets,

    #[error("bulk source file {path:?} not found")]
    SourceFileMissing { path: PathBuf },

    #[error("bulk source file {path:?} could not be read: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },
}

/// Failure of a single fetch. The batch goes on with the next target.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("media unavailable: {0}")]
    Unavailable(String),

    #[error("fetch failed: {0}")]
    Unknown(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Unavailable(_) => "unavailable",
            FetchError::Unknown(_) => "unknown",
        }
    }
}

/// Failure of the batch loop itself. Ends the batch as `Failed`.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("event bridge closed; nobody is listening for progress")]
    BridgeClosed,

    #[error("cannot prepare output directory {path:?}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unrecognized quality label: {0:?}")]
    UnknownLabel(String),

    #[error("quality label {0:?} has an invalid height")]
    InvalidHeight(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a batch is already running")]
    AlreadyRunning,
}

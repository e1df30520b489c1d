use crate::core::error::{FormatError, ResolveError};
use crate::core::events::StatusMessage;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type BatchId = Uuid;

/// One URL queued for fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: String,
}

impl Target {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Quality selection. Parsed from labels such as `1080p`, `720p` or `Audio Only (MP3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    BestVideo,
    VideoAtMost { height: u32 },
    AudioOnly,
}

/// Heights at or above this are served by the unrestricted best-video selector.
const BEST_VIDEO_MIN_HEIGHT: u32 = 1080;

impl FormatSpec {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            FormatSpec::AudioOnly => MediaKind::Audio,
            FormatSpec::BestVideo | FormatSpec::VideoAtMost { .. } => MediaKind::Video,
        }
    }
}

impl FromStr for FormatSpec {
    type Err = FormatError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let norm = label.trim().to_ascii_lowercase();
        if norm.contains("audio") {
            return Ok(FormatSpec::AudioOnly);
        }
        if norm == "best" || norm.starts_with("best ") {
            return Ok(FormatSpec::BestVideo);
        }

        let digits: String = norm.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || !norm[digits.len()..].starts_with('p') {
            return Err(FormatError::UnknownLabel(label.to_string()));
        }
        let height: u32 = digits
            .parse()
            .map_err(|_| FormatError::InvalidHeight(label.to_string()))?;
        if height == 0 {
            return Err(FormatError::InvalidHeight(label.to_string()));
        }
        if height >= BEST_VIDEO_MIN_HEIGHT {
            Ok(FormatSpec::BestVideo)
        } else {
            Ok(FormatSpec::VideoAtMost { height })
        }
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSpec::BestVideo => write!(f, "best video"),
            FormatSpec::VideoAtMost { height } => write!(f, "{}p", height),
            FormatSpec::AudioOnly => write!(f, "audio only (mp3)"),
        }
    }
}

/// Output root plus the per-media-kind subdirectories below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub video_subdir: String,
    pub audio_subdir: String,
}

impl OutputLayout {
    pub fn dir_for(&self, format: &FormatSpec) -> PathBuf {
        match format.media_kind() {
            MediaKind::Video => self.root.join(&self.video_subdir),
            MediaKind::Audio => self.root.join(&self.audio_subdir),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    targets: Vec<Target>,
    format: FormatSpec,
    layout: OutputLayout,
}

impl BatchRequest {
    pub fn new(targets: Vec<Target>, format: FormatSpec, layout: OutputLayout) -> Result<Self, ResolveError> {
        if targets.is_empty() {
            return Err(ResolveError::NoTargets);
        }
        Ok(Self { targets, format, layout })
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn format(&self) -> FormatSpec {
        self.format
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }
}

/// Everything the worker needs for one batch, captured once at start.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_id: BatchId,
    pub layout: OutputLayout,
    pub format: FormatSpec,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Idle,
    Running,
    Completed,
    Halted,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Halted | BatchStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    /// Targets whose fetch attempt ran to an end, successful or not.
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
    pub message: StatusMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configured_labels() {
        assert_eq!("1080p".parse::<FormatSpec>().unwrap(), FormatSpec::BestVideo);
        assert_eq!("720p".parse::<FormatSpec>().unwrap(), FormatSpec::VideoAtMost { height: 720 });
        assert_eq!(" 480P ".parse::<FormatSpec>().unwrap(), FormatSpec::VideoAtMost { height: 480 });
        assert_eq!("Audio Only (MP3)".parse::<FormatSpec>().unwrap(), FormatSpec::AudioOnly);
        assert_eq!("best".parse::<FormatSpec>().unwrap(), FormatSpec::BestVideo);
    }

    #[test]
    fn rejects_unknown_labels() {
        assert!(matches!("potato".parse::<FormatSpec>(), Err(FormatError::UnknownLabel(_))));
        assert!(matches!("720".parse::<FormatSpec>(), Err(FormatError::UnknownLabel(_))));
        assert!(matches!("0p".parse::<FormatSpec>(), Err(FormatError::InvalidHeight(_))));
    }

    #[test]
    fn each_format_picks_one_subdirectory() {
        let layout = OutputLayout {
            root: PathBuf::from("out"),
            video_subdir: "Video".into(),
            audio_subdir: "Audio".into(),
        };
        assert_eq!(layout.dir_for(&FormatSpec::BestVideo), PathBuf::from("out").join("Video"));
        assert_eq!(layout.dir_for(&FormatSpec::VideoAtMost { height: 360 }), PathBuf::from("out").join("Video"));
        assert_eq!(layout.dir_for(&FormatSpec::AudioOnly), PathBuf::from("out").join("Audio"));
    }

    #[test]
    fn empty_request_is_rejected() {
        let layout = OutputLayout {
            root: PathBuf::from("out"),
            video_subdir: "Video".into(),
            audio_subdir: "Audio".into(),
        };
        let err = BatchRequest::new(vec![], FormatSpec::AudioOnly, layout).unwrap_err();
        assert_eq!(err, ResolveError::NoTargets);
    }
}

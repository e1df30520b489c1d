use crate::core::model::{FormatSpec, OutputLayout};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub downloader: DownloaderConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    pub app_name: String,
    pub author: String,
    /// Plain-text file remembering the last chosen output directory.
    #[serde(alias = "config_file_name")]
    pub output_path_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloaderConfig {
    pub quality_options: Vec<String>,
    pub manual_mode_url_limit: usize,
    pub bulk_mode_file: PathBuf,
    pub default_output_path: PathBuf,
    pub video_subdirectory: String,
    pub audio_subdirectory: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { general: GeneralConfig::default(), downloader: DownloaderConfig::default() }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: "Zenith Downloader".to_string(),
            author: "Sardar Wafa Abbas".to_string(),
            output_path_file: PathBuf::from("zenith_config.json"),
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            quality_options: vec!["1080p".to_string(), "720p".to_string(), "Audio Only (MP3)".to_string()],
            manual_mode_url_limit: 5,
            bulk_mode_file: PathBuf::from("links.txt"),
            default_output_path: PathBuf::from("downloads"),
            video_subdirectory: "Video".to_string(),
            audio_subdirectory: "Audio".to_string(),
        }
    }
}

impl AppConfig {
    /// Never fails: a missing or malformed file yields the built-in defaults.
    pub async fn load(path: &Path) -> Self {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config not readable, using built-in defaults");
                return Self::default();
            }
        };

        match Self::parse(&raw) {
            Ok(cfg) => {
                debug!(path = %path.display(), "config loaded");
                cfg
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config malformed, using built-in defaults");
                Self::default()
            }
        }
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let mut cfg: AppConfig = serde_json::from_str(raw)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        let d = &mut self.downloader;
        d.quality_options.retain(|label| match label.parse::<FormatSpec>() {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "dropping quality option");
                false
            }
        });
        if d.quality_options.is_empty() {
            d.quality_options = DownloaderConfig::default().quality_options;
        }
        if d.manual_mode_url_limit == 0 {
            warn!("manual_mode_url_limit of 0 would reject every link, using default");
            d.manual_mode_url_limit = DownloaderConfig::default().manual_mode_url_limit;
        }
    }

    /// Configured quality labels paired with their parsed format.
    pub fn formats(&self) -> Vec<(String, FormatSpec)> {
        self.downloader
            .quality_options
            .iter()
            .filter_map(|label| label.parse().ok().map(|spec| (label.clone(), spec)))
            .collect()
    }

    /// Resolves a user-supplied quality label. Configured labels match
    /// case-insensitively; anything else is parsed directly.
    pub fn format_for(&self, label: Option<&str>) -> Result<FormatSpec, crate::core::error::FormatError> {
        let formats = self.formats();
        let Some(label) = label else {
            return Ok(formats.first().map(|(_, spec)| *spec).unwrap_or(FormatSpec::BestVideo));
        };
        if let Some((_, spec)) = formats.iter().find(|(l, _)| l.eq_ignore_ascii_case(label.trim())) {
            return Ok(*spec);
        }
        label.parse()
    }

    pub fn layout(&self, root: PathBuf) -> OutputLayout {
        OutputLayout {
            root,
            video_subdir: self.downloader.video_subdirectory.clone(),
            audio_subdir: self.downloader.audio_subdirectory.clone(),
        }
    }
}

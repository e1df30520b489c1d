use async_trait::async_trait;
use crate::core::bridge::ProgressSink;
use crate::core::error::FetchError;
use crate::core::model::{FormatSpec, Target};
use clap::{ArgMatches, Command};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DriverContext {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub headers: HashMap<String, String>,
    /// Engine-specific knobs contributed by CLI plugins, e.g. `ytdlp_bin`.
    pub options: HashMap<String, String>,
}

impl Default for DriverContext {
    fn default() -> Self {
        Self {
            user_agent: "ZenithDownloader/0.1".to_string(),
            timeout_secs: 60,
            retries: 2,
            retry_backoff_ms: 400,
            headers: HashMap::new(),
            options: HashMap::new(),
        }
    }
}

/// Where and how one target should land.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Final directory, already specific to the format's media kind.
    pub output_dir: PathBuf,
    pub format: FormatSpec,
}

#[async_trait]
pub trait FetchEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Claim strength for a target; 0 means "cannot handle".
    fn can_handle(&self, target: &Target, format: &FormatSpec) -> u8;

    /// Fetches one target, reporting progress through `sink` before returning.
    async fn fetch(
        &self,
        target: &Target,
        req: &FetchRequest,
        ctx: &DriverContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError>;
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_download_command(&self, cmd: Command) -> Command;
    fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut DriverContext) -> anyhow::Result<()>;
}

pub struct PluginRegistry {
    engines: Vec<Arc<dyn FetchEngine>>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self { engines: vec![], cli_plugins: vec![] }
    }

    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();

        reg.engines.push(Arc::new(crate::plugins::ytdlp::driver::YtDlpEngine::new()));
        reg.engines.push(Arc::new(crate::plugins::http::driver::HttpMediaEngine::new()));

        reg.cli_plugins.push(Box::new(crate::plugins::ytdlp::cli::YtDlpCliPlugin::new()));
        reg.cli_plugins.push(Box::new(crate::plugins::http::cli::DirectMediaCliPlugin::new()));
        reg
    }

    #[cfg(test)]
    pub fn with_engine(mut self, engine: Arc<dyn FetchEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn augment_download_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_download_command(c))
    }

    pub fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut DriverContext) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            tracing::trace!(plugin = p.name(), "applying cli options");
            p.apply_download_matches(matches, ctx)?;
        }
        Ok(())
    }

    pub fn best_engine(&self, target: &Target, format: &FormatSpec) -> Option<Arc<dyn FetchEngine>> {
        self.engines
            .iter()
            .map(|e| (e.can_handle(target, format), e))
            .max_by_key(|(c, _)| *c)
            .and_then(|(c, e)| if c == 0 { None } else { Some(e.clone()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_media_links_prefer_http_engine() {
        let reg = PluginRegistry::with_defaults();
        let mp4 = Target::new("https://cdn.example.com/clips/intro.mp4");
        let page = Target::new("https://www.youtube.com/watch?v=abc");

        let e = reg.best_engine(&mp4, &FormatSpec::BestVideo).unwrap();
        assert_eq!(e.name(), "http-media");

        let e = reg.best_engine(&page, &FormatSpec::BestVideo).unwrap();
        assert_eq!(e.name(), "yt-dlp");

        // a video file cannot satisfy an audio-only request without transcoding
        let e = reg.best_engine(&mp4, &FormatSpec::AudioOnly).unwrap();
        assert_eq!(e.name(), "yt-dlp");
    }

    #[test]
    fn audio_only_goes_through_mp3_extraction() {
        let reg = PluginRegistry::with_defaults();
        let m4a = Target::new("https://cdn.example.com/a/song.m4a");
        let mp3 = Target::new("https://cdn.example.com/a/song.mp3");

        assert_eq!(reg.best_engine(&m4a, &FormatSpec::AudioOnly).unwrap().name(), "yt-dlp");
        assert_eq!(reg.best_engine(&mp3, &FormatSpec::AudioOnly).unwrap().name(), "http-media");
    }

    #[test]
    fn nothing_claims_non_http_links() {
        let reg = PluginRegistry::with_defaults();
        assert!(reg.best_engine(&Target::new("ftp://host/file.mp4"), &FormatSpec::BestVideo).is_none());
        assert!(reg.best_engine(&Target::new("not a url"), &FormatSpec::BestVideo).is_none());
    }

    #[test]
    fn plugin_args_reach_the_driver_context() {
        let reg = PluginRegistry::with_defaults();
        let cmd = reg.augment_download_command(Command::new("download"));
        let m = cmd
            .try_get_matches_from(["download", "--yt-dlp-bin", "/opt/yt-dlp", "--retries", "5", "--header", "X-Token: abc"])
            .unwrap();

        let mut ctx = DriverContext::default();
        reg.apply_download_matches(&m, &mut ctx).unwrap();
        assert_eq!(ctx.options.get("ytdlp_bin").map(String::as_str), Some("/opt/yt-dlp"));
        assert_eq!(ctx.retries, 5);
        assert_eq!(ctx.headers.get("X-Token").map(String::as_str), Some("abc"));
    }
}

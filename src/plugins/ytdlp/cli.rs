use crate::plugins::registry::{CliPlugin, DriverContext};
use clap::{Arg, ArgMatches, Command};

pub struct YtDlpCliPlugin;

impl YtDlpCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for YtDlpCliPlugin {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn augment_download_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("ytdlp_bin")
                .long("yt-dlp-bin")
                .help_heading("yt-dlp")
                .help("Path to the yt-dlp executable (default: yt-dlp on PATH)")
                .num_args(1),
        )
        .arg(
            Arg::new("ffmpeg_location")
                .long("ffmpeg-location")
                .help_heading("yt-dlp")
                .help("Location of ffmpeg, used for merging and MP3 extraction")
                .num_args(1),
        )
        .arg(
            Arg::new("ytdlp_cookies")
                .long("cookies")
                .help_heading("yt-dlp")
                .help("Netscape-format cookies file handed to yt-dlp")
                .num_args(1),
        )
    }

    fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut DriverContext) -> anyhow::Result<()> {
        for key in ["ytdlp_bin", "ffmpeg_location", "ytdlp_cookies"] {
            if let Some(v) = matches.get_one::<String>(key) {
                ctx.options.insert(key.to_string(), v.clone());
            }
        }
        Ok(())
    }
}

use async_trait::async_trait;
use crate::core::bridge::ProgressSink;
use crate::core::error::FetchError;
use crate::core::model::{FormatSpec, Target};
use crate::plugins::registry::{DriverContext, FetchEngine, FetchRequest};
use crate::plugins::ytdlp::parse::{classify_failure, download_template, parse_progress_line, postprocess_template};
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};
use url::Url;

const STDERR_TAIL_LINES: usize = 40;

pub struct YtDlpEngine;

impl YtDlpEngine {
    pub fn new() -> Self {
        Self
    }
}

pub fn format_selector(format: &FormatSpec) -> String {
    match format {
        FormatSpec::BestVideo => "bv[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/best".to_string(),
        FormatSpec::VideoAtMost { height } => format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4][height<={h}]",
            h = height
        ),
        FormatSpec::AudioOnly => "bestaudio/best".to_string(),
    }
}

pub fn build_args(target: &Target, req: &FetchRequest, ctx: &DriverContext) -> Vec<String> {
    let out_template = req.output_dir.join("%(title)s.%(ext)s");

    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--no-warnings".into(),
        "--ignore-errors".into(),
        "--no-check-certificate".into(),
        "--progress-template".into(),
        download_template(),
        "--progress-template".into(),
        postprocess_template(),
        "-f".into(),
        format_selector(&req.format),
        "-o".into(),
        out_template.to_string_lossy().to_string(),
    ];

    if req.format == FormatSpec::AudioOnly {
        args.extend(["-x", "--audio-format", "mp3", "--audio-quality", "192K"].map(String::from));
    }
    if let Some(ffmpeg) = ctx.options.get("ffmpeg_location") {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.clone());
    }
    if let Some(cookies) = ctx.options.get("ytdlp_cookies") {
        args.push("--cookies".into());
        args.push(cookies.clone());
    }

    args.push("--".into());
    args.push(target.url().to_string());
    args
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn can_handle(&self, target: &Target, _format: &FormatSpec) -> u8 {
        match Url::parse(target.url()) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => 50,
            _ => 0,
        }
    }

    async fn fetch(
        &self,
        target: &Target,
        req: &FetchRequest,
        ctx: &DriverContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        let bin = ctx
            .options
            .get("ytdlp_bin")
            .cloned()
            .unwrap_or_else(|| "yt-dlp".to_string());
        let args = build_args(target, req, ctx);
        debug!(bin = %bin, ?args, "spawning yt-dlp");

        let mut cmd = Command::new(&bin);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // keep a terminal Ctrl-C away from the child; halting waits for the current file
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::Unknown(format!("{} not found; install yt-dlp or pass --yt-dlp-bin", bin))
            } else {
                FetchError::Unknown(format!("spawn {}: {}", bin, e))
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Unknown("yt-dlp stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Unknown("yt-dlp stderr not captured".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                trace!(target: "yt-dlp", "{}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail)
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| FetchError::Unknown(format!("read yt-dlp output: {}", e)))?
        {
            match parse_progress_line(&line) {
                Some(evt) => sink.emit(evt),
                None => trace!(target: "yt-dlp", "{}", line),
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FetchError::Unknown(format!("wait for yt-dlp: {}", e)))?;
        let tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(classify_failure(&tail, status.code()))
        }
    }
}

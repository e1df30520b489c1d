use async_trait::async_trait;
use bytes::Bytes;
use crate::core::bridge::ProgressSink;
use crate::core::error::FetchError;
use crate::core::events::{MediaTitle, ProgressEvent};
use crate::core::model::{FormatSpec, MediaKind, Target};
use crate::core::progress::fmt_bytes;
use crate::plugins::registry::{DriverContext, FetchEngine, FetchRequest};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use sanitize_filename::sanitize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};
use url::Url;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "webm", "mkv", "mov"];
/// Audio-only output is always MP3; other audio containers need yt-dlp's extraction step.
const AUDIO_EXTENSIONS: &[&str] = &["mp3"];
const EMIT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(thiserror::Error, Debug)]
pub enum HttpEngineError {
    #[error("http status error: {0}")]
    Status(StatusCode),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no data received for {0}s")]
    Stalled(u64),

    #[error("connection closed after {got} of {expected} bytes")]
    Truncated { expected: u64, got: u64 },

    #[error("invalid header: {0}")]
    Header(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HttpEngineError> for FetchError {
    fn from(e: HttpEngineError) -> Self {
        let msg = e.to_string();
        match e {
            HttpEngineError::Status(s)
                if matches!(
                    s,
                    StatusCode::NOT_FOUND
                        | StatusCode::GONE
                        | StatusCode::FORBIDDEN
                        | StatusCode::UNAUTHORIZED
                        | StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS
                ) =>
            {
                FetchError::Unavailable(msg)
            }
            HttpEngineError::Status(s) if HttpMediaEngine::should_retry_status(s) => FetchError::Network(msg),
            HttpEngineError::Transport(ref t) if t.is_timeout() || t.is_connect() || t.is_body() || t.is_request() => {
                FetchError::Network(msg)
            }
            HttpEngineError::Stalled(_) | HttpEngineError::Truncated { .. } => FetchError::Network(msg),
            _ => FetchError::Unknown(msg),
        }
    }
}

/// Streams direct links to media files (`.../clip.mp4`) without going through yt-dlp.
pub struct HttpMediaEngine {
    client: reqwest::Client,
}

impl HttpMediaEngine {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    #[cfg(test)]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn media_extension(url: &Url) -> Option<String> {
        let last = url.path_segments()?.last()?;
        let (_, ext) = last.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    fn file_name(url: &Url) -> String {
        url.path_segments()
            .and_then(|s| s.last())
            .filter(|s| !s.is_empty())
            .map(sanitize)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "download.bin".to_string())
    }

    fn build_headers(ctx: &DriverContext) -> Result<HeaderMap, HttpEngineError> {
        let mut h = HeaderMap::new();
        h.insert(
            USER_AGENT,
            HeaderValue::from_str(&ctx.user_agent).map_err(|e| HttpEngineError::Header(e.to_string()))?,
        );
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| HttpEngineError::Header(e.to_string()))?;
            let value = HeaderValue::from_str(v).map_err(|e| HttpEngineError::Header(e.to_string()))?;
            h.insert(name, value);
        }
        Ok(h)
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    async fn sleep_backoff(ctx: &DriverContext, attempt: u32) {
        let base = ctx.retry_backoff_ms.max(1);
        let shift = attempt.min(16);
        let mul = 1u64 << shift;
        let ms = base.saturating_mul(mul).min(30_000);
        sleep(Duration::from_millis(ms)).await;
    }

    async fn open(&self, url: &Url, ctx: &DriverContext) -> Result<reqwest::Response, HttpEngineError> {
        let headers = Self::build_headers(ctx)?;
        let wait = Duration::from_secs(ctx.timeout_secs.max(1));

        let mut last_err: Option<HttpEngineError> = None;
        for attempt in 0..=ctx.retries {
            if attempt > 0 {
                Self::sleep_backoff(ctx, attempt - 1).await;
            }

            let sent = timeout(wait, self.client.get(url.clone()).headers(headers.clone()).send()).await;
            let resp = match sent {
                Ok(Ok(r)) => r,
                Ok(Err(e)) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    warn!(attempt, url = %url, error = %e, "request failed, retrying");
                    last_err = Some(e.into());
                    continue;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!(attempt, url = %url, "no response, retrying");
                    last_err = Some(HttpEngineError::Stalled(ctx.timeout_secs));
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }
            if Self::should_retry_status(status) {
                warn!(attempt, url = %url, %status, "transient status, retrying");
                last_err = Some(HttpEngineError::Status(status));
                continue;
            }
            return Err(HttpEngineError::Status(status));
        }

        Err(last_err.unwrap_or(HttpEngineError::Status(StatusCode::REQUEST_TIMEOUT)))
    }

    fn progress(downloaded: u64, total: Option<u64>, started: Instant, title: &MediaTitle) -> ProgressEvent {
        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        let speed = (downloaded as f64 / elapsed) as u64;
        let eta = match (total, speed) {
            (Some(t), s) if s > 0 && downloaded < t => Some(format!("{:.0}s", (t - downloaded) as f64 / s as f64)),
            _ => None,
        };
        ProgressEvent::Downloading {
            downloaded_bytes: downloaded,
            total_bytes: total,
            total_bytes_estimate: None,
            speed: Some(format!("{}/s", fmt_bytes(speed))),
            eta,
            title: title.clone(),
        }
    }

    async fn transfer(
        &self,
        url: &Url,
        target_path: &Path,
        partial_path: &Path,
        title: &MediaTitle,
        ctx: &DriverContext,
        sink: &dyn ProgressSink,
    ) -> Result<u64, HttpEngineError> {
        let resp = self.open(url, ctx).await?;
        let total = resp.content_length();
        debug!(url = %url, ?total, path = %target_path.display(), "streaming direct media");

        let mut file = tokio::fs::File::create(partial_path).await?;
        let mut stream = resp.bytes_stream();
        let wait = Duration::from_secs(ctx.timeout_secs.max(1));
        let started = Instant::now();
        let mut last_emit: Option<Instant> = None;
        let mut downloaded = 0u64;

        loop {
            let next = timeout(wait, stream.next())
                .await
                .map_err(|_| HttpEngineError::Stalled(ctx.timeout_secs))?;
            let Some(chunk) = next else { break };
            let chunk: Bytes = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if last_emit.map_or(true, |t| t.elapsed() >= EMIT_INTERVAL) {
                sink.emit(Self::progress(downloaded, total, started, title));
                last_emit = Some(Instant::now());
            }
        }
        file.flush().await?;
        drop(file);

        if let Some(expected) = total {
            if downloaded < expected {
                return Err(HttpEngineError::Truncated { expected, got: downloaded });
            }
        }

        if tokio::fs::metadata(target_path).await.is_ok() {
            let _ = tokio::fs::remove_file(target_path).await;
        }
        tokio::fs::rename(partial_path, target_path).await?;
        Ok(downloaded)
    }
}

#[async_trait]
impl FetchEngine for HttpMediaEngine {
    fn name(&self) -> &'static str {
        "http-media"
    }

    fn can_handle(&self, target: &Target, format: &FormatSpec) -> u8 {
        let Ok(url) = Url::parse(target.url()) else { return 0 };
        if url.scheme() != "http" && url.scheme() != "https" {
            return 0;
        }
        let Some(ext) = Self::media_extension(&url) else { return 0 };
        let family = match format.media_kind() {
            MediaKind::Video => VIDEO_EXTENSIONS,
            MediaKind::Audio => AUDIO_EXTENSIONS,
        };
        if family.contains(&ext.as_str()) {
            80
        } else {
            0
        }
    }

    async fn fetch(
        &self,
        target: &Target,
        req: &FetchRequest,
        ctx: &DriverContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        let url = Url::parse(target.url())
            .map_err(|e| FetchError::Unavailable(format!("invalid url {}: {}", target.url(), e)))?;
        let filename = Self::file_name(&url);
        let target_path = req.output_dir.join(&filename);
        let partial_path = req.output_dir.join(format!("{}.partial", filename));
        let title = MediaTitle::named(filename);

        match self.transfer(&url, &target_path, &partial_path, &title, ctx, sink).await {
            Ok(downloaded) => {
                sink.emit(ProgressEvent::Finished {
                    total_bytes: Some(downloaded),
                    downloaded_bytes: Some(downloaded),
                    title,
                    postprocessor: None,
                });
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial_path).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Recorder {
        fn emit(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let mut head = Vec::new();
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.write_all(body).await.unwrap();
            let _ = sock.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn engine() -> HttpMediaEngine {
        HttpMediaEngine::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    fn quick_ctx() -> DriverContext {
        DriverContext { retries: 0, timeout_secs: 5, ..DriverContext::default() }
    }

    #[test]
    fn claims_only_matching_media_family() {
        let e = HttpMediaEngine::new();
        assert_eq!(e.can_handle(&Target::new("https://cdn/x/clip.MP4"), &FormatSpec::BestVideo), 80);
        assert_eq!(e.can_handle(&Target::new("https://cdn/x/song.mp3"), &FormatSpec::AudioOnly), 80);
        assert_eq!(e.can_handle(&Target::new("https://cdn/x/song.mp3"), &FormatSpec::BestVideo), 0);
        for other in ["m4a", "flac", "wav", "ogg", "opus"] {
            let t = Target::new(format!("https://cdn/x/song.{}", other));
            assert_eq!(e.can_handle(&t, &FormatSpec::AudioOnly), 0, "{} needs conversion", other);
        }
        assert_eq!(e.can_handle(&Target::new("https://cdn/watch?v=1"), &FormatSpec::BestVideo), 0);
        assert_eq!(e.can_handle(&Target::new("ftp://cdn/x/clip.mp4"), &FormatSpec::BestVideo), 0);
    }

    #[test]
    fn status_classification() {
        assert!(matches!(FetchError::from(HttpEngineError::Status(StatusCode::NOT_FOUND)), FetchError::Unavailable(_)));
        assert!(matches!(FetchError::from(HttpEngineError::Status(StatusCode::BAD_GATEWAY)), FetchError::Network(_)));
        assert!(matches!(FetchError::from(HttpEngineError::Status(StatusCode::IM_A_TEAPOT)), FetchError::Unknown(_)));
        assert!(matches!(FetchError::from(HttpEngineError::Stalled(5)), FetchError::Network(_)));
    }

    #[tokio::test]
    async fn streams_into_output_dir() {
        let base = serve_once("200 OK", b"hello media").await;
        let dir = tempfile::tempdir().unwrap();
        let req = FetchRequest { output_dir: dir.path().to_path_buf(), format: FormatSpec::BestVideo };
        let sink = Recorder::default();

        engine()
            .fetch(&Target::new(format!("{}/media/clip.mp4", base)), &req, &quick_ctx(), &sink)
            .await
            .unwrap();

        let saved = std::fs::read(dir.path().join("clip.mp4")).unwrap();
        assert_eq!(saved, b"hello media");
        assert!(!dir.path().join("clip.mp4.partial").exists());

        let events = sink.0.lock().unwrap();
        assert!(matches!(events.first(), Some(ProgressEvent::Downloading { .. })));
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Finished {
                total_bytes: Some(11),
                downloaded_bytes: Some(11),
                title: MediaTitle::named("clip.mp4"),
                postprocessor: None,
            })
        );
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let base = serve_once("404 Not Found", b"").await;
        let dir = tempfile::tempdir().unwrap();
        let req = FetchRequest { output_dir: PathBuf::from(dir.path()), format: FormatSpec::AudioOnly };

        let err = engine()
            .fetch(&Target::new(format!("{}/gone.mp3", base)), &req, &quick_ctx(), &Recorder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
        assert!(!dir.path().join("gone.mp3.partial").exists());
    }
}

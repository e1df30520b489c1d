//! Machine-readable progress lines requested from yt-dlp via `--progress-template`,
//! and classification of its error output.

use crate::core::error::FetchError;
use crate::core::events::{MediaTitle, ProgressEvent};

const DOWNLOAD_MARK: &str = "[zenith:dl]";
const POSTPROCESS_MARK: &str = "[zenith:pp]";

/// Fields are tab separated; the title goes last so stray tabs in it survive.
pub fn download_template() -> String {
    format!(
        "download:{DOWNLOAD_MARK}\t%(progress.status)s\t%(progress.downloaded_bytes)s\t%(progress.total_bytes)s\t%(progress.total_bytes_estimate)s\t%(progress._speed_str)s\t%(progress._eta_str)s\t%(info.playlist_index)s\t%(info.n_entries)s\t%(info.title)s"
    )
}

pub fn postprocess_template() -> String {
    format!(
        "postprocess:{POSTPROCESS_MARK}\t%(progress.status)s\t%(progress.postprocessor)s\t%(info.playlist_index)s\t%(info.n_entries)s\t%(info.title)s"
    )
}

pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(DOWNLOAD_MARK) {
        let mut f = rest.strip_prefix('\t')?.splitn(9, '\t');
        let status = f.next()?.trim();
        let downloaded = number(f.next());
        let total = number(f.next());
        let estimate = number(f.next());
        let speed = text(f.next());
        let eta = text(f.next());
        let title = MediaTitle {
            playlist_index: number(f.next()).map(|n| n as u32),
            playlist_count: number(f.next()).map(|n| n as u32),
            title: text(f.next()),
        };

        return match status {
            "downloading" => Some(ProgressEvent::Downloading {
                downloaded_bytes: downloaded.unwrap_or(0),
                total_bytes: total,
                total_bytes_estimate: estimate,
                speed,
                eta,
                title,
            }),
            "finished" => Some(ProgressEvent::Finished {
                total_bytes: total,
                downloaded_bytes: downloaded,
                title,
                postprocessor: None,
            }),
            _ => None,
        };
    }

    if let Some(rest) = line.strip_prefix(POSTPROCESS_MARK) {
        let mut f = rest.strip_prefix('\t')?.splitn(5, '\t');
        let status = f.next()?.trim();
        let postprocessor = text(f.next()).unwrap_or_else(|| "postprocessor".to_string());
        let title = MediaTitle {
            playlist_index: number(f.next()).map(|n| n as u32),
            playlist_count: number(f.next()).map(|n| n as u32),
            title: text(f.next()),
        };

        // only completed stages are reported; "started"/"processing" carry nothing new
        if status == "finished" {
            return Some(ProgressEvent::Finished {
                total_bytes: None,
                downloaded_bytes: None,
                title,
                postprocessor: Some(postprocessor),
            });
        }
    }

    None
}

fn text(field: Option<&str>) -> Option<String> {
    let s = field?.trim();
    if s.is_empty() || s == "NA" || s == "None" || s.starts_with("Unknown") {
        None
    } else {
        Some(s.to_string())
    }
}

fn number(field: Option<&str>) -> Option<u64> {
    let s = text(field)?;
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "is not available",
    "has been removed",
    "unsupported url",
    "http error 404",
    "http error 410",
    "http error 403",
    "members-only",
    "sign in to confirm your age",
    "requested format is not available",
    "does not exist",
    "account has been terminated",
];

const NETWORK_MARKERS: &[&str] = &[
    "unable to download webpage",
    "unable to download video data",
    "timed out",
    "connection reset",
    "connection refused",
    "temporary failure in name resolution",
    "name or service not known",
    "getaddrinfo",
    "network is unreachable",
    "urlopen error",
    "http error 5",
    "ssl",
];

/// Picks the most telling line from yt-dlp's stderr and maps it onto a fetch error kind.
pub fn classify_failure(stderr_tail: &[String], exit_code: Option<i32>) -> FetchError {
    let message = stderr_tail
        .iter()
        .rev()
        .find(|l| l.trim_start().starts_with("ERROR:"))
        .or_else(|| stderr_tail.iter().rev().find(|l| !l.trim().is_empty()))
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| match exit_code {
            Some(code) => format!("yt-dlp exited with status {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        });

    let lower = message.to_ascii_lowercase();
    if UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        FetchError::Unavailable(message)
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        FetchError::Network(message)
    } else {
        FetchError::Unknown(message)
    }
}

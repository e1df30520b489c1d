use crate::core::events::ProgressEvent;

/// What the dashboard shows for the target currently being fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    /// Always within `[0, 1]`.
    pub fraction: f64,
    pub title: Option<String>,
    pub downloaded: Option<u64>,
    pub total: Option<u64>,
    pub speed: String,
    pub eta: String,
    pub complete: bool,
}

impl Default for ProgressView {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            title: None,
            downloaded: None,
            total: None,
            speed: "-".to_string(),
            eta: "-".to_string(),
            complete: false,
        }
    }
}

impl ProgressView {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        if let Some(title) = event.title().display() {
            self.title = Some(title);
        }

        match event {
            ProgressEvent::Downloading {
                downloaded_bytes,
                total_bytes,
                total_bytes_estimate,
                speed,
                eta,
                ..
            } => {
                self.complete = false;
                self.speed = speed.clone().unwrap_or_else(|| "-".to_string());
                self.eta = eta.clone().unwrap_or_else(|| "-".to_string());
                self.downloaded = Some(*downloaded_bytes);

                let total = total_bytes.or(*total_bytes_estimate).filter(|t| *t > 0);
                if let Some(t) = total {
                    self.total = Some(t);
                    self.fraction = (*downloaded_bytes as f64 / t as f64).clamp(0.0, 1.0);
                }
            }
            ProgressEvent::Finished { total_bytes, downloaded_bytes, .. } if event.is_item_terminal() => {
                self.complete = true;
                self.fraction = 1.0;
                if let Some(t) = total_bytes.or(*downloaded_bytes) {
                    self.downloaded = Some(t);
                    self.total = Some(t);
                }
                self.speed = "complete".to_string();
                self.eta = "0s".to_string();
            }
            ProgressEvent::Finished { .. } => {}
        }
    }
}

pub fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::MediaTitle;

    fn downloading(done: u64, total: Option<u64>, estimate: Option<u64>, title: MediaTitle) -> ProgressEvent {
        ProgressEvent::Downloading {
            downloaded_bytes: done,
            total_bytes: total,
            total_bytes_estimate: estimate,
            speed: Some("1.00MiB/s".into()),
            eta: Some("00:03".into()),
            title,
        }
    }

    fn finished(pp: Option<&str>) -> ProgressEvent {
        ProgressEvent::Finished {
            total_bytes: Some(200),
            downloaded_bytes: None,
            title: MediaTitle::default(),
            postprocessor: pp.map(str::to_string),
        }
    }

    #[test]
    fn quarter_progress() {
        let mut v = ProgressView::default();
        v.apply(&downloading(50, Some(200), None, MediaTitle::default()));
        assert_eq!(v.fraction, 0.25);
        assert_eq!(v.speed, "1.00MiB/s");
        assert_eq!(v.eta, "00:03");
    }

    #[test]
    fn estimate_is_used_when_total_is_unknown() {
        let mut v = ProgressView::default();
        v.apply(&downloading(30, None, Some(120), MediaTitle::default()));
        assert_eq!(v.fraction, 0.25);
        assert_eq!(v.total, Some(120));
    }

    #[test]
    fn unknown_total_keeps_fraction() {
        let mut v = ProgressView::default();
        v.apply(&downloading(30, Some(60), None, MediaTitle::default()));
        v.apply(&downloading(40, None, None, MediaTitle::default()));
        assert_eq!(v.fraction, 0.5);
        assert_eq!(v.downloaded, Some(40));
    }

    #[test]
    fn overshoot_is_clamped() {
        let mut v = ProgressView::default();
        v.apply(&downloading(300, Some(200), None, MediaTitle::default()));
        assert_eq!(v.fraction, 1.0);
    }

    #[test]
    fn postprocessor_finish_is_not_completion() {
        let mut v = ProgressView::default();
        v.apply(&downloading(50, Some(200), None, MediaTitle::default()));
        v.apply(&finished(Some("FFmpegExtractAudio")));
        assert_eq!(v.fraction, 0.25);
        assert!(!v.complete);
    }

    #[test]
    fn plain_finish_is_completion() {
        let mut v = ProgressView::default();
        v.apply(&downloading(50, Some(200), None, MediaTitle::default()));
        v.apply(&finished(None));
        assert_eq!(v.fraction, 1.0);
        assert!(v.complete);
        assert_eq!(v.total, Some(200));
        assert_eq!(v.speed, "complete");
        assert_eq!(v.eta, "0s");
    }

    #[test]
    fn missing_title_keeps_previous() {
        let mut v = ProgressView::default();
        let t = MediaTitle { title: Some("Song".into()), playlist_index: Some(3), playlist_count: Some(7) };
        v.apply(&downloading(1, Some(10), None, t));
        assert_eq!(v.title.as_deref(), Some("(3/7) Song"));

        v.apply(&downloading(2, Some(10), None, MediaTitle::default()));
        assert_eq!(v.title.as_deref(), Some("(3/7) Song"));
    }

    #[test]
    fn bytes_formatting() {
        assert_eq!(fmt_bytes(512), "512B");
        assert_eq!(fmt_bytes(2048), "2.00KiB");
        assert_eq!(fmt_bytes(5 * 1024 * 1024), "5.00MiB");
    }
}

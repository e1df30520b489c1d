/// Simple localization support for ZenithDownloader.
/// Locale can be selected via the `--locale` CLI flag (e.g. `--locale zh`).
use crate::core::error::ResolveError;
use crate::core::events::StatusMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

/// Templates use `{name}` placeholders filled by [`Messages::status`].
pub struct Messages {
    pub by: &'static str,
    pub output_label: &'static str,
    pub target_label: &'static str,
    pub status_prefix: &'static str,
    pub error_prefix: &'static str,
    pub summary_header: &'static str,
    pub status_done: &'static str,
    pub status_failed: &'static str,
    pub post_processed: &'static str,
    pub eta_label: &'static str,
    pub paste_hint: &'static str,
    standby: &'static str,
    processing: &'static str,
    skipped: &'static str,
    halt_requested: &'static str,
    halted: &'static str,
    completed: &'static str,
    completed_with_skips: &'static str,
    critical: &'static str,
    too_many: &'static str,
    no_targets: &'static str,
    bulk_missing: &'static str,
    bulk_unreadable: &'static str,
}

pub static EN: Messages = Messages {
    by: "By",
    output_label: "Output",
    target_label: "TARGET",
    status_prefix: "SYS.STATUS",
    error_prefix: "SYS.ERROR",
    summary_header: "Summary",
    status_done: "done",
    status_failed: "failed",
    post_processed: "post-processed",
    eta_label: "eta",
    paste_hint: "Paste links, one per line, then press Ctrl-D:",
    standby: "standby...",
    processing: "Processing target {index} of {total}: {url}",
    skipped: "Target {index} skipped ({url}): {error}",
    halt_requested: "Halting... awaiting current file to finish.",
    halted: "Download halted by user. {processed} targets processed.",
    completed: "All {total} transfers complete.",
    completed_with_skips: "All {total} targets processed, {failed} skipped.",
    critical: "CRITICAL ERROR: {message}",
    too_many: "Max {limit} links/playlists in manual mode (got {found}).",
    no_targets: "No target links provided.",
    bulk_missing: "{path} not found.",
    bulk_unreadable: "{path} could not be read: {reason}",
};

pub static ZH: Messages = Messages {
    by: "作者",
    output_label: "输出目录",
    target_label: "目标",
    status_prefix: "状态",
    error_prefix: "错误",
    summary_header: "摘要",
    status_done: "完成",
    status_failed: "失败",
    post_processed: "后处理完成",
    eta_label: "剩余",
    paste_hint: "请粘贴链接（每行一个），然后按 Ctrl-D：",
    standby: "待命...",
    processing: "正在处理第 {index}/{total} 个目标：{url}",
    skipped: "已跳过第 {index} 个目标（{url}）：{error}",
    halt_requested: "正在停止... 等待当前文件完成。",
    halted: "用户已停止下载，已处理 {processed} 个目标。",
    completed: "全部 {total} 个下载已完成。",
    completed_with_skips: "全部 {total} 个目标已处理，跳过 {failed} 个。",
    critical: "严重错误：{message}",
    too_many: "手动模式最多 {limit} 个链接（当前 {found} 个）。",
    no_targets: "未提供任何链接。",
    bulk_missing: "未找到 {path}。",
    bulk_unreadable: "无法读取 {path}：{reason}",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}

/// Single pass over the template, so braces inside substituted values are left alone.
fn fill(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let value = tail
            .find('}')
            .and_then(|close| vars.iter().find(|(k, _)| *k == &tail[..close]).map(|(_, v)| (close, v)));
        match value {
            Some((close, v)) => {
                out.push_str(v);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

impl Messages {
    pub fn status(&self, msg: &StatusMessage) -> String {
        match msg {
            StatusMessage::Standby => self.standby.to_string(),
            StatusMessage::Processing { index, total, url } => fill(
                self.processing,
                &[("index", index.to_string()), ("total", total.to_string()), ("url", url.clone())],
            ),
            StatusMessage::TargetSkipped { index, url, error } => fill(
                self.skipped,
                &[("index", index.to_string()), ("url", url.clone()), ("error", error.to_string())],
            ),
            StatusMessage::HaltRequested => self.halt_requested.to_string(),
            StatusMessage::Halted { processed } => fill(self.halted, &[("processed", processed.to_string())]),
            StatusMessage::Completed { total, failed: 0 } => fill(self.completed, &[("total", total.to_string())]),
            StatusMessage::Completed { total, failed } => fill(
                self.completed_with_skips,
                &[("total", total.to_string()), ("failed", failed.to_string())],
            ),
            StatusMessage::Critical { message } => fill(self.critical, &[("message", message.clone())]),
            StatusMessage::Resolution(e) => self.resolution(e),
        }
    }

    fn resolution(&self, e: &ResolveError) -> String {
        match e {
            ResolveError::TooManyTargets { limit, found } => fill(
                self.too_many,
                &[("limit", limit.to_string()), ("found", found.to_string())],
            ),
            ResolveError::NoTargets => self.no_targets.to_string(),
            ResolveError::SourceFileMissing { path } => {
                fill(self.bulk_missing, &[("path", path.display().to_string())])
            }
            ResolveError::SourceUnreadable { path, reason } => fill(
                self.bulk_unreadable,
                &[("path", path.display().to_string()), ("reason", reason.clone())],
            ),
        }
    }

    /// Prefix for a status line: errors are flagged so they stand out.
    pub fn prefix_for(&self, msg: &StatusMessage) -> &'static str {
        match msg {
            StatusMessage::Critical { .. } | StatusMessage::Resolution(_) | StatusMessage::TargetSkipped { .. } => {
                self.error_prefix
            }
            _ => self.status_prefix,
        }
    }
}

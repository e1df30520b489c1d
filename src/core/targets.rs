use crate::core::error::ResolveError;
use crate::core::model::Target;
use std::path::{Path, PathBuf};

const COMMENT_MARKER: char = '#';

/// Where the link list comes from. The two modes are mutually exclusive.
#[derive(Debug, Clone)]
pub enum TargetSource {
    Manual(String),
    Bulk(PathBuf),
}

impl TargetSource {
    pub async fn resolve(&self, manual_limit: usize) -> Result<Vec<Target>, ResolveError> {
        match self {
            TargetSource::Manual(text) => resolve_manual(text, manual_limit),
            TargetSource::Bulk(path) => resolve_bulk(path).await,
        }
    }
}

pub fn resolve_manual(text: &str, limit: usize) -> Result<Vec<Target>, ResolveError> {
    let targets: Vec<Target> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(Target::new)
        .collect();

    if targets.len() > limit {
        return Err(ResolveError::TooManyTargets { limit, found: targets.len() });
    }
    if targets.is_empty() {
        return Err(ResolveError::NoTargets);
    }
    Ok(targets)
}

pub async fn resolve_bulk(path: &Path) -> Result<Vec<Target>, ResolveError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ResolveError::SourceFileMissing { path: path.to_path_buf() });
        }
        Err(e) => {
            return Err(ResolveError::SourceUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let targets: Vec<Target> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(COMMENT_MARKER))
        .map(Target::new)
        .collect();

    if targets.is_empty() {
        return Err(ResolveError::NoTargets);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(targets: &[Target]) -> Vec<&str> {
        targets.iter().map(|t| t.url()).collect()
    }

    #[test]
    fn manual_trims_and_drops_blank_lines() {
        let t = resolve_manual("  https://a/1 \n\n\r\nhttps://a/2\n   \n", 5).unwrap();
        assert_eq!(urls(&t), vec!["https://a/1", "https://a/2"]);
    }

    #[test]
    fn manual_over_limit_produces_nothing() {
        let text = (1..=6).map(|i| format!("https://a/{i}")).collect::<Vec<_>>().join("\n");
        let err = resolve_manual(&text, 5).unwrap_err();
        assert_eq!(err, ResolveError::TooManyTargets { limit: 5, found: 6 });
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn manual_exactly_at_limit_is_accepted() {
        let text = (1..=5).map(|i| format!("https://a/{i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(resolve_manual(&text, 5).unwrap().len(), 5);
    }

    #[test]
    fn manual_empty_input() {
        assert_eq!(resolve_manual(" \n\n", 5).unwrap_err(), ResolveError::NoTargets);
    }

    #[tokio::test]
    async fn bulk_skips_comments_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");
        std::fs::write(&path, "# comment\n\nhttps://example/a\nhttps://example/b\n").unwrap();

        let t = resolve_bulk(&path).await.unwrap();
        assert_eq!(urls(&t), vec!["https://example/a", "https://example/b"]);
    }

    #[tokio::test]
    async fn bulk_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        let err = resolve_bulk(&path).await.unwrap_err();
        assert_eq!(err, ResolveError::SourceFileMissing { path });
    }

    #[tokio::test]
    async fn bulk_only_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");
        std::fs::write(&path, "# a\n#b\n\n").unwrap();
        assert_eq!(resolve_bulk(&path).await.unwrap_err(), ResolveError::NoTargets);
    }

    #[tokio::test]
    async fn bulk_ignores_manual_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");
        let body = (1..=8).map(|i| format!("https://a/{i}\n")).collect::<String>();
        std::fs::write(&path, body).unwrap();

        let t = TargetSource::Bulk(path).resolve(5).await.unwrap();
        assert_eq!(t.len(), 8);
    }
}

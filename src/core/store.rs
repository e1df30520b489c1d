use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remembers the last chosen output directory in a one-line text file.
#[derive(Debug, Clone)]
pub struct OutputPathStore {
    file: PathBuf,
}

impl OutputPathStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    /// The saved directory if it still exists, otherwise `fallback`.
    pub async fn load_or(&self, fallback: &Path) -> PathBuf {
        match tokio::fs::read_to_string(&self.file).await {
            Ok(raw) => {
                let saved = raw.trim();
                if !saved.is_empty() && tokio::fs::metadata(saved).await.map(|m| m.is_dir()).unwrap_or(false) {
                    return PathBuf::from(saved);
                }
                debug!(file = %self.file.display(), saved, "saved output path unusable");
            }
            Err(e) => {
                debug!(file = %self.file.display(), error = %e, "no saved output path");
            }
        }
        fallback.to_path_buf()
    }

    pub async fn save(&self, dir: &Path) -> anyhow::Result<()> {
        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create_dir_all {}", parent.display()))?;
        }
        tokio::fs::write(&self.file, dir.to_string_lossy().as_bytes())
            .await
            .with_context(|| format!("write {}", self.file.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let chosen = dir.path().join("media");
        std::fs::create_dir(&chosen).unwrap();

        let store = OutputPathStore::new(dir.path().join("last_dir.txt"));
        store.save(&chosen).await.unwrap();
        assert_eq!(store.load_or(Path::new("downloads")).await, chosen);
    }

    #[tokio::test]
    async fn vanished_directory_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputPathStore::new(dir.path().join("last_dir.txt"));
        store.save(&dir.path().join("gone")).await.unwrap();
        assert_eq!(store.load_or(Path::new("downloads")).await, PathBuf::from("downloads"));
    }

    #[tokio::test]
    async fn missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputPathStore::new(dir.path().join("never_written.txt"));
        assert_eq!(store.load_or(Path::new("downloads")).await, PathBuf::from("downloads"));
    }
}

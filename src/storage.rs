//! Output artifact store writing generated images to collision-free paths

use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Writes generated images under a base directory with UUID filenames
pub struct OutputStore {
    base_path: PathBuf,
}

impl OutputStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Ensure the output directory exists
    pub async fn ensure_dir(&self) -> Result<()> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)
                .await
                .map_err(AppError::Io)?;
            debug!(path = ?self.base_path, "created output directory");
        }
        Ok(())
    }

    /// Write PNG bytes to a fresh path and return it
    pub async fn save_png(&self, data: &[u8]) -> Result<String> {
        self.ensure_dir().await?;

        let filename = format!("{}.png", Uuid::new_v4());
        let file_path = self.base_path.join(&filename);

        fs::write(&file_path, data).await.map_err(AppError::Io)?;
        debug!(path = ?file_path, size = data.len(), "saved output image");

        Ok(file_path.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_png_creates_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());

        let first = store.save_png(&[1, 2, 3]).await.unwrap();
        let second = store.save_png(&[4, 5, 6]).await.unwrap();
        assert_ne!(first, second);

        let bytes = tokio::fs::read(&first).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("api").join("out");
        let store = OutputStore::new(&nested);

        let path = store.save_png(&[9]).await.unwrap();
        assert!(path.contains("out"));
        assert!(nested.exists());
    }
}

//! Storage for uploaded meeting recordings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Keeps a copy of an uploaded recording and returns where it lives.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn save(&self, source: &Path, file_name: &str) -> Result<String>;
}

/// Media store backed by a directory on the local disk.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Picks a target path that does not collide with an existing file.
    /// The file name is reduced to its final component first, so callers
    /// cannot escape the store root.
    fn unique_target(&self, file_name: &str) -> PathBuf {
        let file_name = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.mp3");

        let candidate = self.root.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("upload");
        let extension = Path::new(file_name).extension().and_then(|ext| ext.to_str());

        let mut counter = 1u32;
        loop {
            let name = match extension {
                Some(ext) => format!("{}-{}.{}", stem, counter, ext),
                None => format!("{}-{}", stem, counter),
            };
            let candidate = self.root.join(name);
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, source: &Path, file_name: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .context("Failed to create media directory")?;

        let target = self.unique_target(file_name);
        tokio::fs::copy(source, &target)
            .await
            .context("Failed to store media file")?;

        info!("Stored media file at {:?}", target);
        Ok(target.to_string_lossy().into_owned())
    }
}

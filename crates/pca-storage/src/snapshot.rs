use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub content_hash: String,
    pub path: PathBuf,
    pub byte_size: usize,
    pub deduplicated: bool,
}

#[derive(Debug, Clone)]
pub struct PageSnapshotStore {
    root: PathBuf,
}

impl PageSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn content_hash(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub fn snapshot_path(&self, captured_at: DateTime<Utc>, label: &str, content_hash: &str) -> PathBuf {
        self.root
            .join(captured_at.format("%Y%m%d").to_string())
            .join(slug(label))
            .join(format!("{content_hash}.html"))
    }

    /// Writes through a temp file and a rename so readers never see a partial page.
    pub async fn store_html(
        &self,
        captured_at: DateTime<Utc>,
        label: &str,
        html: &str,
    ) -> anyhow::Result<StoredSnapshot> {
        let bytes = html.as_bytes();
        let content_hash = Self::content_hash(bytes);
        let path = self.snapshot_path(captured_at, label, &content_hash);
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;

        let stored = |deduplicated| StoredSnapshot {
            content_hash: content_hash.clone(),
            path: path.clone(),
            byte_size: bytes.len(),
            deduplicated,
        };

        if fs::try_exists(&path)
            .await
            .with_context(|| format!("checking snapshot path {}", path.display()))?
        {
            return Ok(stored(true));
        }

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("creating {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!("renaming {} -> {}", temp_path.display(), path.display())
            });
        }
        Ok(stored(false))
    }
}

fn slug(label: &str) -> String {
    let slug = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "page".to_string()
    } else {
        slug
    }
}

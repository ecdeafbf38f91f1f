//! Local JSON file [`HistoryStore`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::HistoryStore;
use crate::models::{HistoryDecodeError, HistoryDocument, HistoryItem};

pub struct FileHistoryStore {
    path: PathBuf,
    max_items: usize,
}

impl FileHistoryStore {
    pub fn new(path: PathBuf, max_items: usize) -> Self {
        Self { path, max_items }
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    fn backend(&self) -> &str {
        "file"
    }

    async fn load(&self) -> HistoryDocument {
        let body = match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => body,
            Err(_) => {
                tracing::info!(path = %self.path.display(), "history_skip");
                return HistoryDocument::default();
            }
        };
        match HistoryDocument::parse(&body) {
            Ok(doc) => doc,
            Err(HistoryDecodeError::InvalidJson) => {
                tracing::warn!(
                    path = %self.path.display(),
                    action = "reinit",
                    "history_invalid_json"
                );
                HistoryDocument::default()
            }
            Err(HistoryDecodeError::MissingItems) => {
                tracing::warn!(
                    path = %self.path.display(),
                    action = "reinit",
                    "history_invalid_structure"
                );
                HistoryDocument::default()
            }
        }
    }

    async fn save(&self, item: HistoryItem, existing: &HistoryDocument) -> Result<()> {
        let next = existing.with_item(item, self.max_items);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&next)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))?;
        Ok(())
    }
}

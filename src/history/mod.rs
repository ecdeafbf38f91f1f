//! History store abstraction.
//!
//! The [`HistoryStore`] trait hides where the rolling history lives. The
//! production adapter keeps the JSON document in the body of one GitHub
//! issue; a local file and an in-memory backend implement the same
//! contract.
//!
//! # Contract
//!
//! | Method | Behaviour |
//! |--------|-----------|
//! | [`load`](HistoryStore::load) | Never fails: any problem degrades to an empty document |
//! | [`save`](HistoryStore::save) | Prepends the item, caps the list, writes the whole document |
//!
//! There is no locking. Two overlapping runs both read, both write, and
//! the last write wins.

pub mod file;
pub mod github;
pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::{Config, Credentials};
use crate::models::{HistoryDocument, HistoryItem};

pub use file::FileHistoryStore;
pub use github::{GitHubHistoryStore, RepoRef};
pub use memory::InMemoryHistoryStore;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Short backend name for logs (`"github"`, `"file"`, `"memory"`).
    fn backend(&self) -> &str;

    /// Read the current document.
    async fn load(&self) -> HistoryDocument;

    /// Prepend `item` to `existing` and persist the result.
    async fn save(&self, item: HistoryItem, existing: &HistoryDocument) -> Result<()>;
}

/// Create the store selected by `history.backend`.
pub fn create_history_store(
    config: &Config,
    credentials: &Credentials,
) -> Result<Box<dyn HistoryStore>> {
    match config.history.backend.as_str() {
        "github" => Ok(Box::new(GitHubHistoryStore::new(
            &config.tracker,
            &config.history,
            credentials.tracker_token.clone(),
            credentials.tracker_repo.as_deref(),
        )?)),
        "file" => Ok(Box::new(FileHistoryStore::new(
            config.history.file.clone(),
            config.history.max_items,
        ))),
        other => bail!("Unknown history backend: {}", other),
    }
}

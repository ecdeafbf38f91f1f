//! In-memory [`HistoryStore`] for tests and dry runs.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::HistoryStore;
use crate::models::{HistoryDocument, HistoryItem};

pub struct InMemoryHistoryStore {
    doc: RwLock<HistoryDocument>,
    max_items: usize,
}

impl InMemoryHistoryStore {
    pub fn new(max_items: usize) -> Self {
        Self::with_document(HistoryDocument::default(), max_items)
    }

    pub fn with_document(doc: HistoryDocument, max_items: usize) -> Self {
        Self {
            doc: RwLock::new(doc),
            max_items,
        }
    }

    /// The current stored document.
    pub fn snapshot(&self) -> HistoryDocument {
        self.doc.read().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> HistoryDocument {
        self.snapshot()
    }

    async fn save(&self, item: HistoryItem, existing: &HistoryDocument) -> Result<()> {
        let next = existing.with_item(item, self.max_items);
        *self.doc.write().unwrap() = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_replaces_whole_document() {
        let store = InMemoryHistoryStore::new(2);
        for title in ["a", "b", "c"] {
            let existing = store.load().await;
            let item = HistoryItem {
                title: title.to_string(),
                ..Default::default()
            };
            store.save(item, &existing).await.unwrap();
        }
        let titles: Vec<_> = store
            .snapshot()
            .items
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = InMemoryHistoryStore::new(10);
        let stale = store.load().await;
        let item = |t: &str| HistoryItem {
            title: t.to_string(),
            ..Default::default()
        };
        store.save(item("first"), &stale).await.unwrap();
        store.save(item("second"), &stale).await.unwrap();
        assert_eq!(store.snapshot().items.len(), 1);
        assert_eq!(store.snapshot().items[0].title, "second");
    }
}

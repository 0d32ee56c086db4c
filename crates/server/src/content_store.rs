//! The key→blob content store consumed but not specified internally (spec
//! §6 "Content store"). The broker calls `get` at first-session creation to
//! hydrate a document's initial text; saving is out of scope for the core.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, ServerError};

#[derive(Debug, Clone)]
pub struct StoredContent {
    pub content: String,
    pub mime: String,
    pub size: usize,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<StoredContent>;
    async fn save(&self, path: &str, content: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Default in-memory store: documents that don't exist yet hydrate as
/// empty text rather than erroring, since `start_editing` is expected to
/// work against a brand-new path.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    files: RwLock<HashMap<String, String>>,
}

impl InMemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get(&self, path: &str) -> Result<StoredContent> {
        let content = self
            .files
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_default();
        Ok(StoredContent {
            size: content.len(),
            content,
            mime: "text/plain".to_string(),
        })
    }

    async fn save(&self, path: &str, content: &str) -> Result<()> {
        self.files
            .write()
            .await
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.read().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.files
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ServerError::Validation {
                what: "content_store",
                detail: format!("no such path: {path}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_path_hydrates_as_empty() {
        let store = InMemoryContentStore::new();
        let got = store.get("new/doc.txt").await.unwrap();
        assert_eq!(got.content, "");
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = InMemoryContentStore::new();
        store.save("a.txt", "hello").await.unwrap();
        assert!(store.exists("a.txt").await.unwrap());
        assert_eq!(store.get("a.txt").await.unwrap().content, "hello");
    }
}

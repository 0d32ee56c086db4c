//! The pluggable key-value backend consumed by the history service (spec
//! §4.7 "Backends"), plus the in-memory default implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// A small key-value interface: a scalar store (`set`/`get`), an append-only
/// list store (`lpush`/`lrange`), and pub/sub (`publish`) for the two topics
/// the history service announces on. Implementations backed by Redis,
/// sqlite, or anything else plug in here; [`InMemoryBackend`] is the default
/// so the service works with no external infrastructure.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Push `value` onto the front of the list at `key`, matching Redis's
    /// `LPUSH` so a newest-first `lrange` is the default read pattern.
    async fn lpush(&self, key: &str, value: String) -> Result<()>;

    /// Read `[start, stop]` (inclusive, Redis-style) of the list at `key`,
    /// newest-first.
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// Best-effort fan-out notification; no subscriber is required to be
    /// listening. The in-memory backend simply drops the message.
    async fn publish(&self, topic: &str, message: String) -> Result<()>;
}

/// Default backend: everything lives in process memory and is lost on
/// restart. Adequate for development and for deployments that don't need
/// history to survive a restart (history is explicitly best-effort per
/// spec §1 Non-goals).
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    kv: RwLock<HashMap<String, String>>,
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl HistoryBackend for InMemoryBackend {
    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.kv.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv.read().await.get(key).cloned())
    }

    async fn lpush(&self, key: &str, value: String) -> Result<()> {
        self.lists
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .push_front(value);
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let lists = self.lists.read().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as isize;
        let norm = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len)
            }
        };
        let start = norm(start);
        let stop = norm(stop).min(len - 1);
        if start > stop || len == 0 {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    async fn publish(&self, _topic: &str, _message: String) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get_round_trip() {
        let backend = InMemoryBackend::new();
        backend.set("k", "v".into()).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".into()));
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lpush_and_lrange_are_newest_first() {
        let backend = InMemoryBackend::new();
        backend.lpush("l", "a".into()).await.unwrap();
        backend.lpush("l", "b".into()).await.unwrap();
        backend.lpush("l", "c".into()).await.unwrap();
        let all = backend.lrange("l", 0, -1).await.unwrap();
        assert_eq!(all, vec!["c".to_string(), "b".to_string(), "a".to_string()]);
    }
}

//! Session broker (C5): registry of edit sessions keyed by document path.
//! Creates, looks up, and destroys sessions; binds each new session to the
//! content store and history listener.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use collab_history::HistoryListener;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::content_store::ContentStore;
use crate::error::{Result, ServerError};
use crate::session::EditSession;

/// `sessions`/`by_path` are a read-mostly registry — looked up on every
/// message, written only on session create/destroy — so a
/// [`parking_lot::RwLock`] guards them directly (grounded in the teacher's
/// own registry lock choice for per-resource state, `ResourceStateManager`).
pub struct SessionBroker {
    sessions: RwLock<HashMap<Uuid, Arc<EditSession>>>,
    by_path: RwLock<HashMap<String, Uuid>>,
    content_store: Arc<dyn ContentStore>,
    history: Arc<dyn HistoryListener>,
    thresholds: ServerConfig,
    /// Set by [`Self::shutdown`]; once set, [`Self::get_or_create_session`]
    /// refuses to create or hydrate sessions (spec §5 shutdown drain).
    closed: AtomicBool,
}

impl SessionBroker {
    #[must_use]
    pub fn new(
        content_store: Arc<dyn ContentStore>,
        history: Arc<dyn HistoryListener>,
        thresholds: ServerConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_path: RwLock::new(HashMap::new()),
            content_store,
            history,
            thresholds,
            closed: AtomicBool::new(false),
        }
    }

    /// Look up the session already open for `path`, or hydrate and create
    /// one. Returns the session plus whether it was newly created.
    pub async fn get_or_create_session(&self, path: &str) -> Result<(Arc<EditSession>, bool)> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ServerError::ShuttingDown);
        }

        if let Some(id) = self.by_path.read().get(path).copied() {
            if let Some(session) = self.sessions.read().get(&id).cloned() {
                return Ok((session, false));
            }
        }

        let initial = self.content_store.get(path).await?;
        let session_id = Uuid::new_v4();
        let session = Arc::new(EditSession::new(
            session_id,
            path.to_string(),
            initial.content,
            self.history.clone(),
            self.thresholds.clone(),
        ));

        self.sessions.write().insert(session_id, session.clone());
        self.by_path.write().insert(path.to_string(), session_id);
        info!(%session_id, path, "edit session created");

        Ok((session, true))
    }

    #[must_use]
    pub fn get(&self, session_id: Uuid) -> Option<Arc<EditSession>> {
        self.sessions.read().get(&session_id).cloned()
    }

    pub fn get_or_not_found(&self, session_id: Uuid) -> Result<Arc<EditSession>> {
        self.get(session_id).ok_or(ServerError::SessionNotFound(session_id))
    }

    /// Remove a session from both registry maps. Any in-flight broadcast
    /// holding a clone of the removed `Arc<EditSession>` simply finishes
    /// talking to an orphaned session — it is a no-op from the broker's
    /// perspective since nothing can look the id up again.
    pub fn destroy_session(&self, session_id: Uuid) {
        let Some(session) = self.sessions.write().remove(&session_id) else {
            return;
        };
        self.by_path.write().remove(&session.file_path);
        info!(%session_id, path = %session.file_path, "edit session destroyed");
    }

    /// Phase one of the §5 shutdown drain: stop accepting new sessions and
    /// tell every live session to start rejecting new ops. Existing
    /// connections are left for the caller to tear down afterwards.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        for session in self.sessions.read().values() {
            session.mark_shutting_down();
        }
        info!("session broker refusing new sessions, existing sessions draining");
    }

    /// Spawns the idle-client reaper (spec §5 "Cancellation & timeouts"):
    /// periodically sweeps every open session for clients whose `last_seen`
    /// has exceeded the configured idle timeout, evicting them and
    /// destroying sessions that empty out as a result.
    pub fn spawn_reaper(self: Arc<Self>) -> JoinHandle<()> {
        let sweep_interval = Duration::from_secs(self.thresholds.client_idle_timeout_seconds.max(2) / 2);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                self.reap_idle_clients().await;
            }
        })
    }

    async fn reap_idle_clients(&self) {
        let sessions: Vec<(Uuid, Arc<EditSession>)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, session)| (*id, session.clone()))
            .collect();
        for (session_id, session) in sessions {
            if session
                .evict_idle_clients(self.thresholds.client_idle_timeout_seconds)
                .await
            {
                self.destroy_session(session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_store::InMemoryContentStore;
    use collab_history::NullHistoryListener;

    fn broker() -> SessionBroker {
        SessionBroker::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(NullHistoryListener),
            ServerConfig::default(),
        )
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_path() {
        let broker = broker();
        let (a, created_a) = broker.get_or_create_session("doc.txt").await.unwrap();
        let (b, created_b) = broker.get_or_create_session("doc.txt").await.unwrap();
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn destroyed_session_is_unreachable() {
        let broker = broker();
        let (session, _) = broker.get_or_create_session("doc.txt").await.unwrap();
        broker.destroy_session(session.session_id);
        assert!(broker.get(session.session_id).is_none());
        let (_, created_again) = broker.get_or_create_session("doc.txt").await.unwrap();
        assert!(created_again);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_sessions_and_drains_existing_ones() {
        let broker = broker();
        let (session, _) = broker.get_or_create_session("doc.txt").await.unwrap();
        broker.shutdown();

        let err = broker.get_or_create_session("other.txt").await.unwrap_err();
        assert!(matches!(err, ServerError::ShuttingDown));

        let op = ot_core::OperationBuilder::new().build();
        let err = session.apply_operation("a", 0, op).await.unwrap_err();
        assert!(matches!(err, ServerError::ShuttingDown));
    }

    #[tokio::test]
    async fn reaper_destroys_sessions_emptied_by_eviction() {
        let mut thresholds = ServerConfig::default();
        thresholds.client_idle_timeout_seconds = 1;
        let broker = Arc::new(SessionBroker::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(NullHistoryListener),
            thresholds,
        ));
        let (session, _) = broker.get_or_create_session("doc.txt").await.unwrap();
        session.subscribe("stale", false).await;

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;

        broker.reap_idle_clients().await;
        assert!(broker.get(session.session_id).is_none());
    }
}

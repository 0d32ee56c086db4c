//! Shared application state handed to every axum handler.

use std::sync::Arc;

use collab_history::HistoryService;

use crate::auth::Authenticator;
use crate::broker::SessionBroker;
use crate::config::AppConfig;
use crate::content_store::ContentStore;

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<SessionBroker>,
    pub authenticator: Arc<dyn Authenticator>,
    pub content_store: Arc<dyn ContentStore>,
    pub history: Arc<HistoryService>,
    pub config: AppConfig,
}

impl AppState {
    #[must_use]
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        content_store: Arc<dyn ContentStore>,
        history: Arc<HistoryService>,
        config: AppConfig,
    ) -> Self {
        let broker = Arc::new(SessionBroker::new(
            content_store.clone(),
            history.clone() as Arc<dyn collab_history::HistoryListener>,
            config.server,
        ));
        Self {
            broker,
            authenticator,
            content_store,
            history,
            config,
        }
    }
}

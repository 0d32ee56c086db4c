//! Process entry point: wires the in-memory collaborator defaults, the
//! history service, and the router, then serves over TCP.

use std::sync::Arc;

use collab_history::{HistoryService, InMemoryBackend};
use server::auth::InMemoryAuthenticator;
use server::content_store::InMemoryContentStore;
use server::{router, AppConfig, AppState};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // a global subscriber is already installed (e.g. under a test harness)
    }

    let config = AppConfig::from_env();

    let backend: Arc<dyn collab_history::HistoryBackend> = Arc::new(InMemoryBackend::new());
    let (history, history_worker) = HistoryService::spawn(
        backend,
        config.server.history_queue_capacity,
        config.server.use_patch_mode,
    );
    let history = Arc::new(history);

    let authenticator = Arc::new(InMemoryAuthenticator::new());
    let content_store = Arc::new(InMemoryContentStore::new());

    let state = AppState::new(authenticator, content_store, history.clone(), config.clone());
    let broker = state.broker.clone();
    let reaper = broker.clone().spawn_reaper();
    let app = router(state);

    info!("collaborative editing server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Two-phase drain (spec §5): the broker refuses new sessions and every
    // live session starts rejecting new ops, then the history service is
    // asked to close, then (already done, above) the transport is torn down.
    broker.shutdown();
    reaper.abort();
    drop(broker);

    match Arc::try_unwrap(history) {
        Ok(history) => history.close(history_worker).await,
        Err(history) => {
            warn!(
                refs = Arc::strong_count(&history),
                "history service still has live references at shutdown; skipping drain"
            );
        }
    }

    Ok(())
}

/// Resolves once Ctrl+C or (on Unix) SIGTERM is received, for
/// `axum::serve(..).with_graceful_shutdown(..)`.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, draining sessions");
}

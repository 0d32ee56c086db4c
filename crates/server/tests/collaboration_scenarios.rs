//! Integration tests reproducing the end-to-end scenarios from the
//! collaborative editing scenario catalogue, driven through the broker and
//! session layer rather than raw WebSocket bytes.

use std::sync::Arc;

use collab_common::ServerConfig;
use collab_history::NullHistoryListener;
use ot_core::OperationBuilder;
use server::broker::SessionBroker;
use server::content_store::{ContentStore, InMemoryContentStore};
use server::error::ServerError;

fn broker_with(config: ServerConfig) -> SessionBroker {
    SessionBroker::new(
        Arc::new(InMemoryContentStore::new()),
        Arc::new(NullHistoryListener),
        config,
    )
}

#[tokio::test]
async fn concurrent_inserts_at_same_position_converge() {
    let broker = broker_with(ServerConfig::default());
    let (session, _) = broker.get_or_create_session("doc.txt").await.unwrap();
    session.subscribe("a", false).await;
    session.subscribe("b", false).await;

    let a_op = OperationBuilder::new().insert("Hello").build();
    let applied_a = session.apply_operation("a", 0, a_op).await.unwrap();
    assert_eq!(applied_a.new_revision, 1);

    let b_op = OperationBuilder::new().insert("Hi").build();
    let applied_b = session.apply_operation("b", 0, b_op).await.unwrap();
    assert_eq!(applied_b.new_revision, 2);

    assert_eq!(session.current_content().await, "HelloHi");
    assert_eq!(session.current_revision().await, 2);
}

#[tokio::test]
async fn insert_versus_delete_overlap_converges() {
    let content_store = Arc::new(InMemoryContentStore::new());
    content_store.save("doc.txt", "Hello World").await.unwrap();
    let broker = SessionBroker::new(
        content_store,
        Arc::new(NullHistoryListener),
        ServerConfig::default(),
    );
    let (session, _) = broker.get_or_create_session("doc.txt").await.unwrap();
    session.subscribe("a", false).await;
    session.subscribe("b", false).await;

    let a_op = OperationBuilder::new()
        .retain(6)
        .insert("beautiful ")
        .retain(5)
        .build();
    let applied_a = session.apply_operation("a", 0, a_op).await.unwrap();
    assert_eq!(applied_a.new_revision, 1);

    let b_op = OperationBuilder::new().retain(5).delete(6).build();
    let applied_b = session.apply_operation("b", 0, b_op).await.unwrap();
    assert_eq!(applied_b.new_revision, 2);

    assert_eq!(session.current_content().await, "Hellobeautiful ");
}

#[tokio::test]
async fn three_ops_cut_a_snapshot() {
    let config = ServerConfig {
        max_ops_before_snapshot: 3,
        ..ServerConfig::default()
    };
    let content_store = Arc::new(InMemoryContentStore::new());
    content_store.save("doc.txt", "a").await.unwrap();
    let broker = SessionBroker::new(content_store, Arc::new(NullHistoryListener), config);
    let (session, _) = broker.get_or_create_session("doc.txt").await.unwrap();
    session.subscribe("writer", false).await;

    for (rev, at, ch) in [(0u64, 1usize, "b"), (1, 2, "c"), (2, 3, "d")] {
        session
            .apply_operation(
                "writer",
                rev,
                OperationBuilder::new().retain(at).insert(ch).build(),
            )
            .await
            .unwrap();
    }

    assert_eq!(session.current_content().await, "abcd");
    assert_eq!(session.current_revision().await, 3);
}

#[tokio::test]
async fn reference_count_destruction_rejects_further_operations() {
    let broker = broker_with(ServerConfig::default());
    let (session, _) = broker.get_or_create_session("doc.txt").await.unwrap();
    let session_id = session.session_id;

    session.subscribe("reader-1", true).await;
    session.subscribe("reader-2", true).await;
    session.start_editing("writer").await.unwrap();

    let info = session.snapshot_info().await;
    assert_eq!((info.readers, info.writers), (2, 1));

    assert!(!session.stop_editing("writer").await);
    assert!(!session.unsubscribe("reader-1").await);
    let destroyed = session.unsubscribe("reader-2").await;
    assert!(destroyed);
    broker.destroy_session(session_id);

    let err = broker.get_or_not_found(session_id).unwrap_err();
    assert!(matches!(err, ServerError::SessionNotFound(id) if id == session_id));
}

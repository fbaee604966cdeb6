//! Integration tests for `EmailSenderConfig` reconciliation
//!
//! Walk a sender config through its finalizer lifecycle against the
//! in-memory store.

mod common;

use std::sync::Arc;

use common::{
    email, reconciler, sender_config, test_config, InMemoryStore, ScriptedTransport, SENDER,
};
use email_operator::constants::SENDER_CONFIG_FINALIZER;
use email_operator::controller::reconciler::{reconcile_email, reconcile_sender_config};
use email_operator::crd::EmailPhase;
use kube_runtime::controller::Action;

#[tokio::test]
async fn test_finalizer_lifecycle() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(ScriptedTransport::new());
    let ctx = reconciler(&store, &transport, test_config());
    let created = Arc::new(store.create_sender_config(sender_config(SENDER)));

    let action = reconcile_sender_config(created.clone(), ctx.clone())
        .await
        .unwrap();
    assert_eq!(action, Action::requeue(test_config().finalizer_requeue()));
    assert_eq!(
        store.sender_config(SENDER).unwrap().finalizers(),
        vec![SENDER_CONFIG_FINALIZER.to_string()]
    );

    // Steady state: no further writes
    let action = reconcile_sender_config(created.clone(), ctx.clone())
        .await
        .unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(store.sender_config(SENDER).unwrap().finalizers().len(), 1);

    store.delete_sender_config(SENDER);
    let action = reconcile_sender_config(created, ctx).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert!(store.sender_config(SENDER).is_none());
}

#[tokio::test]
async fn test_deletion_waits_for_in_flight_emails() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(ScriptedTransport::new());
    let ctx = reconciler(&store, &transport, test_config());
    let created = Arc::new(store.create_sender_config(sender_config(SENDER)));
    reconcile_sender_config(created.clone(), ctx.clone())
        .await
        .unwrap();

    let pending = store.create_email(email("queued"));
    store.delete_sender_config(SENDER);

    let action = reconcile_sender_config(created.clone(), ctx.clone())
        .await
        .unwrap();
    assert_eq!(
        action,
        Action::requeue(test_config().sender_config_deletion_requeue())
    );
    assert!(store.sender_config(SENDER).unwrap().is_being_deleted());

    // The held config still delivers the queued email
    reconcile_email(Arc::new(pending), ctx.clone()).await.unwrap();
    assert_eq!(store.status("queued").phase, Some(EmailPhase::Sent));
    assert_eq!(transport.calls(), 1);

    let action = reconcile_sender_config(created, ctx).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert!(store.sender_config(SENDER).is_none());
}

#[tokio::test]
async fn test_deletion_without_finalizer_is_immediate() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(ScriptedTransport::new());
    let ctx = reconciler(&store, &transport, test_config());
    let created = Arc::new(store.create_sender_config(sender_config(SENDER)));

    store.delete_sender_config(SENDER);
    let action = reconcile_sender_config(created, ctx).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert!(store.sender_config(SENDER).is_none());
}

#[tokio::test]
async fn test_stale_object_conflicts_and_retries_cleanly() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(ScriptedTransport::new());
    let ctx = reconciler(&store, &transport, test_config());
    let created = Arc::new(store.create_sender_config(sender_config(SENDER)));

    // Two reconciles racing from the same fresh read: one wins, the other
    // observes the finalizer on its next pass
    let (first, second) = tokio::join!(
        reconcile_sender_config(created.clone(), ctx.clone()),
        reconcile_sender_config(created.clone(), ctx.clone()),
    );
    for result in [first, second] {
        if let Err(err) = result {
            assert!(err.is_conflict(), "unexpected error: {err}");
        }
    }

    let action = reconcile_sender_config(created, ctx).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(store.sender_config(SENDER).unwrap().finalizers().len(), 1);
}

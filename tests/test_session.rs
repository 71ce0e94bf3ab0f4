//! End-to-end tests for session.rs: store, push channel and gateway wired together

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::push_server::{PushServer, ServerEvent};
use common::{FakeGateway, GatewayCall, customer, record};
use inbox_sync::{
    NotificationError, NotificationSession, RecipientType, SessionPrincipal, StoreSnapshot,
    SyncConfig,
};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

async fn wait_for_store(session: &NotificationSession, condition: impl FnMut(&StoreSnapshot) -> bool) {
    let mut updates = session.store().subscribe();
    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(condition))
        .await
        .expect("Timed out waiting for store update")
        .expect("Store dropped");
}

fn config_for(server: &PushServer) -> Arc<SyncConfig> {
    Arc::new(SyncConfig::new(&server.base_url()).expect("valid url"))
}

#[tokio::test]
async fn test_session_round_trip() {
    common::init_tracing();
    let mut server = PushServer::spawn().await;
    let gateway = FakeGateway::new();
    gateway.push_fetch(Ok(vec![record("a", false), record("b", true)]));
    let principals = Arc::new(SessionPrincipal::signed_in(customer()));

    let session = NotificationSession::with_gateway(config_for(&server), principals, gateway.clone());

    assert_eq!(server.next_frame().await["type"], "register");
    wait_for_store(&session, |state| state.is_connected).await;

    assert_ok!(session.store().load_from_backend().await);
    assert_eq!(session.store().total(), 2);
    assert_eq!(session.store().unread_count(), 1);

    server.send(json!({
        "type": "notification",
        "payload": { "_id": "live-1", "title": "Appointment moved", "message": "Now at 11:00" }
    }));
    wait_for_store(&session, |state| state.total() == 3).await;
    let newest = session.store().notifications()[0].clone();
    assert_eq!(newest.id.as_str(), "live-1");
    assert_eq!(session.store().unread_count(), 2);

    session.store().sync_mark_read(&newest.id);
    assert_eq!(session.store().unread_count(), 1);
    assert_eq!(server.next_frame().await, json!({ "type": "markAsRead", "payload": "live-1" }));

    let sent = assert_ok!(session.send_notification("Test notification", "Hello").await);
    assert_eq!(sent.title, "Test notification");
    assert!(gateway.calls().contains(&GatewayCall::Create {
        principal_id: "42".to_string(),
        title: "Test notification".to_string(),
        message: "Hello".to_string(),
        recipient: RecipientType::User,
    }));

    let store = session.store().clone();
    session.shutdown();

    assert_eq!(server.next_event().await, ServerEvent::Closed);
    assert_eq!(store.snapshot(), StoreSnapshot::default());
}

#[tokio::test]
async fn test_session_starts_offline_until_login() {
    common::init_tracing();
    let mut server = PushServer::spawn().await;
    let principals = Arc::new(SessionPrincipal::new());

    let session = NotificationSession::with_gateway(
        config_for(&server),
        principals.clone(),
        FakeGateway::new(),
    );

    server.expect_silence(Duration::from_millis(200)).await;
    assert!(!session.store().is_connected());
    let err = assert_err!(session.send_notification("Test", "Hello").await);
    assert!(matches!(err, NotificationError::Unauthenticated { .. }));

    principals.login(customer());
    assert_ok!(session.connect());

    assert_eq!(
        server.next_frame().await,
        json!({ "type": "register", "payload": { "id": "42", "type": "user" } })
    );
    wait_for_store(&session, |state| state.is_connected).await;
    session.shutdown();
}

#[tokio::test]
async fn test_session_start_uses_http_gateway() {
    common::init_tracing();
    let mut server = PushServer::spawn().await;
    let principals = Arc::new(SessionPrincipal::signed_in(customer()));
    let config = SyncConfig::new(&server.base_url()).expect("valid url");

    let session = assert_ok!(NotificationSession::start(config, principals));

    assert_eq!(server.next_frame().await["type"], "register");
    wait_for_store(&session, |state| state.is_connected).await;

    // The push server does not speak REST, so the load fails and leaves the inbox alone
    let err = assert_err!(session.store().load_from_backend().await);
    assert!(err.is_fetch());
    assert_eq!(session.store().total(), 0);
    session.shutdown();
}

#[tokio::test]
async fn test_dropping_session_closes_push_channel() {
    common::init_tracing();
    let mut server = PushServer::spawn().await;
    let principals = Arc::new(SessionPrincipal::signed_in(customer()));

    let session = NotificationSession::with_gateway(config_for(&server), principals, FakeGateway::new());
    assert_eq!(server.next_frame().await["type"], "register");
    wait_for_store(&session, |state| state.is_connected).await;
    let push = session.push().clone();

    drop(session);

    assert_eq!(server.next_event().await, ServerEvent::Closed);
    assert!(!push.is_connected());
}

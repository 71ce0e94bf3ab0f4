//! Shared fixtures for the integration tests
//!
//! In-memory stand-ins for the REST gateway and the push channel, plus a
//! small WebSocket server for exercising the real push client.

#![allow(dead_code)]

pub mod push_server;

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use inbox_sync::{
    BackendNotification, CUSTOMER_ROLE, NotificationError, NotificationGateway, NotificationId,
    NotificationResult, NotificationStore, Principal, PushCommands, RecipientType,
    SessionPrincipal,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;

pub const CUSTOMER_ID: &str = "42";

pub fn customer() -> Principal {
    Principal::new(CUSTOMER_ID, CUSTOMER_ROLE)
}

pub fn employee() -> Principal {
    Principal::new("7", "ROLE_MECHANIC")
}

/// Backend record with the given id and read flag
pub fn record(id: &str, read: bool) -> BackendNotification {
    BackendNotification::from_value(json!({
        "_id": id,
        "userId": CUSTOMER_ID,
        "title": format!("Notification {}", id),
        "message": "Something happened",
        "read": read,
        "status": "sent",
        "recipientType": "user",
        "createdAt": "2024-06-04T08:30:00.000Z"
    }))
    .expect("fixture record is valid")
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    FetchAll(String),
    MarkAllRead(String),
    DeleteOne(String),
    DeleteAll(String),
    Create {
        principal_id: String,
        title: String,
        message: String,
        recipient: RecipientType,
    },
}

struct ScriptedFetch {
    result: NotificationResult<Vec<BackendNotification>>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Scriptable [`NotificationGateway`] that records every call
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<GatewayCall>>,
    fetches: Mutex<VecDeque<ScriptedFetch>>,
    mutation_error: Mutex<Option<NotificationError>>,
    mutation_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the result of the next `fetch_all`; unscripted fetches return nothing
    pub fn push_fetch(&self, result: NotificationResult<Vec<BackendNotification>>) {
        self.fetches.lock().push_back(ScriptedFetch { result, gate: None });
    }

    /// Queue a fetch that only completes once the returned sender fires
    pub fn push_gated_fetch(&self, result: NotificationResult<Vec<BackendNotification>>) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.fetches.lock().push_back(ScriptedFetch {
            result,
            gate: Some(gate),
        });
        release
    }

    /// Hold the next mutating call open until the returned sender fires
    pub fn gate_next_mutation(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.mutation_gate.lock() = Some(gate);
        release
    }

    /// Make every mutating call fail with `error`
    pub fn fail_mutations(&self, error: NotificationError) {
        *self.mutation_error.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    fn record_call(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }

    /// Record the call, wait on the gate if one is set, then answer
    async fn mutation(&self, call: GatewayCall) -> NotificationResult<()> {
        let gate = self.mutation_gate.lock().take();
        self.record_call(call);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        match self.mutation_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl NotificationGateway for FakeGateway {
    fn fetch_all<'a>(
        &'a self,
        principal_id: &'a str,
    ) -> BoxFuture<'a, NotificationResult<Vec<BackendNotification>>> {
        Box::pin(async move {
            let scripted = self.fetches.lock().pop_front();
            self.record_call(GatewayCall::FetchAll(principal_id.to_string()));

            let Some(scripted) = scripted else {
                return Ok(Vec::new());
            };
            if let Some(gate) = scripted.gate {
                let _ = gate.await;
            }
            scripted.result
        })
    }

    fn mark_all_read<'a>(&'a self, principal_id: &'a str) -> BoxFuture<'a, NotificationResult<()>> {
        Box::pin(self.mutation(GatewayCall::MarkAllRead(principal_id.to_string())))
    }

    fn delete_one<'a>(&'a self, notification_id: &'a str) -> BoxFuture<'a, NotificationResult<()>> {
        Box::pin(self.mutation(GatewayCall::DeleteOne(notification_id.to_string())))
    }

    fn delete_all<'a>(&'a self, principal_id: &'a str) -> BoxFuture<'a, NotificationResult<()>> {
        Box::pin(self.mutation(GatewayCall::DeleteAll(principal_id.to_string())))
    }

    fn create<'a>(
        &'a self,
        principal_id: &'a str,
        title: &'a str,
        message: &'a str,
        recipient: RecipientType,
    ) -> BoxFuture<'a, NotificationResult<BackendNotification>> {
        Box::pin(async move {
            self.mutation(GatewayCall::Create {
                principal_id: principal_id.to_string(),
                title: title.to_string(),
                message: message.to_string(),
                recipient,
            })
            .await?;

            let mut created = record("created-1", false);
            created.title = title.to_string();
            created.message = message.to_string();
            created.recipient_type = Some(recipient);
            Ok(created)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushCommand {
    Read(NotificationId),
    Delete(NotificationId),
}

/// [`PushCommands`] sink that remembers what it was asked to send
#[derive(Default)]
pub struct RecordingPush {
    commands: Mutex<Vec<PushCommand>>,
}

impl RecordingPush {
    pub fn commands(&self) -> Vec<PushCommand> {
        self.commands.lock().clone()
    }
}

impl PushCommands for RecordingPush {
    fn notify_read_command(&self, id: &NotificationId) {
        self.commands.lock().push(PushCommand::Read(id.clone()));
    }

    fn notify_delete_command(&self, id: &NotificationId) {
        self.commands.lock().push(PushCommand::Delete(id.clone()));
    }
}

/// A store wired to fakes
pub struct Harness {
    pub store: NotificationStore,
    pub gateway: Arc<FakeGateway>,
    pub push: Arc<RecordingPush>,
    pub principals: Arc<SessionPrincipal>,
}

impl Harness {
    /// Signed in as [`customer`]
    pub fn new() -> Self {
        let harness = Self::signed_out();
        harness.principals.login(customer());
        harness
    }

    pub fn signed_out() -> Self {
        let gateway = FakeGateway::new();
        let push = Arc::new(RecordingPush::default());
        let principals = Arc::new(SessionPrincipal::new());
        let store = NotificationStore::new(gateway.clone(), push.clone(), principals.clone());
        Self {
            store,
            gateway,
            push,
            principals,
        }
    }
}

/// The unread counter must always match the collection
pub fn assert_counter_consistent(store: &NotificationStore) {
    let snapshot = store.snapshot();
    let actual = snapshot.notifications.iter().filter(|n| !n.is_read).count();
    assert_eq!(snapshot.unread_count, actual, "unread counter drifted from collection");
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

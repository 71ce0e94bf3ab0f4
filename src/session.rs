// Session context: everything that lives from login to logout
// Built once at session start and handed to collaborators by reference; shutdown releases
// the push connection and resets the store

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backends::{HttpGateway, PushChannelClient, PushEvent};
use crate::components::{
    Notification, NotificationError, NotificationGateway, NotificationResult, PrincipalProvider,
    SyncConfig,
};
use crate::store::NotificationStore;

pub struct NotificationSession {
    store: NotificationStore,
    push: PushChannelClient,
    gateway: Arc<dyn NotificationGateway>,
    principals: Arc<dyn PrincipalProvider>,
    pump: JoinHandle<()>,
}

impl NotificationSession {
    /// Start a session against the configured backend
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        config: SyncConfig,
        principals: Arc<dyn PrincipalProvider>,
    ) -> NotificationResult<Self> {
        let config = Arc::new(config);
        let gateway: Arc<dyn NotificationGateway> =
            Arc::new(HttpGateway::new(Arc::clone(&config))?);
        Ok(Self::with_gateway(config, principals, gateway))
    }

    /// Start a session with a caller supplied gateway
    ///
    /// The push channel is opened immediately when a principal is signed in;
    /// otherwise the session starts offline and [`connect`](Self::connect) can
    /// be called after login.
    pub fn with_gateway(
        config: Arc<SyncConfig>,
        principals: Arc<dyn PrincipalProvider>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        let (push, events) = PushChannelClient::new(config, Arc::clone(&principals));
        let store = NotificationStore::new(
            Arc::clone(&gateway),
            Arc::new(push.clone()),
            Arc::clone(&principals),
        );
        let pump = tokio::spawn(pump_events(store.clone(), events));

        let session = Self {
            store,
            push,
            gateway,
            principals,
            pump,
        };
        if let Err(e) = session.connect() {
            tracing::debug!(error = %e, "Session started without push channel");
        }
        session
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn push(&self) -> &PushChannelClient {
        &self.push
    }

    pub fn connect(&self) -> NotificationResult<()> {
        self.push.connect()
    }

    /// Create a notification on the backend for the signed-in principal
    ///
    /// Administrative path: the created entry reaches the inbox through the
    /// push channel (or the next load), not through this call. Failures are
    /// returned so the caller can show them.
    pub async fn send_notification(
        &self,
        title: &str,
        message: &str,
    ) -> NotificationResult<Notification> {
        let principal = self.principals.current_principal().ok_or_else(|| {
            NotificationError::Unauthenticated {
                operation: "send_notification".to_string(),
            }
        })?;

        let created = self
            .gateway
            .create(&principal.id, title, message, principal.recipient_type())
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to send notification"))?;
        Ok(created.to_notification())
    }

    /// Logout: close the push channel and forget all local state
    pub fn shutdown(self) {
        self.release();
        self.store.reset();
        tracing::info!("Notification session closed");
    }

    fn release(&self) {
        self.push.disconnect();
        self.pump.abort();
    }
}

// The pump holds a store clone, and the store holds the push client whose event
// sender the pump waits on, so nothing closes on its own
impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.release();
    }
}

async fn pump_events(store: NotificationStore, mut events: mpsc::UnboundedReceiver<PushEvent>) {
    while let Some(event) = events.recv().await {
        store.apply_push_event(event);
    }
}

// WebSocket push channel client
// One connection at a time, registered to the current principal; inbound notifications
// are normalized here and handed to the store through an event channel

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::messages::{ClientMessage, ServerMessage, msg_types};
use crate::components::{
    BackendNotification, ConnectionLifecycle, ConnectionState, Notification, NotificationError,
    NotificationId, NotificationResult, Principal, PrincipalProvider, PushCommands, SyncConfig,
    TransitionReason,
};

/// Signals delivered from the push channel to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Transport open and registration sent
    Connected,
    /// Transport dropped, failed to open, or was torn down
    Disconnected,
    /// A notification pushed by the server, already normalized
    Notification(Notification),
}

struct ChannelState {
    lifecycle: ConnectionLifecycle,
    /// Present from `connect()` until teardown; commands only flow while Connected
    outbound: Option<mpsc::UnboundedSender<ClientMessage>>,
}

struct PushInner {
    config: Arc<SyncConfig>,
    principals: Arc<dyn PrincipalProvider>,
    state: Mutex<ChannelState>,
    events: mpsc::UnboundedSender<PushEvent>,
}

/// Client side of the real-time notification channel
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct PushChannelClient {
    inner: Arc<PushInner>,
}

impl PushChannelClient {
    /// Create a disconnected client and the receiver of its events
    pub fn new(
        config: Arc<SyncConfig>,
        principals: Arc<dyn PrincipalProvider>,
    ) -> (Self, mpsc::UnboundedReceiver<PushEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let client = Self {
            inner: Arc::new(PushInner {
                config,
                principals,
                state: Mutex::new(ChannelState {
                    lifecycle: ConnectionLifecycle::new(),
                    outbound: None,
                }),
                events,
            }),
        };
        (client, receiver)
    }

    /// Open the connection for the current principal
    ///
    /// A no-op while already connecting or connected. Refuses without an
    /// authenticated principal. Transport errors are reported asynchronously
    /// as [`PushEvent::Disconnected`]; there is no automatic reconnect.
    pub fn connect(&self) -> NotificationResult<()> {
        let Some(principal) = self.inner.principals.current_principal() else {
            tracing::info!("User not authenticated, skipping push connection");
            return Err(NotificationError::Unauthenticated {
                operation: "connect".to_string(),
            });
        };
        let url = self.inner.config.push_url()?;

        let (outbound, commands) = mpsc::unbounded_channel();
        let generation = {
            let mut state = self.inner.state.lock();
            match state.lifecycle.begin_connect()? {
                Some(generation) => {
                    state.outbound = Some(outbound);
                    generation
                },
                None => {
                    tracing::debug!(state = %state.lifecycle.state, "Push channel already active");
                    return Ok(());
                },
            }
        };

        tracing::debug!(%url, generation, "Opening push channel");
        tokio::spawn(run_connection(Arc::clone(&self.inner), generation, url, principal, commands));
        Ok(())
    }

    /// Tear the connection down unconditionally
    ///
    /// No inbound events are delivered after this returns, even if the socket
    /// task has not finished closing yet.
    pub fn disconnect(&self) {
        let changed = {
            let mut state = self.inner.state.lock();
            // Dropping the sender makes the socket task close the transport
            state.outbound = None;
            state.lifecycle.reset()
        };

        if changed {
            tracing::info!("Disconnected from notification server");
            self.inner.emit(PushEvent::Disconnected);
        }
    }

    pub fn status(&self) -> ConnectionState {
        self.inner.state.lock().lifecycle.state
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().lifecycle.is_connected()
    }

    /// Snapshot of the connection lifecycle, including recent transitions
    pub fn lifecycle(&self) -> ConnectionLifecycle {
        self.inner.state.lock().lifecycle.clone()
    }

    fn send_command(&self, message: ClientMessage) {
        let state = self.inner.state.lock();
        match (&state.outbound, state.lifecycle.is_connected()) {
            (Some(outbound), true) => {
                if outbound.send(message).is_err() {
                    tracing::debug!("Push channel closing, command dropped");
                }
            },
            _ => {
                tracing::debug!(command = %message.msg_type, "Push channel not connected, command dropped");
            },
        }
    }
}

impl PushCommands for PushChannelClient {
    fn notify_read_command(&self, id: &NotificationId) {
        self.send_command(ClientMessage::mark_as_read(id));
    }

    fn notify_delete_command(&self, id: &NotificationId) {
        self.send_command(ClientMessage::delete_notification(id));
    }
}

impl PushInner {
    fn emit(&self, event: PushEvent) {
        // The consumer may already be gone during shutdown
        let _ = self.events.send(event);
    }

    fn mark_connected(&self, generation: u64) -> bool {
        self.state.lock().lifecycle.mark_connected(generation)
    }

    fn finish(&self, generation: u64, reason: TransitionReason) {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.lifecycle.finish(generation, reason);
            if changed {
                state.outbound = None;
            }
            changed
        };

        if changed {
            self.emit(PushEvent::Disconnected);
        }
    }

    fn handle_frame(&self, generation: u64, frame: &str) {
        let message = match ServerMessage::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable push frame");
                return;
            },
        };

        if message.msg_type != msg_types::NOTIFICATION {
            tracing::debug!(event = %message.msg_type, "Ignoring push event");
            return;
        }

        let notification = match BackendNotification::from_value(message.payload) {
            Ok(record) => record.to_notification(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed pushed notification");
                return;
            },
        };

        // Hold the lock while emitting so a concurrent disconnect cannot slip in between
        let state = self.state.lock();
        if state.lifecycle.is_current(generation) && state.lifecycle.is_connected() {
            tracing::debug!(id = %notification.id, "New notification received");
            self.emit(PushEvent::Notification(notification));
        }
    }
}

async fn run_connection(
    inner: Arc<PushInner>,
    generation: u64,
    url: Url,
    principal: Principal,
    mut commands: mpsc::UnboundedReceiver<ClientMessage>,
) {
    let connect_timeout = inner.config.connect_timeout;
    let stream = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            tracing::error!(error = %e, %url, "Push channel connection error");
            inner.finish(generation, TransitionReason::TransportError);
            return;
        },
        Err(_) => {
            tracing::error!(%url, timeout = ?connect_timeout, "Push channel connection timed out");
            inner.finish(generation, TransitionReason::TransportError);
            return;
        },
    };

    let (mut sink, mut source) = stream.split();

    let register = ClientMessage::register(&principal).and_then(|message| message.to_frame());
    let register = match register {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Push channel registration failed");
            inner.finish(generation, TransitionReason::TransportError);
            return;
        },
    };
    if let Err(e) = sink.send(Message::Text(register.into())).await {
        tracing::error!(error = %e, "Push channel registration failed");
        inner.finish(generation, TransitionReason::TransportError);
        return;
    }

    if !inner.mark_connected(generation) {
        // Torn down while the transport was opening
        let _ = sink.close().await;
        return;
    }
    tracing::info!(
        principal = %principal.id,
        recipient = principal.recipient_type().as_str(),
        "Connected to notification server"
    );
    inner.emit(PushEvent::Connected);

    let mut reason = TransitionReason::TransportClosed;
    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => inner.handle_frame(generation, text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Push channel transport error");
                    reason = TransitionReason::TransportError;
                    break;
                },
            },
            command = commands.recv() => match command {
                Some(message) => {
                    let frame = match message.to_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping unencodable command");
                            continue;
                        },
                    };
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        tracing::warn!(error = %e, "Push channel send failed");
                        reason = TransitionReason::TransportError;
                        break;
                    }
                },
                None => {
                    // Explicit disconnect dropped the command sender
                    let _ = sink.close().await;
                    break;
                },
            },
        }
    }

    if inner.state.lock().lifecycle.is_current(generation) {
        tracing::info!("Disconnected from notification server");
    }
    inner.finish(generation, reason);
}

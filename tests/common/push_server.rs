//! Minimal WebSocket peer standing in for the notification push server

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// What the server observed from its client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Frame(Value),
    Closed,
}

type ClientSlot = Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>;

pub struct PushServer {
    port: u16,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    client: ClientSlot,
    accept_task: tokio::task::JoinHandle<()>,
}

impl PushServer {
    /// Bind to a random local port and accept any number of connections
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().expect("Failed to get local address").port();

        let (events_tx, events) = mpsc::unbounded_channel();
        let client: ClientSlot = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&client);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, events_tx.clone(), Arc::clone(&slot)));
            }
        });

        Self {
            port,
            events,
            client,
            accept_task,
        }
    }

    /// HTTP base address; the client derives `ws://.../ws` from it
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn next_event(&mut self) -> ServerEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("Timed out waiting for client activity")
            .expect("Push server stopped")
    }

    /// Next JSON frame sent by the client
    pub async fn next_frame(&mut self) -> Value {
        match self.next_event().await {
            ServerEvent::Frame(frame) => frame,
            ServerEvent::Closed => panic!("Client closed the connection, expected a frame"),
        }
    }

    /// Assert the client sends nothing for `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(window, self.events.recv()).await {
            panic!("Expected no client activity, got {:?}", event);
        }
    }

    /// Send a JSON frame to the most recently connected client
    pub fn send(&self, frame: Value) {
        self.send_message(Message::Text(frame.to_string().into()));
    }

    /// Close the most recent connection from the server side
    pub fn close_client(&self) {
        self.send_message(Message::Close(None));
    }

    fn send_message(&self, message: Message) {
        let client = self.client.lock();
        let sender = client.as_ref().expect("No client connected");
        sender.send(message).expect("Client connection already gone");
    }
}

impl Drop for PushServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve(stream: TcpStream, events: mpsc::UnboundedSender<ServerEvent>, slot: ClientSlot) {
    let Ok(socket) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    *slot.lock() = Some(outbound);

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) {
                        let _ = events.send(ServerEvent::Frame(frame));
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {},
            },
            outgoing = outbound_rx.recv() => match outgoing {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if sink.send(message).await.is_err() || closing {
                        break;
                    }
                },
                None => break,
            },
        }
    }

    let _ = events.send(ServerEvent::Closed);
}

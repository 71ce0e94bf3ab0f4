//! Push channel message types.
//!
//! Every frame in either direction is a JSON text frame with the envelope
//! `{"type": <event>, "payload": <value>}`. Inbound payloads stay untyped until
//! they are normalized into the entity model.

use serde::{Deserialize, Serialize};

use crate::components::{NotificationError, NotificationId, NotificationResult, Principal, RecipientType};

/// Reserved event names.
pub mod msg_types {
    /// Client announces which principal this connection belongs to.
    pub const REGISTER: &str = "register";
    /// Client marked a notification read locally.
    pub const MARK_AS_READ: &str = "markAsRead";
    /// Client deleted a notification locally.
    pub const DELETE_NOTIFICATION: &str = "deleteNotification";
    /// Server pushes a newly created notification.
    pub const NOTIFICATION: &str = "notification";
}

/// Client -> Server message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ClientMessage {
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> NotificationResult<Self> {
        let msg_type = msg_type.into();
        let payload = encode_payload(&msg_type, payload)?;
        Ok(Self::with_payload(msg_type, payload))
    }

    pub fn with_payload(msg_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload,
        }
    }

    /// Registration handshake sent right after the transport opens.
    pub fn register(principal: &Principal) -> NotificationResult<Self> {
        Self::new(
            msg_types::REGISTER,
            Register {
                id: principal.id.clone(),
                recipient_type: principal.recipient_type(),
            },
        )
    }

    pub fn mark_as_read(id: &NotificationId) -> Self {
        Self::with_payload(msg_types::MARK_AS_READ, id.as_str().into())
    }

    pub fn delete_notification(id: &NotificationId) -> Self {
        Self::with_payload(msg_types::DELETE_NOTIFICATION, id.as_str().into())
    }

    /// Encode as a text frame body.
    pub fn to_frame(&self) -> NotificationResult<String> {
        serde_json::to_string(self).map_err(|e| {
            NotificationError::connection(format!("failed to encode {} frame: {}", self.msg_type, e))
        })
    }
}

/// Server -> Client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ServerMessage {
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> NotificationResult<Self> {
        let msg_type = msg_type.into();
        let payload = encode_payload(&msg_type, payload)?;
        Ok(Self { msg_type, payload })
    }

    pub fn parse(frame: &str) -> NotificationResult<Self> {
        serde_json::from_str(frame).map_err(|e| NotificationError::Validation {
            field: "frame".to_string(),
            message: e.to_string(),
        })
    }
}

fn encode_payload(msg_type: &str, payload: impl Serialize) -> NotificationResult<serde_json::Value> {
    serde_json::to_value(payload).map_err(|e| NotificationError::Validation {
        field: "payload".to_string(),
        message: format!("failed to encode {} payload: {}", msg_type, e),
    })
}

/// Payload of [`msg_types::REGISTER`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Register {
    pub id: String,
    #[serde(rename = "type")]
    pub recipient_type: RecipientType,
}

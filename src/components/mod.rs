// Notification entity model shared by the store, the REST gateway and the push channel
// Loosely typed backend records are normalized into these types at the boundary (see record.rs)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod backend;
pub mod config;
pub mod lifecycle;
pub mod principal;
pub mod record;
pub mod serde_time;

pub use backend::{NotificationGateway, PushCommands};
pub use config::SyncConfig;
pub use lifecycle::{ConnectionLifecycle, ConnectionState, StateTransition, TransitionReason};
pub use principal::{CUSTOMER_ROLE, Principal, PrincipalProvider, RecipientType, SessionPrincipal};
pub use record::{BackendNotification, DeliveryStatus, NOTIFICATIONS_LIST_URL};

/// Opaque, stable notification identifier
///
/// Backend records keep their remote id; locally added notifications get a
/// generated `notif_`-prefixed id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate an id for a locally originated notification
    pub fn generate() -> Self {
        Self(format!("notif_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Visual classification of a notification; has no behavioral effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Info,
        NotificationKind::Success,
        NotificationKind::Warning,
        NotificationKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NotificationError::Validation {
                field: "type".to_string(),
                message: format!("unknown notification type '{}'", s),
            })
    }
}

/// Priority levels for attention management
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 1,
    #[default]
    Medium = 2,
    /// Flags "urgent" presentation while the notification is unread
    High = 3,
}

/// A single inbox entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub priority: Priority,
    /// Only ever moves from `false` to `true`
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl Notification {
    /// Materialize locally supplied data as a fresh, unread notification
    pub fn from_new(data: NewNotification) -> Self {
        Self {
            id: NotificationId::generate(),
            title: data.title,
            message: data.message,
            kind: data.kind,
            priority: data.priority,
            is_read: false,
            created_at: Utc::now(),
            action_url: data.action_url,
        }
    }

    /// High priority entries are shown as urgent until they are read
    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::High && !self.is_read
    }
}

/// Caller supplied part of a locally added notification
///
/// `id`, `is_read` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub action_url: Option<String>,
}

impl NewNotification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Failure taxonomy of the sync engine
///
/// Local-only store mutations never produce these; they come from the gateway,
/// the push channel and boundary validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    /// A read from the backend failed
    #[error("Fetch error from {endpoint}: {message}")]
    Fetch {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },
    /// A mutating backend call failed
    #[error("Sync error during {operation}: {message}")]
    Sync {
        operation: String,
        status: Option<u16>,
        message: String,
    },
    /// The push channel could not be established or dropped
    #[error("Connection error: {message}")]
    Connection { message: String },
    /// The operation needs a current principal and there is none
    #[error("No authenticated principal for {operation}")]
    Unauthenticated { operation: String },
    /// A backend or push record failed boundary normalization
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },
    #[error("Invalid connection transition from {from} to {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}

impl NotificationError {
    pub fn fetch(endpoint: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    pub fn sync(operation: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Sync {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, Self::Sync { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// HTTP status of the failed request, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } | Self::Sync { status, .. } => *status,
            _ => None,
        }
    }
}

/// Type alias for results produced by the sync engine
pub type NotificationResult<T> = Result<T, NotificationError>;

// Backend-shaped notification records and their mapping into the entity model
// Records arrive loosely typed from REST bodies and push frames; normalize them here

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::serde_time::{deserialize_lenient, serialize_lenient};
use super::{
    Notification, NotificationError, NotificationId, NotificationKind, NotificationResult,
    Priority, RecipientType,
};

/// Destination attached to every backend-originated notification
pub const NOTIFICATIONS_LIST_URL: &str = "/notifications";

/// Server-side delivery status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
}

/// Notification record as the backend stores it
///
/// Richer than [`Notification`]: status, recipient classification, owner and
/// update time are dropped by [`BackendNotification::to_notification`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRecord")]
pub struct BackendNotification {
    #[serde(rename = "_id")]
    pub remote_id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub status: Option<DeliveryStatus>,
    pub recipient_type: Option<RecipientType>,
    #[serde(serialize_with = "serialize_lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_lenient")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Visual type, only present on some push events
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl BackendNotification {
    /// Validate and normalize an untyped record from a response body or push frame
    pub fn from_value(value: Value) -> NotificationResult<Self> {
        let raw: RawRecord = serde_json::from_value(value).map_err(|e| NotificationError::Validation {
            field: "notification".to_string(),
            message: e.to_string(),
        })?;
        Self::try_from(raw)
    }

    /// Map into the entity model
    ///
    /// Lossy: the backend has no priority, so it is always medium,
    /// the type falls back to info unless the record names a known one, and the
    /// action target is the notifications list. Missing creation times become now.
    pub fn to_notification(&self) -> Notification {
        let kind = self
            .kind
            .as_deref()
            .and_then(|raw| raw.parse::<NotificationKind>().ok())
            .unwrap_or_default();

        Notification {
            id: NotificationId::new(self.remote_id.clone()),
            title: self.title.clone(),
            message: self.message.clone(),
            kind,
            priority: Priority::Medium,
            is_read: self.read,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            action_url: Some(NOTIFICATIONS_LIST_URL.to_string()),
        }
    }
}

impl From<BackendNotification> for Notification {
    fn from(record: BackendNotification) -> Self {
        record.to_notification()
    }
}

/// Wire shape before validation; documents may carry `_id`, `id` or both
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default, rename = "_id")]
    underscore_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    user_id: Option<Value>,
    title: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    read: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_known")]
    status: Option<DeliveryStatus>,
    #[serde(default, deserialize_with = "deserialize_known")]
    recipient_type: Option<RecipientType>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl TryFrom<RawRecord> for BackendNotification {
    type Error = NotificationError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let remote_id = raw
            .underscore_id
            .and_then(id_from_value)
            .or_else(|| raw.id.and_then(id_from_value))
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| NotificationError::Validation {
                field: "_id".to_string(),
                message: "notification record has no usable id".to_string(),
            })?;

        Ok(Self {
            remote_id,
            user_id: raw.user_id.and_then(id_from_value),
            title: raw.title,
            message: raw.message.unwrap_or_default(),
            read: raw.read.unwrap_or(false),
            status: raw.status,
            recipient_type: raw.recipient_type,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            kind: raw.kind,
        })
    }
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

// Unknown enum values are dropped rather than rejecting the record
fn deserialize_known<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

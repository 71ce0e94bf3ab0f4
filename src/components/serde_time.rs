//! Lenient serde support for backend timestamps
//!
//! Backend and push records carry `createdAt`/`updatedAt` as RFC 3339 strings,
//! but older events send epoch milliseconds and some omit the field entirely.
//! Anything that cannot be interpreted is treated as absent instead of failing
//! the whole record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Interpret a JSON value as a UTC timestamp
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Serialize an `Option<DateTime<Utc>>` as RFC 3339
pub fn serialize_lenient<S>(timestamp: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match timestamp {
        Some(timestamp) => serializer.serialize_some(&timestamp.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}

/// Deserialize an `Option<DateTime<Utc>>`, mapping unreadable values to `None`
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp))
}

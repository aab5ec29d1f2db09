//! Row conversion helpers shared by the repository implementations.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::DatabaseError;

/// Parse an RFC 3339 timestamp column into `DateTime<Utc>`.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Decode an optional JSON text column, treating NULL as the default.
pub fn decode_json<T: DeserializeOwned + Default>(
    raw: Option<String>,
) -> Result<T, DatabaseError> {
    match raw {
        Some(s) if !s.is_empty() => Ok(serde_json::from_str(&s)?),
        _ => Ok(T::default()),
    }
}

/// Encode a value into a JSON text column.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, DatabaseError> {
    Ok(serde_json::to_string(value)?)
}

//! Custom serde helpers for the service's wire formats.

use chrono::{DateTime, ParseResult, Utc};

/// Timestamp layout used by every date field on the wire, e.g.
/// `2006-01-02T15:04:05-0700`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Parse a wire timestamp into a UTC instant.
///
/// The offset may also carry a colon (`+02:00`); `Z` is rejected.
pub fn parse_timestamp(value: &str) -> ParseResult<DateTime<Utc>> {
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(|dt| dt.with_timezone(&Utc))
}

/// Render a UTC instant in the wire layout (always `+0000`).
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// (De)serializes `Option<DateTime<Utc>>` in the wire timestamp layout.
///
/// `null` and a missing field both decode to `None`. Use together with
/// `#[serde(default)]`.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => super::parse_timestamp(&raw)
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}"))),
        }
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&super::format_timestamp(dt)),
            None => serializer.serialize_none(),
        }
    }
}

/// Decodes an explicit JSON `null` to `T::default()`.
///
/// The service sends `null` for unset strings, numbers, lists and nested
/// records alike; after decoding there is no difference between `null`, a
/// missing field and the zero value.
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    let value = <Option<T> as serde::Deserialize>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

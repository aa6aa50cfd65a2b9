// Tolerant field decoders for backend payloads
//
// A field of the wrong type reads as absent instead of failing the whole
// payload. Lists are decoded element by element and keep what they can.

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::Deserialize;
use serde_json::Value;

/// Any value that does not decode as `T` (including `null`) becomes `None`.
pub(crate) fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// A list whose unreadable elements are skipped. Not a list at all is `None`.
pub(crate) fn list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| T::deserialize(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

/// Reference links arrive as plain strings or as `{"url": ...}` objects.
pub(crate) fn references<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Object(mut map) => match map.remove("url") {
                        Some(Value::String(url)) => Some(url),
                        _ => None,
                    },
                    _ => None,
                })
                .collect(),
        )),
        Value::String(single) => Ok(Some(vec![single])),
        _ => Ok(None),
    }
}

/// Port numbers are sent as integers or as numeric strings.
pub(crate) fn port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| D::Error::custom(format!("invalid port {}", value)))
}

/// Optional port: anything that is not a valid port is `None`.
pub(crate) fn optional_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(port(value).ok())
}

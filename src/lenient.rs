//! Field deserializers for vendor payloads whose shape drifts between operators.
//!
//! All of these degrade an unexpected shape to "absent" (or to an empty list) instead of
//! failing the surrounding payload.
use serde::Deserialize;
use serde::de::{DeserializeOwned, Deserializer};
use serde_json::Value;
use tracing::debug;

/// A field that is sometimes a bare object and sometimes an array of them. Elements that
/// don't decode are dropped individually.
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(collect_lenient).unwrap_or_default())
}

pub fn collect_lenient<T: DeserializeOwned>(value: Value) -> Vec<T> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(decode_or_drop).collect(),
        single => decode_or_drop(single).into_iter().collect(),
    }
}

fn decode_or_drop<T: DeserializeOwned>(value: Value) -> Option<T> {
    serde_json::from_value(value)
        .map_err(|err| debug!("Dropping record of unexpected shape: {err}"))
        .ok()
}

/// `Option<T>` where a value of the wrong shape counts as missing.
pub fn invalid_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(decode_or_drop))
}

/// Text fields. Besides plain strings, accepts numbers and the `[{"value": ...}]` wrapping
/// SIRI feeds use for localized names (first entry wins).
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(text))
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.into_iter().next().and_then(text),
        Value::Object(mut fields) => fields.remove("value").and_then(text),
        Value::Null | Value::Bool(_) => None,
    }
}

/// Coordinates arrive as decimal strings. Anything that is not a finite number is absent,
/// never zero.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_f64))
}

pub fn parse_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Flags that some operators send as `"true"`/`"false"`.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::String(s)) => s.trim().to_ascii_lowercase().parse().ok(),
        _ => None,
    })
}

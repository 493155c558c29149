//! Field deserializers for upstream technique output.
//!
//! Technique responses come from collaborators this crate does not control.
//! A `null`, wrong-typed, or out-of-range field degrades to the field's
//! default instead of rejecting the whole request.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::any::type_name;
use tracing::trace;

/// Read `T`, or `T::default()` when the value is `null` or has the wrong
/// shape.
///
/// # Errors
///
/// Fails only when the input is not well-formed data at all.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        trace!(expected = type_name::<T>(), %err, "defaulting malformed field");
        T::default()
    }))
}

/// Read a list, skipping entries that cannot be read as `T`.
///
/// `null` or a non-list value yields an empty list.
///
/// # Errors
///
/// Fails only when the input is not well-formed data at all.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                trace!(expected = type_name::<T>(), %err, "skipping malformed entry");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "or_default")]
        count: usize,
        #[serde(default, deserialize_with = "or_default")]
        label: String,
        #[serde(default, deserialize_with = "list")]
        tags: Vec<u8>,
    }

    #[test]
    fn null_and_wrong_types_fall_back_to_default() {
        let row: Row = serde_json::from_str(r#"{"count": -3, "label": null, "tags": "x"}"#).unwrap();
        assert_eq!(row.count, 0);
        assert!(row.label.is_empty());
        assert!(row.tags.is_empty());
    }

    #[test]
    fn list_keeps_readable_entries() {
        let row: Row = serde_json::from_str(r#"{"count": 2, "tags": [1, "two", 3, null]}"#).unwrap();
        assert_eq!(row.count, 2);
        assert_eq!(row.tags, vec![1, 3]);
    }
}

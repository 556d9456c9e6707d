//! Decoding Firestore's typed JSON values.
//!
//! Firestore wraps every field in a single-key object naming its type, e.g.
//! `{"stringValue": "Dorm B"}` or `{"integerValue": "42"}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::ports::{Document, FieldValue};

/// A document as returned by the Firestore REST API.
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    /// Full resource name, ending in `/{collection}/{id}`.
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawDocument {
    /// Decode into a [`Document`].
    #[must_use]
    pub fn into_document(self) -> Document {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        Document {
            id,
            fields: decode_fields(&self.fields),
        }
    }
}

/// Decode a `fields` object.
#[must_use]
pub fn decode_fields(fields: &Map<String, Value>) -> BTreeMap<String, FieldValue> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), decode_value(value)))
        .collect()
}

/// Decode one typed value. Unknown or malformed values decode as `Null`.
#[must_use]
pub fn decode_value(value: &Value) -> FieldValue {
    let Some((kind, inner)) = value.as_object().and_then(|obj| obj.iter().next()) else {
        return FieldValue::Null;
    };

    match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => inner.as_bool().map_or(FieldValue::Null, FieldValue::Bool),
        // int64 travels as a decimal string
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| inner.as_i64())
            .map_or(FieldValue::Null, FieldValue::Integer),
        "doubleValue" => inner.as_f64().map_or(FieldValue::Null, FieldValue::Double),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or(FieldValue::Null, |ts| {
                FieldValue::Timestamp(ts.with_timezone(&Utc))
            }),
        "stringValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map_or(FieldValue::Null, |s| FieldValue::String(s.to_owned())),
        "geoPointValue" => inner.as_object().map_or(FieldValue::Null, |point| {
            FieldValue::Map(
                point
                    .iter()
                    .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), FieldValue::Double(f))))
                    .collect(),
            )
        }),
        "arrayValue" => FieldValue::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => FieldValue::Map(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        other => {
            debug!(kind = other, "unsupported Firestore value type");
            FieldValue::Null
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_complaint_document() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/fixit/databases/(default)/documents/complaints/abc123",
            "fields": {
                "title": {"stringValue": "Leaking tap"},
                "createdAt": {"timestampValue": "2024-03-01T09:30:00.123456Z"},
                "floor": {"integerValue": "2"},
                "urgent": {"booleanValue": true},
                "imageUrl": {"nullValue": null},
                "tags": {"arrayValue": {"values": [{"stringValue": "water"}]}},
                "location": {"mapValue": {"fields": {"block": {"stringValue": "B"}}}}
            },
            "createTime": "2024-03-01T09:30:00.123456Z",
            "updateTime": "2024-03-01T09:30:00.123456Z"
        }))
        .unwrap();

        let doc = raw.into_document();
        assert_eq!(doc.id, "abc123");
        assert_eq!(doc.get_str("title"), Some("Leaking tap"));
        assert!(matches!(doc.get("createdAt"), Some(FieldValue::Timestamp(_))));
        assert_eq!(doc.get("floor"), Some(&FieldValue::Integer(2)));
        assert_eq!(doc.get("urgent"), Some(&FieldValue::Bool(true)));
        assert_eq!(doc.get("imageUrl"), Some(&FieldValue::Null));
        assert_eq!(
            doc.get("tags"),
            Some(&FieldValue::Array(vec![FieldValue::String("water".to_string())]))
        );
        let Some(FieldValue::Map(location)) = doc.get("location") else {
            panic!("location should decode as a map");
        };
        assert_eq!(location.get("block"), Some(&FieldValue::String("B".to_string())));
    }

    #[test]
    fn test_decode_tolerates_odd_shapes() {
        assert_eq!(decode_value(&json!({"integerValue": "nope"})), FieldValue::Null);
        assert_eq!(decode_value(&json!({"vectorValue": {}})), FieldValue::Null);
        assert_eq!(decode_value(&json!("bare")), FieldValue::Null);
        assert_eq!(decode_value(&json!({"arrayValue": {}})), FieldValue::Array(vec![]));
        assert_eq!(
            decode_value(&json!({"doubleValue": 1.5})),
            FieldValue::Double(1.5)
        );
    }

    #[test]
    fn test_document_without_fields() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/users/u1"
        }))
        .unwrap();
        let doc = raw.into_document();
        assert_eq!(doc.id, "u1");
        assert!(doc.fields.is_empty());
    }
}

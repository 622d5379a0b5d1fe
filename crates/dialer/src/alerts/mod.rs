//! Alert payload handling
//!
//! Views over the monitoring system's webhook body and the normalization of
//! each alert into dispatch jobs.

pub mod normalizer;
pub mod phone_numbers;

use serde::Deserialize;
use serde_json::{Map, Value};

pub use normalizer::{AlertNormalizer, Blacklist};
pub use phone_numbers::PhoneNumbers;

/// Returns the `alerts` array of a webhook body, or `None` when the body is
/// not an object or `alerts` is missing or not a list.
pub fn alerts_of(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("alerts").and_then(Value::as_array)
}

#[derive(Debug, Deserialize)]
struct RawAlert {
    #[serde(default)]
    labels: Map<String, Value>,
    #[serde(default)]
    annotations: Map<String, Value>,
}

/// The fields of one alert that matter for dispatching.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub name: String,
    pub phone_numbers: Option<PhoneNumbers>,
    pub message: Option<String>,
}

impl Alert {
    /// Reads the alert at position `index` of the `alerts` array.
    ///
    /// Fails when the entry is not an object, or when `labels` or
    /// `annotations` is present but not an object.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, serde_json::Error> {
        let raw = RawAlert::deserialize(value)?;

        let name = match raw.labels.get("alertname") {
            Some(Value::Null) | None => format!("alert_{}", index + 1),
            Some(name) => value_text(name),
        };

        Ok(Self {
            name,
            phone_numbers: PhoneNumbers::classify(raw.labels.get("phoneNumbers")),
            message: raw
                .annotations
                .get("message")
                .filter(|message| is_truthy(message))
                .map(value_text),
        })
    }
}

/// String form of a JSON value as passed on a command line: strings verbatim,
/// `null` as empty, anything else as compact JSON.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_name_numbers_and_message() {
        let alert = Alert::from_value(
            0,
            &json!({
                "labels": {"alertname": "DiskPressure", "phoneNumbers": "111, 222"},
                "annotations": {"message": "disk almost full"}
            }),
        )
        .unwrap();

        assert_eq!(alert.name, "DiskPressure");
        assert_eq!(
            alert.phone_numbers,
            Some(PhoneNumbers::CommaString("111, 222".to_string()))
        );
        assert_eq!(alert.message.as_deref(), Some("disk almost full"));
    }

    #[test]
    fn name_defaults_to_one_based_position() {
        let alert = Alert::from_value(2, &json!({"labels": {}, "annotations": {}})).unwrap();
        assert_eq!(alert.name, "alert_3");

        let alert = Alert::from_value(0, &json!({"labels": {"alertname": null}})).unwrap();
        assert_eq!(alert.name, "alert_1");

        let alert = Alert::from_value(0, &json!({})).unwrap();
        assert_eq!(alert.name, "alert_1");
        assert_eq!(alert.phone_numbers, None);
        assert_eq!(alert.message, None);
    }

    #[test]
    fn falsy_messages_count_as_missing() {
        for message in [json!(""), json!(null), json!(0), json!(false), json!([])] {
            let alert = Alert::from_value(0, &json!({"annotations": {"message": message.clone()}})).unwrap();
            assert_eq!(alert.message, None, "message {:?}", message);
        }

        let alert = Alert::from_value(0, &json!({"annotations": {"message": 42}})).unwrap();
        assert_eq!(alert.message.as_deref(), Some("42"));
    }

    #[test]
    fn message_is_read_from_annotations_only() {
        let alert = Alert::from_value(
            0,
            &json!({"labels": {"message": "from labels"}, "annotations": {}}),
        )
        .unwrap();
        assert_eq!(alert.message, None);
    }

    #[test]
    fn malformed_entries_are_errors() {
        assert!(Alert::from_value(0, &json!("not an alert")).is_err());
        assert!(Alert::from_value(0, &json!({"labels": "severity=page"})).is_err());
        assert!(Alert::from_value(0, &json!({"labels": null})).is_err());
        assert!(Alert::from_value(0, &json!({"annotations": [1, 2]})).is_err());
    }

    #[test]
    fn alerts_of_requires_a_list() {
        assert_eq!(alerts_of(&json!({"alerts": [{}]})).map(Vec::len), Some(1));
        assert!(alerts_of(&json!({"alerts": {"0": {}}})).is_none());
        assert!(alerts_of(&json!({"status": "firing"})).is_none());
        assert!(alerts_of(&json!([{"alerts": []}])).is_none());
        assert!(alerts_of(&json!("alerts")).is_none());
    }
}

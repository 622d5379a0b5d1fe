use serde_json::Value;

use super::value_text;

/// Shape of the `phoneNumbers` label as it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum PhoneNumbers {
    /// A string, possibly holding several comma-separated numbers.
    CommaString(String),
    /// A JSON list; elements are taken as-is, never comma-split.
    List(Vec<Value>),
    /// Any other non-null value, treated as one number.
    Scalar(Value),
}

impl PhoneNumbers {
    /// `None` when the label is absent or `null`.
    pub fn classify(raw: Option<&Value>) -> Option<Self> {
        match raw? {
            Value::Null => None,
            Value::String(s) => Some(PhoneNumbers::CommaString(s.clone())),
            Value::Array(items) => Some(PhoneNumbers::List(items.clone())),
            other => Some(PhoneNumbers::Scalar(other.clone())),
        }
    }

    /// The coerced, ordered list of candidate numbers.
    ///
    /// Comma strings are split, trimmed and stripped of empty parts here.
    /// List elements and scalars are only converted to strings; trimming and
    /// the empty check happen per candidate in the normalizer.
    pub fn candidates(&self) -> Vec<String> {
        match self {
            PhoneNumbers::CommaString(s) => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
            PhoneNumbers::List(items) => items.iter().map(value_text).collect(),
            PhoneNumbers::Scalar(value) => vec![value_text(value)],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PhoneNumbers::CommaString(_) => "string",
            PhoneNumbers::List(_) => "list",
            PhoneNumbers::Scalar(_) => "scalar",
        }
    }
}

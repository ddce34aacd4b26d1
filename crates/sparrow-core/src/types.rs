use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::CoreError;

/// Variable bag carried by a process instance, keyed by variable name
pub type Variables = BTreeMap<String, VariableValue>;

/// A single process variable value
///
/// Variables arrive untyped from callers (query strings, forms) and are
/// checked against the consuming step's [`VariableSpec`](crate::domain::process_definition::VariableSpec)
/// before they are merged into an instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VariableValue {
    /// Numeric value
    Number(f64),
    /// Point in time, serialized as RFC 3339
    Date(DateTime<Utc>),
    /// Free text
    String(String),
}

/// The kind of a [`VariableValue`]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Free text
    String,
    /// Numeric value
    Number,
    /// Point in time
    Date,
}

impl VariableValue {
    /// The kind of this value
    #[inline]
    pub fn kind(&self) -> VariableKind {
        match self {
            VariableValue::Number(_) => VariableKind::Number,
            VariableValue::Date(_) => VariableKind::Date,
            VariableValue::String(_) => VariableKind::String,
        }
    }

    /// Borrow the value as a string slice, if it is text
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariableValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a number, if it is numeric
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariableValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as a timestamp, if it is a date
    #[inline]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            VariableValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Parse raw text into a value of the requested kind
    pub fn parse_as(kind: VariableKind, raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        match kind {
            VariableKind::String => Ok(VariableValue::String(raw.to_string())),
            VariableKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(VariableValue::Number)
                .ok_or_else(|| CoreError::ValidationError(format!("'{}' is not a number", raw))),
            VariableKind::Date => DateTime::parse_from_rfc3339(raw)
                .map(|d| VariableValue::Date(d.with_timezone(&Utc)))
                .map_err(|e| CoreError::ValidationError(format!("'{}' is not a date: {}", raw, e))),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Number(n) => write!(f, "{}", n),
            VariableValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            VariableValue::String(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::String => f.write_str("string"),
            VariableKind::Number => f.write_str("number"),
            VariableKind::Date => f.write_str("date"),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::String(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::String(s)
    }
}

impl From<f64> for VariableValue {
    fn from(n: f64) -> Self {
        VariableValue::Number(n)
    }
}

impl From<DateTime<Utc>> for VariableValue {
    fn from(d: DateTime<Utc>) -> Self {
        VariableValue::Date(d)
    }
}

/// Build a [`Variables`] map from name/value pairs
pub fn variables<I, K, V>(pairs: I) -> Variables
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<VariableValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

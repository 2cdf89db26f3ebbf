use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VdsError;

/// A caller-supplied metadata mapping.
pub type Metadata = HashMap<String, DataValue>;

/// Loosely typed value stored in a metadata record.
///
/// Core fields are validated against the variant they expect; dynamic fields
/// accept any variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),

    /// List of values (e.g. tags).
    List(Vec<DataValue>),

    /// Date and time in UTC.
    DateTime(DateTime<Utc>),
}

impl DataValue {
    /// Returns the string value if this is a String variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value if this is an Int64 variant.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float value, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            DataValue::Float64(f) => Some(*f),
            DataValue::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DataValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Short name of the variant, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "bool",
            DataValue::Int64(_) => "int64",
            DataValue::Float64(_) => "float64",
            DataValue::String(_) => "string",
            DataValue::List(_) => "list",
            DataValue::DateTime(_) => "datetime",
        }
    }
}

// --- Conversions ---

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::String(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::String(v.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int64(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Int64(v as i64)
    }
}

/// Values above `i64::MAX` do not fit [`DataValue::Int64`] and are rejected.
impl TryFrom<u64> for DataValue {
    type Error = VdsError;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        i64::try_from(v)
            .map(DataValue::Int64)
            .map_err(|_| VdsError::invalid_argument(format!("integer {v} exceeds the Int64 range")))
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Float64(v)
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        DataValue::Float64(v as f64)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(dt: DateTime<Utc>) -> Self {
        DataValue::DateTime(dt)
    }
}

impl<T: Into<DataValue>> From<Vec<T>> for DataValue {
    fn from(items: Vec<T>) -> Self {
        DataValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Build a [`Metadata`] map from key/value pairs.
///
/// ```
/// use citadel_vds::{metadata_from, DataValue};
///
/// let meta = metadata_from([("source", DataValue::from("crawler")), ("rank", 3.into())]);
/// assert_eq!(meta.len(), 2);
/// ```
pub fn metadata_from<K, I>(pairs: I) -> Metadata
where
    K: Into<String>,
    I: IntoIterator<Item = (K, DataValue)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

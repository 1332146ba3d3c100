//! Primitive field values as stored in term dictionaries.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw (unformatted) field value.
///
/// Numeric variants compare numerically with each other; text compares
/// lexicographically and sorts after every number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// 32-bit integer value.
    Int(i32),
    /// 64-bit integer value.
    Long(i64),
    /// 32-bit float value.
    Float(f32),
    /// 64-bit float value.
    Double(f64),
    /// Text value.
    Text(String),
}

impl RawValue {
    /// Integral view of the value, if it is an integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(v) => Some(i64::from(*v)),
            RawValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Floating point view of any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(v) => Some(f64::from(*v)),
            RawValue::Long(v) => Some(*v as f64),
            RawValue::Float(v) => Some(f64::from(*v)),
            RawValue::Double(v) => Some(*v),
            RawValue::Text(_) => None,
        }
    }

    /// Text view, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is numeric.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, RawValue::Text(_))
    }
}

impl PartialEq for RawValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RawValue {}

impl PartialOrd for RawValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RawValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RawValue::Text(a), RawValue::Text(b)) => a.cmp(b),
            (RawValue::Text(_), _) => Ordering::Greater,
            (_, RawValue::Text(_)) => Ordering::Less,
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                // as_f64 is always Some for numeric variants
                _ => a
                    .as_f64()
                    .unwrap_or_default()
                    .total_cmp(&b.as_f64().unwrap_or_default()),
            },
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Int(v) => write!(f, "{v}"),
            RawValue::Long(v) => write!(f, "{v}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Double(v) => write!(f, "{v}"),
            RawValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

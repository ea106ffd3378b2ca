//! Scalar values stored on property nodes.

use std::fmt;

/// The value held by a single property node.
///
/// Booleans are stored as integers (`0`/`1`), which is what observers expect
/// for flags such as `loading` or `canFilter`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    #[default]
    Void,
    String(String),
    Int(i64),
    Float(f64),
}

impl PropValue {
    /// Get the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, PropValue::Void)
    }

    /// Loose equality used when waiting for a value: numbers compare
    /// numerically across int/float.
    pub fn matches(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Int(a), PropValue::Float(b)) | (PropValue::Float(b), PropValue::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Void => write!(f, "<void>"),
            PropValue::String(s) => write!(f, "{:?}", s),
            PropValue::Int(i) => write!(f, "{}", i),
            PropValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::String(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

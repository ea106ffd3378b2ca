//! Values exchanged with script code.

use std::fmt;

use crate::graph::{Prop, PropValue};
use crate::page::{ItemObject, ModelObject};

use super::ScriptFunction;

/// A script-side value.
#[derive(Clone, Default)]
pub enum ScriptValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Plain object with ordered fields.
    Object(Vec<(String, ScriptValue)>),
    Function(ScriptFunction),
    Model(ModelObject),
    Item(ItemObject),
}

impl ScriptValue {
    /// Build a plain object from key/value pairs.
    pub fn object<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ScriptValue>,
    {
        ScriptValue::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_function(&self) -> Option<&ScriptFunction> {
        match self {
            ScriptValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Strict boolean: only an actual boolean qualifies.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelObject> {
        match self {
            ScriptValue::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&ItemObject> {
        match self {
            ScriptValue::Item(i) => Some(i),
            _ => None,
        }
    }

    /// Field lookup on plain objects.
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            ScriptValue::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ScriptValue::Undefined | ScriptValue::Null => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Int(i) => *i != 0,
            ScriptValue::Float(f) => *f != 0.0 && !f.is_nan(),
            ScriptValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Convert to a graph scalar. Non-scalars become void.
    pub fn to_prop_value(&self) -> PropValue {
        match self {
            ScriptValue::Bool(b) => PropValue::from(*b),
            ScriptValue::Int(i) => PropValue::Int(*i),
            ScriptValue::Float(f) => PropValue::Float(*f),
            ScriptValue::String(s) => PropValue::String(s.clone()),
            _ => PropValue::Void,
        }
    }

    pub fn from_prop_value(value: &PropValue) -> Self {
        match value {
            PropValue::Void => ScriptValue::Undefined,
            PropValue::String(s) => ScriptValue::String(s.clone()),
            PropValue::Int(i) => ScriptValue::Int(*i),
            PropValue::Float(f) => ScriptValue::Float(*f),
        }
    }

    /// Write this value into `prop`. Objects expand into child nodes,
    /// recursively.
    pub fn store_into(&self, prop: &Prop) {
        match self {
            ScriptValue::Object(fields) => {
                for (key, value) in fields {
                    value.store_into(&prop.create_child(key));
                }
            }
            other => prop.set_value(other.to_prop_value()),
        }
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Undefined => write!(f, "undefined"),
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Bool(b) => write!(f, "{b}"),
            ScriptValue::Int(i) => write!(f, "{i}"),
            ScriptValue::Float(v) => write!(f, "{v}"),
            ScriptValue::String(s) => write!(f, "{s:?}"),
            ScriptValue::Object(fields) => f
                .debug_map()
                .entries(fields.iter().map(|(k, v)| (k, v)))
                .finish(),
            ScriptValue::Function(func) => write!(f, "[function {}]", func.name()),
            ScriptValue::Model(m) => write!(f, "[model {}]", m.id()),
            ScriptValue::Item(_) => write!(f, "[item]"),
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Int(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Float(value)
    }
}

impl From<ScriptFunction> for ScriptValue {
    fn from(value: ScriptFunction) -> Self {
        ScriptValue::Function(value)
    }
}

impl From<ModelObject> for ScriptValue {
    fn from(value: ModelObject) -> Self {
        ScriptValue::Model(value)
    }
}

impl From<ItemObject> for ScriptValue {
    fn from(value: ItemObject) -> Self {
        ScriptValue::Item(value)
    }
}

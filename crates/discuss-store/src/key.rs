use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed key shared by every singleton-typed model.
pub const SINGLETON_KEY: &str = "singleton";

/// Value identifying a record within its model.
///
/// Keys are unique per model, never across models. Server records use numeric
/// ids; mailboxes and categories use text ids such as `"inbox"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    pub fn singleton() -> Self {
        RecordKey::Text(SINGLETON_KEY.into())
    }

    /// Interpret a payload value as a key. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordKey::Int),
            Value::String(s) => Some(RecordKey::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Int(n) => Value::from(*n),
            RecordKey::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(n) => write!(f, "{n}"),
            RecordKey::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        RecordKey::Int(value)
    }
}

impl From<i32> for RecordKey {
    fn from(value: i32) -> Self {
        RecordKey::Int(value.into())
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        RecordKey::Text(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        RecordKey::Text(value)
    }
}

/// Position of a model in its store, assigned at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub(crate) u32);

impl ModelId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Store-wide identity of one record.
///
/// A `RecordId` is handed out once per (model, key) pair and stays valid for
/// the lifetime of the store that allocated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub(crate) model: ModelId,
    pub(crate) slot: u32,
}

impl RecordId {
    pub fn model(&self) -> ModelId {
        self.model
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model.0, self.slot)
    }
}

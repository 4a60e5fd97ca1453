//! Core types for the record store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored record: a JSON object whose field order is preserved.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Longest collection name accepted, in bytes.
pub const MAX_COLLECTION_NAME_LEN: usize = 100;

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as i64)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated name of a collection, also used verbatim as its storage key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    /// Validate a collection name.
    ///
    /// Names must be non-blank, free of control characters and at most
    /// [`MAX_COLLECTION_NAME_LEN`] bytes long.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "collection name must not be empty".into(),
            ));
        }
        if name.len() > MAX_COLLECTION_NAME_LEN {
            return Err(StoreError::InvalidArgument(format!(
                "collection name is {} bytes, limit is {}",
                name.len(),
                MAX_COLLECTION_NAME_LEN
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(StoreError::InvalidArgument(format!(
                "collection name {:?} contains control characters",
                name
            )));
        }

        Ok(CollectionName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CollectionName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CollectionName::new(raw).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<&str> for CollectionName {
    type Error = StoreError;

    fn try_from(name: &str) -> Result<Self> {
        CollectionName::new(name)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CollectionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Collection({})", self.0)
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A student known to the sign-off book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_number: String,
    pub name: String,
}

impl Student {
    pub fn new(student_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            student_number: student_number.into(),
            name: name.into(),
        }
    }
}

/// One signed-off (or not yet completed) assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub student_number: String,
    pub assignment_id: String,
    pub done: bool,
    pub notes: String,
    /// Epoch milliseconds at which the sign-off was recorded.
    pub timestamp: Timestamp,
}

/// Convert any serializable value into a record.
///
/// Only values that serialize to a JSON object are records.
pub fn to_record<T: Serialize + ?Sized>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidArgument(format!(
            "records must be JSON objects, got {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ============================================================================
// spark-observable - Type Definitions
// Json alias, child keys and watcher handles
// ============================================================================

use std::fmt;

/// The document type held by a root node.
///
/// Object key order carries no meaning; serde_json's sorted map keeps
/// diagnostics deterministic.
pub type Json = serde_json::Value;

// =============================================================================
// KEY
// =============================================================================

/// Address of a child inside its parent's value.
///
/// Strings that are the canonical decimal form of an index normalize to
/// `Key::Index`, so `node.child("2")` and `node.child(2)` are the same node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Array element (or the object field named by the decimal index).
    Index(usize),
    /// Object field.
    Field(String),
}

impl Key {
    /// Normalize a field name, turning canonical indices into `Key::Index`.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.parse::<usize>() {
            Ok(index) if index.to_string() == name => Key::Index(index),
            _ => Key::Field(name),
        }
    }

    /// The key as an object field name.
    pub fn as_field(&self) -> String {
        match self {
            Key::Index(index) => index.to_string(),
            Key::Field(name) => name.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Field(name) => write!(f, "{name}"),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::field(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::field(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::field(name.as_str())
    }
}

// =============================================================================
// WATCHER ID
// =============================================================================

/// Generational handle into the thread-local watcher arena.
///
/// The slot generation changes every time a slot is released, so an id held
/// after its watcher was detached never aliases a newer watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl WatcherId {
    /// Arena slot index (diagnostics only).
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}v{}", self.index, self.generation)
    }
}

// =============================================================================
// JSON HELPERS
// =============================================================================

/// Human-readable name of a value's shape, used in error messages.
pub fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Whether the value is a primitive (not an array or object).
pub fn is_primitive(value: &Json) -> bool {
    !matches!(value, Json::Array(_) | Json::Object(_))
}

/// Equality used for no-op write detection.
///
/// Only primitives compare; composite values are never equal, because a
/// structural comparison is exactly what the store refuses to do.
///
/// Numbers are equal only when they are the same kind and value: integers
/// compare exactly, floats compare as `f64`, and an integer never equals a
/// float (`5` and `5.0` serialize differently, so the write is a change).
pub fn primitive_equals(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Null, Json::Null) => true,
        (Json::Bool(a), Json::Bool(b)) => a == b,
        (Json::String(a), Json::String(b)) => a == b,
        (Json::Number(a), Json::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                return a == b;
            }
            a.is_f64() && b.is_f64() && a.as_f64() == b.as_f64()
        }
        _ => false,
    }
}

/// Text form of a value, as placed into text leaves and attributes.
///
/// Strings are used verbatim, integral numbers print without a fraction
/// and `null` is empty.
pub fn json_text(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::Bool(b) => b.to_string(),
        Json::String(s) => s.clone(),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        other => other.to_string(),
    }
}

/// Truthiness used by `conditional()`: `null`, `false`, `0`, NaN and `""`
/// are false, everything else (including empty containers) is true.
pub fn json_truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

// =============================================================================
// TESTS
// =============================================================================

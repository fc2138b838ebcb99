use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// A value carried by a change notification.
///
/// Typed writes report their value in serializer-neutral structured form.
/// Raw string writes, removals and explicit-contract writes report the text
/// exactly as it sits in the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", content = "value", rename_all = "lowercase")]
pub enum ChangeValue {
    /// A typed value in its declared serde shape.
    Structured(Value),
    /// Raw stored text.
    Text(String),
}

impl ChangeValue {
    /// The raw text, if this value is in text form.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// The structured value, if this value is in structured form.
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Decode into a concrete type.
    ///
    /// Text is first parsed as JSON; text that is not JSON is treated as a
    /// plain string, so `Text("abc")` decodes as `String::from("abc")`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TypeError> {
        match self {
            Self::Structured(value) => {
                serde_json::from_value(value.clone()).map_err(|e| TypeError::Decode(e.to_string()))
            }
            Self::Text(text) => match serde_json::from_str(text) {
                Ok(decoded) => Ok(decoded),
                Err(_) => serde_json::from_value(Value::String(text.clone()))
                    .map_err(|e| TypeError::Decode(e.to_string())),
            },
        }
    }
}

impl fmt::Display for ChangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<Value> for ChangeValue {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for ChangeValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ChangeValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A proposed mutation, delivered to "changing" subscribers before it is
/// applied.
///
/// One instance is built per mutating call and handed by mutable reference
/// to every subscriber in turn. Any subscriber may set `cancel`; the facade
/// reads the flag once after the whole pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangePreview {
    /// The key about to change.
    pub key: String,
    /// The value currently stored, `None` if the key is absent.
    pub old_value: Option<ChangeValue>,
    /// The value about to be written, `None` for a removal.
    pub new_value: Option<ChangeValue>,
    /// Set to `true` to veto the mutation.
    pub cancel: bool,
}

impl ChangePreview {
    /// Create a preview with `cancel` cleared.
    pub fn new(
        key: impl Into<String>,
        old_value: Option<ChangeValue>,
        new_value: Option<ChangeValue>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
            cancel: false,
        }
    }

    /// Returns `true` if this preview describes a removal.
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}

/// A mutation that has already been applied, delivered to "changed"
/// subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRecord {
    /// The key that changed.
    pub key: String,
    /// The value before the change, `None` if the key was newly created.
    pub old_value: Option<ChangeValue>,
    /// The value after the change, `None` if the key was removed.
    pub new_value: Option<ChangeValue>,
}

impl ChangeRecord {
    pub fn new(
        key: impl Into<String>,
        old_value: Option<ChangeValue>,
        new_value: Option<ChangeValue>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
        }
    }

    /// Returns `true` if the key did not exist before the change.
    pub fn is_insert(&self) -> bool {
        self.old_value.is_none() && self.new_value.is_some()
    }

    /// Returns `true` if the change removed the key.
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}

impl From<ChangePreview> for ChangeRecord {
    fn from(preview: ChangePreview) -> Self {
        Self {
            key: preview.key,
            old_value: preview.old_value,
            new_value: preview.new_value,
        }
    }
}

//! The default JSON serializer.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::error::{SerdeError, SerdeResult};
use crate::options::SerializerOptions;
use crate::traits::StorageSerializer;
use crate::{decode, encode};

/// JSON serializer configured by [`SerializerOptions`].
///
/// Values are encoded through an intermediate [`Value`] so the naming and
/// null policies can be applied at struct boundaries. Object keys are
/// emitted in sorted order, which keeps output deterministic.
///
/// The structured form used for change notifications is the value's
/// declared serde shape, unaffected by the policies.
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer {
    options: SerializerOptions,
}

impl JsonSerializer {
    pub fn new(options: SerializerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }
}

impl StorageSerializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SerdeResult<String> {
        let shaped =
            encode::to_value(value, &self.options).map_err(|e| SerdeError::Encode(e.to_string()))?;
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&shaped)
        } else {
            serde_json::to_string(&shaped)
        };
        text.map_err(|e| SerdeError::Encode(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> SerdeResult<Option<T>> {
        let parsed: Value =
            serde_json::from_str(text).map_err(|e| SerdeError::Decode(e.to_string()))?;
        if parsed.is_null() {
            return Ok(None);
        }
        if self.options.renames_keys() {
            trace!(policy = ?self.options.naming, "matching stored field names to declared fields");
        }
        decode::from_value(parsed, self.options.naming)
            .map(Some)
            .map_err(|e| SerdeError::Decode(e.to_string()))
    }
}

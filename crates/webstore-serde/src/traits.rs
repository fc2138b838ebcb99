//! The serializer and type-contract interfaces.
//!
//! [`StorageSerializer`] is the process-wide default codec a facade is built
//! with. [`TypeContract`] is an explicit per-call codec for a single type,
//! used where serde-driven encoding is unavailable or unwanted.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{SerdeError, SerdeResult};
use crate::options::SerializerOptions;

/// Converts typed values to and from their stored text form.
///
/// Implementations must be deterministic: equal inputs produce equal text.
pub trait StorageSerializer: Send + Sync {
    /// Encode a value as text.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SerdeResult<String>;

    /// Decode text into a value.
    ///
    /// Returns `Ok(None)` if the text is the null literal.
    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> SerdeResult<Option<T>>;

    /// The structured form of a value, as reported in change notifications.
    ///
    /// This is the value's declared serde shape. Storage-side policies such
    /// as field renaming are not applied, so the form decodes straight back
    /// into the type that produced it.
    fn to_structured<T: Serialize + ?Sized>(&self, value: &T) -> SerdeResult<Value> {
        serde_json::to_value(value).map_err(|e| SerdeError::Encode(e.to_string()))
    }
}

/// An explicit codec for one type.
pub trait TypeContract<T>: Send + Sync {
    /// Encode `value` as text.
    fn encode(&self, value: &T, options: &SerializerOptions) -> SerdeResult<String>;

    /// Decode text, returning `Ok(None)` for the null literal.
    fn decode(&self, text: &str, options: &SerializerOptions) -> SerdeResult<Option<T>>;
}

/// A [`TypeContract`] built from a pair of closures.
pub struct FnContract<T, E, D> {
    encode: E,
    decode: D,
    _marker: PhantomData<fn() -> T>,
}

impl<T, E, D> FnContract<T, E, D>
where
    E: Fn(&T) -> SerdeResult<String> + Send + Sync,
    D: Fn(&str) -> SerdeResult<Option<T>> + Send + Sync,
{
    pub fn new(encode: E, decode: D) -> Self {
        Self {
            encode,
            decode,
            _marker: PhantomData,
        }
    }
}

impl<T, E, D> TypeContract<T> for FnContract<T, E, D>
where
    E: Fn(&T) -> SerdeResult<String> + Send + Sync,
    D: Fn(&str) -> SerdeResult<Option<T>> + Send + Sync,
{
    fn encode(&self, value: &T, _options: &SerializerOptions) -> SerdeResult<String> {
        (self.encode)(value)
    }

    fn decode(&self, text: &str, _options: &SerializerOptions) -> SerdeResult<Option<T>> {
        (self.decode)(text)
    }
}

/// A [`TypeContract`] for types with a textual form of their own
/// (`Display` + `FromStr`). The text `null` decodes to `None`.
pub struct DisplayContract<T>(PhantomData<fn() -> T>);

impl<T> DisplayContract<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DisplayContract<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeContract<T> for DisplayContract<T>
where
    T: Display + FromStr,
    T::Err: Display,
{
    fn encode(&self, value: &T, _options: &SerializerOptions) -> SerdeResult<String> {
        Ok(value.to_string())
    }

    fn decode(&self, text: &str, _options: &SerializerOptions) -> SerdeResult<Option<T>> {
        if text == "null" {
            return Ok(None);
        }
        text.parse()
            .map(Some)
            .map_err(|e: T::Err| SerdeError::Decode(e.to_string()))
    }
}

//! Decoding from a stored [`Value`], mapping renamed struct fields back to
//! the names the target type declares.
//!
//! A stored key is renamed only when it equals the policy's form of one of
//! the struct's declared fields. Map keys and enum variant names are passed
//! through untouched, which mirrors what [`crate::encode`] writes.

use serde::de::value::StringDeserializer;
use serde::de::{
    DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess, Error as _, IntoDeserializer,
    MapAccess, SeqAccess, Unexpected, VariantAccess, Visitor,
};
use serde::forward_to_deserialize_any;
use serde_json::{Map, Value};

use crate::names::convert;
use crate::options::NamingPolicy;

/// Decode a `T` from `value`, written under `naming`.
pub fn from_value<T: DeserializeOwned>(
    value: Value,
    naming: NamingPolicy,
) -> Result<T, serde_json::Error> {
    if naming == NamingPolicy::AsDeclared {
        return serde_json::from_value(value);
    }
    T::deserialize(PolicyDeserializer { value, naming })
}

fn text(s: String) -> StringDeserializer<serde_json::Error> {
    s.into_deserializer()
}

/// Rename stored keys that match a declared field under `naming`.
fn declared_names(
    map: Map<String, Value>,
    fields: &'static [&'static str],
    naming: NamingPolicy,
) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let declared = fields
                .iter()
                .find(|field| convert(field, naming) == key)
                .map_or(key, |field| (*field).to_owned());
            (declared, value)
        })
        .collect()
}

struct PolicyDeserializer {
    value: Value,
    naming: NamingPolicy,
}

impl<'de> Deserializer<'de> for PolicyDeserializer {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, serde_json::Error> {
        let naming = self.naming;
        match self.value {
            Value::Array(items) => visitor.visit_seq(Elements {
                items: items.into_iter(),
                naming,
            }),
            Value::Object(map) => visitor.visit_map(Entries {
                entries: map.into_iter(),
                pending: None,
                naming,
            }),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, serde_json::Error> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, serde_json::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, serde_json::Error> {
        let naming = self.naming;
        match self.value {
            Value::Object(map) => visitor.visit_map(Entries {
                entries: declared_names(map, fields, naming).into_iter(),
                pending: None,
                naming,
            }),
            other => PolicyDeserializer {
                value: other,
                naming,
            }
            .deserialize_any(visitor),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, serde_json::Error> {
        let naming = self.naming;
        match self.value {
            Value::String(variant) => visitor.visit_enum(text(variant)),
            Value::Object(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((variant, value)), None) => visitor.visit_enum(Variant {
                        variant,
                        value,
                        naming,
                    }),
                    _ => Err(serde_json::Error::invalid_value(
                        Unexpected::Map,
                        &"map with a single key",
                    )),
                }
            }
            other => other.deserialize_enum(name, variants, visitor),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier
        ignored_any
    }
}

struct Elements {
    items: std::vec::IntoIter<Value>,
    naming: NamingPolicy,
}

impl<'de> SeqAccess<'de> for Elements {
    type Error = serde_json::Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, serde_json::Error> {
        match self.items.next() {
            Some(value) => seed
                .deserialize(PolicyDeserializer {
                    value,
                    naming: self.naming,
                })
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct Entries {
    entries: serde_json::map::IntoIter,
    pending: Option<Value>,
    naming: NamingPolicy,
}

impl<'de> MapAccess<'de> for Entries {
    type Error = serde_json::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, serde_json::Error> {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(MapKey(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, serde_json::Error> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| serde_json::Error::custom("map value requested before its key"))?;
        seed.deserialize(PolicyDeserializer {
            value,
            naming: self.naming,
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct Variant {
    variant: String,
    value: Value,
    naming: NamingPolicy,
}

impl<'de> EnumAccess<'de> for Variant {
    type Error = serde_json::Error;
    type Variant = PolicyDeserializer;

    fn variant_seed<S: DeserializeSeed<'de>>(
        self,
        seed: S,
    ) -> Result<(S::Value, PolicyDeserializer), serde_json::Error> {
        let tag = seed.deserialize(text(self.variant))?;
        Ok((
            tag,
            PolicyDeserializer {
                value: self.value,
                naming: self.naming,
            },
        ))
    }
}

impl<'de> VariantAccess<'de> for PolicyDeserializer {
    type Error = serde_json::Error;

    fn unit_variant(self) -> Result<(), serde_json::Error> {
        serde::Deserialize::deserialize(self)
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, serde_json::Error> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, serde_json::Error> {
        Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, serde_json::Error> {
        Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}

/// An object key. Numeric and boolean targets parse the text, matching
/// serde_json's own map key handling.
struct MapKey(String);

macro_rules! parsed_key {
    ($($method:ident => $visit:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, serde_json::Error> {
                match self.0.parse() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(_) => visitor.visit_string(self.0),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for MapKey {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, serde_json::Error> {
        visitor.visit_string(self.0)
    }

    parsed_key! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, serde_json::Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, serde_json::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, serde_json::Error> {
        visitor.visit_enum(text(self.0))
    }

    forward_to_deserialize_any! {
        i128 u128 char str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

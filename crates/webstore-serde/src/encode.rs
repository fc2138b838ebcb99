//! Encoding into a [`Value`] with the naming and null policies applied.
//!
//! This is serde_json's value serializer with two changes at struct
//! boundaries: field names are converted to the configured
//! [`NamingPolicy`], and null fields are dropped under
//! [`NullHandling::Omit`]. Everything else keeps its serde shape.

use serde::ser::{
    Error as _, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};
use serde_json::{Map, Value};

use crate::names::convert;
use crate::options::{NamingPolicy, NullHandling, SerializerOptions};

/// Encode `value` as a [`Value`] shaped by `options`.
pub fn to_value<T>(value: &T, options: &SerializerOptions) -> Result<Value, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    value.serialize(PolicySerializer {
        naming: options.naming,
        nulls: options.nulls,
    })
}

#[derive(Clone, Copy)]
struct PolicySerializer {
    naming: NamingPolicy,
    nulls: NullHandling,
}

impl PolicySerializer {
    fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, serde_json::Error> {
        value.serialize(self)
    }
}

fn tagged(variant: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(variant.to_owned(), value);
    Value::Object(map)
}

/// JSON object keys must be strings; numbers, booleans and chars are
/// stringified the way serde_json does it.
fn map_key<T: Serialize + ?Sized>(key: &T) -> Result<String, serde_json::Error> {
    match key.serialize(serde_json::value::Serializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(serde_json::Error::custom("key must be a string")),
    }
}

macro_rules! primitives {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> Result<Value, serde_json::Error> {
                serde_json::value::Serializer.$method(v)
            }
        )*
    };
}

impl Serializer for PolicySerializer {
    type Ok = Value;
    type Error = serde_json::Error;
    type SerializeSeq = Elements;
    type SerializeTuple = Elements;
    type SerializeTupleStruct = Elements;
    type SerializeTupleVariant = Variant<Elements>;
    type SerializeMap = Entries;
    type SerializeStruct = Fields;
    type SerializeStructVariant = Variant<Fields>;

    primitives! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    }

    fn serialize_none(self) -> Result<Value, serde_json::Error> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, serde_json::Error> {
        self.encode(value)
    }

    fn serialize_unit(self) -> Result<Value, serde_json::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, serde_json::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, serde_json::Error> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, serde_json::Error> {
        self.encode(value)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, serde_json::Error> {
        Ok(tagged(variant, self.encode(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Elements, serde_json::Error> {
        Ok(Elements {
            ser: self,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Elements, serde_json::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Elements, serde_json::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Variant<Elements>, serde_json::Error> {
        Ok(Variant {
            variant,
            inner: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Entries, serde_json::Error> {
        Ok(Entries {
            ser: self,
            map: Map::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Fields, serde_json::Error> {
        Ok(Fields {
            ser: self,
            map: Map::new(),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Variant<Fields>, serde_json::Error> {
        Ok(Variant {
            variant,
            inner: self.serialize_struct(name, len)?,
        })
    }
}

/// Sequences, tuples and tuple structs.
struct Elements {
    ser: PolicySerializer,
    items: Vec<Value>,
}

impl SerializeSeq for Elements {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.items.push(self.ser.encode(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, serde_json::Error> {
        Ok(Value::Array(self.items))
    }
}

impl SerializeTuple for Elements {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, serde_json::Error> {
        SerializeSeq::end(self)
    }
}

impl SerializeTupleStruct for Elements {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, serde_json::Error> {
        SerializeSeq::end(self)
    }
}

/// Maps. Keys are kept verbatim.
struct Entries {
    ser: PolicySerializer,
    map: Map<String, Value>,
    next_key: Option<String>,
}

impl SerializeMap for Entries {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), serde_json::Error> {
        self.next_key = Some(map_key(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| serde_json::Error::custom("map value without a key"))?;
        self.map.insert(key, self.ser.encode(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, serde_json::Error> {
        Ok(Value::Object(self.map))
    }
}

/// Structs. Field names follow the naming policy.
struct Fields {
    ser: PolicySerializer,
    map: Map<String, Value>,
}

impl SerializeStruct for Fields {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = self.ser.encode(value)?;
        if value.is_null() && self.ser.nulls == NullHandling::Omit {
            return Ok(());
        }
        self.map.insert(convert(key, self.ser.naming), value);
        Ok(())
    }

    fn end(self) -> Result<Value, serde_json::Error> {
        Ok(Value::Object(self.map))
    }
}

/// Tuple and struct variants, written externally tagged.
struct Variant<B> {
    variant: &'static str,
    inner: B,
}

impl SerializeTupleVariant for Variant<Elements> {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        SerializeSeq::serialize_element(&mut self.inner, value)
    }

    fn end(self) -> Result<Value, serde_json::Error> {
        Ok(tagged(self.variant, SerializeSeq::end(self.inner)?))
    }
}

impl SerializeStructVariant for Variant<Fields> {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Value, serde_json::Error> {
        Ok(tagged(self.variant, SerializeStruct::end(self.inner)?))
    }
}

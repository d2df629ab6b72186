//! Depth-guarded capture of any `Serialize` value into a JSON tree.
//!
//! `serde_json::to_value` quietly turns NaN and infinities into `null` and
//! recurses without bound. Here non-finite floats are rejected, map keys
//! must serialize to strings (integers, chars and unit variants are
//! stringified the way `serde_json` does), and a graph that nests deeper
//! than the configured ceiling fails with
//! [`UnsupportedValue::DepthExceeded`]. The ceiling is what turns a
//! reference cycle in a hand-written `Serialize` impl into an error rather
//! than a stack overflow.

use crate::error::UnsupportedValue;
use serde::ser::{self, Impossible, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt::Display;

impl ser::Error for UnsupportedValue {
    fn custom<T: Display>(msg: T) -> Self {
        UnsupportedValue::Custom(msg.to_string())
    }
}

/// Capture `value` as a [`Value`], allowing at most `max_depth` nested
/// sequences, maps, structs, variants, options or newtypes. Every step that
/// recurses into another `Serialize` call spends one level.
pub fn to_value<T>(value: &T, max_depth: usize) -> Result<Value, UnsupportedValue>
where
    T: Serialize + ?Sized,
{
    value.serialize(Capture {
        depth: 0,
        max_depth,
    })
}

#[derive(Clone, Copy)]
struct Capture {
    depth: usize,
    max_depth: usize,
}

impl Capture {
    fn nested(self) -> Result<Self, UnsupportedValue> {
        if self.depth >= self.max_depth {
            return Err(UnsupportedValue::DepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self
        })
    }
}

fn finite(v: f64) -> Result<Value, UnsupportedValue> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or(UnsupportedValue::NonFiniteNumber(v))
}

impl ser::Serializer for Capture {
    type Ok = Value;
    type Error = UnsupportedValue;

    type SerializeSeq = SeqCapture;
    type SerializeTuple = SeqCapture;
    type SerializeTupleStruct = SeqCapture;
    type SerializeTupleVariant = VariantCapture<SeqCapture>;
    type SerializeMap = MapCapture;
    type SerializeStruct = MapCapture;
    type SerializeStructVariant = VariantCapture<MapCapture>;

    fn serialize_bool(self, v: bool) -> Result<Value, Self::Error> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, Self::Error> {
        if let Ok(v) = i64::try_from(v) {
            Ok(Value::from(v))
        } else if let Ok(v) = u64::try_from(v) {
            Ok(Value::from(v))
        } else {
            Err(UnsupportedValue::Custom(format!("integer {v} out of range")))
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Value, Self::Error> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, Self::Error> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, Self::Error> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Self::Error> {
        u64::try_from(v)
            .map(Value::from)
            .map_err(|_| UnsupportedValue::Custom(format!("integer {v} out of range")))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Self::Error> {
        finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Self::Error> {
        finite(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, Self::Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, Self::Error> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, Self::Error> {
        Ok(Value::Array(v.iter().copied().map(Value::from).collect()))
    }

    fn serialize_none(self) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, Self::Error> {
        value.serialize(self.nested()?)
    }

    fn serialize_unit(self) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, Self::Error> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Self::Error> {
        value.serialize(self.nested()?)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Self::Error> {
        let inner = value.serialize(self.nested()?)?;
        let mut map = Map::with_capacity(1);
        map.insert(variant.to_owned(), inner);
        Ok(Value::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCapture, Self::Error> {
        Ok(SeqCapture {
            inner: self.nested()?,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCapture, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqCapture, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantCapture<SeqCapture>, Self::Error> {
        Ok(VariantCapture {
            variant,
            body: self.nested()?.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapCapture, Self::Error> {
        Ok(MapCapture {
            inner: self.nested()?,
            map: Map::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapCapture, Self::Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantCapture<MapCapture>, Self::Error> {
        Ok(VariantCapture {
            variant,
            body: self.nested()?.serialize_map(Some(len))?,
        })
    }
}

pub struct SeqCapture {
    inner: Capture,
    items: Vec<Value>,
}

impl SeqCapture {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), UnsupportedValue> {
        self.items.push(value.serialize(self.inner)?);
        Ok(())
    }

    fn finish(self) -> Value {
        Value::Array(self.items)
    }
}

impl ser::SerializeSeq for SeqCapture {
    type Ok = Value;
    type Error = UnsupportedValue;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqCapture {
    type Ok = Value;
    type Error = UnsupportedValue;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqCapture {
    type Ok = Value;
    type Error = UnsupportedValue;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

pub struct MapCapture {
    inner: Capture,
    map: Map<String, Value>,
    next_key: Option<String>,
}

impl MapCapture {
    fn insert<T: Serialize + ?Sized>(
        &mut self,
        key: String,
        value: &T,
    ) -> Result<(), UnsupportedValue> {
        let value = value.serialize(self.inner)?;
        self.map.insert(key, value);
        Ok(())
    }

    fn finish(self) -> Value {
        Value::Object(self.map)
    }
}

impl ser::SerializeMap for MapCapture {
    type Ok = Value;
    type Error = UnsupportedValue;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Self::Error> {
        self.next_key = Some(key.serialize(KeyCapture)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| UnsupportedValue::Custom("map value without a key".to_owned()))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapCapture {
    type Ok = Value;
    type Error = UnsupportedValue;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.insert(key.to_owned(), value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

/// Externally tagged enum variant: `{"Variant": body}`.
pub struct VariantCapture<B> {
    variant: &'static str,
    body: B,
}

impl<B> VariantCapture<B> {
    fn wrap(variant: &'static str, body: Value) -> Value {
        let mut map = Map::with_capacity(1);
        map.insert(variant.to_owned(), body);
        Value::Object(map)
    }
}

impl ser::SerializeTupleVariant for VariantCapture<SeqCapture> {
    type Ok = Value;
    type Error = UnsupportedValue;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.body.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(Self::wrap(self.variant, self.body.finish()))
    }
}

impl ser::SerializeStructVariant for VariantCapture<MapCapture> {
    type Ok = Value;
    type Error = UnsupportedValue;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.body.insert(key.to_owned(), value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(Self::wrap(self.variant, self.body.finish()))
    }
}

/// Map keys: strings pass through, integers and chars are stringified,
/// everything else is a [`UnsupportedValue::NonStringKey`].
struct KeyCapture;

fn bad_key(kind: &str) -> UnsupportedValue {
    UnsupportedValue::NonStringKey(kind.to_owned())
}

impl ser::Serializer for KeyCapture {
    type Ok = String;
    type Error = UnsupportedValue;

    type SerializeSeq = Impossible<String, UnsupportedValue>;
    type SerializeTuple = Impossible<String, UnsupportedValue>;
    type SerializeTupleStruct = Impossible<String, UnsupportedValue>;
    type SerializeTupleVariant = Impossible<String, UnsupportedValue>;
    type SerializeMap = Impossible<String, UnsupportedValue>;
    type SerializeStruct = Impossible<String, UnsupportedValue>;
    type SerializeStructVariant = Impossible<String, UnsupportedValue>;

    fn serialize_bool(self, _v: bool) -> Result<String, Self::Error> {
        Err(bad_key("bool"))
    }

    fn serialize_i8(self, v: i8) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, _v: f32) -> Result<String, Self::Error> {
        Err(bad_key("float"))
    }

    fn serialize_f64(self, _v: f64) -> Result<String, Self::Error> {
        Err(bad_key("float"))
    }

    fn serialize_char(self, v: char) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, Self::Error> {
        Ok(v.to_owned())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, Self::Error> {
        Err(bad_key("bytes"))
    }

    fn serialize_none(self) -> Result<String, Self::Error> {
        Err(bad_key("none"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> Result<String, Self::Error> {
        Err(bad_key("option"))
    }

    fn serialize_unit(self) -> Result<String, Self::Error> {
        Err(bad_key("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String, Self::Error> {
        Err(bad_key(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, Self::Error> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, Self::Error> {
        Err(bad_key(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(bad_key("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(bad_key("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(bad_key(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(bad_key(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(bad_key("map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(bad_key(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(bad_key(name))
    }
}

//! A hand-rolled tagged binary format: every primitive value is preceded by a one-byte type
//! tag, mirroring the typecode-prefixed streams of the original `armi` library's own
//! encoder. This is one of the two codecs the runtime ships; the other is
//! [`crate::archive`], a `serde` + `bincode` archive.

use armi::error::Error;
use armi::types::{ReplyHeader, ReplyKind, RequestHeader};
use armi::wire::{FrameCodec, ValueCodec};
use serde::de::{self, DeserializeOwned, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::ser::{self, Serialize};

#[derive(Debug, Default, Clone, Copy)]
pub struct TaggedCodec;

mod tag {
    pub const UNIT: u8 = 0;
    pub const BOOL: u8 = 1;
    pub const I64: u8 = 2;
    pub const U64: u8 = 3;
    pub const F64: u8 = 4;
    pub const STR: u8 = 5;
    pub const BYTES: u8 = 6;
    pub const NONE: u8 = 7;
    pub const SOME: u8 = 8;
    pub const SEQ: u8 = 9;
    pub const MAP: u8 = 10;
    pub const STRUCT: u8 = 11;
    pub const VARIANT: u8 = 12;
}

fn io_err(e: impl std::fmt::Display) -> Error {
    Error::codec(e.to_string())
}

/// Writes a `u32` length/count as a big-endian-prefixed varint-free field (fixed width, kept
/// simple and unambiguous to decode).
fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

fn read_len(input: &mut &[u8]) -> Result<usize, Error> {
    if input.len() < 4 {
        return Err(Error::codec("truncated length prefix"));
    }
    let (head, rest) = input.split_at(4);
    *input = rest;
    Ok(u32::from_be_bytes(head.try_into().unwrap()) as usize)
}

fn read_exact<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8], Error> {
    if input.len() < len {
        return Err(Error::codec("truncated payload"));
    }
    let (head, rest) = input.split_at(len);
    *input = rest;
    Ok(head)
}

fn read_tag(input: &mut &[u8]) -> Result<u8, Error> {
    if input.is_empty() {
        return Err(Error::codec("truncated tag"));
    }
    let t = input[0];
    *input = &input[1..];
    Ok(t)
}

// ---------------------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------------------

struct TaggedSerializer {
    out: Vec<u8>,
}

impl TaggedSerializer {
    fn new() -> Self {
        Self { out: Vec::new() }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
struct SerError(String);

impl ser::Error for SerError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SerError(msg.to_string())
    }
}
impl de::Error for SerError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SerError(msg.to_string())
    }
}

impl<'a> ser::Serializer for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<(), SerError> {
        self.out.push(tag::BOOL);
        self.out.push(v as u8);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<(), SerError> {
        self.serialize_i64(v as i64)
    }
    fn serialize_i16(self, v: i16) -> Result<(), SerError> {
        self.serialize_i64(v as i64)
    }
    fn serialize_i32(self, v: i32) -> Result<(), SerError> {
        self.serialize_i64(v as i64)
    }
    fn serialize_i64(self, v: i64) -> Result<(), SerError> {
        self.out.push(tag::I64);
        self.out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<(), SerError> {
        self.serialize_u64(v as u64)
    }
    fn serialize_u16(self, v: u16) -> Result<(), SerError> {
        self.serialize_u64(v as u64)
    }
    fn serialize_u32(self, v: u32) -> Result<(), SerError> {
        self.serialize_u64(v as u64)
    }
    fn serialize_u64(self, v: u64) -> Result<(), SerError> {
        self.out.push(tag::U64);
        self.out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), SerError> {
        self.serialize_f64(v as f64)
    }
    fn serialize_f64(self, v: f64) -> Result<(), SerError> {
        self.out.push(tag::F64);
        self.out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<(), SerError> {
        self.serialize_str(&v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<(), SerError> {
        self.out.push(tag::STR);
        write_len(&mut self.out, v.len());
        self.out.extend_from_slice(v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), SerError> {
        self.out.push(tag::BYTES);
        write_len(&mut self.out, v.len());
        self.out.extend_from_slice(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<(), SerError> {
        self.out.push(tag::NONE);
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), SerError> {
        self.out.push(tag::SOME);
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), SerError> {
        self.out.push(tag::UNIT);
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), SerError> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<(), SerError> {
        self.out.push(tag::VARIANT);
        self.serialize_str(variant)?;
        self.out.push(tag::UNIT);
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), SerError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), SerError> {
        self.out.push(tag::VARIANT);
        self.serialize_str(variant)?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self, SerError> {
        self.out.push(tag::SEQ);
        write_len(&mut self.out, len.unwrap_or(0));
        Ok(self)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self, SerError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self, SerError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self, SerError> {
        self.out.push(tag::VARIANT);
        self.serialize_str(variant)?;
        self.serialize_seq(Some(len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self, SerError> {
        self.out.push(tag::MAP);
        write_len(&mut self.out, len.unwrap_or(0));
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self, SerError> {
        self.out.push(tag::STRUCT);
        write_len(&mut self.out, len);
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self, SerError> {
        self.out.push(tag::VARIANT);
        self.serialize_str(variant)?;
        self.serialize_struct(_name, len)
    }
}

impl<'a> ser::SerializeSeq for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerError> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), SerError> {
        Ok(())
    }
}
impl<'a> ser::SerializeTuple for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerError> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), SerError> {
        Ok(())
    }
}
impl<'a> ser::SerializeTupleStruct for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerError> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), SerError> {
        Ok(())
    }
}
impl<'a> ser::SerializeTupleVariant for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerError> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), SerError> {
        Ok(())
    }
}
impl<'a> ser::SerializeMap for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), SerError> {
        key.serialize(&mut **self)
    }
    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerError> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), SerError> {
        Ok(())
    }
}
impl<'a> ser::SerializeStruct for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), SerError> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), SerError> {
        Ok(())
    }
}
impl<'a> ser::SerializeStructVariant for &'a mut TaggedSerializer {
    type Ok = ();
    type Error = SerError;
    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), SerError> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), SerError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------
// Deserializer
// ---------------------------------------------------------------------------------------

struct TaggedDeserializer<'de> {
    input: &'de [u8],
}

impl<'de> TaggedDeserializer<'de> {
    fn new(input: &'de [u8]) -> Self {
        Self { input }
    }
}

macro_rules! forward_to_i64 {
    ($($method:ident => $visit:ident : $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
                let v = self.read_i64()?;
                visitor.$visit(v as $ty)
            }
        )*
    };
}

impl<'de> TaggedDeserializer<'de> {
    fn read_tag(&mut self) -> Result<u8, SerError> {
        read_tag(&mut self.input).map_err(|e| SerError(e.to_string()))
    }

    fn read_i64(&mut self) -> Result<i64, SerError> {
        match self.read_tag()? {
            tag::I64 => {
                let bytes = read_exact(&mut self.input, 8).map_err(|e| SerError(e.to_string()))?;
                Ok(i64::from_be_bytes(bytes.try_into().unwrap()))
            }
            tag::U64 => {
                let bytes = read_exact(&mut self.input, 8).map_err(|e| SerError(e.to_string()))?;
                Ok(u64::from_be_bytes(bytes.try_into().unwrap()) as i64)
            }
            other => Err(SerError(format!("expected integer tag, got {other}"))),
        }
    }

    fn read_u64(&mut self) -> Result<u64, SerError> {
        Ok(self.read_i64()? as u64)
    }

    fn read_f64(&mut self) -> Result<f64, SerError> {
        match self.read_tag()? {
            tag::F64 => {
                let bytes = read_exact(&mut self.input, 8).map_err(|e| SerError(e.to_string()))?;
                Ok(f64::from_be_bytes(bytes.try_into().unwrap()))
            }
            other => Err(SerError(format!("expected float tag, got {other}"))),
        }
    }

    fn read_string(&mut self) -> Result<String, SerError> {
        match self.read_tag()? {
            tag::STR => {
                let len = read_len(&mut self.input).map_err(|e| SerError(e.to_string()))?;
                let bytes = read_exact(&mut self.input, len).map_err(|e| SerError(e.to_string()))?;
                String::from_utf8(bytes.to_vec()).map_err(|e| SerError(e.to_string()))
            }
            other => Err(SerError(format!("expected string tag, got {other}"))),
        }
    }
}

impl<'de, 'a> de::Deserializer<'de> for &'a mut TaggedDeserializer<'de> {
    type Error = SerError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        let saved = self.input;
        let t = self.read_tag()?;
        self.input = saved;
        match t {
            tag::UNIT => self.deserialize_unit(visitor),
            tag::BOOL => self.deserialize_bool(visitor),
            tag::I64 | tag::U64 => self.deserialize_i64(visitor),
            tag::F64 => self.deserialize_f64(visitor),
            tag::STR => self.deserialize_str(visitor),
            tag::BYTES => self.deserialize_bytes(visitor),
            tag::NONE | tag::SOME => self.deserialize_option(visitor),
            tag::SEQ => self.deserialize_seq(visitor),
            tag::MAP => self.deserialize_map(visitor),
            tag::STRUCT => self.deserialize_map(visitor),
            tag::VARIANT => self.deserialize_enum("", &[], visitor),
            other => Err(SerError(format!("unknown tag {other}"))),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        match self.read_tag()? {
            tag::BOOL => {
                let byte = read_exact(&mut self.input, 1).map_err(|e| SerError(e.to_string()))?;
                visitor.visit_bool(byte[0] != 0)
            }
            other => Err(SerError(format!("expected bool tag, got {other}"))),
        }
    }

    forward_to_i64!(
        deserialize_i8 => visit_i8 : i8,
        deserialize_i16 => visit_i16 : i16,
        deserialize_i32 => visit_i32 : i32,
        deserialize_i64 => visit_i64 : i64,
    );

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        visitor.visit_u8(self.read_u64()? as u8)
    }
    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        visitor.visit_u16(self.read_u64()? as u16)
    }
    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        visitor.visit_u32(self.read_u64()? as u32)
    }
    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        visitor.visit_u64(self.read_u64()?)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        visitor.visit_f32(self.read_f64()? as f32)
    }
    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        visitor.visit_f64(self.read_f64()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        let s = self.read_string()?;
        let c = s.chars().next().ok_or_else(|| SerError("empty char".into()))?;
        visitor.visit_char(c)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        visitor.visit_string(self.read_string()?)
    }
    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        match self.read_tag()? {
            tag::BYTES => {
                let len = read_len(&mut self.input).map_err(|e| SerError(e.to_string()))?;
                let bytes = read_exact(&mut self.input, len).map_err(|e| SerError(e.to_string()))?;
                visitor.visit_byte_buf(bytes.to_vec())
            }
            other => Err(SerError(format!("expected bytes tag, got {other}"))),
        }
    }
    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        let saved = self.input;
        match self.read_tag()? {
            tag::NONE => visitor.visit_none(),
            tag::SOME => visitor.visit_some(self),
            _ => {
                self.input = saved;
                Err(SerError("expected option tag".into()))
            }
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        match self.read_tag()? {
            tag::UNIT => visitor.visit_unit(),
            other => Err(SerError(format!("expected unit tag, got {other}"))),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, SerError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, SerError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        match self.read_tag()? {
            tag::SEQ => {
                let len = read_len(&mut self.input).map_err(|e| SerError(e.to_string()))?;
                visitor.visit_seq(TaggedSeqAccess { de: self, remaining: len })
            }
            other => Err(SerError(format!("expected seq tag, got {other}"))),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, SerError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, SerError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        match self.read_tag()? {
            tag::MAP | tag::STRUCT => {
                let len = read_len(&mut self.input).map_err(|e| SerError(e.to_string()))?;
                visitor.visit_map(TaggedMapAccess { de: self, remaining: len })
            }
            other => Err(SerError(format!("expected map tag, got {other}"))),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, SerError> {
        match self.read_tag()? {
            tag::STRUCT => {
                let len = read_len(&mut self.input).map_err(|e| SerError(e.to_string()))?;
                visitor.visit_seq(TaggedStructAccess { de: self, remaining: len })
            }
            other => Err(SerError(format!("expected struct tag, got {other}"))),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, SerError> {
        match self.read_tag()? {
            tag::VARIANT => visitor.visit_enum(TaggedEnumAccess { de: self }),
            other => Err(SerError(format!("expected variant tag, got {other}"))),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerError> {
        self.deserialize_any(visitor)
    }

    serde::forward_to_deserialize_any! {
        i128 u128
    }
}

struct TaggedSeqAccess<'de, 'a> {
    de: &'a mut TaggedDeserializer<'de>,
    remaining: usize,
}

impl<'de, 'a> SeqAccess<'de> for TaggedSeqAccess<'de, 'a> {
    type Error = SerError;
    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, SerError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.de).map(Some)
    }
    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// Struct fields are encoded positionally (as a seq of values), so decoding walks them in
/// declaration order rather than by name.
struct TaggedStructAccess<'de, 'a> {
    de: &'a mut TaggedDeserializer<'de>,
    remaining: usize,
}

impl<'de, 'a> SeqAccess<'de> for TaggedStructAccess<'de, 'a> {
    type Error = SerError;
    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, SerError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.de).map(Some)
    }
}

struct TaggedMapAccess<'de, 'a> {
    de: &'a mut TaggedDeserializer<'de>,
    remaining: usize,
}

impl<'de, 'a> MapAccess<'de> for TaggedMapAccess<'de, 'a> {
    type Error = SerError;
    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, SerError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        seed.deserialize(&mut *self.de).map(Some)
    }
    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, SerError> {
        self.remaining -= 1;
        seed.deserialize(&mut *self.de)
    }
}

struct TaggedEnumAccess<'de, 'a> {
    de: &'a mut TaggedDeserializer<'de>,
}

impl<'de, 'a> EnumAccess<'de> for TaggedEnumAccess<'de, 'a> {
    type Error = SerError;
    type Variant = TaggedVariantAccess<'de, 'a>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), SerError> {
        let name = self.de.read_string()?;
        let value = seed.deserialize(name.into_deserializer())?;
        Ok((value, TaggedVariantAccess { de: self.de }))
    }
}

use serde::de::IntoDeserializer;

struct TaggedVariantAccess<'de, 'a> {
    de: &'a mut TaggedDeserializer<'de>,
}

impl<'de, 'a> VariantAccess<'de> for TaggedVariantAccess<'de, 'a> {
    type Error = SerError;

    fn unit_variant(self) -> Result<(), SerError> {
        de::Deserialize::deserialize(self.de)
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, SerError> {
        seed.deserialize(self.de)
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, SerError> {
        de::Deserializer::deserialize_tuple(self.de, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, SerError> {
        de::Deserializer::deserialize_struct(self.de, "", fields, visitor)
    }
}

// ---------------------------------------------------------------------------------------
// Codec impl
// ---------------------------------------------------------------------------------------

impl FrameCodec for TaggedCodec {
    fn encode_request_header(&self, header: &RequestHeader) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.extend_from_slice(&header.request_id.to_be_bytes());
        out.extend_from_slice(&header.interface_id.to_be_bytes());
        out.extend_from_slice(&header.method_id.to_be_bytes());
        out.extend_from_slice(&header.arg_count.to_be_bytes());
        out
    }

    fn decode_request_header<'a>(
        &self,
        bytes: &'a [u8],
    ) -> Result<(RequestHeader, &'a [u8]), Error> {
        if bytes.len() < 20 {
            return Err(Error::codec("request frame too short"));
        }
        let request_id = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let interface_id = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        let method_id = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
        let arg_count = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
        Ok((
            RequestHeader {
                request_id,
                interface_id,
                method_id,
                arg_count,
            },
            &bytes[20..],
        ))
    }

    fn encode_reply_header(&self, header: &ReplyHeader) -> Vec<u8> {
        let mut out = Vec::with_capacity(13);
        out.extend_from_slice(&header.request_id.to_be_bytes());
        out.push(header.reply_kind.tag());
        out.extend_from_slice(&header.count.to_be_bytes());
        out
    }

    fn decode_reply_header<'a>(&self, bytes: &'a [u8]) -> Result<(ReplyHeader, &'a [u8]), Error> {
        if bytes.len() < 13 {
            return Err(Error::codec("reply frame too short"));
        }
        let request_id = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let reply_kind = ReplyKind::from_tag(bytes[8])?;
        let count = u32::from_be_bytes(bytes[9..13].try_into().unwrap());
        Ok((
            ReplyHeader {
                request_id,
                reply_kind,
                count,
            },
            &bytes[13..],
        ))
    }
}

impl ValueCodec for TaggedCodec {
    fn encode_value<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Error> {
        let mut ser = TaggedSerializer::new();
        value
            .serialize(&mut ser)
            .map_err(|e| Error::codec(e.to_string()))?;
        Ok(ser.out)
    }

    fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error> {
        let mut de = TaggedDeserializer::new(bytes);
        T::deserialize(&mut de).map_err(|e| Error::codec(e.to_string()))
    }

    fn encode_error(&self, category: u32, code: u32, message: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&category.to_be_bytes());
        out.extend_from_slice(&code.to_be_bytes());
        write_len(&mut out, message.len());
        out.extend_from_slice(message.as_bytes());
        out
    }

    fn decode_error(&self, bytes: &[u8]) -> Result<(u32, u32, String), Error> {
        let mut input = bytes;
        if input.len() < 8 {
            return Err(Error::codec("truncated error payload"));
        }
        let category = u32::from_be_bytes(input[0..4].try_into().unwrap());
        let code = u32::from_be_bytes(input[4..8].try_into().unwrap());
        input = &input[8..];
        let len = read_len(&mut input)?;
        let bytes = read_exact(&mut input, len)?;
        let message = String::from_utf8(bytes.to_vec()).map_err(io_err)?;
        Ok((category, code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i64,
        y: i64,
        label: Option<String>,
    }

    #[test]
    fn round_trips_a_struct_with_option() {
        let codec = TaggedCodec;
        let value = Point {
            x: 3,
            y: -4,
            label: Some("origin".to_string()),
        };
        let bytes = codec.encode_value(&value).unwrap();
        let decoded: Point = codec.decode_value(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trips_a_vec_of_strings() {
        let codec = TaggedCodec;
        let value = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let bytes = codec.encode_value(&value).unwrap();
        let decoded: Vec<String> = codec.decode_value(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn error_payload_round_trips() {
        let codec = TaggedCodec;
        let bytes = codec.encode_error(1, 7, "boom");
        let (category, code, message) = codec.decode_error(&bytes).unwrap();
        assert_eq!((category, code, message.as_str()), (1, 7, "boom"));
    }

    #[test]
    fn request_header_round_trips() {
        let codec = TaggedCodec;
        let header = RequestHeader {
            request_id: 42,
            interface_id: 1,
            method_id: 2,
            arg_count: 3,
        };
        let bytes = codec.encode_request_header(&header);
        let (decoded, rest) = codec.decode_request_header(&bytes).unwrap();
        assert_eq!(decoded.request_id, header.request_id);
        assert!(rest.is_empty());
    }
}

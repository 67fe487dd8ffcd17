//! The typed-value codec: CQL type descriptors and the values they describe.
//!
//! A [`Value`] is a self-describing Rust value; a [`CqlType`] is the wire
//! descriptor the server sends alongside it (in `[result]` metadata and
//! `[prepared]` bind metadata) and is what a decoder needs to interpret an
//! opaque `[bytes]` payload.
use std::net::IpAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_bigint::BigInt;
use uuid::Uuid;

use crate::{
    error::ErrorKind,
    protocol::{duration, utf8, varint, CqlRead, CqlWrite},
    Result,
};

/// A CQL column/bind-variable type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CqlType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    TimeUuid,
    Inet,
    Date,
    Time,
    SmallInt,
    TinyInt,
    Duration,
    List(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
    Set(Box<CqlType>),
    Tuple(Vec<CqlType>),
    Udt { keyspace: String, name: String, fields: Vec<(String, CqlType)> },
    Custom(String),
}

/// A value bound to, or decoded from, a single CQL column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Ascii(String),
    BigInt(i64),
    Blob(Bytes),
    Boolean(bool),
    Counter(i64),
    Decimal { scale: i32, unscaled: BigInt },
    Double(f64),
    Float(f32),
    Int(i32),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Uuid(Uuid),
    Varchar(String),
    Varint(BigInt),
    TimeUuid(Uuid),
    Inet(IpAddr),
    /// Days since the epoch, biased by 2^31 (the raw wire encoding).
    Date(u32),
    /// Nanoseconds since midnight.
    Time(i64),
    SmallInt(i16),
    TinyInt(i8),
    Duration { months: i32, days: i32, nanos: i64 },
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    /// Elements in declared order; `None` marks a null field.
    Tuple(Vec<Option<Value>>),
    /// Fields in the UDT's declared order; `None` marks a null field.
    Udt(Vec<Option<Value>>),
}

/// A value as it is bound into a query's `[value]` list: in addition to an
/// ordinary value, protocol v4+ distinguishes an explicit `NULL` (-1) from an
/// `UNSET` (-2) placeholder that leaves a column untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Null,
    Unset,
    Value(Value),
}

impl From<Value> for BoundValue {
    fn from(v: Value) -> Self {
        BoundValue::Value(v)
    }
}

impl CqlType {
    /// Decodes a `[option]`: a u16 id plus an id-specific payload, used for
    /// column specs and prepared-statement bind/result metadata.
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let id = buf.get_cql_short()?;
        Ok(match id {
            0x0000 => CqlType::Custom(buf.get_cql_string()?),
            0x0001 => CqlType::Ascii,
            0x0002 => CqlType::BigInt,
            0x0003 => CqlType::Blob,
            0x0004 => CqlType::Boolean,
            0x0005 => CqlType::Counter,
            0x0006 => CqlType::Decimal,
            0x0007 => CqlType::Double,
            0x0008 => CqlType::Float,
            0x0009 => CqlType::Int,
            0x000B => CqlType::Timestamp,
            0x000C => CqlType::Uuid,
            0x000D => CqlType::Varchar,
            0x000E => CqlType::Varint,
            0x000F => CqlType::TimeUuid,
            0x0010 => CqlType::Inet,
            0x0011 => CqlType::Date,
            0x0012 => CqlType::Time,
            0x0013 => CqlType::SmallInt,
            0x0014 => CqlType::TinyInt,
            0x0015 => CqlType::Duration,
            0x0020 => CqlType::List(Box::new(CqlType::decode(buf)?)),
            0x0021 => {
                let key = CqlType::decode(buf)?;
                let value = CqlType::decode(buf)?;
                CqlType::Map(Box::new(key), Box::new(value))
            }
            0x0022 => CqlType::Set(Box::new(CqlType::decode(buf)?)),
            0x0031 => {
                let keyspace = buf.get_cql_string()?;
                let name = buf.get_cql_string()?;
                let count = buf.get_cql_short()?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let field_name = buf.get_cql_string()?;
                    let field_type = CqlType::decode(buf)?;
                    fields.push((field_name, field_type));
                }
                CqlType::Udt { keyspace, name, fields }
            }
            0x0032 => {
                let count = buf.get_cql_short()?;
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(CqlType::decode(buf)?);
                }
                CqlType::Tuple(elements)
            }
            other => return Err(ErrorKind::Decode(format!("unknown type option id {other:#06x}")).into()),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        match self {
            CqlType::Custom(name) => {
                buf.put_cql_short(0x0000);
                buf.put_cql_string(name)?;
            }
            CqlType::Ascii => buf.put_cql_short(0x0001),
            CqlType::BigInt => buf.put_cql_short(0x0002),
            CqlType::Blob => buf.put_cql_short(0x0003),
            CqlType::Boolean => buf.put_cql_short(0x0004),
            CqlType::Counter => buf.put_cql_short(0x0005),
            CqlType::Decimal => buf.put_cql_short(0x0006),
            CqlType::Double => buf.put_cql_short(0x0007),
            CqlType::Float => buf.put_cql_short(0x0008),
            CqlType::Int => buf.put_cql_short(0x0009),
            CqlType::Timestamp => buf.put_cql_short(0x000B),
            CqlType::Uuid => buf.put_cql_short(0x000C),
            CqlType::Varchar => buf.put_cql_short(0x000D),
            CqlType::Varint => buf.put_cql_short(0x000E),
            CqlType::TimeUuid => buf.put_cql_short(0x000F),
            CqlType::Inet => buf.put_cql_short(0x0010),
            CqlType::Date => buf.put_cql_short(0x0011),
            CqlType::Time => buf.put_cql_short(0x0012),
            CqlType::SmallInt => buf.put_cql_short(0x0013),
            CqlType::TinyInt => buf.put_cql_short(0x0014),
            CqlType::Duration => buf.put_cql_short(0x0015),
            CqlType::List(elem) => {
                buf.put_cql_short(0x0020);
                elem.encode(buf)?;
            }
            CqlType::Map(key, value) => {
                buf.put_cql_short(0x0021);
                key.encode(buf)?;
                value.encode(buf)?;
            }
            CqlType::Set(elem) => {
                buf.put_cql_short(0x0022);
                elem.encode(buf)?;
            }
            CqlType::Udt { keyspace, name, fields } => {
                buf.put_cql_short(0x0031);
                buf.put_cql_string(keyspace)?;
                buf.put_cql_string(name)?;
                let count: u16 = fields.len().try_into().map_err(|_| ErrorKind::Encode("udt field count"))?;
                buf.put_cql_short(count);
                for (field_name, field_type) in fields {
                    buf.put_cql_string(field_name)?;
                    field_type.encode(buf)?;
                }
            }
            CqlType::Tuple(elements) => {
                buf.put_cql_short(0x0032);
                let count: u16 = elements.len().try_into().map_err(|_| ErrorKind::Encode("tuple arity"))?;
                buf.put_cql_short(count);
                for element in elements {
                    element.encode(buf)?;
                }
            }
        }
        Ok(())
    }
}

/// Days since the Unix epoch, encoded with the protocol's 2^31 bias.
pub mod date {
    /// The wire encoding for 1970-01-01.
    pub const EPOCH: u32 = 1 << 31;

    pub fn from_days_since_epoch(days: i64) -> u32 {
        (days + EPOCH as i64) as u32
    }

    pub fn to_days_since_epoch(raw: u32) -> i64 {
        raw as i64 - EPOCH as i64
    }
}

/// Writes the raw, unprefixed wire payload for `value`.
pub fn encode(value: &Value) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_into(value, &mut buf)?;
    Ok(buf.freeze())
}

fn encode_into(value: &Value, buf: &mut BytesMut) -> Result<()> {
    match value {
        Value::Ascii(s) => {
            if !s.is_ascii() {
                return Err(ErrorKind::Encode("ascii").into());
            }
            buf.put_slice(s.as_bytes());
        }
        Value::BigInt(v) | Value::Counter(v) | Value::Timestamp(v) => buf.put_i64(*v),
        Value::Blob(b) => buf.put_slice(b),
        Value::Boolean(b) => buf.put_u8(if *b { 1 } else { 0 }),
        Value::Decimal { scale, unscaled } => {
            buf.put_cql_int(*scale);
            varint::put(buf, unscaled);
        }
        Value::Double(v) => buf.put_f64(*v),
        Value::Float(v) => buf.put_f32(*v),
        Value::Int(v) => buf.put_i32(*v),
        Value::Uuid(u) | Value::TimeUuid(u) => buf.put_slice(u.as_bytes()),
        Value::Varchar(s) => buf.put_slice(s.as_bytes()),
        Value::Varint(v) => varint::put(buf, v),
        Value::Inet(addr) => buf.put_cql_inet_addr(*addr),
        Value::Date(raw) => buf.put_u32(*raw),
        Value::Time(ns) => buf.put_i64(*ns),
        Value::SmallInt(v) => buf.put_i16(*v),
        Value::TinyInt(v) => buf.put_i8(*v),
        Value::Duration { months, days, nanos } => {
            duration::encode_signed(*months as i64, buf);
            duration::encode_signed(*days as i64, buf);
            duration::encode_signed(*nanos, buf);
        }
        Value::List(items) | Value::Set(items) => {
            put_collection_count(buf, items.len())?;
            for item in items {
                put_prefixed(buf, item)?;
            }
        }
        Value::Map(entries) => {
            put_collection_count(buf, entries.len())?;
            for (k, v) in entries {
                put_prefixed(buf, k)?;
                put_prefixed(buf, v)?;
            }
        }
        Value::Tuple(elements) | Value::Udt(elements) => {
            for element in elements {
                put_prefixed_opt(buf, element.as_ref())?;
            }
        }
    }
    Ok(())
}

fn put_collection_count(buf: &mut BytesMut, len: usize) -> Result<()> {
    let count: i32 = len.try_into().map_err(|_| ErrorKind::Encode("collection count"))?;
    buf.put_i32(count);
    Ok(())
}

fn put_prefixed(buf: &mut BytesMut, value: &Value) -> Result<()> {
    put_prefixed_opt(buf, Some(value))
}

fn put_prefixed_opt(buf: &mut BytesMut, value: Option<&Value>) -> Result<()> {
    match value {
        None => buf.put_i32(-1),
        Some(v) => {
            let encoded = encode(v)?;
            let len: i32 = encoded.len().try_into().map_err(|_| ErrorKind::Encode("element"))?;
            buf.put_i32(len);
            buf.put_slice(&encoded);
        }
    }
    Ok(())
}

/// Writes a query bind value: a `[bytes]`-shaped i32 length prefix, with -1
/// for `NULL` and -2 for `UNSET`.
pub fn write_bound(buf: &mut impl BufMut, value: &BoundValue) -> Result<()> {
    match value {
        BoundValue::Null => buf.put_i32(-1),
        BoundValue::Unset => buf.put_i32(-2),
        BoundValue::Value(v) => {
            let encoded = encode(v)?;
            let len: i32 = encoded.len().try_into().map_err(|_| ErrorKind::Encode("bound value"))?;
            buf.put_i32(len);
            buf.put_slice(&encoded);
        }
    }
    Ok(())
}

/// Decodes a raw, already length-delimited payload according to `ty`.
pub fn decode(mut bytes: Bytes, ty: &CqlType) -> Result<Value> {
    decode_buf(&mut bytes, ty)
}

fn decode_buf(buf: &mut Bytes, ty: &CqlType) -> Result<Value> {
    Ok(match ty {
        CqlType::Ascii => Value::Ascii(utf8(buf)?.to_owned()),
        CqlType::BigInt => Value::BigInt(take_i64(buf)?),
        CqlType::Blob => Value::Blob(buf.copy_to_bytes(buf.remaining())),
        CqlType::Boolean => Value::Boolean(buf.get_cql_byte()? != 0),
        CqlType::Counter => Value::Counter(take_i64(buf)?),
        CqlType::Decimal => {
            let scale = buf.get_cql_int()?;
            let unscaled = varint::decode(buf);
            Value::Decimal { scale, unscaled }
        }
        CqlType::Double => Value::Double(buf.get_cql_double()?),
        CqlType::Float => Value::Float(buf.get_cql_float()?),
        CqlType::Int => Value::Int(buf.get_cql_int()?),
        CqlType::Timestamp => Value::Timestamp(take_i64(buf)?),
        CqlType::Uuid => Value::Uuid(buf.get_cql_uuid()?),
        CqlType::Varchar => Value::Varchar(utf8(buf)?.to_owned()),
        CqlType::Varint => Value::Varint(varint::decode(buf)),
        CqlType::TimeUuid => Value::TimeUuid(buf.get_cql_uuid()?),
        CqlType::Inet => Value::Inet(decode_bare_inet(buf)?),
        CqlType::Date => Value::Date(buf.get_cql_int()? as u32),
        CqlType::Time => Value::Time(take_i64(buf)?),
        CqlType::SmallInt => {
            buf.require(2)?;
            Value::SmallInt(buf.get_i16())
        }
        CqlType::TinyInt => {
            buf.require(1)?;
            Value::TinyInt(buf.get_i8())
        }
        CqlType::Duration => {
            let months = duration::decode_signed(buf)? as i32;
            let days = duration::decode_signed(buf)? as i32;
            let nanos = duration::decode_signed(buf)?;
            Value::Duration { months, days, nanos }
        }
        CqlType::List(elem) => Value::List(decode_elements(buf, elem)?),
        CqlType::Set(elem) => Value::Set(decode_elements(buf, elem)?),
        CqlType::Map(key_ty, value_ty) => {
            let count = buf.get_cql_int()?;
            let mut entries = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                let k = decode_prefixed(buf, key_ty)?.ok_or_else(|| ErrorKind::Decode("null map key".into()))?;
                let v = decode_prefixed(buf, value_ty)?.ok_or_else(|| ErrorKind::Decode("null map value".into()))?;
                entries.push((k, v));
            }
            Value::Map(entries)
        }
        CqlType::Tuple(element_types) => {
            let mut elements = Vec::with_capacity(element_types.len());
            for ty in element_types {
                elements.push(decode_prefixed(buf, ty)?);
            }
            Value::Tuple(elements)
        }
        CqlType::Udt { fields, .. } => {
            let mut values = Vec::with_capacity(fields.len());
            for (_, ty) in fields {
                values.push(decode_prefixed(buf, ty)?);
            }
            Value::Udt(values)
        }
        CqlType::Custom(name) => return Err(ErrorKind::Decode(format!("unsupported custom type `{name}`")).into()),
    })
}

fn take_i64(buf: &mut Bytes) -> Result<i64> {
    buf.get_cql_long()
}

fn decode_bare_inet(buf: &mut Bytes) -> Result<IpAddr> {
    use std::net::{Ipv4Addr, Ipv6Addr};
    match buf.remaining() {
        4 => {
            let mut b = [0u8; 4];
            buf.copy_to_slice(&mut b);
            Ok(IpAddr::V4(Ipv4Addr::from(b)))
        }
        16 => {
            let mut b = [0u8; 16];
            buf.copy_to_slice(&mut b);
            Ok(IpAddr::V6(Ipv6Addr::from(b)))
        }
        other => Err(ErrorKind::Decode(format!("invalid inet value length {other}")).into()),
    }
}

fn decode_elements(buf: &mut Bytes, elem: &CqlType) -> Result<Vec<Value>> {
    let count = buf.get_cql_int()?;
    let mut items = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let v = decode_prefixed(buf, elem)?.ok_or_else(|| ErrorKind::Decode("null collection element".into()))?;
        items.push(v);
    }
    Ok(items)
}

/// Reads one `[bytes]`-shaped column value (i32 length, -1 for null) and
/// decodes it per `ty`. Used by both nested collection elements and
/// top-level row columns in `RESULT` frames.
pub(crate) fn decode_prefixed(buf: &mut Bytes, ty: &CqlType) -> Result<Option<Value>> {
    let len = buf.get_cql_int()?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    buf.require(len)?;
    let mut slice = buf.copy_to_bytes(len);
    Ok(Some(decode_buf(&mut slice, ty)?))
}

macro_rules! from_scalar {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        }
    };
}

from_scalar!(i32, Int);
from_scalar!(i64, BigInt);
from_scalar!(f64, Double);
from_scalar!(bool, Boolean);
from_scalar!(Uuid, Uuid);
from_scalar!(IpAddr, Inet);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

impl From<(u8, u8, u8, u8)> for Value {
    fn from((a, b, c, d): (u8, u8, u8, u8)) -> Self {
        Value::Inet(IpAddr::V4(std::net::Ipv4Addr::new(a, b, c, d)))
    }
}

impl From<[u8; 16]> for Value {
    fn from(octets: [u8; 16]) -> Self {
        Value::Inet(IpAddr::V6(std::net::Ipv6Addr::from(octets)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    fn roundtrip(value: Value, ty: CqlType) {
        let bytes = encode(&value).unwrap();
        assert_eq!(decode(bytes, &ty).unwrap(), value);
    }

    #[test]
    fn scalars_roundtrip() {
        roundtrip(Value::Int(-42), CqlType::Int);
        roundtrip(Value::BigInt(i64::MIN), CqlType::BigInt);
        roundtrip(Value::Boolean(true), CqlType::Boolean);
        roundtrip(Value::Double(3.5), CqlType::Double);
        roundtrip(Value::Float(-1.25), CqlType::Float);
        roundtrip(Value::Varchar("hello".into()), CqlType::Varchar);
        roundtrip(Value::Blob(Bytes::from_static(b"\x00\x01\xff")), CqlType::Blob);
        roundtrip(Value::SmallInt(-7), CqlType::SmallInt);
        roundtrip(Value::TinyInt(-7), CqlType::TinyInt);
        roundtrip(Value::Inet(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))), CqlType::Inet);
    }

    #[test]
    fn decimal_roundtrips_with_negative_unscaled() {
        let v = Value::Decimal { scale: 4, unscaled: BigInt::from(-12345) };
        roundtrip(v, CqlType::Decimal);
    }

    #[test]
    fn date_bias_matches_epoch() {
        assert_eq!(date::from_days_since_epoch(0), date::EPOCH);
        assert_eq!(date::from_days_since_epoch(-1), date::EPOCH - 1);
        assert_eq!(date::to_days_since_epoch(date::EPOCH), 0);
        roundtrip(Value::Date(date::from_days_since_epoch(19723)), CqlType::Date);
    }

    #[test]
    fn timestamp_allows_pre_epoch_values() {
        roundtrip(Value::Timestamp(-86_400_000), CqlType::Timestamp);
    }

    #[test]
    fn duration_roundtrips_mixed_sign_components() {
        roundtrip(Value::Duration { months: -1, days: 2, nanos: -3_600_000_000_000 }, CqlType::Duration);
    }

    #[test]
    fn list_roundtrips() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        roundtrip(v, CqlType::List(Box::new(CqlType::Int)));
    }

    #[test]
    fn map_roundtrips() {
        let v = Value::Map(vec![(Value::Varchar("a".into()), Value::Int(1)), (Value::Varchar("b".into()), Value::Int(2))]);
        roundtrip(v, CqlType::Map(Box::new(CqlType::Varchar), Box::new(CqlType::Int)));
    }

    #[test]
    fn tuple_allows_null_elements() {
        let v = Value::Tuple(vec![Some(Value::Int(1)), None, Some(Value::Varchar("x".into()))]);
        roundtrip(v, CqlType::Tuple(vec![CqlType::Int, CqlType::BigInt, CqlType::Varchar]));
    }

    #[test]
    fn udt_roundtrips_in_declared_order() {
        let ty = CqlType::Udt {
            keyspace: "ks".into(),
            name: "address".into(),
            fields: vec![("street".into(), CqlType::Varchar), ("zip".into(), CqlType::Int)],
        };
        let v = Value::Udt(vec![Some(Value::Varchar("Main St".into())), None]);
        roundtrip(v, ty);
    }

    #[test]
    fn type_option_roundtrips_nested_collection() {
        let ty = CqlType::Map(Box::new(CqlType::Varchar), Box::new(CqlType::List(Box::new(CqlType::Int))));
        let mut buf = BytesMut::new();
        ty.encode(&mut buf).unwrap();
        let mut read = buf.freeze();
        assert_eq!(CqlType::decode(&mut read).unwrap(), ty);
    }

    #[test]
    fn type_option_roundtrips_udt() {
        let ty = CqlType::Udt { keyspace: "ks".into(), name: "addr".into(), fields: vec![("street".into(), CqlType::Varchar)] };
        let mut buf = BytesMut::new();
        ty.encode(&mut buf).unwrap();
        let mut read = buf.freeze();
        assert_eq!(CqlType::decode(&mut read).unwrap(), ty);
    }

    #[test]
    fn polymorphic_constructors_pick_expected_defaults() {
        assert_eq!(Value::from(7i32), Value::Int(7));
        assert_eq!(Value::from(3.14f64), Value::Double(3.14));
        assert_eq!(Value::from(true), Value::Boolean(true));
        assert_eq!(Value::from("hi"), Value::Varchar("hi".into()));
        assert_eq!(Value::from((10u8, 0u8, 0u8, 1u8)), Value::Inet(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
    }
}

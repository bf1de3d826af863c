//! Eager, owned representation of CQL values.
//!
//! [`CqlValue`] can hold a value of any CQL type and owns all of its data,
//! so it outlives the response buffer it was decoded from. [`deser_cql_value`]
//! decodes any well-formed payload into it; [`CqlValue::write_cell`] is the
//! inverse and is what mock transports use to build row bytes.
//!
//! The newtypes in this module keep the wire representation of types that
//! have no lossless std counterpart (`varint`, `decimal`, `duration`, ...).

use std::net::IpAddr;

use bytes::BufMut;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::protocol::wire_format::{
    read_bytes, read_bytes_opt, read_int, read_int_length, read_vint, write_bytes, write_bytes_opt,
    write_int, write_vint,
};
use crate::protocol::ColumnType;

/// Value of a `counter` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Counter(pub i64);

/// Arbitrary precision integer, kept as big-endian two's complement bytes.
///
/// Equality ignores redundant sign-extension bytes.
#[derive(Debug, Clone, Eq)]
pub struct CqlVarint(Vec<u8>);

impl CqlVarint {
    pub fn from_signed_bytes_be(digits: Vec<u8>) -> Self {
        Self(digits)
    }

    pub fn from_signed_bytes_be_slice(digits: &[u8]) -> Self {
        Self(digits.to_vec())
    }

    pub fn as_signed_bytes_be_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_signed_bytes_be(self) -> Vec<u8> {
        self.0
    }

    fn normalized(&self) -> &[u8] {
        let mut digits = &self.0[..];
        while let [first, second, ..] = digits {
            let redundant = (*first == 0x00 && second & 0x80 == 0)
                || (*first == 0xFF && second & 0x80 != 0);
            if !redundant {
                break;
            }
            digits = &digits[1..];
        }
        digits
    }
}

impl PartialEq for CqlVarint {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl std::hash::Hash for CqlVarint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl From<i64> for CqlVarint {
    fn from(v: i64) -> Self {
        let varint = Self(v.to_be_bytes().to_vec());
        let digits = varint.normalized().to_vec();
        Self(digits)
    }
}

/// Arbitrary precision decimal: `unscaled * 10^-scale`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CqlDecimal {
    int_val: CqlVarint,
    scale: i32,
}

impl CqlDecimal {
    pub fn from_signed_be_bytes_and_exponent(bytes: Vec<u8>, scale: i32) -> Self {
        Self {
            int_val: CqlVarint::from_signed_bytes_be(bytes),
            scale,
        }
    }

    pub fn from_signed_be_bytes_slice_and_exponent(bytes: &[u8], scale: i32) -> Self {
        Self::from_signed_be_bytes_and_exponent(bytes.to_vec(), scale)
    }

    pub fn as_signed_be_bytes_slice_and_exponent(&self) -> (&[u8], i32) {
        (self.int_val.as_signed_bytes_be_slice(), self.scale)
    }
}

/// Months, days and nanoseconds; the parts are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CqlDuration {
    pub months: i32,
    pub days: i32,
    pub nanoseconds: i64,
}

/// Days since -5877641-06-23; 2^31 is 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CqlDate(pub u32);

/// Nanoseconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CqlTime(pub i64);

/// Milliseconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CqlTimestamp(pub i64);

/// A version 1 UUID as stored in `timeuuid` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CqlTimeuuid(Uuid);

impl CqlTimeuuid {
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl From<Uuid> for CqlTimeuuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<CqlTimeuuid> for Uuid {
    fn from(timeuuid: CqlTimeuuid) -> Self {
        timeuuid.0
    }
}

/// Any CQL value, fully decoded and owned.
#[derive(Debug, Clone, PartialEq)]
pub enum CqlValue {
    Ascii(String),
    Boolean(bool),
    Blob(Vec<u8>),
    Counter(Counter),
    Decimal(CqlDecimal),
    Date(CqlDate),
    Double(f64),
    Duration(CqlDuration),
    /// Zero-length value of a type where that is distinct from null.
    Empty,
    Float(f32),
    Int(i32),
    BigInt(i64),
    Text(String),
    Timestamp(CqlTimestamp),
    Inet(IpAddr),
    List(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
    Set(Vec<CqlValue>),
    UserDefinedType {
        keyspace: String,
        type_name: String,
        /// Fields in declaration order; `None` is null.
        fields: Vec<(String, Option<CqlValue>)>,
    },
    SmallInt(i16),
    TinyInt(i8),
    Time(CqlTime),
    Timeuuid(CqlTimeuuid),
    Tuple(Vec<Option<CqlValue>>),
    Uuid(Uuid),
    Varint(CqlVarint),
}

impl CqlValue {
    pub fn as_ascii(&self) -> Option<&String> {
        match self {
            Self::Ascii(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&String> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Self::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Vec<u8>> {
        match self {
            Self::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Elements of a list or a set.
    pub fn as_list(&self) -> Option<&Vec<CqlValue>> {
        match self {
            Self::List(v) | Self::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Vec<(CqlValue, CqlValue)>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Text of an `ascii` or `text` value.
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::Ascii(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Write this value as a `[bytes]` cell.
    pub fn write_cell(&self, buf: &mut impl BufMut) {
        let mut payload = Vec::new();
        self.write_payload(&mut payload);
        write_bytes(&payload, buf);
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        match self {
            Self::Ascii(s) | Self::Text(s) => out.extend_from_slice(s.as_bytes()),
            Self::Boolean(b) => out.push(u8::from(*b)),
            Self::Blob(v) => out.extend_from_slice(v),
            Self::Counter(c) => out.put_i64(c.0),
            Self::Decimal(d) => {
                let (digits, scale) = d.as_signed_be_bytes_slice_and_exponent();
                write_int(scale, out);
                out.extend_from_slice(digits);
            }
            Self::Date(d) => out.put_u32(d.0),
            Self::Double(d) => out.put_f64(*d),
            Self::Duration(d) => {
                write_vint(i64::from(d.months), out);
                write_vint(i64::from(d.days), out);
                write_vint(d.nanoseconds, out);
            }
            Self::Empty => {}
            Self::Float(f) => out.put_f32(*f),
            Self::Int(i) => out.put_i32(*i),
            Self::BigInt(i) => out.put_i64(*i),
            Self::Timestamp(t) => out.put_i64(t.0),
            Self::Inet(IpAddr::V4(addr)) => out.extend_from_slice(&addr.octets()),
            Self::Inet(IpAddr::V6(addr)) => out.extend_from_slice(&addr.octets()),
            Self::List(values) | Self::Set(values) => {
                write_int(values.len() as i32, out);
                for value in values {
                    value.write_cell(out);
                }
            }
            Self::Map(entries) => {
                write_int(entries.len() as i32, out);
                for (key, value) in entries {
                    key.write_cell(out);
                    value.write_cell(out);
                }
            }
            Self::UserDefinedType { fields, .. } => {
                for (_, value) in fields {
                    write_optional_cell(value.as_ref(), out);
                }
            }
            Self::Tuple(values) => {
                for value in values {
                    write_optional_cell(value.as_ref(), out);
                }
            }
            Self::SmallInt(i) => out.put_i16(*i),
            Self::TinyInt(i) => out.put_i8(*i),
            Self::Time(t) => out.put_i64(t.0),
            Self::Timeuuid(u) => out.extend_from_slice(u.as_bytes()),
            Self::Uuid(u) => out.extend_from_slice(u.as_bytes()),
            Self::Varint(v) => out.extend_from_slice(v.as_signed_bytes_be_slice()),
        }
    }
}

fn write_optional_cell(value: Option<&CqlValue>, out: &mut Vec<u8>) {
    match value {
        Some(value) => value.write_cell(out),
        None => write_bytes_opt(None, out),
    }
}

fn exact<'a, const N: usize>(
    type_name: &'static str,
    buf: &mut &'a [u8],
) -> Result<&'a [u8; N], ProtocolError> {
    let arr: &[u8; N] = (*buf).try_into().map_err(|_| ProtocolError::InvalidValueLength {
        type_name,
        length: buf.len(),
    })?;
    *buf = &[];
    Ok(arr)
}

fn ensure_consumed(buf: &[u8]) -> Result<(), ProtocolError> {
    if buf.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::TrailingBytes(buf.len()))
    }
}

/// Decode one value payload (without its `[bytes]` length prefix).
///
/// `buf` must hold exactly the payload; it is fully consumed on success.
/// A zero-length payload decodes to [`CqlValue::Empty`] for every type
/// except `ascii`, `blob` and `text`.
pub fn deser_cql_value(typ: &ColumnType, buf: &mut &[u8]) -> Result<CqlValue, ProtocolError> {
    if buf.is_empty() && typ.supports_empty() {
        return Ok(CqlValue::Empty);
    }

    Ok(match typ {
        ColumnType::Custom(class) => {
            return Err(ProtocolError::UnsupportedCustomType(class.clone()))
        }
        ColumnType::Ascii => {
            if !buf.is_ascii() {
                return Err(ProtocolError::Malformed(
                    "ascii value contains non-ASCII bytes".to_string(),
                ));
            }
            let s = std::str::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)?;
            *buf = &[];
            CqlValue::Ascii(s.to_owned())
        }
        ColumnType::Text => {
            let s = std::str::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)?;
            *buf = &[];
            CqlValue::Text(s.to_owned())
        }
        ColumnType::Blob => {
            let blob = buf.to_vec();
            *buf = &[];
            CqlValue::Blob(blob)
        }
        ColumnType::Boolean => CqlValue::Boolean(exact::<1>("boolean", buf)?[0] != 0),
        ColumnType::TinyInt => CqlValue::TinyInt(i8::from_be_bytes(*exact("tinyint", buf)?)),
        ColumnType::SmallInt => CqlValue::SmallInt(i16::from_be_bytes(*exact("smallint", buf)?)),
        ColumnType::Int => CqlValue::Int(i32::from_be_bytes(*exact("int", buf)?)),
        ColumnType::BigInt => CqlValue::BigInt(i64::from_be_bytes(*exact("bigint", buf)?)),
        ColumnType::Counter => {
            CqlValue::Counter(Counter(i64::from_be_bytes(*exact("counter", buf)?)))
        }
        ColumnType::Float => CqlValue::Float(f32::from_be_bytes(*exact("float", buf)?)),
        ColumnType::Double => CqlValue::Double(f64::from_be_bytes(*exact("double", buf)?)),
        ColumnType::Date => CqlValue::Date(CqlDate(u32::from_be_bytes(*exact("date", buf)?))),
        ColumnType::Time => CqlValue::Time(CqlTime(i64::from_be_bytes(*exact("time", buf)?))),
        ColumnType::Timestamp => {
            CqlValue::Timestamp(CqlTimestamp(i64::from_be_bytes(*exact("timestamp", buf)?)))
        }
        ColumnType::Uuid => CqlValue::Uuid(uuid::Uuid::from_bytes(*exact("uuid", buf)?)),
        ColumnType::Timeuuid => CqlValue::Timeuuid(CqlTimeuuid(uuid::Uuid::from_bytes(*exact(
            "timeuuid", buf,
        )?))),
        ColumnType::Inet => CqlValue::Inet(match buf.len() {
            4 => IpAddr::from(*exact::<4>("inet", buf)?),
            16 => IpAddr::from(*exact::<16>("inet", buf)?),
            length => {
                return Err(ProtocolError::InvalidValueLength {
                    type_name: "inet",
                    length,
                })
            }
        }),
        ColumnType::Varint => {
            let varint = CqlVarint::from_signed_bytes_be_slice(buf);
            *buf = &[];
            CqlValue::Varint(varint)
        }
        ColumnType::Decimal => {
            let scale = read_int(buf)?;
            let decimal = CqlDecimal::from_signed_be_bytes_slice_and_exponent(buf, scale);
            *buf = &[];
            CqlValue::Decimal(decimal)
        }
        ColumnType::Duration => {
            let months = i32::try_from(read_vint(buf)?)
                .map_err(|_| ProtocolError::Malformed("duration months out of range".into()))?;
            let days = i32::try_from(read_vint(buf)?)
                .map_err(|_| ProtocolError::Malformed("duration days out of range".into()))?;
            let nanoseconds = read_vint(buf)?;
            ensure_consumed(buf)?;
            CqlValue::Duration(CqlDuration {
                months,
                days,
                nanoseconds,
            })
        }
        ColumnType::List(elem) => CqlValue::List(deser_elements(elem, buf)?),
        ColumnType::Set(elem) => CqlValue::Set(deser_elements(elem, buf)?),
        ColumnType::Map(key_type, value_type) => {
            let len = read_int_length(buf)?;
            let mut entries = Vec::with_capacity(len.min(buf.len()));
            for _ in 0..len {
                let key = deser_cql_value(key_type, &mut read_bytes(buf)?)?;
                let value = deser_cql_value(value_type, &mut read_bytes(buf)?)?;
                entries.push((key, value));
            }
            ensure_consumed(buf)?;
            CqlValue::Map(entries)
        }
        ColumnType::UserDefinedType {
            keyspace,
            type_name,
            field_types,
        } => {
            let mut fields = Vec::with_capacity(field_types.len());
            for (name, field_type) in field_types {
                fields.push((name.clone(), deser_optional_field(field_type, buf)?));
            }
            ensure_consumed(buf)?;
            CqlValue::UserDefinedType {
                keyspace: keyspace.clone(),
                type_name: type_name.clone(),
                fields,
            }
        }
        ColumnType::Tuple(types) => {
            let mut values = Vec::with_capacity(types.len());
            for field_type in types {
                values.push(deser_optional_field(field_type, buf)?);
            }
            ensure_consumed(buf)?;
            CqlValue::Tuple(values)
        }
    })
}

fn deser_elements(elem: &ColumnType, buf: &mut &[u8]) -> Result<Vec<CqlValue>, ProtocolError> {
    let len = read_int_length(buf)?;
    let mut values = Vec::with_capacity(len.min(buf.len()));
    for _ in 0..len {
        values.push(deser_cql_value(elem, &mut read_bytes(buf)?)?);
    }
    ensure_consumed(buf)?;
    Ok(values)
}

/// Tuple and UDT fields may be null, and trailing fields may be missing.
fn deser_optional_field(
    typ: &ColumnType,
    buf: &mut &[u8],
) -> Result<Option<CqlValue>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }
    read_bytes_opt(buf)?
        .map(|mut value| deser_cql_value(typ, &mut value))
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn cell(value: &CqlValue) -> Vec<u8> {
        let mut buf = Vec::new();
        value.write_cell(&mut buf);
        buf
    }

    fn decode(typ: &ColumnType, cell: &[u8]) -> Result<CqlValue, ProtocolError> {
        let mut slice = cell;
        let mut payload = read_bytes(&mut slice).unwrap();
        deser_cql_value(typ, &mut payload)
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(deser_cql_value(&ColumnType::Int, &mut &[][..]).unwrap(), CqlValue::Empty);
        assert_eq!(
            deser_cql_value(&ColumnType::Text, &mut &[][..]).unwrap(),
            CqlValue::Text(String::new())
        );
        assert_eq!(
            deser_cql_value(&ColumnType::Blob, &mut &[][..]).unwrap(),
            CqlValue::Blob(Vec::new())
        );
    }

    #[test]
    fn test_fixed_length_mismatch() {
        let err = deser_cql_value(&ColumnType::Int, &mut &[0u8, 1, 2][..]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidValueLength {
                type_name: "int",
                length: 3
            }
        );
        assert!(deser_cql_value(&ColumnType::Inet, &mut &[1u8, 2, 3, 4, 5][..]).is_err());
    }

    #[test]
    fn test_ascii_rejects_non_ascii() {
        assert!(deser_cql_value(&ColumnType::Ascii, &mut "zażółć".as_bytes()).is_err());
        assert_eq!(
            deser_cql_value(&ColumnType::Text, &mut "zażółć".as_bytes()).unwrap(),
            CqlValue::Text("zażółć".to_string())
        );
    }

    #[test]
    fn test_custom_type_unsupported() {
        let typ = ColumnType::Custom("org.example.Thing".to_string());
        assert!(matches!(
            deser_cql_value(&typ, &mut &[1u8][..]),
            Err(ProtocolError::UnsupportedCustomType(_))
        ));
    }

    #[test]
    fn test_nested_collections() {
        let typ = ColumnType::Map(
            Box::new(ColumnType::Text),
            Box::new(ColumnType::List(Box::new(ColumnType::Int))),
        );
        let value = CqlValue::Map(vec![
            (
                CqlValue::Text("a".to_string()),
                CqlValue::List(vec![CqlValue::Int(1), CqlValue::Int(2)]),
            ),
            (CqlValue::Text("b".to_string()), CqlValue::List(vec![])),
        ]);

        assert_eq!(decode(&typ, &cell(&value)).unwrap(), value);
    }

    #[test]
    fn test_collection_trailing_bytes() {
        let mut payload = Vec::new();
        write_int(0, &mut payload);
        payload.push(7);

        let typ = ColumnType::List(Box::new(ColumnType::Int));
        assert_eq!(
            deser_cql_value(&typ, &mut &payload[..]).unwrap_err(),
            ProtocolError::TrailingBytes(1)
        );
    }

    #[test]
    fn test_udt_missing_trailing_fields_are_null() {
        let typ = ColumnType::UserDefinedType {
            keyspace: "ks".to_string(),
            type_name: "address".to_string(),
            field_types: vec![
                ("street".to_string(), ColumnType::Text),
                ("zip".to_string(), ColumnType::Int),
            ],
        };
        let mut payload = Vec::new();
        CqlValue::Text("Main".to_string()).write_cell(&mut payload);

        let value = deser_cql_value(&typ, &mut &payload[..]).unwrap();
        assert_eq!(
            value,
            CqlValue::UserDefinedType {
                keyspace: "ks".to_string(),
                type_name: "address".to_string(),
                fields: vec![
                    ("street".to_string(), Some(CqlValue::Text("Main".to_string()))),
                    ("zip".to_string(), None),
                ],
            }
        );
    }

    #[test]
    fn test_tuple_with_null() {
        let typ = ColumnType::Tuple(vec![ColumnType::Int, ColumnType::Inet]);
        let value = CqlValue::Tuple(vec![
            None,
            Some(CqlValue::Inet(IpAddr::V4(Ipv4Addr::LOCALHOST))),
        ]);
        assert_eq!(decode(&typ, &cell(&value)).unwrap(), value);
    }

    #[test]
    fn test_duration() {
        let value = CqlValue::Duration(CqlDuration {
            months: 1,
            days: -2,
            nanoseconds: 3_000_000_000,
        });
        assert_eq!(decode(&ColumnType::Duration, &cell(&value)).unwrap(), value);
    }

    #[test]
    fn test_varint_equality_ignores_sign_extension() {
        assert_eq!(
            CqlVarint::from_signed_bytes_be(vec![0x00, 0x01]),
            CqlVarint::from_signed_bytes_be(vec![0x01])
        );
        assert_eq!(
            CqlVarint::from_signed_bytes_be(vec![0xFF, 0xFF, 0x80]),
            CqlVarint::from_signed_bytes_be(vec![0x80])
        );
        assert_ne!(
            CqlVarint::from_signed_bytes_be(vec![0x00, 0x80]),
            CqlVarint::from_signed_bytes_be(vec![0x80])
        );
        assert_eq!(CqlVarint::from(-1).as_signed_bytes_be_slice(), &[0xFF]);
    }
}

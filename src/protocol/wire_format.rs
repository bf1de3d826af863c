//! Wire format primitives.
//!
//! Implements the notation used by the CQL binary protocol for result bodies:
//! ```text
//! [int]     4 bytes, signed, Big Endian
//! [short]   2 bytes, unsigned, Big Endian
//! [string]  [short] n, then n bytes of UTF-8
//! [bytes]   [int] n, then n bytes; n < 0 encodes null
//! [vint]    variable length zig-zag integer (durations)
//! ```
//!
//! Readers advance a `&mut &[u8]` cursor and never panic on short input.
//! All multi-byte integers are Big Endian.

use bytes::BufMut;

use crate::error::ProtocolError;

/// Type option ids used in `[option]` fields of column metadata.
pub mod type_ids {
    pub const CUSTOM: u16 = 0x0000;
    pub const ASCII: u16 = 0x0001;
    pub const BIGINT: u16 = 0x0002;
    pub const BLOB: u16 = 0x0003;
    pub const BOOLEAN: u16 = 0x0004;
    pub const COUNTER: u16 = 0x0005;
    pub const DECIMAL: u16 = 0x0006;
    pub const DOUBLE: u16 = 0x0007;
    pub const FLOAT: u16 = 0x0008;
    pub const INT: u16 = 0x0009;
    pub const TIMESTAMP: u16 = 0x000B;
    pub const UUID: u16 = 0x000C;
    pub const VARCHAR: u16 = 0x000D;
    pub const VARINT: u16 = 0x000E;
    pub const TIMEUUID: u16 = 0x000F;
    pub const INET: u16 = 0x0010;
    pub const DATE: u16 = 0x0011;
    pub const TIME: u16 = 0x0012;
    pub const SMALLINT: u16 = 0x0013;
    pub const TINYINT: u16 = 0x0014;
    pub const DURATION: u16 = 0x0015;
    pub const LIST: u16 = 0x0020;
    pub const MAP: u16 = 0x0021;
    pub const SET: u16 = 0x0022;
    pub const UDT: u16 = 0x0030;
    pub const TUPLE: u16 = 0x0031;
}

/// Flag constants of the ROWS metadata block.
pub mod rows_flags {
    /// One table spec for all columns follows the column count.
    pub const GLOBAL_TABLES_SPEC: i32 = 0x0001;
    /// A paging state follows; more pages are available.
    pub const HAS_MORE_PAGES: i32 = 0x0002;
    /// No column specs follow; the client must know them already.
    pub const NO_METADATA: i32 = 0x0004;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: i32, flag: i32) -> bool {
        flags & flag != 0
    }
}

/// Read exactly `count` bytes.
pub fn read_raw_bytes<'a>(count: usize, buf: &mut &'a [u8]) -> Result<&'a [u8], ProtocolError> {
    if buf.len() < count {
        return Err(ProtocolError::TruncatedBuffer {
            needed: count,
            remaining: buf.len(),
        });
    }
    let (ret, rest) = buf.split_at(count);
    *buf = rest;
    Ok(ret)
}

/// Read an `[int]`.
pub fn read_int(buf: &mut &[u8]) -> Result<i32, ProtocolError> {
    let raw = read_raw_bytes(4, buf)?;
    Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Read an `[int]` that must be a non-negative length.
pub fn read_int_length(buf: &mut &[u8]) -> Result<usize, ProtocolError> {
    let v = read_int(buf)?;
    usize::try_from(v).map_err(|_| ProtocolError::NegativeLength(v))
}

/// Read a `[short]`.
pub fn read_short(buf: &mut &[u8]) -> Result<u16, ProtocolError> {
    let raw = read_raw_bytes(2, buf)?;
    Ok(u16::from_be_bytes([raw[0], raw[1]]))
}

/// Read a `[short]` used as a length.
pub fn read_short_length(buf: &mut &[u8]) -> Result<usize, ProtocolError> {
    read_short(buf).map(usize::from)
}

/// Read `[bytes]`; a negative length is a null value.
pub fn read_bytes_opt<'a>(buf: &mut &'a [u8]) -> Result<Option<&'a [u8]>, ProtocolError> {
    let len = read_int(buf)?;
    if len < 0 {
        return Ok(None);
    }
    read_raw_bytes(len as usize, buf).map(Some)
}

/// Read `[bytes]` that must not be null.
pub fn read_bytes<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], ProtocolError> {
    let len = read_int_length(buf)?;
    read_raw_bytes(len, buf)
}

/// Read `[short bytes]`.
pub fn read_short_bytes<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], ProtocolError> {
    let len = read_short_length(buf)?;
    read_raw_bytes(len, buf)
}

/// Read a `[string]`.
pub fn read_string<'a>(buf: &mut &'a [u8]) -> Result<&'a str, ProtocolError> {
    let len = read_short_length(buf)?;
    let raw = read_raw_bytes(len, buf)?;
    std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Read an unsigned variable length integer.
///
/// The number of leading one bits in the first byte is the number of extra
/// bytes that follow.
pub fn read_unsigned_vint(buf: &mut &[u8]) -> Result<u64, ProtocolError> {
    let first = read_raw_bytes(1, buf)?[0];
    let extra = first.leading_ones() as usize;
    let mut value = if extra >= 8 {
        0
    } else {
        u64::from(first & (0xFF >> extra))
    };
    for byte in read_raw_bytes(extra, buf)? {
        value = (value << 8) | u64::from(*byte);
    }
    Ok(value)
}

/// Read a zig-zag encoded signed variable length integer.
pub fn read_vint(buf: &mut &[u8]) -> Result<i64, ProtocolError> {
    let raw = read_unsigned_vint(buf)?;
    Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
}

/// Write an `[int]`.
#[inline]
pub fn write_int(v: i32, buf: &mut impl BufMut) {
    buf.put_i32(v);
}

/// Write a `[short]`.
#[inline]
pub fn write_short(v: u16, buf: &mut impl BufMut) {
    buf.put_u16(v);
}

/// Write a `[string]`.
///
/// # Panics
///
/// Panics if the string is longer than `u16::MAX` bytes.
pub fn write_string(s: &str, buf: &mut impl BufMut) {
    let len = u16::try_from(s.len()).expect("[string] longer than u16::MAX");
    write_short(len, buf);
    buf.put_slice(s.as_bytes());
}

/// Write `[bytes]`.
///
/// # Panics
///
/// Panics if the value is longer than `i32::MAX` bytes.
pub fn write_bytes(v: &[u8], buf: &mut impl BufMut) {
    let len = i32::try_from(v.len()).expect("[bytes] longer than i32::MAX");
    write_int(len, buf);
    buf.put_slice(v);
}

/// Write `[bytes]`, encoding `None` as null.
pub fn write_bytes_opt(v: Option<&[u8]>, buf: &mut impl BufMut) {
    match v {
        Some(v) => write_bytes(v, buf),
        None => write_int(-1, buf),
    }
}

/// Write an unsigned variable length integer.
pub fn write_unsigned_vint(v: u64, buf: &mut impl BufMut) {
    let significant_bits = 64 - v.leading_zeros() as usize;
    let extra = (significant_bits.max(1) - 1) / 7;
    if extra >= 8 {
        buf.put_u8(0xFF);
        buf.put_u64(v);
        return;
    }
    let mask = !(0xFFu8 >> extra);
    buf.put_u8(mask | (v >> (8 * extra)) as u8);
    for i in (0..extra).rev() {
        buf.put_u8((v >> (8 * i)) as u8);
    }
}

/// Write a zig-zag encoded signed variable length integer.
pub fn write_vint(v: i64, buf: &mut impl BufMut) {
    write_unsigned_vint(((v << 1) ^ (v >> 63)) as u64, buf);
}

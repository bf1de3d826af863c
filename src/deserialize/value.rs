//! Decoding of single column values.
//!
//! Every target type implements [`DeserializeValue`]: a `type_check` against
//! the declared [`ColumnType`] that never looks at bytes, and a `deserialize`
//! that turns one cell into the target. Composite targets recurse into their
//! element types and attach the element position to nested errors.
//!
//! ```text
//! ColumnType ──type_check──► Ok(())
//!     │
//!     └── + Option<FrameSlice> ──deserialize──► T
//!                (None = null)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::net::IpAddr;

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use super::{DeserializationError, FrameSlice, TypeCheckError};
use crate::error::ProtocolError;
use crate::protocol::wire_format::read_vint;
use crate::protocol::ColumnType;
use crate::value::{
    deser_cql_value, Counter, CqlDate, CqlDecimal, CqlDuration, CqlTime, CqlTimestamp,
    CqlTimeuuid, CqlValue, CqlVarint,
};

/// A type that can be decoded from one column value of a row.
pub trait DeserializeValue<'frame>
where
    Self: Sized,
{
    /// Check that values declared as `typ` can be decoded into `Self`.
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError>;

    /// Decode one value. `v` is `None` for null.
    ///
    /// May assume `type_check` succeeded for `typ`, but must not rely on it
    /// for memory safety.
    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError>;
}

impl<'frame> DeserializeValue<'frame> for CqlValue {
    fn type_check(_typ: &ColumnType) -> Result<(), TypeCheckError> {
        Ok(())
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        let mut val = ensure_not_null_slice::<Self>(typ, v)?;
        deser_cql_value(typ, &mut val).map_err(|err| {
            mk_deser_err::<Self>(typ, BuiltinDeserializationErrorKind::GenericParseError(err))
        })
    }
}

// None is null, Some is any non-null value.
impl<'frame, T> DeserializeValue<'frame> for Option<T>
where
    T: DeserializeValue<'frame>,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        T::type_check(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        v.map(|_| T::deserialize(typ, v)).transpose()
    }
}

/// Marker for types whose CQL counterpart has a distinct "empty" value
/// (a zero-length payload, which is not null).
pub trait Emptiable {}

/// A value of an [`Emptiable`] type, or the empty value.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum MaybeEmpty<T: Emptiable> {
    Empty,
    Value(T),
}

impl<'frame, T> DeserializeValue<'frame> for MaybeEmpty<T>
where
    T: DeserializeValue<'frame> + Emptiable,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        T::type_check(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        let val = ensure_not_null_slice::<Self>(typ, v)?;
        if val.is_empty() {
            Ok(MaybeEmpty::Empty)
        } else {
            T::deserialize(typ, v).map(MaybeEmpty::Value)
        }
    }
}

macro_rules! impl_scalar {
    (emptiable $t:ty, [$($cql:ident),+], |$typ:ident, $v:ident| $body:expr) => {
        impl Emptiable for $t {}

        impl_scalar!($t, [$($cql),+], |$typ, $v| $body);
    };

    ($t:ty, [$($cql:ident),+], |$typ:ident, $v:ident| $body:expr) => {
        impl<'frame> DeserializeValue<'frame> for $t {
            fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
                const EXPECTED: &[ColumnType] = &[$(ColumnType::$cql),+];
                check_exact_type::<Self>(typ, EXPECTED)
            }

            fn deserialize(
                $typ: &'frame ColumnType,
                $v: Option<FrameSlice<'frame>>,
            ) -> Result<Self, DeserializationError> {
                $body
            }
        }
    };
}

macro_rules! impl_fixed_numeric {
    ($t:ty, [$($cql:ident),+]) => {
        impl_scalar!(emptiable $t, [$($cql),+], |typ, v| {
            let val = ensure_not_null_slice::<$t>(typ, v)?;
            let arr = ensure_exact_length::<$t, { std::mem::size_of::<$t>() }>(typ, val)?;
            Ok(<$t>::from_be_bytes(*arr))
        });
    };
}

impl_fixed_numeric!(i8, [TinyInt]);
impl_fixed_numeric!(i16, [SmallInt]);
impl_fixed_numeric!(i32, [Int]);
impl_fixed_numeric!(i64, [BigInt, Counter]);
impl_fixed_numeric!(f32, [Float]);
impl_fixed_numeric!(f64, [Double]);

impl_scalar!(emptiable bool, [Boolean], |typ, v| {
    let val = ensure_not_null_slice::<bool>(typ, v)?;
    let arr = ensure_exact_length::<bool, 1>(typ, val)?;
    Ok(arr[0] != 0x00)
});

impl_scalar!(Counter, [Counter], |typ, v| {
    let val = ensure_not_null_slice::<Counter>(typ, v)?;
    let arr = ensure_exact_length::<Counter, 8>(typ, val)?;
    Ok(Counter(i64::from_be_bytes(*arr)))
});

impl_scalar!(emptiable CqlVarint, [Varint], |typ, v| {
    let val = ensure_not_null_slice::<CqlVarint>(typ, v)?;
    Ok(CqlVarint::from_signed_bytes_be_slice(val))
});

impl_scalar!(emptiable CqlDecimal, [Decimal], |typ, v| {
    let mut val = ensure_not_null_frame_slice::<CqlDecimal>(typ, v)?;
    let scale = val.read_int().map_err(|err| {
        mk_deser_err::<CqlDecimal>(typ, BuiltinDeserializationErrorKind::GenericParseError(err))
    })?;
    Ok(CqlDecimal::from_signed_be_bytes_slice_and_exponent(
        val.as_slice(),
        scale,
    ))
});

impl_scalar!(Vec<u8>, [Blob], |typ, v| {
    ensure_not_null_slice::<Vec<u8>>(typ, v).map(<[u8]>::to_vec)
});

impl_scalar!(Bytes, [Blob], |typ, v| {
    ensure_not_null_frame_slice::<Bytes>(typ, v).map(|slice| slice.to_bytes())
});

impl_scalar!(String, [Ascii, Text], |typ, v| {
    deserialize_str::<String>(typ, v).map(str::to_owned)
});

impl_scalar!(emptiable Uuid, [Uuid, Timeuuid], |typ, v| {
    let val = ensure_not_null_slice::<Uuid>(typ, v)?;
    let arr = ensure_exact_length::<Uuid, 16>(typ, val)?;
    Ok(Uuid::from_bytes(*arr))
});

impl_scalar!(emptiable CqlTimeuuid, [Timeuuid], |typ, v| {
    let val = ensure_not_null_slice::<CqlTimeuuid>(typ, v)?;
    let arr = ensure_exact_length::<CqlTimeuuid, 16>(typ, val)?;
    Ok(CqlTimeuuid::from(Uuid::from_bytes(*arr)))
});

impl_scalar!(emptiable IpAddr, [Inet], |typ, v| {
    let val = ensure_not_null_slice::<IpAddr>(typ, v)?;
    if let Ok(v4) = <[u8; 4]>::try_from(val) {
        Ok(IpAddr::from(v4))
    } else if let Ok(v6) = <[u8; 16]>::try_from(val) {
        Ok(IpAddr::from(v6))
    } else {
        Err(mk_deser_err::<IpAddr>(
            typ,
            BuiltinDeserializationErrorKind::BadInetLength { got: val.len() },
        ))
    }
});

impl_scalar!(emptiable CqlDate, [Date], |typ, v| {
    let val = ensure_not_null_slice::<CqlDate>(typ, v)?;
    let arr = ensure_exact_length::<CqlDate, 4>(typ, val)?;
    Ok(CqlDate(u32::from_be_bytes(*arr)))
});

impl_scalar!(emptiable CqlTime, [Time], |typ, v| {
    let val = ensure_not_null_slice::<CqlTime>(typ, v)?;
    let arr = ensure_exact_length::<CqlTime, 8>(typ, val)?;
    Ok(CqlTime(i64::from_be_bytes(*arr)))
});

impl_scalar!(emptiable CqlTimestamp, [Timestamp], |typ, v| {
    let val = ensure_not_null_slice::<CqlTimestamp>(typ, v)?;
    let arr = ensure_exact_length::<CqlTimestamp, 8>(typ, val)?;
    Ok(CqlTimestamp(i64::from_be_bytes(*arr)))
});

impl_scalar!(emptiable CqlDuration, [Duration], |typ, v| {
    let mut val = ensure_not_null_slice::<CqlDuration>(typ, v)?;
    let parse_err = |err| {
        mk_deser_err::<CqlDuration>(typ, BuiltinDeserializationErrorKind::GenericParseError(err))
    };
    let out_of_range = |part: &str| {
        parse_err(ProtocolError::Malformed(format!("duration {part} out of i32 range")))
    };
    let months = read_vint(&mut val).map_err(parse_err)?;
    let days = read_vint(&mut val).map_err(parse_err)?;
    let nanoseconds = read_vint(&mut val).map_err(parse_err)?;
    if !val.is_empty() {
        return Err(parse_err(ProtocolError::TrailingBytes(val.len())));
    }
    Ok(CqlDuration {
        months: i32::try_from(months).map_err(|_| out_of_range("months"))?,
        days: i32::try_from(days).map_err(|_| out_of_range("days"))?,
        nanoseconds,
    })
});

impl<'a, 'frame: 'a> DeserializeValue<'frame> for &'a [u8] {
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        check_exact_type::<Self>(typ, &[ColumnType::Blob])
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        ensure_not_null_slice::<Self>(typ, v)
    }
}

impl<'a, 'frame: 'a> DeserializeValue<'frame> for &'a str {
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        check_exact_type::<Self>(typ, &[ColumnType::Ascii, ColumnType::Text])
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        deserialize_str::<Self>(typ, v)
    }
}

fn deserialize_str<'frame, T>(
    typ: &ColumnType,
    v: Option<FrameSlice<'frame>>,
) -> Result<&'frame str, DeserializationError> {
    let val = ensure_not_null_slice::<T>(typ, v)?;
    if matches!(typ, ColumnType::Ascii) && !val.is_ascii() {
        return Err(mk_deser_err::<T>(
            typ,
            BuiltinDeserializationErrorKind::ExpectedAscii,
        ));
    }
    std::str::from_utf8(val)
        .map_err(|err| mk_deser_err::<T>(typ, BuiltinDeserializationErrorKind::InvalidUtf8(err)))
}

// Collections

/// Lazy iterator over the elements of a `list` or `set` value.
///
/// Borrows from the frame and allocates nothing; elements are decoded on
/// demand.
#[derive(Debug, Clone)]
pub struct ListlikeIterator<'frame, T> {
    rust_name: &'static str,
    coll_typ: &'frame ColumnType,
    elem_typ: &'frame ColumnType,
    raw: FrameSlice<'frame>,
    remaining: usize,
    next_index: usize,
    phantom: PhantomData<T>,
}

impl<'frame, T> ListlikeIterator<'frame, T>
where
    T: DeserializeValue<'frame>,
{
    fn type_check_as<C>(typ: &ColumnType) -> Result<(), TypeCheckError> {
        match typ {
            ColumnType::List(elem) | ColumnType::Set(elem) => T::type_check(elem).map_err(|err| {
                mk_typck_err::<C>(typ, BuiltinTypeCheckErrorKind::ElementTypeCheckFailed(err))
            }),
            _ => Err(mk_typck_err::<C>(
                typ,
                BuiltinTypeCheckErrorKind::NotListOrSet,
            )),
        }
    }

    fn deserialize_as<C>(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        let elem_typ = match typ {
            ColumnType::List(elem) | ColumnType::Set(elem) => elem.as_ref(),
            _ => {
                return Err(mk_deser_err::<C>(
                    typ,
                    BuiltinDeserializationErrorKind::UnexpectedCqlType,
                ))
            }
        };
        let mut raw = ensure_not_null_frame_slice::<C>(typ, v)?;
        let count = read_collection_length::<C>(typ, &mut raw)?;
        Ok(Self {
            rust_name: std::any::type_name::<C>(),
            coll_typ: typ,
            elem_typ,
            raw,
            remaining: count,
            next_index: 0,
            phantom: PhantomData,
        })
    }

    /// Build a parse error and stop the iteration.
    fn parse_err(&mut self, err: ProtocolError) -> DeserializationError {
        self.remaining = 0;
        self.raw = self.raw.prefix(0);
        mk_deser_err_named(
            self.rust_name,
            self.coll_typ,
            BuiltinDeserializationErrorKind::GenericParseError(err),
        )
    }
}

impl<'frame, T> DeserializeValue<'frame> for ListlikeIterator<'frame, T>
where
    T: DeserializeValue<'frame>,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        Self::type_check_as::<Self>(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        Self::deserialize_as::<Self>(typ, v)
    }
}

impl<'frame, T> Iterator for ListlikeIterator<'frame, T>
where
    T: DeserializeValue<'frame>,
{
    type Item = Result<T, DeserializationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            let err = self.raw.ensure_consumed().err()?;
            return Some(Err(self.parse_err(err)));
        }
        self.remaining -= 1;
        let index = self.next_index;
        self.next_index += 1;

        let raw = match self.raw.read_cql_bytes() {
            Ok(raw) => raw,
            Err(err) => return Some(Err(self.parse_err(err))),
        };
        Some(T::deserialize(self.elem_typ, raw).map_err(|err| {
            mk_deser_err_named(
                self.rust_name,
                self.coll_typ,
                BuiltinDeserializationErrorKind::ElementDeserializationFailed { index, err },
            )
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // One more item when leftover bytes are reported.
        (0, Some(self.remaining + usize::from(!self.raw.is_empty())))
    }
}

impl<'frame, T> DeserializeValue<'frame> for Vec<T>
where
    T: DeserializeValue<'frame>,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        ListlikeIterator::<'frame, T>::type_check_as::<Self>(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        ListlikeIterator::<'frame, T>::deserialize_as::<Self>(typ, v)?.collect()
    }
}

impl<'frame, T> DeserializeValue<'frame> for BTreeSet<T>
where
    T: DeserializeValue<'frame> + Ord,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        ListlikeIterator::<'frame, T>::type_check_as::<Self>(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        ListlikeIterator::<'frame, T>::deserialize_as::<Self>(typ, v)?.collect()
    }
}

impl<'frame, T, S> DeserializeValue<'frame> for HashSet<T, S>
where
    T: DeserializeValue<'frame> + Eq + Hash,
    S: BuildHasher + Default,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        ListlikeIterator::<'frame, T>::type_check_as::<Self>(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        ListlikeIterator::<'frame, T>::deserialize_as::<Self>(typ, v)?.collect()
    }
}

/// Lazy iterator over the entries of a `map` value.
#[derive(Debug, Clone)]
pub struct MapIterator<'frame, K, V> {
    rust_name: &'static str,
    map_typ: &'frame ColumnType,
    key_typ: &'frame ColumnType,
    value_typ: &'frame ColumnType,
    raw: FrameSlice<'frame>,
    remaining: usize,
    next_index: usize,
    phantom: PhantomData<(K, V)>,
}

impl<'frame, K, V> MapIterator<'frame, K, V>
where
    K: DeserializeValue<'frame>,
    V: DeserializeValue<'frame>,
{
    fn type_check_as<C>(typ: &ColumnType) -> Result<(), TypeCheckError> {
        let ColumnType::Map(key, value) = typ else {
            return Err(mk_typck_err::<C>(typ, BuiltinTypeCheckErrorKind::NotMap));
        };
        K::type_check(key).map_err(|err| {
            mk_typck_err::<C>(typ, BuiltinTypeCheckErrorKind::MapKeyTypeCheckFailed(err))
        })?;
        V::type_check(value).map_err(|err| {
            mk_typck_err::<C>(typ, BuiltinTypeCheckErrorKind::MapValueTypeCheckFailed(err))
        })
    }

    fn deserialize_as<C>(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        let ColumnType::Map(key_typ, value_typ) = typ else {
            return Err(mk_deser_err::<C>(
                typ,
                BuiltinDeserializationErrorKind::UnexpectedCqlType,
            ));
        };
        let mut raw = ensure_not_null_frame_slice::<C>(typ, v)?;
        let count = read_collection_length::<C>(typ, &mut raw)?;
        Ok(Self {
            rust_name: std::any::type_name::<C>(),
            map_typ: typ,
            key_typ,
            value_typ,
            raw,
            remaining: count,
            next_index: 0,
            phantom: PhantomData,
        })
    }

    fn parse_err(&mut self, err: ProtocolError) -> DeserializationError {
        self.remaining = 0;
        self.raw = self.raw.prefix(0);
        mk_deser_err_named(
            self.rust_name,
            self.map_typ,
            BuiltinDeserializationErrorKind::GenericParseError(err),
        )
    }
}

impl<'frame, K, V> DeserializeValue<'frame> for MapIterator<'frame, K, V>
where
    K: DeserializeValue<'frame>,
    V: DeserializeValue<'frame>,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        Self::type_check_as::<Self>(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        Self::deserialize_as::<Self>(typ, v)
    }
}

impl<'frame, K, V> Iterator for MapIterator<'frame, K, V>
where
    K: DeserializeValue<'frame>,
    V: DeserializeValue<'frame>,
{
    type Item = Result<(K, V), DeserializationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            let err = self.raw.ensure_consumed().err()?;
            return Some(Err(self.parse_err(err)));
        }
        self.remaining -= 1;
        let index = self.next_index;
        self.next_index += 1;

        let raw_key = match self.raw.read_cql_bytes() {
            Ok(raw) => raw,
            Err(err) => return Some(Err(self.parse_err(err))),
        };
        let raw_value = match self.raw.read_cql_bytes() {
            Ok(raw) => raw,
            Err(err) => return Some(Err(self.parse_err(err))),
        };

        let key = K::deserialize(self.key_typ, raw_key).map_err(|err| {
            mk_deser_err_named(
                self.rust_name,
                self.map_typ,
                BuiltinDeserializationErrorKind::MapKeyDeserializationFailed { index, err },
            )
        });
        let value = V::deserialize(self.value_typ, raw_value).map_err(|err| {
            mk_deser_err_named(
                self.rust_name,
                self.map_typ,
                BuiltinDeserializationErrorKind::MapValueDeserializationFailed { index, err },
            )
        });
        Some(key.and_then(|key| value.map(|value| (key, value))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining + usize::from(!self.raw.is_empty())))
    }
}

impl<'frame, K, V> DeserializeValue<'frame> for BTreeMap<K, V>
where
    K: DeserializeValue<'frame> + Ord,
    V: DeserializeValue<'frame>,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        MapIterator::<'frame, K, V>::type_check_as::<Self>(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        MapIterator::<'frame, K, V>::deserialize_as::<Self>(typ, v)?.collect()
    }
}

impl<'frame, K, V, S> DeserializeValue<'frame> for HashMap<K, V, S>
where
    K: DeserializeValue<'frame> + Eq + Hash,
    V: DeserializeValue<'frame>,
    S: BuildHasher + Default,
{
    fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
        MapIterator::<'frame, K, V>::type_check_as::<Self>(typ)
    }

    fn deserialize(
        typ: &'frame ColumnType,
        v: Option<FrameSlice<'frame>>,
    ) -> Result<Self, DeserializationError> {
        MapIterator::<'frame, K, V>::deserialize_as::<Self>(typ, v)?.collect()
    }
}

fn read_collection_length<T>(
    typ: &ColumnType,
    raw: &mut FrameSlice<'_>,
) -> Result<usize, DeserializationError> {
    let parse_err =
        |err| mk_deser_err::<T>(typ, BuiltinDeserializationErrorKind::GenericParseError(err));
    let count = raw.read_int().map_err(parse_err)?;
    usize::try_from(count).map_err(|_| parse_err(ProtocolError::NegativeLength(count)))
}

// Tuples

/// Read the next element of a tuple or UDT payload.
///
/// Elements missing from the end of the payload read as null.
pub(crate) fn read_trailing_optional<'frame>(
    raw: &mut FrameSlice<'frame>,
) -> Result<Option<FrameSlice<'frame>>, ProtocolError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.read_cql_bytes()
}

macro_rules! impl_tuple {
    ($arity:literal; $($t:ident: $idx:tt),+) => {
        impl<'frame, $($t),+> DeserializeValue<'frame> for ($($t,)+)
        where
            $($t: DeserializeValue<'frame>),+
        {
            fn type_check(typ: &ColumnType) -> Result<(), TypeCheckError> {
                let ColumnType::Tuple(typs) = typ else {
                    return Err(mk_typck_err::<Self>(typ, BuiltinTypeCheckErrorKind::NotTuple));
                };
                if typs.len() != $arity {
                    return Err(mk_typck_err::<Self>(
                        typ,
                        BuiltinTypeCheckErrorKind::WrongTupleArity {
                            rust_arity: $arity,
                            cql_arity: typs.len(),
                        },
                    ));
                }
                $(
                    <$t as DeserializeValue<'frame>>::type_check(&typs[$idx]).map_err(|err| {
                        mk_typck_err::<Self>(
                            typ,
                            BuiltinTypeCheckErrorKind::TupleElementTypeCheckFailed {
                                position: $idx,
                                err,
                            },
                        )
                    })?;
                )+
                Ok(())
            }

            fn deserialize(
                typ: &'frame ColumnType,
                v: Option<FrameSlice<'frame>>,
            ) -> Result<Self, DeserializationError> {
                use BuiltinDeserializationErrorKind::{
                    GenericParseError, TupleElementDeserializationFailed,
                };

                let ColumnType::Tuple(typs) = typ else {
                    return Err(mk_deser_err::<Self>(
                        typ,
                        BuiltinDeserializationErrorKind::UnexpectedCqlType,
                    ));
                };
                if typs.len() != $arity {
                    return Err(mk_deser_err::<Self>(
                        typ,
                        BuiltinDeserializationErrorKind::UnexpectedCqlType,
                    ));
                }
                let mut raw = ensure_not_null_frame_slice::<Self>(typ, v)?;
                let parse_err = |err| mk_deser_err::<Self>(typ, GenericParseError(err));
                let tuple = ($(
                    {
                        let elem = read_trailing_optional(&mut raw).map_err(parse_err)?;
                        <$t as DeserializeValue<'frame>>::deserialize(&typs[$idx], elem).map_err(
                            |err| {
                                mk_deser_err::<Self>(
                                    typ,
                                    TupleElementDeserializationFailed { position: $idx, err },
                                )
                            },
                        )?
                    },
                )+);
                raw.ensure_consumed().map_err(parse_err)?;
                Ok(tuple)
            }
        }
    };
}

impl_tuple!(1; T0: 0);
impl_tuple!(2; T0: 0, T1: 1);
impl_tuple!(3; T0: 0, T1: 1, T2: 2);
impl_tuple!(4; T0: 0, T1: 1, T2: 2, T3: 3);
impl_tuple!(5; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4);
impl_tuple!(6; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5);
impl_tuple!(7; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6);
impl_tuple!(8; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7);
impl_tuple!(9; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8);
impl_tuple!(10; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9);
impl_tuple!(11; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10);
impl_tuple!(12; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11);
impl_tuple!(13; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12);
impl_tuple!(14; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13);
impl_tuple!(15; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13, T14: 14);
impl_tuple!(16; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13, T14: 14, T15: 15);

// Utilities

fn check_exact_type<T>(
    typ: &ColumnType,
    expected: &'static [ColumnType],
) -> Result<(), TypeCheckError> {
    if expected.contains(typ) {
        Ok(())
    } else {
        Err(mk_typck_err::<T>(
            typ,
            BuiltinTypeCheckErrorKind::MismatchedType { expected },
        ))
    }
}

pub(crate) fn ensure_not_null_frame_slice<'frame, T>(
    typ: &ColumnType,
    v: Option<FrameSlice<'frame>>,
) -> Result<FrameSlice<'frame>, DeserializationError> {
    v.ok_or_else(|| mk_deser_err::<T>(typ, BuiltinDeserializationErrorKind::ExpectedNonNull))
}

fn ensure_not_null_slice<'frame, T>(
    typ: &ColumnType,
    v: Option<FrameSlice<'frame>>,
) -> Result<&'frame [u8], DeserializationError> {
    ensure_not_null_frame_slice::<T>(typ, v).map(|slice| slice.as_slice())
}

fn ensure_exact_length<'frame, T, const SIZE: usize>(
    typ: &ColumnType,
    v: &'frame [u8],
) -> Result<&'frame [u8; SIZE], DeserializationError> {
    v.try_into().map_err(|_| {
        mk_deser_err::<T>(
            typ,
            BuiltinDeserializationErrorKind::ByteLengthMismatch {
                expected: SIZE,
                got: v.len(),
            },
        )
    })
}

// Errors

/// Type checking of a built-in type failed.
#[derive(Debug, Error, Clone)]
#[error("Failed to type check Rust type {rust_name} against CQL type {cql_type:?}: {kind}")]
pub struct BuiltinTypeCheckError {
    /// Name of the Rust type being checked.
    pub rust_name: &'static str,
    /// The declared CQL type.
    pub cql_type: ColumnType,
    pub kind: BuiltinTypeCheckErrorKind,
}

pub(crate) fn mk_typck_err<T>(
    cql_type: &ColumnType,
    kind: BuiltinTypeCheckErrorKind,
) -> TypeCheckError {
    mk_typck_err_named(std::any::type_name::<T>(), cql_type, kind)
}

pub(crate) fn mk_typck_err_named(
    rust_name: &'static str,
    cql_type: &ColumnType,
    kind: BuiltinTypeCheckErrorKind,
) -> TypeCheckError {
    TypeCheckError::new(BuiltinTypeCheckError {
        rust_name,
        cql_type: cql_type.clone(),
        kind,
    })
}

/// Why a built-in type check failed.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum BuiltinTypeCheckErrorKind {
    #[error("expected one of the CQL types: {expected:?}")]
    MismatchedType { expected: &'static [ColumnType] },

    #[error("expected a list or a set")]
    NotListOrSet,

    #[error("expected a map")]
    NotMap,

    #[error("expected a tuple")]
    NotTuple,

    #[error("expected a user defined type")]
    NotUdt,

    #[error("the element type check failed: {0}")]
    ElementTypeCheckFailed(TypeCheckError),

    #[error("the map key type check failed: {0}")]
    MapKeyTypeCheckFailed(TypeCheckError),

    #[error("the map value type check failed: {0}")]
    MapValueTypeCheckFailed(TypeCheckError),

    #[error("the Rust tuple has {rust_arity} elements, the CQL tuple has {cql_arity}")]
    WrongTupleArity { rust_arity: usize, cql_arity: usize },

    #[error("tuple element {position} failed the type check: {err}")]
    TupleElementTypeCheckFailed { position: usize, err: TypeCheckError },

    #[error("field {field_name} is not part of the user defined type")]
    MissingUdtField { field_name: &'static str },

    #[error("user defined type field {field_name} failed the type check: {err}")]
    UdtFieldTypeCheckFailed {
        field_name: &'static str,
        err: TypeCheckError,
    },
}

/// Deserialization of a built-in type failed.
#[derive(Debug, Error)]
#[error("Failed to deserialize Rust type {rust_name} from CQL type {cql_type:?}: {kind}")]
pub struct BuiltinDeserializationError {
    /// Name of the Rust type being decoded.
    pub rust_name: &'static str,
    /// The declared CQL type.
    pub cql_type: ColumnType,
    #[source]
    pub kind: BuiltinDeserializationErrorKind,
}

pub(crate) fn mk_deser_err<T>(
    cql_type: &ColumnType,
    kind: BuiltinDeserializationErrorKind,
) -> DeserializationError {
    mk_deser_err_named(std::any::type_name::<T>(), cql_type, kind)
}

pub(crate) fn mk_deser_err_named(
    rust_name: &'static str,
    cql_type: &ColumnType,
    kind: BuiltinDeserializationErrorKind,
) -> DeserializationError {
    DeserializationError::new(BuiltinDeserializationError {
        rust_name,
        cql_type: cql_type.clone(),
        kind,
    })
}

/// Why decoding a built-in type failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuiltinDeserializationErrorKind {
    #[error("{0}")]
    GenericParseError(#[source] ProtocolError),

    #[error("expected a non-null value, got null")]
    ExpectedNonNull,

    #[error("the CQL type requires {expected} bytes, but got {got}")]
    ByteLengthMismatch { expected: usize, got: usize },

    #[error("expected a valid ASCII string")]
    ExpectedAscii,

    #[error("{0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    #[error("inet value must be 4 or 16 bytes long, got {got}")]
    BadInetLength { got: usize },

    /// Called with a CQL type the target never type checked against.
    #[error("the value was not type checked against this CQL type")]
    UnexpectedCqlType,

    #[error("failed to deserialize element {index}: {err}")]
    ElementDeserializationFailed {
        index: usize,
        #[source]
        err: DeserializationError,
    },

    #[error("failed to deserialize key of entry {index}: {err}")]
    MapKeyDeserializationFailed {
        index: usize,
        #[source]
        err: DeserializationError,
    },

    #[error("failed to deserialize value of entry {index}: {err}")]
    MapValueDeserializationFailed {
        index: usize,
        #[source]
        err: DeserializationError,
    },

    #[error("failed to deserialize tuple element {position}: {err}")]
    TupleElementDeserializationFailed {
        position: usize,
        #[source]
        err: DeserializationError,
    },

    #[error("failed to deserialize user defined type field {field_name}: {err}")]
    UdtFieldDeserializationFailed {
        field_name: String,
        #[source]
        err: DeserializationError,
    },
}

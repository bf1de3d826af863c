//! Eagerly decoded rows and their conversion traits.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::net::IpAddr;

use thiserror::Error;
use uuid::Uuid;

use crate::deserialize::row::{column_deser_err, next_raw_column};
use crate::deserialize::{
    ColumnIterator, DeserializationError, DeserializeRow, DeserializeValue, RowBinding, RowPlan,
    TypeCheckError,
};
use crate::protocol::ColumnSpec;
use crate::value::{
    Counter, CqlDate, CqlDecimal, CqlDuration, CqlTime, CqlTimestamp, CqlTimeuuid, CqlValue,
    CqlVarint,
};

/// A fully decoded row. Owns its data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// One entry per column, `None` for null.
    pub columns: Vec<Option<CqlValue>>,
}

impl Row {
    /// Convert into a typed row.
    pub fn into_typed<T: FromRow>(self) -> Result<T, FromRowError> {
        T::from_row(self)
    }
}

/// Eager decoding: every column becomes an `Option<CqlValue>`.
impl<'frame> DeserializeRow<'frame> for Row {
    fn type_check(specs: &[ColumnSpec], _binding: RowBinding) -> Result<RowPlan, TypeCheckError> {
        Ok(RowPlan::positional(specs.len()))
    }

    fn deserialize(
        _plan: &RowPlan,
        mut row: ColumnIterator<'frame>,
    ) -> Result<Self, DeserializationError> {
        let mut columns = Vec::with_capacity(row.columns_remaining());
        while let Some(column) = next_raw_column::<Self>(&mut row)? {
            let value = <Option<CqlValue>>::deserialize(column.spec.typ(), column.slice)
                .map_err(|err| column_deser_err::<Self>(&column, err))?;
            columns.push(value);
        }
        Ok(Self { columns })
    }
}

/// Conversion of an already decoded [`CqlValue`] into a Rust type.
pub trait FromCqlVal: Sized {
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError>;

    /// Convert a possibly null value. Null is an error unless overridden.
    fn from_cql_opt(value: Option<CqlValue>) -> Result<Self, FromCqlValError> {
        value.ok_or(FromCqlValError::ValIsNull).and_then(Self::from_cql)
    }
}

/// `None` for null and for the empty value.
impl<T: FromCqlVal> FromCqlVal for Option<T> {
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        match value {
            CqlValue::Empty => Ok(None),
            value => T::from_cql(value).map(Some),
        }
    }

    fn from_cql_opt(value: Option<CqlValue>) -> Result<Self, FromCqlValError> {
        match value {
            Some(value) => Self::from_cql(value),
            None => Ok(None),
        }
    }
}

impl FromCqlVal for CqlValue {
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        Ok(value)
    }
}

macro_rules! impl_from_cql_val {
    ($t:ty, $($variant:ident)|+) => {
        impl FromCqlVal for $t {
            fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
                match value {
                    $(CqlValue::$variant(inner) => Ok(inner.into()),)+
                    _ => Err(FromCqlValError::BadCqlType),
                }
            }
        }
    };
}

impl_from_cql_val!(bool, Boolean);
impl_from_cql_val!(i8, TinyInt);
impl_from_cql_val!(i16, SmallInt);
impl_from_cql_val!(i32, Int);
impl_from_cql_val!(f32, Float);
impl_from_cql_val!(f64, Double);
impl_from_cql_val!(String, Ascii | Text);
impl_from_cql_val!(Vec<u8>, Blob);
impl_from_cql_val!(Counter, Counter);
impl_from_cql_val!(CqlVarint, Varint);
impl_from_cql_val!(CqlDecimal, Decimal);
impl_from_cql_val!(CqlDate, Date);
impl_from_cql_val!(CqlTime, Time);
impl_from_cql_val!(CqlTimestamp, Timestamp);
impl_from_cql_val!(CqlDuration, Duration);
impl_from_cql_val!(CqlTimeuuid, Timeuuid);
impl_from_cql_val!(Uuid, Uuid | Timeuuid);
impl_from_cql_val!(IpAddr, Inet);

impl FromCqlVal for i64 {
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        match value {
            CqlValue::BigInt(v) => Ok(v),
            CqlValue::Counter(Counter(v)) => Ok(v),
            _ => Err(FromCqlValError::BadCqlType),
        }
    }
}

fn listlike(value: CqlValue) -> Result<Vec<CqlValue>, FromCqlValError> {
    match value {
        CqlValue::List(values) | CqlValue::Set(values) => Ok(values),
        _ => Err(FromCqlValError::BadCqlType),
    }
}

fn map_entries(value: CqlValue) -> Result<Vec<(CqlValue, CqlValue)>, FromCqlValError> {
    match value {
        CqlValue::Map(entries) => Ok(entries),
        _ => Err(FromCqlValError::BadCqlType),
    }
}

impl<T: FromCqlVal> FromCqlVal for Vec<T> {
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        listlike(value)?.into_iter().map(T::from_cql).collect()
    }
}

impl<T: FromCqlVal + Ord> FromCqlVal for BTreeSet<T> {
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        listlike(value)?.into_iter().map(T::from_cql).collect()
    }
}

impl<T, S> FromCqlVal for HashSet<T, S>
where
    T: FromCqlVal + Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        listlike(value)?.into_iter().map(T::from_cql).collect()
    }
}

impl<K: FromCqlVal + Ord, V: FromCqlVal> FromCqlVal for BTreeMap<K, V> {
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_cql(k)?, V::from_cql(v)?)))
            .collect()
    }
}

impl<K, V, S> FromCqlVal for HashMap<K, V, S>
where
    K: FromCqlVal + Eq + Hash,
    V: FromCqlVal,
    S: BuildHasher + Default,
{
    fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_cql(k)?, V::from_cql(v)?)))
            .collect()
    }
}

macro_rules! impl_tuple_from_cql {
    ($arity:literal; $($t:ident),+) => {
        impl<$($t),+> FromCqlVal for ($($t,)+)
        where
            $($t: FromCqlVal),+
        {
            fn from_cql(value: CqlValue) -> Result<Self, FromCqlValError> {
                let CqlValue::Tuple(elements) = value else {
                    return Err(FromCqlValError::BadCqlType);
                };
                if elements.len() != $arity {
                    return Err(FromCqlValError::BadCqlType);
                }
                let mut elements = elements.into_iter();
                Ok(($($t::from_cql_opt(elements.next().flatten())?,)+))
            }
        }
    };
}

impl_tuple_from_cql!(1; T0);
impl_tuple_from_cql!(2; T0, T1);
impl_tuple_from_cql!(3; T0, T1, T2);
impl_tuple_from_cql!(4; T0, T1, T2, T3);
impl_tuple_from_cql!(5; T0, T1, T2, T3, T4);
impl_tuple_from_cql!(6; T0, T1, T2, T3, T4, T5);
impl_tuple_from_cql!(7; T0, T1, T2, T3, T4, T5, T6);
impl_tuple_from_cql!(8; T0, T1, T2, T3, T4, T5, T6, T7);
impl_tuple_from_cql!(9; T0, T1, T2, T3, T4, T5, T6, T7, T8);
impl_tuple_from_cql!(10; T0, T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_tuple_from_cql!(11; T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_tuple_from_cql!(12; T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_tuple_from_cql!(13; T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_tuple_from_cql!(14; T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_tuple_from_cql!(15; T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_tuple_from_cql!(16; T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15);

/// Fields of a decoded user defined type value.
#[doc(hidden)]
pub fn udt_fields(
    value: CqlValue,
) -> Result<Vec<(String, Option<CqlValue>)>, FromCqlValError> {
    match value {
        CqlValue::UserDefinedType { fields, .. } => Ok(fields),
        _ => Err(FromCqlValError::BadCqlType),
    }
}

/// Take the value of field `name`. A field the type does not define reads
/// as null.
#[doc(hidden)]
pub fn take_udt_field(
    fields: &mut [(String, Option<CqlValue>)],
    name: &str,
) -> Option<CqlValue> {
    fields
        .iter_mut()
        .find(|(field_name, _)| field_name == name)
        .and_then(|(_, value)| value.take())
}

/// Implement [`FromRow`] and [`FromCqlVal`] (as a user defined type) for a
/// struct with named, owned fields.
///
/// Rows are converted by position, in field declaration order. User
/// defined type values are converted by field name.
///
/// ```
/// use cqlwire_client::impl_from_cql_record;
///
/// struct User {
///     name: String,
///     age: Option<i32>,
/// }
///
/// impl_from_cql_record!(User { name: String, age: Option<i32> });
/// ```
#[macro_export]
macro_rules! impl_from_cql_record {
    ($name:ident { $($field:ident: $ty:ty),+ $(,)? }) => {
        impl $crate::legacy::FromRow for $name {
            fn from_row(
                row: $crate::legacy::Row,
            ) -> ::std::result::Result<Self, $crate::legacy::FromRowError> {
                const FIELDS: &[&str] = &[$(stringify!($field)),+];
                if row.columns.len() != FIELDS.len() {
                    return Err($crate::legacy::FromRowError::WrongRowSize {
                        expected: FIELDS.len(),
                        actual: row.columns.len(),
                    });
                }
                let mut columns = row.columns.into_iter().enumerate();
                Ok(Self {
                    $($field: {
                        let (column, value) = columns.next().unwrap_or_default();
                        <$ty as $crate::legacy::FromCqlVal>::from_cql_opt(value).map_err(
                            |err| $crate::legacy::FromRowError::BadCqlVal { err, column },
                        )?
                    },)+
                })
            }
        }

        impl $crate::legacy::FromCqlVal for $name {
            fn from_cql(
                value: $crate::value::CqlValue,
            ) -> ::std::result::Result<Self, $crate::legacy::FromCqlValError> {
                let mut fields = $crate::legacy::udt_fields(value)?;
                Ok(Self {
                    $($field: <$ty as $crate::legacy::FromCqlVal>::from_cql_opt(
                        $crate::legacy::take_udt_field(&mut fields, stringify!($field)),
                    )?,)+
                })
            }
        }
    };
}

/// Conversion of a [`Row`] into a Rust type.
pub trait FromRow: Sized {
    fn from_row(row: Row) -> Result<Self, FromRowError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, FromRowError> {
        Ok(row)
    }
}

macro_rules! impl_tuple_from_row {
    ($arity:literal; $($t:ident: $idx:tt),+) => {
        impl<$($t),+> FromRow for ($($t,)+)
        where
            $($t: FromCqlVal),+
        {
            fn from_row(row: Row) -> Result<Self, FromRowError> {
                if row.columns.len() != $arity {
                    return Err(FromRowError::WrongRowSize {
                        expected: $arity,
                        actual: row.columns.len(),
                    });
                }
                let mut columns = row.columns.into_iter();
                Ok(($(
                    $t::from_cql_opt(columns.next().flatten())
                        .map_err(|err| FromRowError::BadCqlVal { err, column: $idx })?,
                )+))
            }
        }
    };
}

impl_tuple_from_row!(1; T0: 0);
impl_tuple_from_row!(2; T0: 0, T1: 1);
impl_tuple_from_row!(3; T0: 0, T1: 1, T2: 2);
impl_tuple_from_row!(4; T0: 0, T1: 1, T2: 2, T3: 3);
impl_tuple_from_row!(5; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4);
impl_tuple_from_row!(6; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5);
impl_tuple_from_row!(7; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6);
impl_tuple_from_row!(8; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7);
impl_tuple_from_row!(9; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8);
impl_tuple_from_row!(10; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9);
impl_tuple_from_row!(11; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10);
impl_tuple_from_row!(12; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11);
impl_tuple_from_row!(13; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12);
impl_tuple_from_row!(14; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13);
impl_tuple_from_row!(15; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13, T14: 14);
impl_tuple_from_row!(16; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13, T14: 14, T15: 15);

/// Typed view over a vector of rows.
pub trait IntoTypedRows {
    fn into_typed<T: FromRow>(self) -> TypedRowIter<T>;
}

impl IntoTypedRows for Vec<Row> {
    fn into_typed<T: FromRow>(self) -> TypedRowIter<T> {
        TypedRowIter {
            row_iter: self.into_iter(),
            phantom: PhantomData,
        }
    }
}

/// Iterator converting owned rows with [`FromRow`].
#[derive(Debug)]
pub struct TypedRowIter<T> {
    row_iter: std::vec::IntoIter<Row>,
    phantom: PhantomData<T>,
}

impl<T: FromRow> Iterator for TypedRowIter<T> {
    type Item = Result<T, FromRowError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.row_iter.next().map(T::from_row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.row_iter.size_hint()
    }
}

impl<T: FromRow> ExactSizeIterator for TypedRowIter<T> {}

/// A [`CqlValue`] could not be converted into the requested type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FromCqlValError {
    #[error("Bad CQL type")]
    BadCqlType,
    #[error("Value is null")]
    ValIsNull,
}

/// A [`Row`] could not be converted into the requested type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FromRowError {
    #[error("Bad CQL value in column {column}: {err}")]
    BadCqlVal { err: FromCqlValError, column: usize },
    #[error("Wrong row size: expected {expected}, got {actual}")]
    WrongRowSize { expected: usize, actual: usize },
}

/// Failure of the eager (legacy) conversion path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error(transparent)]
    FromCqlVal(#[from] FromCqlValError),
    #[error(transparent)]
    FromRow(#[from] FromRowError),
    /// The result carried no rows at all (not a ROWS result).
    #[error("Rows were expected, but the result carries none")]
    RowsExpected,
    /// The result had zero rows where one was required.
    #[error("The result has no rows")]
    RowsEmpty,
    /// The result did not have exactly one row.
    #[error("Expected a single row, got {0}")]
    UnexpectedRowCount(usize),
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use bytes::{Bytes, BytesMut};

    use super::*;
    use crate::deserialize::FrameSlice;
    use crate::protocol::wire_format::write_bytes_opt;
    use crate::protocol::ColumnType;

    #[test]
    fn test_from_cql_scalars() {
        assert_eq!(i32::from_cql(CqlValue::Int(4)), Ok(4));
        assert_eq!(i64::from_cql(CqlValue::Counter(Counter(9))), Ok(9));
        assert_eq!(
            String::from_cql(CqlValue::Ascii("a".to_string())),
            Ok("a".to_string())
        );
        assert_eq!(
            IpAddr::from_cql(CqlValue::Inet(IpAddr::V4(Ipv4Addr::LOCALHOST))),
            Ok(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(
            i32::from_cql(CqlValue::Text("4".to_string())),
            Err(FromCqlValError::BadCqlType)
        );
    }

    #[test]
    fn test_null_and_empty() {
        assert_eq!(i32::from_cql_opt(None), Err(FromCqlValError::ValIsNull));
        assert_eq!(<Option<i32>>::from_cql_opt(None), Ok(None));
        assert_eq!(<Option<i32>>::from_cql(CqlValue::Empty), Ok(None));
        assert_eq!(
            i32::from_cql(CqlValue::Empty),
            Err(FromCqlValError::BadCqlType)
        );
    }

    #[test]
    fn test_from_cql_collections() {
        let list = CqlValue::List(vec![CqlValue::Int(2), CqlValue::Int(1)]);
        assert_eq!(Vec::<i32>::from_cql(list.clone()), Ok(vec![2, 1]));
        assert_eq!(BTreeSet::<i32>::from_cql(list), Ok(BTreeSet::from([1, 2])));

        let map = CqlValue::Map(vec![(CqlValue::Text("k".to_string()), CqlValue::BigInt(3))]);
        let map = HashMap::<String, i64>::from_cql(map).unwrap();
        assert_eq!(map["k"], 3);

        assert_eq!(
            Vec::<u8>::from_cql(CqlValue::Blob(vec![1, 2])),
            Ok(vec![1, 2])
        );
    }

    #[test]
    fn test_from_row_tuples() {
        let row = Row {
            columns: vec![Some(CqlValue::Int(1)), None],
        };
        let typed: (i32, Option<String>) = row.clone().into_typed().unwrap();
        assert_eq!(typed, (1, None));

        assert_eq!(
            row.clone().into_typed::<(i32, String)>(),
            Err(FromRowError::BadCqlVal {
                err: FromCqlValError::ValIsNull,
                column: 1
            })
        );
        assert_eq!(
            row.into_typed::<(i32,)>(),
            Err(FromRowError::WrongRowSize {
                expected: 1,
                actual: 2
            })
        );
    }

    #[derive(Debug, PartialEq)]
    struct Address {
        street: String,
        number: Option<i32>,
    }

    crate::impl_from_cql_record!(Address { street: String, number: Option<i32> });

    #[derive(Debug, PartialEq)]
    struct Resident {
        name: String,
        home: Address,
        scores: (i32, Option<String>),
    }

    crate::impl_from_cql_record!(Resident {
        name: String,
        home: Address,
        scores: (i32, Option<String>),
    });

    fn address_value(fields: Vec<(&str, Option<CqlValue>)>) -> CqlValue {
        CqlValue::UserDefinedType {
            keyspace: "ks".to_string(),
            type_name: "address".to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    #[test]
    fn test_from_cql_tuples() {
        let tuple = CqlValue::Tuple(vec![Some(CqlValue::Int(1)), None]);
        assert_eq!(
            <(i32, Option<String>)>::from_cql(tuple.clone()),
            Ok((1, None))
        );
        assert_eq!(
            <(i32, String)>::from_cql(tuple.clone()),
            Err(FromCqlValError::ValIsNull)
        );
        assert_eq!(
            <(i32,)>::from_cql(tuple),
            Err(FromCqlValError::BadCqlType)
        );
        assert_eq!(
            <(i32,)>::from_cql(CqlValue::Int(1)),
            Err(FromCqlValError::BadCqlType)
        );
    }

    #[test]
    fn test_record_from_udt_by_name() {
        let value = address_value(vec![
            ("number", Some(CqlValue::Int(12))),
            ("zip", Some(CqlValue::Text("00-001".to_string()))),
            ("street", Some(CqlValue::Text("Main".to_string()))),
        ]);
        assert_eq!(
            Address::from_cql(value),
            Ok(Address {
                street: "Main".to_string(),
                number: Some(12)
            })
        );

        let without_number = address_value(vec![("street", Some(CqlValue::Text("Side".into())))]);
        assert_eq!(Address::from_cql(without_number).unwrap().number, None);

        let without_street = address_value(vec![("number", Some(CqlValue::Int(1)))]);
        assert_eq!(
            Address::from_cql(without_street),
            Err(FromCqlValError::ValIsNull)
        );
        assert_eq!(
            Address::from_cql(CqlValue::Int(1)),
            Err(FromCqlValError::BadCqlType)
        );
    }

    #[test]
    fn test_record_from_row_by_position() {
        let home = address_value(vec![("street", Some(CqlValue::Text("Main".into())))]);
        let scores = CqlValue::Tuple(vec![Some(CqlValue::Int(7)), None]);
        let row = Row {
            columns: vec![Some(CqlValue::Text("Eve".into())), Some(home), Some(scores)],
        };

        let resident: Resident = row.clone().into_typed().unwrap();
        assert_eq!(resident.name, "Eve");
        assert_eq!(resident.home.street, "Main");
        assert_eq!(resident.scores, (7, None));

        let mut short = row.clone();
        short.columns.pop();
        assert_eq!(
            short.into_typed::<Resident>(),
            Err(FromRowError::WrongRowSize {
                expected: 3,
                actual: 2
            })
        );

        let mut null_home = row;
        null_home.columns[1] = None;
        assert_eq!(
            null_home.into_typed::<Resident>(),
            Err(FromRowError::BadCqlVal {
                err: FromCqlValError::ValIsNull,
                column: 1
            })
        );
    }

    #[test]
    fn test_into_typed_rows() {
        let rows = vec![
            Row {
                columns: vec![Some(CqlValue::Int(1))],
            },
            Row {
                columns: vec![Some(CqlValue::Int(2))],
            },
        ];
        let values: Vec<i32> = rows
            .into_typed::<(i32,)>()
            .map(|row| row.unwrap().0)
            .collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_row_decoded_eagerly() {
        let specs = vec![
            ColumnSpec::new("a", ColumnType::Int),
            ColumnSpec::new("b", ColumnType::Text),
            ColumnSpec::new("c", ColumnType::Int),
        ];
        let mut buf = BytesMut::new();
        CqlValue::Int(1).write_cell(&mut buf);
        write_bytes_opt(None, &mut buf);
        write_bytes_opt(Some(&[][..]), &mut buf);
        let raw: Bytes = buf.freeze();

        let plan = <Row as DeserializeRow>::type_check(&specs, RowBinding::default()).unwrap();
        let row = <Row as DeserializeRow>::deserialize(
            &plan,
            ColumnIterator::new(&specs, FrameSlice::new(&raw)),
        )
        .unwrap();
        assert_eq!(
            row.columns,
            vec![Some(CqlValue::Int(1)), None, Some(CqlValue::Empty)]
        );
    }
}

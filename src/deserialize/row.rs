//! Decoding of whole rows.
//!
//! A row target is type checked once against the column specs of a result
//! set. The check returns a [`RowPlan`] mapping every column to the target
//! field that consumes it; the plan is then reused for every row.
//!
//! Two binding strategies exist for record targets:
//!
//! ```text
//! columns:           (age: int, name: text)
//! struct fields:     { name: String, age: i32 }
//!
//! ByName:            age  -> field 1, name -> field 0     (order independent)
//! Positional:        age  -> field 0, name -> field 1     (type check fails)
//! ```
//!
//! Tuples are always bound by position.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::{
    ensure_not_null_frame_slice, mk_deser_err, mk_deser_err_named, mk_typck_err,
    read_trailing_optional, BuiltinDeserializationErrorKind, BuiltinTypeCheckErrorKind,
};
use super::{
    ColumnIterator, DeserializationError, DeserializeValue, FrameSlice, RawColumn, TypeCheckError,
};
use crate::error::ProtocolError;
use crate::protocol::{ColumnSpec, ColumnType};

/// How record fields are matched to result columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowBinding {
    /// Field `i` consumes column `i`; names are ignored.
    Positional,
    /// Every field consumes the column with its name.
    ByName {
        /// Whether columns no field asks for are skipped instead of failing
        /// the type check.
        allow_extra_columns: bool,
    },
}

impl Default for RowBinding {
    fn default() -> Self {
        RowBinding::ByName {
            allow_extra_columns: false,
        }
    }
}

/// Result of a successful row type check.
///
/// Maps every column position to the index of the field that consumes it.
/// `None` marks a column that is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPlan {
    column_to_field: Vec<Option<usize>>,
}

impl RowPlan {
    /// Column `i` feeds field `i`.
    pub fn positional(col_count: usize) -> Self {
        Self {
            column_to_field: (0..col_count).map(Some).collect(),
        }
    }

    pub fn from_mapping(column_to_field: Vec<Option<usize>>) -> Self {
        Self { column_to_field }
    }

    #[inline]
    pub fn column_to_field(&self) -> &[Option<usize>] {
        &self.column_to_field
    }

    /// Field consuming the column at `column_index`, if any.
    #[inline]
    pub fn field_for_column(&self, column_index: usize) -> Option<usize> {
        self.column_to_field.get(column_index).copied().flatten()
    }
}

/// A type that can be decoded from a whole row.
pub trait DeserializeRow<'frame>
where
    Self: Sized,
{
    /// Check the target against the columns of a result set.
    ///
    /// Never looks at row bytes. The returned plan is passed to every
    /// [`deserialize`](Self::deserialize) call for rows of that result set.
    fn type_check(specs: &[ColumnSpec], binding: RowBinding) -> Result<RowPlan, TypeCheckError>;

    /// Decode one row.
    fn deserialize(
        plan: &RowPlan,
        row: ColumnIterator<'frame>,
    ) -> Result<Self, DeserializationError>;
}

/// Raw access to the columns of a row.
impl<'frame> DeserializeRow<'frame> for ColumnIterator<'frame> {
    fn type_check(specs: &[ColumnSpec], _binding: RowBinding) -> Result<RowPlan, TypeCheckError> {
        Ok(RowPlan::positional(specs.len()))
    }

    fn deserialize(
        _plan: &RowPlan,
        row: ColumnIterator<'frame>,
    ) -> Result<Self, DeserializationError> {
        Ok(row)
    }
}

macro_rules! impl_tuple_row {
    ($arity:literal; $($t:ident: $idx:tt),+) => {
        impl<'frame, $($t),+> DeserializeRow<'frame> for ($($t,)+)
        where
            $($t: DeserializeValue<'frame>),+
        {
            fn type_check(
                specs: &[ColumnSpec],
                _binding: RowBinding,
            ) -> Result<RowPlan, TypeCheckError> {
                if specs.len() != $arity {
                    return Err(mk_row_typck_err::<Self>(
                        BuiltinRowTypeCheckErrorKind::WrongColumnCount {
                            rust_cols: $arity,
                            cql_cols: specs.len(),
                        },
                    ));
                }
                $(
                    let spec = &specs[$idx];
                    <$t as DeserializeValue<'frame>>::type_check(spec.typ())
                        .map_err(|err| column_typck_err::<Self>($idx, spec, err))?;
                )+
                Ok(RowPlan::positional($arity))
            }

            fn deserialize(
                _plan: &RowPlan,
                mut row: ColumnIterator<'frame>,
            ) -> Result<Self, DeserializationError> {
                Ok(($(
                    {
                        let column = next_raw_column::<Self>(&mut row)?.ok_or_else(|| {
                            mk_row_deser_err::<Self>(
                                BuiltinRowDeserializationErrorKind::UnboundField { field: $idx },
                            )
                        })?;
                        let typ = column.spec.typ();
                        <$t as DeserializeValue<'frame>>::deserialize(typ, column.slice)
                            .map_err(|err| column_deser_err::<Self>(&column, err))?
                    },
                )+))
            }
        }
    };
}

impl_tuple_row!(1; T0: 0);
impl_tuple_row!(2; T0: 0, T1: 1);
impl_tuple_row!(3; T0: 0, T1: 1, T2: 2);
impl_tuple_row!(4; T0: 0, T1: 1, T2: 2, T3: 3);
impl_tuple_row!(5; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4);
impl_tuple_row!(6; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5);
impl_tuple_row!(7; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6);
impl_tuple_row!(8; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7);
impl_tuple_row!(9; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8);
impl_tuple_row!(10; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9);
impl_tuple_row!(11; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10);
impl_tuple_row!(12; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11);
impl_tuple_row!(13; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12);
impl_tuple_row!(14; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13);
impl_tuple_row!(15; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13, T14: 14);
impl_tuple_row!(16; T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11, T12: 12, T13: 13, T14: 14, T15: 15);

// Records

/// A struct with named fields, decodable from a row (by position or by
/// name) and from a user defined type value.
///
/// Usually implemented with [`impl_deserialize_record!`](crate::impl_deserialize_record),
/// which also implements [`DeserializeRow`] and [`DeserializeValue`].
pub trait DeserializeRecord<'frame>
where
    Self: Sized,
{
    /// Field names in declaration order.
    const FIELDS: &'static [&'static str];

    /// Type check the field at position `field` of [`FIELDS`](Self::FIELDS).
    fn type_check_field(field: usize, typ: &ColumnType) -> Result<(), TypeCheckError>;

    /// Build the record. Fields must be taken in declaration order.
    fn from_fields(fields: RecordFields<'frame>) -> Result<Self, DeserializationError>;
}

#[derive(Debug, Clone, Copy)]
enum FieldOrigin<'frame> {
    Row,
    Udt(&'frame ColumnType),
}

#[derive(Debug, Clone, Copy)]
struct FieldSource<'frame> {
    /// Column position, or position of the field in the UDT definition.
    position: usize,
    name: &'frame str,
    typ: &'frame ColumnType,
    slice: Option<FrameSlice<'frame>>,
}

/// The undecoded values of a record, in field declaration order.
#[derive(Debug)]
pub struct RecordFields<'frame> {
    rust_name: &'static str,
    field_names: &'static [&'static str],
    origin: FieldOrigin<'frame>,
    sources: Vec<Option<FieldSource<'frame>>>,
    next: usize,
}

impl<'frame> RecordFields<'frame> {
    /// Decode the next field.
    pub fn next_field<T>(&mut self) -> Result<T, DeserializationError>
    where
        T: DeserializeValue<'frame>,
    {
        let field = self.next;
        self.next += 1;

        let Some(source) = self.sources.get(field).copied().flatten() else {
            return Err(mk_row_deser_err_named(
                self.rust_name,
                BuiltinRowDeserializationErrorKind::UnboundField { field },
            ));
        };
        T::deserialize(source.typ, source.slice).map_err(|err| match self.origin {
            FieldOrigin::Row => mk_row_deser_err_named(
                self.rust_name,
                BuiltinRowDeserializationErrorKind::ColumnDeserializationFailed {
                    column_index: source.position,
                    column_name: source.name.to_owned(),
                    err,
                },
            ),
            FieldOrigin::Udt(udt_typ) => mk_deser_err_named(
                self.rust_name,
                udt_typ,
                BuiltinDeserializationErrorKind::UdtFieldDeserializationFailed {
                    field_name: self
                        .field_names
                        .get(field)
                        .copied()
                        .unwrap_or(source.name)
                        .to_owned(),
                    err,
                },
            ),
        })
    }

    /// Number of fields not yet taken.
    pub fn remaining(&self) -> usize {
        self.sources.len().saturating_sub(self.next)
    }
}

/// Type check a record against the columns of a result set.
pub fn type_check_record<'frame, R>(
    specs: &[ColumnSpec],
    binding: RowBinding,
) -> Result<RowPlan, TypeCheckError>
where
    R: DeserializeRecord<'frame>,
{
    match binding {
        RowBinding::Positional => {
            if specs.len() != R::FIELDS.len() {
                return Err(mk_row_typck_err::<R>(
                    BuiltinRowTypeCheckErrorKind::WrongColumnCount {
                        rust_cols: R::FIELDS.len(),
                        cql_cols: specs.len(),
                    },
                ));
            }
            for (index, spec) in specs.iter().enumerate() {
                R::type_check_field(index, spec.typ())
                    .map_err(|err| column_typck_err::<R>(index, spec, err))?;
            }
            Ok(RowPlan::positional(specs.len()))
        }
        RowBinding::ByName {
            allow_extra_columns,
        } => {
            let mut column_to_field = vec![None; specs.len()];
            for (field, &field_name) in R::FIELDS.iter().enumerate() {
                let Some((index, spec)) = specs
                    .iter()
                    .enumerate()
                    .find(|(_, spec)| spec.name() == field_name)
                else {
                    return Err(mk_row_typck_err::<R>(
                        BuiltinRowTypeCheckErrorKind::MissingColumn { field_name },
                    ));
                };
                R::type_check_field(field, spec.typ())
                    .map_err(|err| column_typck_err::<R>(index, spec, err))?;
                column_to_field[index] = Some(field);
            }

            if !allow_extra_columns {
                let unmatched = column_to_field
                    .iter()
                    .zip(specs)
                    .enumerate()
                    .find(|(_, (field, _))| field.is_none());
                if let Some((column_index, (_, spec))) = unmatched {
                    return Err(mk_row_typck_err::<R>(
                        BuiltinRowTypeCheckErrorKind::UnexpectedColumn {
                            column_index,
                            column_name: spec.name().to_owned(),
                        },
                    ));
                }
            }
            Ok(RowPlan::from_mapping(column_to_field))
        }
    }
}

/// Decode a record from one row following `plan`.
pub fn deserialize_record<'frame, R>(
    plan: &RowPlan,
    mut row: ColumnIterator<'frame>,
) -> Result<R, DeserializationError>
where
    R: DeserializeRecord<'frame>,
{
    let mut sources = vec![None; R::FIELDS.len()];
    while let Some(column) = next_raw_column::<R>(&mut row)? {
        let Some(field) = plan.field_for_column(column.index) else {
            continue;
        };
        if let Some(slot) = sources.get_mut(field) {
            *slot = Some(FieldSource {
                position: column.index,
                name: column.spec.name(),
                typ: column.spec.typ(),
                slice: column.slice,
            });
        }
    }
    R::from_fields(RecordFields {
        rust_name: std::any::type_name::<R>(),
        field_names: R::FIELDS,
        origin: FieldOrigin::Row,
        sources,
        next: 0,
    })
}

/// For every field of a user defined type, the record field that consumes
/// it, if any.
///
/// Definitions usually list fields in record order, so each lookup first
/// tries the field after the previous match.
fn udt_field_mapping(
    record_fields: &[&str],
    field_types: &[(String, ColumnType)],
) -> Vec<Option<usize>> {
    let mut cursor = 0;
    field_types
        .iter()
        .map(|(name, _)| {
            let field = if record_fields.get(cursor) == Some(&name.as_str()) {
                Some(cursor)
            } else {
                record_fields.iter().position(|field| *field == name.as_str())
            };
            if let Some(field) = field {
                cursor = field + 1;
            }
            field
        })
        .collect()
}

/// Type check a record against a user defined type.
///
/// Fields are matched by name. The type may define fields the record does
/// not have; every record field must exist in the type.
pub fn type_check_udt<'frame, R>(typ: &ColumnType) -> Result<(), TypeCheckError>
where
    R: DeserializeRecord<'frame>,
{
    let ColumnType::UserDefinedType { field_types, .. } = typ else {
        return Err(mk_typck_err::<R>(typ, BuiltinTypeCheckErrorKind::NotUdt));
    };
    let mut field_to_position = vec![None; R::FIELDS.len()];
    for (position, field) in udt_field_mapping(R::FIELDS, field_types).into_iter().enumerate() {
        if let Some(slot) = field.and_then(|field| field_to_position.get_mut(field)) {
            slot.get_or_insert(position);
        }
    }
    for (field, (&field_name, position)) in R::FIELDS.iter().zip(field_to_position).enumerate() {
        let Some((_, field_typ)) = position.and_then(|position| field_types.get(position)) else {
            return Err(mk_typck_err::<R>(
                typ,
                BuiltinTypeCheckErrorKind::MissingUdtField { field_name },
            ));
        };
        R::type_check_field(field, field_typ).map_err(|err| {
            mk_typck_err::<R>(
                typ,
                BuiltinTypeCheckErrorKind::UdtFieldTypeCheckFailed { field_name, err },
            )
        })?;
    }
    Ok(())
}

/// Decode a record from a user defined type value.
///
/// Fields missing from the end of the payload decode as null. Bytes left
/// after the last defined field are an error.
pub fn deserialize_udt<'frame, R>(
    typ: &'frame ColumnType,
    v: Option<FrameSlice<'frame>>,
) -> Result<R, DeserializationError>
where
    R: DeserializeRecord<'frame>,
{
    let ColumnType::UserDefinedType { field_types, .. } = typ else {
        return Err(mk_deser_err::<R>(
            typ,
            BuiltinDeserializationErrorKind::UnexpectedCqlType,
        ));
    };
    let mut raw = ensure_not_null_frame_slice::<R>(typ, v)?;
    let parse_err =
        |err| mk_deser_err::<R>(typ, BuiltinDeserializationErrorKind::GenericParseError(err));

    let mapping = udt_field_mapping(R::FIELDS, field_types);
    let mut sources = vec![None; R::FIELDS.len()];
    for (position, ((name, field_typ), field)) in field_types.iter().zip(mapping).enumerate() {
        let slice = read_trailing_optional(&mut raw).map_err(parse_err)?;
        if let Some(slot) = field.and_then(|field| sources.get_mut(field)) {
            *slot = Some(FieldSource {
                position,
                name: name.as_str(),
                typ: field_typ,
                slice,
            });
        }
    }
    raw.ensure_consumed().map_err(parse_err)?;

    R::from_fields(RecordFields {
        rust_name: std::any::type_name::<R>(),
        field_names: R::FIELDS,
        origin: FieldOrigin::Udt(typ),
        sources,
        next: 0,
    })
}

/// Implement [`DeserializeRecord`], [`DeserializeRow`] and
/// [`DeserializeValue`] (as a user defined type) for a struct with named
/// fields.
///
/// The field list must repeat the struct's fields in declaration order. A
/// struct borrowing from the response takes exactly one lifetime parameter,
/// which becomes the frame lifetime.
///
/// ```
/// use cqlwire_client::impl_deserialize_record;
///
/// struct User<'a> {
///     name: &'a str,
///     age: Option<i32>,
/// }
///
/// impl_deserialize_record!(User<'a> { name: &'a str, age: Option<i32> });
/// ```
#[macro_export]
macro_rules! impl_deserialize_record {
    (@impl $frame:lifetime, $target:ty, { $($field:ident: $ty:ty),+ }) => {
        impl<$frame> $crate::deserialize::DeserializeRecord<$frame> for $target {
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn type_check_field(
                field: usize,
                typ: &$crate::protocol::ColumnType,
            ) -> ::std::result::Result<(), $crate::deserialize::TypeCheckError> {
                let checks: &[fn(
                    &$crate::protocol::ColumnType,
                ) -> ::std::result::Result<(), $crate::deserialize::TypeCheckError>] = &[$(
                    <$ty as $crate::deserialize::DeserializeValue<$frame>>::type_check
                ),+];
                match checks.get(field) {
                    Some(check) => check(typ),
                    None => Err($crate::deserialize::TypeCheckError::new(
                        $crate::deserialize::BuiltinRowTypeCheckError {
                            rust_name: ::std::any::type_name::<Self>(),
                            kind: $crate::deserialize::BuiltinRowTypeCheckErrorKind::UnknownField {
                                field,
                            },
                        },
                    )),
                }
            }

            fn from_fields(
                mut fields: $crate::deserialize::RecordFields<$frame>,
            ) -> ::std::result::Result<Self, $crate::deserialize::DeserializationError> {
                Ok(Self {
                    $($field: fields.next_field::<$ty>()?,)+
                })
            }
        }

        impl<$frame> $crate::deserialize::DeserializeRow<$frame> for $target {
            fn type_check(
                specs: &[$crate::protocol::ColumnSpec],
                binding: $crate::deserialize::RowBinding,
            ) -> ::std::result::Result<
                $crate::deserialize::RowPlan,
                $crate::deserialize::TypeCheckError,
            > {
                $crate::deserialize::row::type_check_record::<Self>(specs, binding)
            }

            fn deserialize(
                plan: &$crate::deserialize::RowPlan,
                row: $crate::deserialize::ColumnIterator<$frame>,
            ) -> ::std::result::Result<Self, $crate::deserialize::DeserializationError> {
                $crate::deserialize::row::deserialize_record::<Self>(plan, row)
            }
        }

        impl<$frame> $crate::deserialize::DeserializeValue<$frame> for $target {
            fn type_check(
                typ: &$crate::protocol::ColumnType,
            ) -> ::std::result::Result<(), $crate::deserialize::TypeCheckError> {
                $crate::deserialize::row::type_check_udt::<Self>(typ)
            }

            fn deserialize(
                typ: &$frame $crate::protocol::ColumnType,
                v: ::std::option::Option<$crate::deserialize::FrameSlice<$frame>>,
            ) -> ::std::result::Result<Self, $crate::deserialize::DeserializationError> {
                $crate::deserialize::row::deserialize_udt::<Self>(typ, v)
            }
        }
    };

    ($name:ident<$lt:lifetime> { $($field:ident: $ty:ty),+ $(,)? }) => {
        $crate::impl_deserialize_record!(@impl $lt, $name<$lt>, { $($field: $ty),+ });
    };

    ($name:ident { $($field:ident: $ty:ty),+ $(,)? }) => {
        $crate::impl_deserialize_record!(@impl 'frame, $name, { $($field: $ty),+ });
    };
}

// Helpers shared with the other row targets.

/// Advance `row` by one column, wrapping framing errors with the column's
/// position and name.
pub(crate) fn next_raw_column<'frame, R>(
    row: &mut ColumnIterator<'frame>,
) -> Result<Option<RawColumn<'frame>>, DeserializationError> {
    let specs = row.specs();
    let column_index = specs.len() - row.columns_remaining();
    row.next_column().map_err(|err| {
        mk_row_deser_err::<R>(BuiltinRowDeserializationErrorKind::RawColumnDeserializationFailed {
            column_index,
            column_name: specs
                .get(column_index)
                .map(|spec| spec.name().to_owned())
                .unwrap_or_default(),
            err,
        })
    })
}

pub(crate) fn column_deser_err<R>(
    column: &RawColumn<'_>,
    err: DeserializationError,
) -> DeserializationError {
    mk_row_deser_err::<R>(BuiltinRowDeserializationErrorKind::ColumnDeserializationFailed {
        column_index: column.index,
        column_name: column.spec.name().to_owned(),
        err,
    })
}

fn column_typck_err<R>(
    column_index: usize,
    spec: &ColumnSpec,
    err: TypeCheckError,
) -> TypeCheckError {
    mk_row_typck_err::<R>(BuiltinRowTypeCheckErrorKind::ColumnTypeCheckFailed {
        column_index,
        column_name: spec.name().to_owned(),
        err,
    })
}

// Errors

/// Type checking a row target failed.
#[derive(Debug, Error, Clone)]
#[error("Failed to type check the Rust type {rust_name} against the result columns: {kind}")]
pub struct BuiltinRowTypeCheckError {
    pub rust_name: &'static str,
    pub kind: BuiltinRowTypeCheckErrorKind,
}

pub(crate) fn mk_row_typck_err<T>(kind: BuiltinRowTypeCheckErrorKind) -> TypeCheckError {
    TypeCheckError::new(BuiltinRowTypeCheckError {
        rust_name: std::any::type_name::<T>(),
        kind,
    })
}

#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum BuiltinRowTypeCheckErrorKind {
    #[error("the Rust type consumes {rust_cols} columns, but the result has {cql_cols}")]
    WrongColumnCount { rust_cols: usize, cql_cols: usize },

    #[error("no column named {field_name} in the result")]
    MissingColumn { field_name: &'static str },

    #[error("column {column_name} (index {column_index}) is not consumed by any field")]
    UnexpectedColumn {
        column_index: usize,
        column_name: String,
    },

    #[error("column {column_name} (index {column_index}) failed the type check: {err}")]
    ColumnTypeCheckFailed {
        column_index: usize,
        column_name: String,
        err: TypeCheckError,
    },

    #[error("the record has no field at position {field}")]
    UnknownField { field: usize },
}

/// Decoding a row failed.
#[derive(Debug, Error)]
#[error("Failed to deserialize the Rust type {rust_name} from a row: {kind}")]
pub struct BuiltinRowDeserializationError {
    pub rust_name: &'static str,
    #[source]
    pub kind: BuiltinRowDeserializationErrorKind,
}

pub(crate) fn mk_row_deser_err<T>(
    kind: BuiltinRowDeserializationErrorKind,
) -> DeserializationError {
    mk_row_deser_err_named(std::any::type_name::<T>(), kind)
}

fn mk_row_deser_err_named(
    rust_name: &'static str,
    kind: BuiltinRowDeserializationErrorKind,
) -> DeserializationError {
    DeserializationError::new(BuiltinRowDeserializationError { rust_name, kind })
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuiltinRowDeserializationErrorKind {
    #[error("failed to deserialize column {column_name} (index {column_index}): {err}")]
    ColumnDeserializationFailed {
        column_index: usize,
        column_name: String,
        #[source]
        err: DeserializationError,
    },

    #[error("failed to read column {column_name} (index {column_index}): {err}")]
    RawColumnDeserializationFailed {
        column_index: usize,
        column_name: String,
        #[source]
        err: ProtocolError,
    },

    /// The row had no column for a field; the plan did not come from this
    /// row's type check.
    #[error("field {field} is not bound to any column")]
    UnboundField { field: usize },
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::*;
    use crate::protocol::wire_format::write_bytes_opt;
    use crate::value::CqlValue;

    #[derive(Debug, PartialEq)]
    struct Person {
        name: String,
        age: i32,
    }

    crate::impl_deserialize_record!(Person { name: String, age: i32 });

    #[derive(Debug, PartialEq)]
    struct Address<'a> {
        street: &'a str,
        number: Option<i32>,
    }

    crate::impl_deserialize_record!(Address<'a> { street: &'a str, number: Option<i32> });

    #[derive(Debug, PartialEq)]
    struct Resident<'a> {
        name: &'a str,
        home: Address<'a>,
    }

    crate::impl_deserialize_record!(Resident<'a> { name: &'a str, home: Address<'a> });

    fn encode_row(values: &[Option<CqlValue>]) -> Bytes {
        let mut buf = BytesMut::new();
        for value in values {
            match value {
                Some(value) => value.write_cell(&mut buf),
                None => write_bytes_opt(None, &mut buf),
            }
        }
        buf.freeze()
    }

    fn decode<'frame, R: DeserializeRow<'frame>>(
        specs: &'frame [ColumnSpec],
        binding: RowBinding,
        raw: &'frame Bytes,
    ) -> Result<R, DeserializationError> {
        let plan = R::type_check(specs, binding).unwrap();
        R::deserialize(&plan, ColumnIterator::new(specs, FrameSlice::new(raw)))
    }

    fn age_name_specs() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("age", ColumnType::Int),
            ColumnSpec::new("name", ColumnType::Text),
        ]
    }

    fn row_kind(err: &TypeCheckError) -> &BuiltinRowTypeCheckErrorKind {
        &err.downcast_ref::<BuiltinRowTypeCheckError>().unwrap().kind
    }

    #[test]
    fn test_by_name_binding_ignores_column_order() {
        let specs = age_name_specs();
        let raw = encode_row(&[Some(CqlValue::Int(42)), Some(CqlValue::Text("Ann".into()))]);

        let person: Person = decode(&specs, RowBinding::default(), &raw).unwrap();
        assert_eq!(
            person,
            Person {
                name: "Ann".to_string(),
                age: 42
            }
        );

        let plan = <Person as DeserializeRow>::type_check(&specs, RowBinding::default()).unwrap();
        assert_eq!(plan.column_to_field(), &[Some(1), Some(0)]);
    }

    #[test]
    fn test_positional_binding_depends_on_order() {
        let specs = age_name_specs();
        let err =
            <Person as DeserializeRow>::type_check(&specs, RowBinding::Positional).unwrap_err();
        match row_kind(&err) {
            BuiltinRowTypeCheckErrorKind::ColumnTypeCheckFailed {
                column_index,
                column_name,
                ..
            } => {
                assert_eq!(*column_index, 0);
                assert_eq!(column_name, "age");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }

        let ordered = vec![
            ColumnSpec::new("whatever", ColumnType::Text),
            ColumnSpec::new("ignored", ColumnType::Int),
        ];
        let raw = encode_row(&[Some(CqlValue::Text("Bob".into())), Some(CqlValue::Int(7))]);
        let person: Person = decode(&ordered, RowBinding::Positional, &raw).unwrap();
        assert_eq!(person.name, "Bob");
        assert_eq!(person.age, 7);
    }

    #[test]
    fn test_missing_and_extra_columns() {
        let specs = vec![ColumnSpec::new("name", ColumnType::Text)];
        let err =
            <Person as DeserializeRow>::type_check(&specs, RowBinding::default()).unwrap_err();
        assert!(matches!(
            row_kind(&err),
            BuiltinRowTypeCheckErrorKind::MissingColumn { field_name: "age" }
        ));

        let mut specs = age_name_specs();
        specs.push(ColumnSpec::new("email", ColumnType::Text));
        let err =
            <Person as DeserializeRow>::type_check(&specs, RowBinding::default()).unwrap_err();
        assert!(matches!(
            row_kind(&err),
            BuiltinRowTypeCheckErrorKind::UnexpectedColumn { column_index: 2, .. }
        ));

        let lenient = RowBinding::ByName {
            allow_extra_columns: true,
        };
        let raw = encode_row(&[
            Some(CqlValue::Int(1)),
            Some(CqlValue::Text("Cy".into())),
            Some(CqlValue::Text("cy@example.com".into())),
        ]);
        let person: Person = decode(&specs, lenient, &raw).unwrap();
        assert_eq!(person.name, "Cy");
    }

    #[test]
    fn test_null_in_non_optional_field() {
        let specs = age_name_specs();
        let raw = encode_row(&[None, Some(CqlValue::Text("Dee".into()))]);

        let err = decode::<Person>(&specs, RowBinding::default(), &raw).unwrap_err();
        let err = err.downcast_ref::<BuiltinRowDeserializationError>().unwrap();
        match &err.kind {
            BuiltinRowDeserializationErrorKind::ColumnDeserializationFailed {
                column_index,
                column_name,
                ..
            } => {
                assert_eq!(*column_index, 0);
                assert_eq!(column_name, "age");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn test_tuple_rows() {
        let specs = age_name_specs();
        let raw = encode_row(&[Some(CqlValue::Int(5)), None]);

        let row: (i32, Option<&str>) = decode(&specs, RowBinding::default(), &raw).unwrap();
        assert_eq!(row, (5, None));

        let err =
            <(i32,) as DeserializeRow>::type_check(&specs, RowBinding::Positional).unwrap_err();
        assert!(matches!(
            row_kind(&err),
            BuiltinRowTypeCheckErrorKind::WrongColumnCount {
                rust_cols: 1,
                cql_cols: 2
            }
        ));
    }

    #[test]
    fn test_raw_column_failure() {
        let specs = age_name_specs();
        let mut raw =
            encode_row(&[Some(CqlValue::Int(5)), Some(CqlValue::Text("xyz".into()))]).to_vec();
        raw.pop();
        let raw = Bytes::from(raw);

        let err = decode::<(i32, &str)>(&specs, RowBinding::Positional, &raw).unwrap_err();
        assert!(matches!(
            err.as_protocol_error(),
            Some(ProtocolError::TruncatedBuffer { .. })
        ));
    }

    fn address_type(with_extra_field: bool) -> ColumnType {
        let mut field_types = vec![
            ("number".to_string(), ColumnType::Int),
            ("street".to_string(), ColumnType::Text),
        ];
        if with_extra_field {
            field_types.push(("zip".to_string(), ColumnType::Text));
        }
        ColumnType::UserDefinedType {
            keyspace: "ks".to_string(),
            type_name: "address".to_string(),
            field_types,
        }
    }

    #[test]
    fn test_record_nested_as_udt() {
        let specs = vec![
            ColumnSpec::new("name", ColumnType::Text),
            ColumnSpec::new("home", address_type(true)),
        ];
        let home = CqlValue::UserDefinedType {
            keyspace: "ks".to_string(),
            type_name: "address".to_string(),
            fields: vec![
                ("number".to_string(), Some(CqlValue::Int(12))),
                ("street".to_string(), Some(CqlValue::Text("Main".into()))),
                ("zip".to_string(), Some(CqlValue::Text("00-001".into()))),
            ],
        };
        let raw = encode_row(&[Some(CqlValue::Text("Eve".into())), Some(home)]);

        let resident: Resident = decode(&specs, RowBinding::default(), &raw).unwrap();
        assert_eq!(
            resident,
            Resident {
                name: "Eve",
                home: Address {
                    street: "Main",
                    number: Some(12)
                }
            }
        );
    }

    #[test]
    fn test_udt_missing_trailing_fields_are_null() {
        let typ = address_type(false);
        let mut payload = Vec::new();
        CqlValue::Int(3).write_cell(&mut payload);
        CqlValue::Text("Side".into()).write_cell(&mut payload);
        let mut short_payload = Vec::new();
        CqlValue::Int(3).write_cell(&mut short_payload);

        let full = Bytes::from(payload);
        let address =
            <Address as DeserializeValue>::deserialize(&typ, Some(FrameSlice::new(&full))).unwrap();
        assert_eq!(address.street, "Side");

        let short = Bytes::from(short_payload);
        let err = <Address as DeserializeValue>::deserialize(&typ, Some(FrameSlice::new(&short)))
            .unwrap_err();
        let err = err.downcast_ref::<crate::deserialize::BuiltinDeserializationError>().unwrap();
        assert!(matches!(
            &err.kind,
            BuiltinDeserializationErrorKind::UdtFieldDeserializationFailed { field_name, .. }
                if field_name == "street"
        ));
    }

    #[test]
    fn test_udt_trailing_bytes_rejected() {
        let typ = address_type(false);
        let mut payload = Vec::new();
        CqlValue::Int(3).write_cell(&mut payload);
        CqlValue::Text("Side".into()).write_cell(&mut payload);
        payload.extend_from_slice(&[0x00, 0x01]);
        let raw = Bytes::from(payload);

        let err = <Address as DeserializeValue>::deserialize(&typ, Some(FrameSlice::new(&raw)))
            .unwrap_err();
        assert!(matches!(
            err.as_protocol_error(),
            Some(ProtocolError::TrailingBytes(2))
        ));
        assert_eq!(
            crate::value::deser_cql_value(&typ, &mut &raw[..]).unwrap_err(),
            ProtocolError::TrailingBytes(2)
        );
    }

    #[test]
    fn test_udt_field_mapping() {
        let fields = ["a", "b", "c"];
        let definition = |names: &[&str]| -> Vec<(String, ColumnType)> {
            names
                .iter()
                .map(|name| (name.to_string(), ColumnType::Int))
                .collect()
        };

        assert_eq!(
            udt_field_mapping(&fields, &definition(&["a", "b", "c"])),
            vec![Some(0), Some(1), Some(2)]
        );
        assert_eq!(
            udt_field_mapping(&fields, &definition(&["c", "x", "a", "b"])),
            vec![Some(2), None, Some(0), Some(1)]
        );
        assert_eq!(udt_field_mapping(&fields, &definition(&[])), vec![]);
    }

    #[test]
    fn test_udt_type_check() {
        assert!(<Address as DeserializeValue>::type_check(&address_type(true)).is_ok());

        let missing = ColumnType::UserDefinedType {
            keyspace: "ks".to_string(),
            type_name: "address".to_string(),
            field_types: vec![("street".to_string(), ColumnType::Text)],
        };
        let err = <Address as DeserializeValue>::type_check(&missing).unwrap_err();
        let err = err.downcast_ref::<crate::deserialize::BuiltinTypeCheckError>().unwrap();
        assert!(matches!(
            err.kind,
            BuiltinTypeCheckErrorKind::MissingUdtField {
                field_name: "number"
            }
        ));

        assert!(<Address as DeserializeValue>::type_check(&ColumnType::Text).is_err());
    }

    #[test]
    fn test_column_iterator_row() {
        let specs = age_name_specs();
        let raw = encode_row(&[Some(CqlValue::Int(5)), None]);

        let mut columns: ColumnIterator = decode(&specs, RowBinding::default(), &raw).unwrap();
        assert_eq!(columns.next_column().unwrap().unwrap().spec.name(), "age");
        assert!(columns.next_column().unwrap().unwrap().slice.is_none());
    }

    #[test]
    fn test_row_binding_serde() {
        let binding: RowBinding =
            serde_json::from_str(r#"{"by_name":{"allow_extra_columns":true}}"#).unwrap();
        assert_eq!(
            binding,
            RowBinding::ByName {
                allow_extra_columns: true
            }
        );
        assert_eq!(
            serde_json::to_string(&RowBinding::Positional).unwrap(),
            r#""positional""#
        );
    }
}

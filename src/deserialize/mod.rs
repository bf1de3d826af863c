//! Lazy, borrowing deserialization of rows and values.
//!
//! Decoding is split in two phases:
//!
//! ```text
//! ┌──────────────────────┐  once per result set  ┌───────────────────────────┐
//! │ type_check(specs)    │ ────────────────────► │ RowPlan (cached)          │
//! └──────────────────────┘                       └─────────────┬─────────────┘
//!                                                              │ every row
//!                                                ┌─────────────▼─────────────┐
//!                                                │ deserialize(plan, columns)│
//!                                                └───────────────────────────┘
//! ```
//!
//! The type check never looks at row bytes, and decoding never re-checks
//! types. Decoded values may borrow from the response buffer through
//! [`FrameSlice`]; the `'frame` lifetime ties them to that buffer.
//!
//! - [`FrameSlice`] - bounds-checked view into a response buffer
//! - [`ColumnIterator`] / [`RawRowIterator`] - lazy cursors over columns and rows
//! - [`DeserializeValue`] - decoding of a single value
//! - [`DeserializeRow`] - decoding of a whole row, by position or by name

use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

use crate::error::ProtocolError;

mod frame_slice;
mod iterator;
pub mod row;
pub mod value;

pub use frame_slice::FrameSlice;
pub use iterator::{split_row, ColumnIterator, RawColumn, RawRowIterator};
pub use row::{
    BuiltinRowDeserializationError, BuiltinRowDeserializationErrorKind, BuiltinRowTypeCheckError,
    BuiltinRowTypeCheckErrorKind, DeserializeRecord, DeserializeRow, RecordFields, RowBinding,
    RowPlan,
};
pub use value::{
    BuiltinDeserializationError, BuiltinDeserializationErrorKind, BuiltinTypeCheckError,
    BuiltinTypeCheckErrorKind, DeserializeValue, Emptiable, ListlikeIterator, MapIterator,
    MaybeEmpty,
};

/// A target type is incompatible with the declared column types.
///
/// Cheap to clone; the concrete error can be recovered with
/// [`downcast_ref`](Self::downcast_ref).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TypeCheckError(Arc<dyn Error + Send + Sync>);

impl TypeCheckError {
    /// Wrap any error as a type check failure.
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// Access the concrete error.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }
}

/// Bytes could not be decoded into a type that passed the type check.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DeserializationError(Arc<dyn Error + Send + Sync>);

impl DeserializationError {
    /// Wrap any error as a deserialization failure.
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// Access the concrete error.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }

    /// Find buffer-level corruption anywhere in the error chain.
    ///
    /// A row that failed because of corrupted framing makes the rest of its
    /// page unreadable; callers use this to stop iterating.
    pub fn as_protocol_error(&self) -> Option<&ProtocolError> {
        let mut current: Option<&(dyn Error + 'static)> = Some(&*self.0);
        while let Some(err) = current {
            if let Some(protocol) = err.downcast_ref::<ProtocolError>() {
                return Some(protocol);
            }
            current = match err.downcast_ref::<DeserializationError>() {
                Some(nested) => Some(&*nested.0),
                None => err.source(),
            };
        }
        None
    }
}

impl From<ProtocolError> for DeserializationError {
    fn from(err: ProtocolError) -> Self {
        Self::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ColumnType;

    #[test]
    fn test_downcast_builtin_error() {
        let err = DeserializationError::new(BuiltinDeserializationError {
            rust_name: "i32",
            cql_type: ColumnType::Int,
            kind: BuiltinDeserializationErrorKind::ExpectedNonNull,
        });

        let builtin = err.downcast_ref::<BuiltinDeserializationError>().unwrap();
        assert!(matches!(
            builtin.kind,
            BuiltinDeserializationErrorKind::ExpectedNonNull
        ));
        assert!(err.as_protocol_error().is_none());
    }

    #[test]
    fn test_protocol_error_found_through_nesting() {
        let inner = DeserializationError::from(ProtocolError::InvalidUtf8);
        let outer = DeserializationError::new(BuiltinRowDeserializationError {
            rust_name: "Row",
            kind: BuiltinRowDeserializationErrorKind::ColumnDeserializationFailed {
                column_index: 1,
                column_name: "name".to_string(),
                err: inner,
            },
        });

        assert_eq!(outer.as_protocol_error(), Some(&ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_type_check_error_display() {
        let err = TypeCheckError::new(BuiltinTypeCheckError {
            rust_name: "i32",
            cql_type: ColumnType::Text,
            kind: BuiltinTypeCheckErrorKind::MismatchedType {
                expected: &[ColumnType::Int],
            },
        });
        let message = err.to_string();
        assert!(message.contains("i32"));
        assert!(message.contains("Text"));
    }
}

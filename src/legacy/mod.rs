//! Eager API: rows decoded up front into [`CqlValue`](crate::value::CqlValue)s.
//!
//! Kept alongside the lazy API so callers can migrate gradually. Both
//! surfaces share one session and can be converted into each other.

mod result;
mod row;
mod stream;

pub use result::{LegacyQueryResult, LegacyTypedRows, OwnedRowsResult};
pub use row::{
    take_udt_field, udt_fields, ConversionError, FromCqlVal, FromCqlValError, FromRow,
    FromRowError, IntoTypedRows, Row, TypedRowIter,
};
pub use stream::{LegacyRowIterator, LegacyTypedRowIterator};

//! Result facade and pager.
//!
//! - [`QueryResult`] - one response, not yet validated
//! - [`RowsResult`] - one page of rows with a per-type type-check cache
//! - [`Pager`] - successive pages of one query, as pages or as row streams

mod pager;
mod result;

pub use pager::{Pager, TypedRowStream};
pub use result::{QueryResult, RowsResult, TypedRowIterator};

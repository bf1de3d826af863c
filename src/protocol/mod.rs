//! Protocol module - wire format, result metadata, and response frames.
//!
//! This module implements the parts of the binary protocol the row layer
//! consumes:
//! - `[int]`/`[short]`/`[bytes]`/`[string]`/vint primitives
//! - column type options and ROWS result metadata
//! - ROWS result bodies kept as one shared buffer

mod frame;
mod metadata;
pub mod wire_format;

pub use frame::{PagingState, PagingStateResponse, RawResponse, RawResult, RowsFrame};
pub use metadata::{ColumnSpec, ColumnSpecs, ColumnType, ResultMetadata, TableSpec};

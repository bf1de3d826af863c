//! Error types for cqlwire-client.
//!
//! The errors raised while decoding values and rows live next to their
//! traits ([`TypeCheckError`](crate::deserialize::TypeCheckError),
//! [`DeserializationError`](crate::deserialize::DeserializationError),
//! [`ConversionError`](crate::legacy::ConversionError)). This module holds the
//! buffer-level and execution-level errors shared by the rest of the crate.

use thiserror::Error;

use crate::deserialize::{DeserializationError, TypeCheckError};
use crate::legacy::ConversionError;

/// Buffer-level corruption detected while walking a response.
///
/// Fatal for the page it was found in: iteration over that page stops and
/// nothing after the corrupted framing is yielded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A length prefix or fixed-size read ran past the end of the buffer.
    #[error("Buffer truncated: needed {needed} bytes, {remaining} remaining")]
    TruncatedBuffer { needed: usize, remaining: usize },

    /// A length field that must be non-negative was negative.
    #[error("Negative length {0} is not allowed here")]
    NegativeLength(i32),

    /// A type option id that this crate does not know.
    #[error("Unknown type option id: {0:#06x}")]
    UnknownTypeId(u16),

    /// Custom (Java class) types are not decodable.
    #[error("Custom type {0} cannot be decoded")]
    UnsupportedCustomType(String),

    /// A protocol `[string]` was not valid UTF-8.
    #[error("Invalid UTF-8 in protocol string")]
    InvalidUtf8,

    /// The value had a size that its declared type does not allow.
    #[error("Invalid value length for {type_name}: {length}")]
    InvalidValueLength {
        type_name: &'static str,
        length: usize,
    },

    /// A composite value had bytes left over after its last element.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// Anything else that does not follow the wire format.
    #[error("Malformed frame: {0}")]
    Malformed(String),
}

/// Failure reported by the lower (transport) layer or while driving a query.
#[derive(Debug, Error, Clone)]
pub enum ExecutionError {
    /// The connection failed or rejected the request.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server answered with an error response.
    #[error("Server error: {0}")]
    Server(String),

    /// The transport went away before answering.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The response body could not be parsed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A keyspace name that the server would reject.
    #[error("Invalid keyspace name: {0:?}")]
    BadKeyspaceName(String),

    /// The response could not be materialized into legacy rows.
    #[error("Failed to build legacy result: {0}")]
    IntoLegacy(#[from] IntoLegacyResultError),
}

/// Returned when rows are requested from a result that carries none.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntoRowsResultError {
    #[error("Result is not of Rows type")]
    ResultNotRows,
}

/// Eager materialization of a lazily held result failed.
#[derive(Debug, Error, Clone)]
pub enum IntoLegacyResultError {
    #[error("Failed to type check rows: {0}")]
    TypeCheck(#[from] TypeCheckError),

    #[error("Failed to deserialize row: {0}")]
    Deserialization(#[from] DeserializationError),
}

/// Returned by [`RowsResult::first_row`](crate::response::RowsResult::first_row).
#[derive(Debug, Error, Clone)]
pub enum FirstRowError {
    #[error("Failed to type check rows: {0}")]
    TypeCheck(#[from] TypeCheckError),

    #[error("The result has no rows")]
    RowsEmpty,

    #[error("Failed to deserialize the first row: {0}")]
    Deserialization(#[from] DeserializationError),
}

/// Returned by [`RowsResult::maybe_first_row`](crate::response::RowsResult::maybe_first_row).
#[derive(Debug, Error, Clone)]
pub enum MaybeFirstRowError {
    #[error("Failed to type check rows: {0}")]
    TypeCheck(#[from] TypeCheckError),

    #[error("Failed to deserialize the first row: {0}")]
    Deserialization(#[from] DeserializationError),
}

/// Returned by [`RowsResult::single_row`](crate::response::RowsResult::single_row).
#[derive(Debug, Error, Clone)]
pub enum SingleRowError {
    #[error("Failed to type check rows: {0}")]
    TypeCheck(#[from] TypeCheckError),

    #[error("Expected a single row, got {0}")]
    UnexpectedRowCount(usize),

    #[error("Failed to deserialize the row: {0}")]
    Deserialization(#[from] DeserializationError),
}

/// Error yielded by row streams.
#[derive(Debug, Error)]
pub enum NextRowError {
    /// Fetching the next page failed.
    #[error("Failed to fetch next page: {0}")]
    Execution(#[from] ExecutionError),

    /// A row could not be decoded into the requested type.
    #[error("Failed to deserialize row: {0}")]
    Deserialization(#[from] DeserializationError),

    /// A legacy row could not be converted into the requested type.
    #[error("Failed to convert row: {0}")]
    Conversion(#[from] ConversionError),

    /// A page arrived whose columns differ from the ones the stream was
    /// type checked against.
    #[error("Column specs changed between pages")]
    MetadataChanged,
}

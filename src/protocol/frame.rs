//! Rows frame: one page of a ROWS result.
//!
//! A page is the metadata shared by all of its rows, the number of rows and
//! the raw rows region, kept as `bytes::Bytes` so that decoded values can
//! borrow from it without copying.
//!
//! ```text
//! ┌──────────────┬────────────┬───────────────────────────────────────┐
//! │ Metadata     │ Rows count │ Rows: rows_count × col_count × [bytes]│
//! │ (see below)  │ [int]      │                                       │
//! └──────────────┴────────────┴───────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cqlwire_client::protocol::{ColumnSpec, ColumnType, ResultMetadata, RowsFrame};
//! use cqlwire_client::value::CqlValue;
//!
//! let metadata = Arc::new(ResultMetadata::new(vec![ColumnSpec::new("a", ColumnType::Int)]));
//! let frame = RowsFrame::from_values(metadata, &[vec![Some(CqlValue::Int(7))]]);
//! let parsed = RowsFrame::deserialize(frame.encode_body()).unwrap();
//!
//! assert_eq!(parsed.rows_count(), 1);
//! assert_eq!(parsed.raw_rows(), frame.raw_rows());
//! ```

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::metadata::{ColumnSpec, ResultMetadata};
use super::wire_format::{read_int_length, write_bytes_opt, write_int};
use crate::error::ProtocolError;
use crate::value::CqlValue;

/// Opaque server cursor used to request the page following the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagingState(Option<Bytes>);

impl PagingState {
    /// State that requests the first page.
    pub fn start() -> Self {
        Self(None)
    }

    /// Wrap raw bytes received from the server.
    pub fn new_from_raw_bytes(raw: impl AsRef<[u8]>) -> Self {
        Self(Some(Bytes::copy_from_slice(raw.as_ref())))
    }

    pub fn as_bytes_slice(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    /// Whether this state requests the first page.
    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }
}

/// What the server said about further pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagingStateResponse {
    HasMorePages { state: PagingState },
    NoMorePages,
}

impl PagingStateResponse {
    /// Whether the last page has been delivered.
    #[inline]
    pub fn finished(&self) -> bool {
        matches!(self, Self::NoMorePages)
    }

    /// State to send with the next page request, if there is one.
    pub fn next_state(&self) -> Option<PagingState> {
        match self {
            Self::HasMorePages { state } => Some(state.clone()),
            Self::NoMorePages => None,
        }
    }
}

impl Default for PagingStateResponse {
    fn default() -> Self {
        Self::NoMorePages
    }
}

/// One page of rows.
#[derive(Debug, Clone)]
pub struct RowsFrame {
    /// Column metadata shared by every row of the page.
    metadata: Arc<ResultMetadata>,
    /// Number of rows announced by the server.
    rows_count: usize,
    /// Rows region (zero-copy slice of the response body).
    raw_rows: Bytes,
    /// Whether more pages follow.
    paging_state: PagingStateResponse,
}

impl RowsFrame {
    /// Create a page from already separated parts.
    pub fn new(metadata: Arc<ResultMetadata>, rows_count: usize, raw_rows: Bytes) -> Self {
        Self {
            metadata,
            rows_count,
            raw_rows,
            paging_state: PagingStateResponse::NoMorePages,
        }
    }

    /// A page without columns or rows.
    pub fn empty() -> Self {
        Self::new(Arc::new(ResultMetadata::default()), 0, Bytes::new())
    }

    /// Attach the server's paging state to this page.
    pub fn with_paging_state(mut self, paging_state: PagingStateResponse) -> Self {
        self.paging_state = paging_state;
        self
    }

    /// Parse a ROWS result body.
    ///
    /// The rows region of the returned frame shares memory with `body`.
    pub fn deserialize(body: Bytes) -> Result<Self, ProtocolError> {
        let mut buf = &body[..];
        let (metadata, paging_state) = ResultMetadata::deserialize(&mut buf)?;
        if !metadata.has_specs() {
            return Err(ProtocolError::Malformed(
                "rows result without metadata needs cached metadata".to_string(),
            ));
        }
        Self::finish_deserialize(&body, buf, Arc::new(metadata), paging_state)
    }

    /// Parse a ROWS result body, using `cached` when the server omitted the
    /// column specs (prepared statements skip them).
    pub fn deserialize_with_metadata(
        body: Bytes,
        cached: Arc<ResultMetadata>,
    ) -> Result<Self, ProtocolError> {
        let mut buf = &body[..];
        let (metadata, paging_state) = ResultMetadata::deserialize(&mut buf)?;
        let metadata = if metadata.has_specs() {
            Arc::new(metadata)
        } else if metadata.col_count() == cached.col_count() {
            cached
        } else {
            return Err(ProtocolError::Malformed(format!(
                "cached metadata has {} columns, server announced {}",
                cached.col_count(),
                metadata.col_count()
            )));
        };
        Self::finish_deserialize(&body, buf, metadata, paging_state)
    }

    fn finish_deserialize(
        body: &Bytes,
        mut rest: &[u8],
        metadata: Arc<ResultMetadata>,
        paging_state: PagingStateResponse,
    ) -> Result<Self, ProtocolError> {
        let rows_count = read_int_length(&mut rest)?;
        let raw_rows = body.slice_ref(rest);
        Ok(Self {
            metadata,
            rows_count,
            raw_rows,
            paging_state,
        })
    }

    /// Serialize values into a page.
    ///
    /// Used by transports that build responses in memory and by tests.
    pub fn from_values(metadata: Arc<ResultMetadata>, rows: &[Vec<Option<CqlValue>>]) -> Self {
        let mut raw_rows = BytesMut::new();
        for row in rows {
            for value in row {
                match value {
                    Some(value) => value.write_cell(&mut raw_rows),
                    None => write_bytes_opt(None, &mut raw_rows),
                }
            }
        }
        Self::new(metadata, rows.len(), raw_rows.freeze())
    }

    /// Encode this page back into a ROWS result body.
    pub fn encode_body(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.raw_rows.len() + 64);
        self.metadata.serialize(&self.paging_state, &mut buf);
        write_int(self.rows_count as i32, &mut buf);
        buf.extend_from_slice(&self.raw_rows);
        buf.freeze()
    }

    #[inline]
    pub fn metadata(&self) -> &Arc<ResultMetadata> {
        &self.metadata
    }

    #[inline]
    pub fn col_specs(&self) -> &[ColumnSpec] {
        self.metadata.col_specs()
    }

    #[inline]
    pub fn rows_count(&self) -> usize {
        self.rows_count
    }

    /// Get a reference to the raw rows region.
    #[inline]
    pub fn raw_rows(&self) -> &Bytes {
        &self.raw_rows
    }

    /// Size of the rows region in bytes.
    #[inline]
    pub fn rows_bytes_size(&self) -> usize {
        self.raw_rows.len()
    }

    #[inline]
    pub fn paging_state(&self) -> &PagingStateResponse {
        &self.paging_state
    }
}

/// Result body handed over by the transport layer.
#[derive(Debug, Clone)]
pub enum RawResult {
    Void,
    Rows(RowsFrame),
    SetKeyspace(String),
}

/// A complete response as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub result: RawResult,
    pub warnings: Vec<String>,
}

impl RawResponse {
    pub fn new(result: RawResult) -> Self {
        Self {
            result,
            warnings: Vec::new(),
        }
    }

    pub fn rows(frame: RowsFrame) -> Self {
        Self::new(RawResult::Rows(frame))
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

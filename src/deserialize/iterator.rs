//! Lazy cursors over the rows region of a page.
//!
//! ```text
//! rows region: [row 0][row 1] ... [row n-1]
//! row:         [bytes col 0][bytes col 1] ... [bytes col m-1]
//! ```
//!
//! [`RawRowIterator`] validates the framing of a whole row before handing
//! out its [`ColumnIterator`], so a row with a corrupted length prefix
//! yields no column at all.

use tracing::warn;

use super::FrameSlice;
use crate::error::ProtocolError;
use crate::protocol::ColumnSpec;

/// One undecoded column of a row.
#[derive(Debug, Clone, Copy)]
pub struct RawColumn<'frame> {
    /// Position of the column in the row.
    pub index: usize,
    pub spec: &'frame ColumnSpec,
    /// `None` is a null value.
    pub slice: Option<FrameSlice<'frame>>,
}

/// Cursor over the columns of one row.
///
/// Yields columns strictly in column spec order, one per call. After a
/// framing error the cursor is poisoned.
#[derive(Debug, Clone)]
pub struct ColumnIterator<'frame> {
    specs: &'frame [ColumnSpec],
    next_index: usize,
    slice: FrameSlice<'frame>,
    poisoned: Option<ProtocolError>,
    error_reported: bool,
}

impl<'frame> ColumnIterator<'frame> {
    /// Iterate over the columns serialized at the front of `slice`.
    pub fn new(specs: &'frame [ColumnSpec], slice: FrameSlice<'frame>) -> Self {
        Self {
            specs,
            next_index: 0,
            slice,
            poisoned: None,
            error_reported: false,
        }
    }

    /// Column specs of the row.
    #[inline]
    pub fn specs(&self) -> &'frame [ColumnSpec] {
        self.specs
    }

    /// Number of columns not yet yielded.
    #[inline]
    pub fn columns_remaining(&self) -> usize {
        self.specs.len() - self.next_index
    }

    /// Advance by exactly one column.
    ///
    /// `Ok(None)` marks the end of the row. Once a framing error was hit,
    /// every further call returns that error.
    pub fn next_column(&mut self) -> Result<Option<RawColumn<'frame>>, ProtocolError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        let Some(spec) = self.specs.get(self.next_index) else {
            return Ok(None);
        };
        match self.slice.read_cql_bytes() {
            Ok(slice) => {
                let column = RawColumn {
                    index: self.next_index,
                    spec,
                    slice,
                };
                self.next_index += 1;
                Ok(Some(column))
            }
            Err(err) => {
                warn!(column = %spec.name, error = %err, "column iterator poisoned");
                self.poisoned = Some(err.clone());
                Err(err)
            }
        }
    }
}

/// Yields a framing error once, then ends.
impl<'frame> Iterator for ColumnIterator<'frame> {
    type Item = Result<RawColumn<'frame>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.error_reported {
            return None;
        }
        match self.next_column() {
            Ok(column) => column.map(Ok),
            Err(err) => {
                self.error_reported = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.error_reported {
            return (0, Some(0));
        }
        (0, Some(self.columns_remaining()))
    }
}

/// Split the next row of `col_count` columns off the front of `rows`.
///
/// Validates every length prefix of the row. On error `rows` is left
/// untouched.
pub fn split_row<'frame>(
    col_count: usize,
    rows: &mut FrameSlice<'frame>,
) -> Result<FrameSlice<'frame>, ProtocolError> {
    let mut cursor = *rows;
    for _ in 0..col_count {
        cursor.read_cql_bytes()?;
    }
    let row = rows.prefix(rows.len() - cursor.len());
    *rows = cursor;
    Ok(row)
}

/// Cursor over the rows of one page.
///
/// Yields one [`ColumnIterator`] per row. A framing error is yielded once
/// and ends the iteration; nothing after corrupted framing is read.
#[derive(Debug, Clone)]
pub struct RawRowIterator<'frame> {
    specs: &'frame [ColumnSpec],
    remaining: usize,
    slice: FrameSlice<'frame>,
}

impl<'frame> RawRowIterator<'frame> {
    pub fn new(rows_count: usize, specs: &'frame [ColumnSpec], slice: FrameSlice<'frame>) -> Self {
        Self {
            specs,
            remaining: rows_count,
            slice,
        }
    }

    #[inline]
    pub fn specs(&self) -> &'frame [ColumnSpec] {
        self.specs
    }

    /// Number of rows not yet yielded.
    #[inline]
    pub fn rows_remaining(&self) -> usize {
        self.remaining
    }

    /// Unread part of the rows region.
    #[inline]
    pub fn remaining_slice(&self) -> FrameSlice<'frame> {
        self.slice
    }
}

impl<'frame> Iterator for RawRowIterator<'frame> {
    type Item = Result<ColumnIterator<'frame>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match split_row(self.specs.len(), &mut self.slice) {
            Ok(row) => {
                self.remaining -= 1;
                Some(Ok(ColumnIterator::new(self.specs, row)))
            }
            Err(err) => {
                warn!(
                    rows_left = self.remaining,
                    error = %err,
                    "row framing corrupted, page abandoned"
                );
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

//! Fully materialized query result.

use std::sync::Arc;

use super::row::{ConversionError, FromRow, IntoTypedRows, Row, TypedRowIter};
use crate::protocol::{ColumnSpec, ColumnSpecs, PagingStateResponse, ResultMetadata};

/// Result of a query with every row already decoded.
#[derive(Debug, Clone, Default)]
pub struct LegacyQueryResult {
    /// `None` when the response was not a ROWS result.
    pub rows: Option<Vec<Row>>,
    pub warnings: Vec<String>,
    /// `None` when the response was not a ROWS result.
    pub metadata: Option<Arc<ResultMetadata>>,
    pub paging_state_response: PagingStateResponse,
}

impl LegacyQueryResult {
    /// Number of rows, or `RowsExpected` if this is not a ROWS result.
    pub fn rows_num(&self) -> Result<usize, ConversionError> {
        self.rows
            .as_ref()
            .map(Vec::len)
            .ok_or(ConversionError::RowsExpected)
    }

    pub fn rows(self) -> Result<Vec<Row>, ConversionError> {
        self.rows.ok_or(ConversionError::RowsExpected)
    }

    /// Convert every row with [`FromRow`].
    pub fn rows_typed<T: FromRow>(self) -> Result<LegacyTypedRows<T>, ConversionError> {
        Ok(LegacyTypedRows {
            inner: self.rows()?.into_typed(),
        })
    }

    pub fn first_row(self) -> Result<Row, ConversionError> {
        self.rows()?
            .into_iter()
            .next()
            .ok_or(ConversionError::RowsEmpty)
    }

    pub fn first_row_typed<T: FromRow>(self) -> Result<T, ConversionError> {
        Ok(self.first_row()?.into_typed()?)
    }

    /// First row converted, or `None` if there are no rows.
    pub fn maybe_first_row_typed<T: FromRow>(self) -> Result<Option<T>, ConversionError> {
        match self.rows()?.into_iter().next() {
            Some(row) => Ok(Some(row.into_typed()?)),
            None => Ok(None),
        }
    }

    /// The only row converted. Fails unless there is exactly one.
    pub fn single_row_typed<T: FromRow>(self) -> Result<T, ConversionError> {
        let rows = self.rows()?;
        if rows.len() != 1 {
            return Err(ConversionError::UnexpectedRowCount(rows.len()));
        }
        let mut rows = rows.into_iter();
        match rows.next() {
            Some(row) => Ok(row.into_typed()?),
            None => Err(ConversionError::UnexpectedRowCount(0)),
        }
    }

    /// Column specs; empty when this is not a ROWS result.
    pub fn col_specs(&self) -> &[ColumnSpec] {
        self.metadata
            .as_deref()
            .map(ResultMetadata::col_specs)
            .unwrap_or(&[])
    }

    pub fn get_column_spec(&self, name: &str) -> Option<(usize, &ColumnSpec)> {
        self.col_specs()
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.name() == name)
    }

    /// Split into metadata and rows.
    pub fn into_owned_rows(self) -> Result<OwnedRowsResult, ConversionError> {
        match (self.rows, self.metadata) {
            (Some(rows), Some(metadata)) => Ok(OwnedRowsResult { metadata, rows }),
            _ => Err(ConversionError::RowsExpected),
        }
    }
}

/// Rows of a ROWS result together with their metadata.
///
/// Offers the accessors of the lazy rows result over rows that are already
/// decoded.
#[derive(Debug, Clone)]
pub struct OwnedRowsResult {
    pub metadata: Arc<ResultMetadata>,
    pub rows: Vec<Row>,
}

impl OwnedRowsResult {
    #[inline]
    pub fn rows_num(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn column_specs(&self) -> ColumnSpecs<'_> {
        self.metadata.column_specs()
    }

    /// Every row converted with [`FromRow`].
    pub fn rows<R: FromRow>(
        &self,
    ) -> impl ExactSizeIterator<Item = Result<R, ConversionError>> + '_ {
        self.rows
            .iter()
            .map(|row| row.clone().into_typed::<R>().map_err(ConversionError::from))
    }

    /// The first row. Fails if there are no rows.
    pub fn first_row<R: FromRow>(&self) -> Result<R, ConversionError> {
        self.maybe_first_row()?.ok_or(ConversionError::RowsEmpty)
    }

    /// The first row, or `None` if there are no rows.
    pub fn maybe_first_row<R: FromRow>(&self) -> Result<Option<R>, ConversionError> {
        self.rows::<R>().next().transpose()
    }

    /// The only row. Fails unless there is exactly one.
    pub fn single_row<R: FromRow>(&self) -> Result<R, ConversionError> {
        match self.rows.as_slice() {
            [row] => Ok(row.clone().into_typed()?),
            rows => Err(ConversionError::UnexpectedRowCount(rows.len())),
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Iterator returned by [`LegacyQueryResult::rows_typed`].
#[derive(Debug)]
pub struct LegacyTypedRows<T> {
    inner: TypedRowIter<T>,
}

impl<T: FromRow> Iterator for LegacyTypedRows<T> {
    type Item = Result<T, ConversionError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|row| row.map_err(ConversionError::from))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: FromRow> ExactSizeIterator for LegacyTypedRows<T> {}

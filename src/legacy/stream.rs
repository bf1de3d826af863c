//! Row streams of the eager API.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::Stream;

use super::row::{ConversionError, FromRow, Row};
use crate::error::NextRowError;
use crate::protocol::ColumnSpecs;
use crate::response::TypedRowStream;

/// Stream of eagerly decoded rows across all pages of a query.
#[derive(Debug)]
pub struct LegacyRowIterator {
    inner: TypedRowStream<Row>,
}

impl LegacyRowIterator {
    pub(crate) fn new(inner: TypedRowStream<Row>) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn column_specs(&self) -> ColumnSpecs<'_> {
        self.inner.column_specs()
    }

    /// Convert every row with [`FromRow`].
    pub fn into_typed<T: FromRow>(self) -> LegacyTypedRowIterator<T> {
        LegacyTypedRowIterator {
            inner: self,
            phantom: PhantomData,
        }
    }
}

impl Stream for LegacyRowIterator {
    type Item = Result<Row, NextRowError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Stream returned by [`LegacyRowIterator::into_typed`].
#[derive(Debug)]
pub struct LegacyTypedRowIterator<T> {
    inner: LegacyRowIterator,
    phantom: PhantomData<fn() -> T>,
}

impl<T> LegacyTypedRowIterator<T> {
    #[inline]
    pub fn column_specs(&self) -> ColumnSpecs<'_> {
        self.inner.column_specs()
    }
}

impl<T: FromRow> Stream for LegacyTypedRowIterator<T> {
    type Item = Result<T, NextRowError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = ready!(Pin::new(&mut self.inner).poll_next(cx));
        Poll::Ready(next.map(|row| {
            row.and_then(|row| {
                T::from_row(row).map_err(|err| ConversionError::from(err).into())
            })
        }))
    }
}

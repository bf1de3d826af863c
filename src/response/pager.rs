//! Page-by-page query execution.
//!
//! Every pager owns a dedicated fetch task that requests pages from the
//! lower layer and hands them over a bounded channel.
//!
//! # Architecture
//!
//! ```text
//! Connection ◄── execute(page request) ── Fetch Task ─► mpsc::Sender<page> ─► Pager
//!                                                                              │
//!                                           rows_stream::<T>() / into_legacy() ┘
//! ```
//!
//! The channel capacity bounds read-ahead. Dropping the pager (or a stream
//! built from it) aborts the fetch task, so no page is requested after that.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::RowsResult;
use crate::deserialize::{
    split_row, ColumnIterator, DeserializationError, DeserializeRow, FrameSlice, RowBinding,
    RowPlan, TypeCheckError,
};
use crate::error::{ExecutionError, NextRowError, ProtocolError};
use crate::legacy::{LegacyRowIterator, Row};
use crate::protocol::{ColumnSpecs, RawResult, ResultMetadata, RowsFrame};
use crate::session::{Connection, PageRequest};

type PageResult = Result<RowsFrame, ExecutionError>;

/// Fetch pages until the last one, a failure, or the receiver is gone.
async fn fetch_pages(
    connection: Arc<dyn Connection>,
    mut request: PageRequest,
    tx: mpsc::Sender<PageResult>,
) {
    let mut page = 0usize;
    loop {
        debug!(page, "fetching page");
        let response = match connection.execute(request.clone()).await {
            Ok(response) => response,
            Err(err) => {
                error!(page, error = %err, "page fetch failed");
                let _ = tx.send(Err(err)).await;
                return;
            }
        };

        let frame = match response.result {
            RawResult::Rows(frame) => frame,
            _ => RowsFrame::empty(),
        };
        let next_state = frame.paging_state().next_state();
        debug!(
            page,
            rows = frame.rows_count(),
            has_more = next_state.is_some(),
            "page fetched"
        );

        if tx.send(Ok(frame)).await.is_err() {
            debug!(page, "pager gone, stopping page fetch");
            return;
        }
        match next_state {
            Some(state) => request.paging_state = state,
            None => return,
        }
        page += 1;
    }
}

/// Aborts the fetch task when dropped.
#[derive(Debug)]
struct FetchGuard(JoinHandle<()>);

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            debug!("pager dropped before exhaustion, cancelling page fetch");
        }
        self.0.abort();
    }
}

/// Sequence of pages produced by one query.
///
/// Not restartable: every page is handed out once.
#[derive(Debug)]
pub struct Pager {
    receiver: mpsc::Receiver<PageResult>,
    guard: FetchGuard,
    first: Option<RowsFrame>,
    metadata: Arc<ResultMetadata>,
    binding: RowBinding,
}

impl Pager {
    /// Start fetching and wait for the first page.
    ///
    /// Fails with the error of the first page fetch, or if the first page
    /// comes without column specs: later pages are checked against them.
    pub(crate) async fn start(
        connection: Arc<dyn Connection>,
        request: PageRequest,
        prefetch_pages: usize,
        binding: RowBinding,
    ) -> Result<Self, ExecutionError> {
        let (tx, mut receiver) = mpsc::channel(prefetch_pages.max(1));
        let guard = FetchGuard(tokio::spawn(fetch_pages(connection, request, tx)));

        let first = match receiver.recv().await {
            Some(page) => page?,
            None => return Err(ExecutionError::ConnectionClosed),
        };
        if !first.metadata().has_specs() {
            warn!(
                col_count = first.metadata().col_count(),
                "first page came without column specs"
            );
            return Err(ProtocolError::Malformed(
                "first page of a paged query has no column metadata".to_string(),
            )
            .into());
        }
        Ok(Self {
            receiver,
            guard,
            metadata: first.metadata().clone(),
            first: Some(first),
            binding,
        })
    }

    /// Column specs of the first page.
    #[inline]
    pub fn column_specs(&self) -> ColumnSpecs<'_> {
        self.metadata.column_specs()
    }

    /// Next page, or `None` after the last one.
    pub async fn next_page(&mut self) -> Option<Result<RowsResult, ExecutionError>> {
        if let Some(first) = self.first.take() {
            return Some(Ok(RowsResult::new(first, self.binding)));
        }
        let page = self.receiver.recv().await?;
        Some(page.map(|frame| RowsResult::new(frame, self.binding)))
    }

    /// Stream of rows decoded as `T`, across all pages.
    ///
    /// The type check runs once, against the first page.
    pub fn rows_stream<T>(self) -> Result<TypedRowStream<T>, TypeCheckError>
    where
        T: for<'frame> DeserializeRow<'frame>,
    {
        let plan = T::type_check(self.metadata.col_specs(), self.binding)?;
        Ok(self.into_stream(plan))
    }

    /// Stream of eagerly decoded legacy rows.
    pub fn into_legacy(self) -> LegacyRowIterator {
        let plan = RowPlan::positional(self.metadata.col_count());
        LegacyRowIterator::new(self.into_stream::<Row>(plan))
    }

    fn into_stream<T>(self, plan: RowPlan) -> TypedRowStream<T> {
        TypedRowStream {
            receiver: self.receiver,
            _guard: self.guard,
            page: self.first.map(PageCursor::new),
            metadata: self.metadata,
            plan,
            finished: false,
            phantom: PhantomData,
        }
    }
}

#[derive(Debug)]
struct PageCursor {
    frame: RowsFrame,
    offset: usize,
    remaining: usize,
}

impl PageCursor {
    fn new(frame: RowsFrame) -> Self {
        Self {
            remaining: frame.rows_count(),
            frame,
            offset: 0,
        }
    }

    /// Frame the next row; the cursor does not move on error.
    fn next_row(&mut self, col_count: usize) -> Result<FrameSlice<'_>, ProtocolError> {
        let raw = self.frame.raw_rows();
        let mut rows = FrameSlice::new_at(raw, self.offset)?;
        let row = split_row(col_count, &mut rows)?;
        self.offset = raw.len() - rows.len();
        self.remaining -= 1;
        Ok(row)
    }
}

/// Rows of every page of a query, decoded as `T`.
///
/// A row that fails to decode is yielded as an error and the stream goes
/// on. Corrupted row framing, a failed page fetch, or a page with different
/// columns is yielded once and ends the stream.
#[derive(Debug)]
pub struct TypedRowStream<T> {
    receiver: mpsc::Receiver<PageResult>,
    _guard: FetchGuard,
    page: Option<PageCursor>,
    metadata: Arc<ResultMetadata>,
    plan: RowPlan,
    finished: bool,
    phantom: PhantomData<fn() -> T>,
}

impl<T> TypedRowStream<T> {
    /// Column specs the stream was type checked against.
    #[inline]
    pub fn column_specs(&self) -> ColumnSpecs<'_> {
        self.metadata.column_specs()
    }

    /// Pages announced without specs are taken to carry the checked ones.
    fn same_columns(&self, frame: &RowsFrame) -> bool {
        let metadata = frame.metadata();
        if Arc::ptr_eq(metadata, &self.metadata) {
            return true;
        }
        if metadata.has_specs() {
            metadata.col_specs() == self.metadata.col_specs()
        } else {
            metadata.col_count() == self.metadata.col_count()
        }
    }
}

impl<T> Stream for TypedRowStream<T>
where
    T: for<'frame> DeserializeRow<'frame>,
{
    type Item = Result<T, NextRowError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            if let Some(cursor) = this.page.as_mut() {
                if cursor.remaining > 0 {
                    let specs = this.metadata.col_specs();
                    let row = match cursor.next_row(specs.len()) {
                        Ok(row) => row,
                        Err(err) => {
                            warn!(error = %err, "row framing corrupted, stream ended");
                            this.finished = true;
                            return Poll::Ready(Some(Err(DeserializationError::from(err).into())));
                        }
                    };
                    let decoded = T::deserialize(&this.plan, ColumnIterator::new(specs, row));
                    return Poll::Ready(Some(decoded.map_err(NextRowError::from)));
                }
                this.page = None;
            }

            match ready!(this.receiver.poll_recv(cx)) {
                Some(Ok(frame)) => {
                    if !this.same_columns(&frame) {
                        warn!("column specs changed between pages, stream ended");
                        this.finished = true;
                        return Poll::Ready(Some(Err(NextRowError::MetadataChanged)));
                    }
                    this.page = Some(PageCursor::new(frame));
                }
                Some(Err(err)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err.into())));
                }
                None => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

//! Result facade over one response.
//!
//! ```text
//! RawResponse ──► QueryResult ──into_rows_result──► RowsResult ──rows::<T>()──► iterator of T
//!                      │                                │   (type checked once per T + binding)
//!                      │                                └─into_legacy_rows──► Vec<Row>
//!                      └──into_legacy_result──► LegacyQueryResult
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::deserialize::{
    DeserializationError, DeserializeRow, FrameSlice, RawRowIterator, RowBinding, RowPlan,
    TypeCheckError,
};
use crate::error::{
    FirstRowError, IntoLegacyResultError, IntoRowsResultError, MaybeFirstRowError, SingleRowError,
};
use crate::legacy::{LegacyQueryResult, Row};
use crate::protocol::{
    ColumnSpecs, PagingStateResponse, RawResponse, RawResult, ResultMetadata, RowsFrame,
};

/// Keyed by the target type with its lifetimes erased, so every borrow of
/// the same target shares one entry.
type PlanCache = HashMap<(TypeId, RowBinding), Result<Arc<RowPlan>, TypeCheckError>>;

/// One response to a query, nothing validated yet.
#[derive(Debug, Clone)]
pub struct QueryResult {
    result: RawResult,
    warnings: Vec<String>,
    binding: RowBinding,
}

impl QueryResult {
    /// Wrap a response; `binding` is used by [`RowsResult::rows`].
    pub fn new(response: RawResponse, binding: RowBinding) -> Self {
        Self {
            result: response.result,
            warnings: response.warnings,
            binding,
        }
    }

    /// Whether the response carries rows.
    #[inline]
    pub fn is_rows(&self) -> bool {
        matches!(self.result, RawResult::Rows(_))
    }

    /// Rows view over this result. The page buffer is shared, not copied.
    pub fn rows_result(&self) -> Result<RowsResult, IntoRowsResultError> {
        match &self.result {
            RawResult::Rows(frame) => Ok(RowsResult::new(frame.clone(), self.binding)),
            _ => Err(IntoRowsResultError::ResultNotRows),
        }
    }

    pub fn into_rows_result(self) -> Result<RowsResult, IntoRowsResultError> {
        match self.result {
            RawResult::Rows(frame) => Ok(RowsResult::new(frame, self.binding)),
            _ => Err(IntoRowsResultError::ResultNotRows),
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().map(String::as_str)
    }

    pub fn paging_state_response(&self) -> PagingStateResponse {
        match &self.result {
            RawResult::Rows(frame) => frame.paging_state().clone(),
            _ => PagingStateResponse::NoMorePages,
        }
    }

    /// Keyspace reported by a `USE` statement.
    pub fn set_keyspace(&self) -> Option<&str> {
        match &self.result {
            RawResult::SetKeyspace(keyspace) => Some(keyspace),
            _ => None,
        }
    }

    /// Decode every row eagerly into the legacy representation.
    ///
    /// Fails if any row cannot be decoded.
    pub fn into_legacy_result(self) -> Result<LegacyQueryResult, IntoLegacyResultError> {
        let warnings = self.warnings;
        match self.result {
            RawResult::Rows(frame) => {
                let paging_state_response = frame.paging_state().clone();
                let rows_result = RowsResult::new(frame, self.binding);
                let rows = rows_result.into_legacy_rows()?;
                Ok(LegacyQueryResult {
                    rows: Some(rows),
                    warnings,
                    metadata: Some(rows_result.frame.metadata().clone()),
                    paging_state_response,
                })
            }
            _ => Ok(LegacyQueryResult {
                rows: None,
                warnings,
                metadata: None,
                paging_state_response: PagingStateResponse::NoMorePages,
            }),
        }
    }
}

/// A page of rows, decodable into any [`DeserializeRow`] target.
///
/// The type check for a target is run on first use and cached for the
/// lifetime of this value, keyed by the target type and the binding.
#[derive(Debug)]
pub struct RowsResult {
    frame: RowsFrame,
    binding: RowBinding,
    plans: Mutex<PlanCache>,
    type_check_count: AtomicUsize,
}

impl RowsResult {
    pub fn new(frame: RowsFrame, binding: RowBinding) -> Self {
        Self {
            frame,
            binding,
            plans: Mutex::new(HashMap::new()),
            type_check_count: AtomicUsize::new(0),
        }
    }

    /// Number of rows announced by the server.
    #[inline]
    pub fn rows_num(&self) -> usize {
        self.frame.rows_count()
    }

    /// Size of the raw rows region.
    #[inline]
    pub fn rows_bytes_size(&self) -> usize {
        self.frame.rows_bytes_size()
    }

    #[inline]
    pub fn column_specs(&self) -> ColumnSpecs<'_> {
        self.frame.metadata().column_specs()
    }

    #[inline]
    pub fn metadata(&self) -> &Arc<ResultMetadata> {
        self.frame.metadata()
    }

    #[inline]
    pub fn binding(&self) -> RowBinding {
        self.binding
    }

    pub fn paging_state_response(&self) -> &PagingStateResponse {
        self.frame.paging_state()
    }

    /// How many type checks actually ran (cache misses).
    pub fn type_check_count(&self) -> usize {
        self.type_check_count.load(Ordering::Acquire)
    }

    /// Iterate over the rows decoded as `T`, bound with the default binding.
    pub fn rows<'frame, T>(&'frame self) -> Result<TypedRowIterator<'frame, T>, TypeCheckError>
    where
        T: DeserializeRow<'frame>,
    {
        self.rows_with_binding(self.binding)
    }

    /// Iterate over the rows decoded as `T`, bound with `binding`.
    pub fn rows_with_binding<'frame, T>(
        &'frame self,
        binding: RowBinding,
    ) -> Result<TypedRowIterator<'frame, T>, TypeCheckError>
    where
        T: DeserializeRow<'frame>,
    {
        let plan = self.type_check::<T>(binding)?;
        Ok(TypedRowIterator {
            rows: RawRowIterator::new(
                self.frame.rows_count(),
                self.frame.col_specs(),
                FrameSlice::new(self.frame.raw_rows()),
            ),
            plan,
            phantom: PhantomData,
        })
    }

    /// The first row. Fails if there are no rows.
    pub fn first_row<'frame, T>(&'frame self) -> Result<T, FirstRowError>
    where
        T: DeserializeRow<'frame>,
    {
        match self.rows::<T>()?.next() {
            Some(row) => Ok(row?),
            None => Err(FirstRowError::RowsEmpty),
        }
    }

    /// The first row, or `None` if there are no rows.
    pub fn maybe_first_row<'frame, T>(&'frame self) -> Result<Option<T>, MaybeFirstRowError>
    where
        T: DeserializeRow<'frame>,
    {
        Ok(self.rows::<T>()?.next().transpose()?)
    }

    /// The only row. Fails unless there is exactly one.
    pub fn single_row<'frame, T>(&'frame self) -> Result<T, SingleRowError>
    where
        T: DeserializeRow<'frame>,
    {
        let mut rows = self.rows::<T>()?;
        if self.rows_num() != 1 {
            return Err(SingleRowError::UnexpectedRowCount(self.rows_num()));
        }
        match rows.next() {
            Some(row) => Ok(row?),
            None => Err(SingleRowError::UnexpectedRowCount(0)),
        }
    }

    /// Decode every row eagerly into legacy [`Row`]s.
    pub fn into_legacy_rows(&self) -> Result<Vec<Row>, IntoLegacyResultError> {
        let rows = self
            .rows_with_binding::<Row>(RowBinding::Positional)?
            .collect::<Result<Vec<_>, DeserializationError>>()?;
        Ok(rows)
    }

    fn type_check<'frame, T>(&self, binding: RowBinding) -> Result<Arc<RowPlan>, TypeCheckError>
    where
        T: DeserializeRow<'frame>,
    {
        let key = (typeid::of::<T>(), binding);
        let rust_type = std::any::type_name::<T>();
        let mut plans = self.plans.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = plans.get(&key) {
            trace!(rust_type, "type check cache hit");
            return cached.clone();
        }

        let outcome = T::type_check(self.frame.col_specs(), binding).map(Arc::new);
        self.type_check_count.fetch_add(1, Ordering::AcqRel);
        if let Err(err) = &outcome {
            debug!(rust_type, error = %err, "type check failed");
        }
        plans.insert(key, outcome.clone());
        outcome
    }
}

/// Rows of one page decoded as `T`.
///
/// Per-row decode errors are yielded and iteration continues. Corrupted
/// row framing is yielded once and ends the iteration.
#[derive(Debug)]
pub struct TypedRowIterator<'frame, T> {
    rows: RawRowIterator<'frame>,
    plan: Arc<RowPlan>,
    phantom: PhantomData<T>,
}

impl<'frame, T> TypedRowIterator<'frame, T> {
    /// Rows not yet yielded.
    #[inline]
    pub fn rows_remaining(&self) -> usize {
        self.rows.rows_remaining()
    }
}

impl<'frame, T> Iterator for TypedRowIterator<'frame, T>
where
    T: DeserializeRow<'frame>,
{
    type Item = Result<T, DeserializationError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.next()? {
            Ok(columns) => Some(T::deserialize(&self.plan, columns)),
            Err(err) => Some(Err(err.into())),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

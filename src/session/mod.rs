//! Sessions: query execution on top of a lower-layer [`Connection`].
//!
//! ```text
//!          ┌────────── Arc<SessionShared> ──────────┐
//!          │ connection, current keyspace, config   │
//!          └─────────▲─────────────────────▲────────┘
//!                    │                     │
//!                Session  ◄── make_shared ──►  LegacySession
//!          (lazy, typed rows)            (eager rows)
//! ```
//!
//! Both facades are cheap handles on the same shared state, so a keyspace
//! switched through one is seen by the other.

mod config;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::ExecutionError;
use crate::legacy::{LegacyQueryResult, LegacyRowIterator};
use crate::protocol::{PagingState, PagingStateResponse, RawResponse, RawResult};
use crate::response::{Pager, QueryResult};

pub use config::{SessionBuilder, SessionConfig, DEFAULT_PAGE_SIZE, DEFAULT_PREFETCH_PAGES};

/// Boxed future type for lower-layer requests.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Longest keyspace name the server accepts.
const MAX_KEYSPACE_NAME_LEN: usize = 48;

/// The transport below the session: sends one page request, returns the
/// decoded response.
pub trait Connection: Send + Sync + 'static {
    fn execute(&self, request: PageRequest) -> BoxFuture<'_, Result<RawResponse, ExecutionError>>;
}

/// A query with per-statement options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub contents: String,
    /// Overrides the session page size.
    pub page_size: Option<i32>,
}

impl Statement {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

impl From<&str> for Statement {
    fn from(contents: &str) -> Self {
        Self::new(contents)
    }
}

impl From<String> for Statement {
    fn from(contents: String) -> Self {
        Self::new(contents)
    }
}

/// One request handed to the [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub statement: String,
    pub keyspace: Option<String>,
    /// `None` requests the whole result at once.
    pub page_size: Option<i32>,
    pub paging_state: PagingState,
}

impl PageRequest {
    /// Request for the first page.
    pub fn new(statement: String, keyspace: Option<String>, page_size: Option<i32>) -> Self {
        Self {
            statement,
            keyspace,
            page_size,
            paging_state: PagingState::start(),
        }
    }
}

struct SessionShared {
    connection: Arc<dyn Connection>,
    keyspace: RwLock<Option<String>>,
    config: SessionConfig,
}

/// Session with the lazy, typed API.
#[derive(Clone)]
pub struct Session {
    shared: Arc<SessionShared>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("keyspace", &self.current_keyspace())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(connection: Arc<dyn Connection>, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                connection,
                keyspace: RwLock::new(None),
                config,
            }),
        }
    }

    /// Create a session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Run a statement and return the whole result in one response.
    pub async fn query_unpaged(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<QueryResult, ExecutionError> {
        let statement = statement.into();
        let request = PageRequest::new(statement.contents, self.current_keyspace(), None);
        self.execute(request).await
    }

    /// Fetch one page starting at `paging_state`.
    pub async fn query_single_page(
        &self,
        statement: impl Into<Statement>,
        paging_state: PagingState,
    ) -> Result<(QueryResult, PagingStateResponse), ExecutionError> {
        let statement = statement.into();
        let mut request = PageRequest::new(
            statement.contents,
            self.current_keyspace(),
            statement.page_size.or(self.shared.config.page_size),
        );
        request.paging_state = paging_state;
        let result = self.execute(request).await?;
        let paging_state_response = result.paging_state_response();
        Ok((result, paging_state_response))
    }

    /// Run a statement page by page.
    ///
    /// Resolves once the first page has arrived.
    pub async fn query_iter(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<Pager, ExecutionError> {
        let statement = statement.into();
        let request = PageRequest::new(
            statement.contents,
            self.current_keyspace(),
            statement.page_size.or(self.shared.config.page_size),
        );
        Pager::start(
            self.shared.connection.clone(),
            request,
            self.shared.config.prefetch_pages,
            self.shared.config.row_binding,
        )
        .await
    }

    /// Switch the keyspace of this session and every facade sharing it.
    ///
    /// Unless `case_sensitive`, the name is sent unquoted and stored
    /// lowercased.
    pub async fn use_keyspace(
        &self,
        keyspace_name: impl Into<String>,
        case_sensitive: bool,
    ) -> Result<(), ExecutionError> {
        let keyspace_name = keyspace_name.into();
        validate_keyspace_name(&keyspace_name)?;

        let query = if case_sensitive {
            format!("USE \"{keyspace_name}\"")
        } else {
            format!("USE {keyspace_name}")
        };
        let result = self
            .execute(PageRequest::new(query, self.current_keyspace(), None))
            .await?;

        if result.set_keyspace().is_none() {
            let stored = if case_sensitive {
                keyspace_name
            } else {
                keyspace_name.to_lowercase()
            };
            self.set_current_keyspace(stored);
        }
        Ok(())
    }

    pub fn current_keyspace(&self) -> Option<String> {
        self.shared
            .keyspace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Eager facade over the same shared session.
    pub fn make_shared_session_legacy(&self) -> LegacySession {
        LegacySession {
            session: self.clone(),
        }
    }

    async fn execute(&self, request: PageRequest) -> Result<QueryResult, ExecutionError> {
        let response = self.shared.connection.execute(request).await?;
        if let RawResult::SetKeyspace(keyspace) = &response.result {
            self.set_current_keyspace(keyspace.clone());
        }
        Ok(QueryResult::new(response, self.shared.config.row_binding))
    }

    fn set_current_keyspace(&self, keyspace: String) {
        debug!(keyspace = %keyspace, "keyspace switched");
        *self
            .shared
            .keyspace
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(keyspace);
    }
}

fn validate_keyspace_name(name: &str) -> Result<(), ExecutionError> {
    let bad = |reason: &str| -> Result<(), ExecutionError> {
        Err(ExecutionError::BadKeyspaceName(format!("{name:?}: {reason}")))
    };
    if name.is_empty() {
        return bad("empty name");
    }
    if name.len() > MAX_KEYSPACE_NAME_LEN {
        return bad("longer than 48 characters");
    }
    if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return bad(&format!("illegal character {c:?}"));
    }
    Ok(())
}

/// Session with the eager API. Shares its state with the [`Session`] it
/// was made from.
#[derive(Debug, Clone)]
pub struct LegacySession {
    session: Session,
}

impl LegacySession {
    /// Run a statement and decode every row up front.
    pub async fn query(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<LegacyQueryResult, ExecutionError> {
        let result = self.session.query_unpaged(statement).await?;
        Ok(result.into_legacy_result()?)
    }

    /// Run a statement page by page, rows decoded eagerly.
    pub async fn query_iter(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<LegacyRowIterator, ExecutionError> {
        Ok(self.session.query_iter(statement).await?.into_legacy())
    }

    pub async fn use_keyspace(
        &self,
        keyspace_name: impl Into<String>,
        case_sensitive: bool,
    ) -> Result<(), ExecutionError> {
        self.session.use_keyspace(keyspace_name, case_sensitive).await
    }

    pub fn current_keyspace(&self) -> Option<String> {
        self.session.current_keyspace()
    }

    pub fn config(&self) -> &SessionConfig {
        self.session.config()
    }

    /// Lazy facade over the same shared session.
    pub fn make_shared_session(&self) -> Session {
        self.session.clone()
    }
}

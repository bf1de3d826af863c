//! Session configuration and builder.
//!
//! # Example
//!
//! ```ignore
//! use cqlwire_client::session::SessionBuilder;
//! use cqlwire_client::deserialize::RowBinding;
//!
//! let session = SessionBuilder::new()
//!     .page_size(1000)
//!     .row_binding(RowBinding::Positional)
//!     .keyspace("ks")
//!     .build(connection)
//!     .await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Connection, LegacySession, Session};
use crate::deserialize::RowBinding;
use crate::error::ExecutionError;

/// Default number of rows requested per page.
pub const DEFAULT_PAGE_SIZE: i32 = 5000;

/// Default number of pages fetched ahead of the consumer.
pub const DEFAULT_PREFETCH_PAGES: usize = 1;

/// Configuration shared by both session facades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Rows per page. `None` lets the server decide.
    pub page_size: Option<i32>,
    /// How rows are matched to record fields.
    pub row_binding: RowBinding,
    /// Capacity of the pager's read-ahead channel.
    pub prefetch_pages: usize,
    /// Keyspace switched to when the session is built.
    pub keyspace: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE),
            row_binding: RowBinding::default(),
            prefetch_pages: DEFAULT_PREFETCH_PAGES,
            keyspace: None,
        }
    }
}

impl SessionConfig {
    /// Load from a JSON document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Builder for configuring and creating a session.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Set the page size.
    ///
    /// Default: 5000
    pub fn page_size(mut self, page_size: i32) -> Self {
        self.config.page_size = Some(page_size);
        self
    }

    /// Let the server pick the page size.
    pub fn no_page_size(mut self) -> Self {
        self.config.page_size = None;
        self
    }

    /// Set the default row binding.
    ///
    /// Default: by name, extra columns rejected
    pub fn row_binding(mut self, binding: RowBinding) -> Self {
        self.config.row_binding = binding;
        self
    }

    /// Set how many pages may be fetched ahead of the consumer.
    ///
    /// Default: 1
    pub fn prefetch_pages(mut self, pages: usize) -> Self {
        self.config.prefetch_pages = pages;
        self
    }

    /// Switch to `keyspace` when building.
    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.config.keyspace = Some(keyspace.into());
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Build the session, issuing `USE` if an initial keyspace is set.
    pub async fn build(self, connection: Arc<dyn Connection>) -> Result<Session, ExecutionError> {
        let keyspace = self.config.keyspace.clone();
        let session = Session::new(connection, self.config);
        if let Some(keyspace) = keyspace {
            session.use_keyspace(keyspace, false).await?;
        }
        Ok(session)
    }

    /// Build the eager facade over a fresh session.
    pub async fn build_legacy(
        self,
        connection: Arc<dyn Connection>,
    ) -> Result<LegacySession, ExecutionError> {
        Ok(self.build(connection).await?.make_shared_session_legacy())
    }
}

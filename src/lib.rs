//! # cqlwire-client
//!
//! Row and value deserialization for the CQL binary protocol, with a lazy
//! typed API and an eager legacy API over the same sessions.
//!
//! ## Architecture
//!
//! - **Lazy API**: rows stay in the response buffer; each target type is
//!   type checked once per result set, then decoded row by row, possibly
//!   borrowing from the buffer
//! - **Legacy API**: every row decoded up front into
//!   [`CqlValue`](value::CqlValue)s, then converted
//!
//! ```text
//! Connection ─► RawResponse ─► QueryResult ─► RowsResult ─► rows::<T>()
//!                                  │                         (lazy)
//!                                  └─► LegacyQueryResult ─► rows_typed::<T>()
//!                                                            (eager)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use cqlwire_client::{impl_deserialize_record, SessionBuilder};
//!
//! struct User<'a> {
//!     id: i32,
//!     name: &'a str,
//! }
//! impl_deserialize_record!(User<'a> { id: i32, name: &'a str });
//!
//! let session = SessionBuilder::new().keyspace("ks").build(connection).await?;
//! let rows = session.query_unpaged("SELECT id, name FROM users").await?.into_rows_result()?;
//! for user in rows.rows::<User>()? {
//!     let user = user?;
//!     println!("{} {}", user.id, user.name);
//! }
//! ```

pub mod deserialize;
pub mod error;
pub mod legacy;
pub mod protocol;
pub mod response;
pub mod session;
pub mod value;

pub use deserialize::{DeserializeRow, DeserializeValue, RowBinding};
pub use error::{ExecutionError, NextRowError, ProtocolError};
pub use response::{Pager, QueryResult, RowsResult};
pub use session::{Connection, LegacySession, Session, SessionBuilder, SessionConfig};

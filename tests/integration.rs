//! Integration tests for cqlwire-client.
//!
//! These tests drive the public API against an in-memory connection that
//! serves ROWS bodies through the wire encoder and parser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;

use cqlwire_client::deserialize::{ListlikeIterator, RowBinding};
use cqlwire_client::error::{ExecutionError, NextRowError};
use cqlwire_client::legacy::{ConversionError, FromRowError, IntoTypedRows, Row};
use cqlwire_client::protocol::wire_format::{write_bytes_opt, write_int, write_vint};
use cqlwire_client::protocol::{
    ColumnSpec, ColumnType, PagingState, PagingStateResponse, RawResponse, RawResult,
    ResultMetadata, RowsFrame,
};
use cqlwire_client::session::{BoxFuture, Connection, PageRequest, SessionBuilder};
use cqlwire_client::value::{CqlDuration, CqlValue};
use cqlwire_client::{impl_deserialize_record, impl_from_cql_record};

/// Serves canned pages per statement, following the paging state.
#[derive(Default)]
struct MockConnection {
    tables: Mutex<HashMap<String, Vec<Bytes>>>,
    requests: AtomicUsize,
}

impl MockConnection {
    fn with_pages(self, statement: &str, pages: Vec<RowsFrame>) -> Self {
        let last = pages.len().saturating_sub(1);
        let bodies = pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| {
                let page = if i == last {
                    page
                } else {
                    page.with_paging_state(PagingStateResponse::HasMorePages {
                        state: PagingState::new_from_raw_bytes([(i + 1) as u8]),
                    })
                };
                page.encode_body()
            })
            .collect();
        self.tables
            .lock()
            .unwrap()
            .insert(statement.to_string(), bodies);
        self
    }

    fn with_raw_body(self, statement: &str, body: Bytes) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(statement.to_string(), vec![body]);
        self
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    fn execute(&self, request: PageRequest) -> BoxFuture<'_, Result<RawResponse, ExecutionError>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if let Some(keyspace) = request.statement.strip_prefix("USE ") {
                return Ok(RawResponse::new(RawResult::SetKeyspace(
                    keyspace.trim_matches('"').to_string(),
                )));
            }

            let page = request
                .paging_state
                .as_bytes_slice()
                .map_or(0, |state| state[0] as usize);
            let body = self
                .tables
                .lock()
                .unwrap()
                .get(&request.statement)
                .and_then(|pages| pages.get(page).cloned())
                .ok_or_else(|| {
                    ExecutionError::Server(format!("no table for {}", request.statement))
                })?;
            let frame = RowsFrame::deserialize(body)?;
            Ok(RawResponse::rows(frame))
        })
    }
}

fn users_metadata() -> Arc<ResultMetadata> {
    Arc::new(ResultMetadata::new(vec![
        ColumnSpec::new("name", ColumnType::Text),
        ColumnSpec::new("id", ColumnType::Int),
        ColumnSpec::new("tags", ColumnType::List(Box::new(ColumnType::Text))),
    ]))
}

fn user_row(id: i32, name: &str, tags: Option<&[&str]>) -> Vec<Option<CqlValue>> {
    vec![
        Some(CqlValue::Text(name.to_string())),
        Some(CqlValue::Int(id)),
        tags.map(|tags| {
            CqlValue::List(tags.iter().map(|t| CqlValue::Text(t.to_string())).collect())
        }),
    ]
}

fn users_page(rows: &[(i32, &str, Option<&[&str]>)]) -> RowsFrame {
    let rows: Vec<_> = rows
        .iter()
        .map(|(id, name, tags)| user_row(*id, name, *tags))
        .collect();
    RowsFrame::from_values(users_metadata(), &rows)
}

#[derive(Debug, PartialEq)]
struct User {
    id: i32,
    name: String,
    tags: Option<Vec<String>>,
}
impl_deserialize_record!(User { id: i32, name: String, tags: Option<Vec<String>> });

#[derive(Debug, PartialEq)]
struct UserRef<'a> {
    id: i32,
    name: &'a str,
}
impl_deserialize_record!(UserRef<'a> { id: i32, name: &'a str });

/// By-name binding matches fields regardless of column order; positional
/// binding does not.
#[tokio::test]
async fn test_binding_by_name_and_positional() {
    let connection = Arc::new(MockConnection::default().with_pages(
        "SELECT users",
        vec![users_page(&[(1, "ann", Some(&["a", "b"][..])), (2, "bob", None)])],
    ));
    let session = SessionBuilder::new()
        .row_binding(RowBinding::ByName {
            allow_extra_columns: false,
        })
        .build(connection)
        .await
        .unwrap();

    let rows = session
        .query_unpaged("SELECT users")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap();
    let users: Vec<User> = rows.rows::<User>().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        users,
        vec![
            User {
                id: 1,
                name: "ann".to_string(),
                tags: Some(vec!["a".to_string(), "b".to_string()]),
            },
            User {
                id: 2,
                name: "bob".to_string(),
                tags: None,
            },
        ]
    );

    assert!(rows.rows_with_binding::<User>(RowBinding::Positional).is_err());
}

/// Extra columns fail by default and are skipped when allowed.
#[tokio::test]
async fn test_extra_columns() {
    let connection = Arc::new(
        MockConnection::default().with_pages("SELECT users", vec![users_page(&[(7, "cy", None)])]),
    );
    let session = SessionBuilder::new().build(connection).await.unwrap();
    let rows = session
        .query_unpaged("SELECT users")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap();

    assert!(rows.rows::<UserRef>().is_err());
    let user = rows
        .rows_with_binding::<UserRef>(RowBinding::ByName {
            allow_extra_columns: true,
        })
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(user, UserRef { id: 7, name: "cy" });
}

/// Repeated decodes of one result with the same target type check once.
#[tokio::test]
async fn test_type_check_runs_once_per_target() {
    let connection = Arc::new(
        MockConnection::default().with_pages("SELECT users", vec![users_page(&[(1, "a", None)])]),
    );
    let session = SessionBuilder::new().build(connection).await.unwrap();
    let rows = session
        .query_unpaged("SELECT users")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap();

    for _ in 0..5 {
        assert_eq!(rows.rows::<User>().unwrap().count(), 1);
    }
    assert_eq!(rows.type_check_count(), 1);

    let _ = rows.rows::<(String, i32, Option<Vec<String>>)>().unwrap();
    assert_eq!(rows.type_check_count(), 2);
}

/// Borrowed targets point into the response buffer.
#[tokio::test]
async fn test_borrowed_decoding() {
    let connection = Arc::new(MockConnection::default().with_pages(
        "SELECT users",
        vec![users_page(&[(1, "ann", Some(&["x", "y", "z"][..]))])],
    ));
    let session = SessionBuilder::new().build(connection).await.unwrap();
    let rows = session
        .query_unpaged("SELECT users")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap();

    let (name, _, tags) = rows
        .first_row::<(&str, i32, ListlikeIterator<&str>)>()
        .unwrap();
    assert_eq!(name, "ann");
    let tags: Vec<&str> = tags.collect::<Result<_, _>>().unwrap();
    assert_eq!(tags, vec!["x", "y", "z"]);
}

/// Null fits `Option`, and is reported with its column otherwise.
#[tokio::test]
async fn test_null_handling() {
    let connection = Arc::new(
        MockConnection::default().with_pages("SELECT users", vec![users_page(&[(3, "dee", None)])]),
    );
    let session = SessionBuilder::new().build(connection).await.unwrap();
    let rows = session
        .query_unpaged("SELECT users")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap();

    let (_, _, tags) = rows
        .single_row::<(String, i32, Option<Vec<String>>)>()
        .unwrap();
    assert_eq!(tags, None);

    let err = rows.single_row::<(String, i32, Vec<String>)>().unwrap_err();
    assert!(err.to_string().contains("tags"), "{err}");

    let legacy = session
        .make_shared_session_legacy()
        .query("SELECT users")
        .await
        .unwrap();
    assert!(matches!(
        legacy.first_row_typed::<(String, i32, Vec<String>)>(),
        Err(ConversionError::FromRow(FromRowError::BadCqlVal { column: 2, .. }))
    ));
}

/// Both APIs produce the same values for the same result.
#[tokio::test]
async fn test_legacy_and_lazy_agree() {
    let connection = Arc::new(MockConnection::default().with_pages(
        "SELECT users",
        vec![users_page(&[(1, "ann", Some(&["a"][..])), (2, "bob", None)])],
    ));
    let session = SessionBuilder::new().build(connection).await.unwrap();
    let legacy_session = session.make_shared_session_legacy();

    type Shape = (String, i32, Option<Vec<String>>);

    let lazy: Vec<Shape> = session
        .query_unpaged("SELECT users")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap()
        .rows::<Shape>()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let eager: Vec<Shape> = legacy_session
        .query("SELECT users")
        .await
        .unwrap()
        .rows_typed::<Shape>()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let converted: Vec<Row> = session
        .query_unpaged("SELECT users")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap()
        .into_legacy_rows()
        .unwrap();
    let converted: Vec<Shape> = converted
        .into_typed::<Shape>()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(lazy, eager);
    assert_eq!(lazy, converted);
}

/// Streams cross page boundaries in order, in both APIs.
#[tokio::test]
async fn test_paged_streams() {
    let pages = vec![
        users_page(&[(1, "a", None), (2, "b", None)]),
        users_page(&[(3, "c", None)]),
        users_page(&[(4, "d", None)]),
    ];
    let connection = Arc::new(MockConnection::default().with_pages("SELECT users", pages));
    let session = SessionBuilder::new()
        .page_size(2)
        .build(connection.clone())
        .await
        .unwrap();

    let ids: Vec<i32> = session
        .query_iter("SELECT users")
        .await
        .unwrap()
        .rows_stream::<User>()
        .unwrap()
        .map(|user| user.unwrap().id)
        .collect()
        .await;
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(connection.requests(), 3);

    let legacy_ids: Vec<i32> = session
        .make_shared_session_legacy()
        .query_iter("SELECT users")
        .await
        .unwrap()
        .into_typed::<(String, i32, Option<Vec<String>>)>()
        .map(|row| row.unwrap().1)
        .collect()
        .await;
    assert_eq!(legacy_ids, ids);
}

/// Dropping a pager mid-stream stops page requests and releases the
/// connection held by the fetch task.
#[tokio::test]
async fn test_pager_cancellation() {
    let pages: Vec<_> = (0..6).map(|i| users_page(&[(i, "x", None)])).collect();
    let connection = Arc::new(MockConnection::default().with_pages("SELECT users", pages));
    let session = SessionBuilder::new()
        .prefetch_pages(1)
        .build(connection.clone())
        .await
        .unwrap();
    let idle_refs = Arc::strong_count(&connection);

    let mut stream = session
        .query_iter("SELECT users")
        .await
        .unwrap()
        .rows_stream::<User>()
        .unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap().id, 0);
    drop(stream);

    for _ in 0..100 {
        if Arc::strong_count(&connection) == idle_refs {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(Arc::strong_count(&connection), idle_refs);

    let requests = connection.requests();
    assert!(requests < 6, "fetched {requests} pages");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(connection.requests(), requests);
}

/// A page with different columns ends a typed stream.
#[tokio::test]
async fn test_metadata_change_mid_stream() {
    let other = Arc::new(ResultMetadata::new(vec![ColumnSpec::new("n", ColumnType::BigInt)]));
    let pages = vec![
        users_page(&[(1, "a", None)]),
        RowsFrame::from_values(other, &[vec![Some(CqlValue::BigInt(5))]]),
    ];
    let connection = Arc::new(MockConnection::default().with_pages("SELECT users", pages));
    let session = SessionBuilder::new().build(connection).await.unwrap();

    let rows: Vec<_> = session
        .query_iter("SELECT users")
        .await
        .unwrap()
        .rows_stream::<User>()
        .unwrap()
        .collect()
        .await;
    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_ok());
    assert!(matches!(rows[1], Err(NextRowError::MetadataChanged)));
}

/// A truncated rows region yields the good rows, one error, then ends.
#[tokio::test]
async fn test_corrupted_rows_region() {
    let good = users_page(&[(1, "a", None), (2, "b", None)]).encode_body();
    let corrupted = good.slice(..good.len() - 3);
    let connection = Arc::new(MockConnection::default().with_raw_body("SELECT users", corrupted));
    let session = SessionBuilder::new().build(connection).await.unwrap();

    let rows: Vec<_> = session
        .query_iter("SELECT users")
        .await
        .unwrap()
        .rows_stream::<User>()
        .unwrap()
        .collect()
        .await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].as_ref().unwrap().id, 1);
    assert!(matches!(rows[1], Err(NextRowError::Deserialization(_))));

    let err = session
        .make_shared_session_legacy()
        .query("SELECT users")
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::IntoLegacy(_)));
}

/// A keyspace switched through either facade is seen by both.
#[tokio::test]
async fn test_keyspace_shared_across_facades() {
    let connection = Arc::new(MockConnection::default());
    let session = SessionBuilder::new()
        .keyspace("first")
        .build(connection)
        .await
        .unwrap();
    let legacy = session.make_shared_session_legacy();
    assert_eq!(legacy.current_keyspace().as_deref(), Some("first"));

    legacy.use_keyspace("Second", true).await.unwrap();
    assert_eq!(session.current_keyspace().as_deref(), Some("Second"));

    let again = legacy.make_shared_session();
    again.use_keyspace("third", false).await.unwrap();
    assert_eq!(session.current_keyspace().as_deref(), Some("third"));
    assert_eq!(legacy.current_keyspace().as_deref(), Some("third"));
}

/// Nested UDTs decode by field name inside a row.
#[tokio::test]
async fn test_udt_column() {
    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }
    impl_deserialize_record!(Point { x: i32, y: i32 });

    let udt = ColumnType::UserDefinedType {
        keyspace: "ks".to_string(),
        type_name: "point".to_string(),
        field_types: vec![
            ("y".to_string(), ColumnType::Int),
            ("x".to_string(), ColumnType::Int),
            ("label".to_string(), ColumnType::Text),
        ],
    };
    let metadata = Arc::new(ResultMetadata::new(vec![ColumnSpec::new("p", udt)]));
    let value = CqlValue::UserDefinedType {
        keyspace: "ks".to_string(),
        type_name: "point".to_string(),
        fields: vec![
            ("y".to_string(), Some(CqlValue::Int(2))),
            ("x".to_string(), Some(CqlValue::Int(1))),
        ],
    };
    let page = RowsFrame::from_values(metadata, &[vec![Some(value.clone())]]);
    let connection = Arc::new(MockConnection::default().with_pages("SELECT p", vec![page]));
    let session = SessionBuilder::new().build(connection).await.unwrap();

    let rows = session
        .query_unpaged("SELECT p")
        .await
        .unwrap()
        .into_rows_result()
        .unwrap();
    let (point,) = rows.single_row::<(Point,)>().unwrap();
    assert_eq!(point, Point { x: 1, y: 2 });

    let legacy = rows.into_legacy_rows().unwrap();
    assert_eq!(
        legacy[0].columns[0],
        Some(CqlValue::UserDefinedType {
            keyspace: "ks".to_string(),
            type_name: "point".to_string(),
            fields: vec![
                ("y".to_string(), Some(CqlValue::Int(2))),
                ("x".to_string(), Some(CqlValue::Int(1))),
                ("label".to_string(), None),
            ],
        })
    );
}

/// UDT and tuple columns convert the same way through both APIs.
#[tokio::test]
async fn test_udt_and_tuple_through_legacy_result() {
    #[derive(Debug, PartialEq)]
    struct Home {
        street: String,
        number: Option<i32>,
    }
    impl_deserialize_record!(Home { street: String, number: Option<i32> });
    impl_from_cql_record!(Home { street: String, number: Option<i32> });

    #[derive(Debug, PartialEq)]
    struct Resident {
        home: Home,
        pair: (i32, Option<String>),
    }
    impl_deserialize_record!(Resident { home: Home, pair: (i32, Option<String>) });
    impl_from_cql_record!(Resident { home: Home, pair: (i32, Option<String>) });

    let home_type = ColumnType::UserDefinedType {
        keyspace: "ks".to_string(),
        type_name: "home".to_string(),
        field_types: vec![
            ("number".to_string(), ColumnType::Int),
            ("street".to_string(), ColumnType::Text),
        ],
    };
    let metadata = Arc::new(ResultMetadata::new(vec![
        ColumnSpec::new("home", home_type),
        ColumnSpec::new(
            "pair",
            ColumnType::Tuple(vec![ColumnType::Int, ColumnType::Text]),
        ),
    ]));
    let home = |number: Option<i32>, street: &str| CqlValue::UserDefinedType {
        keyspace: "ks".to_string(),
        type_name: "home".to_string(),
        fields: vec![
            ("number".to_string(), number.map(CqlValue::Int)),
            ("street".to_string(), Some(CqlValue::Text(street.to_string()))),
        ],
    };
    let page = RowsFrame::from_values(
        metadata,
        &[
            vec![
                Some(home(Some(5), "Main")),
                Some(CqlValue::Tuple(vec![
                    Some(CqlValue::Int(1)),
                    Some(CqlValue::Text("a".to_string())),
                ])),
            ],
            vec![
                Some(home(None, "Side")),
                Some(CqlValue::Tuple(vec![Some(CqlValue::Int(2)), None])),
            ],
        ],
    );
    let connection = Arc::new(MockConnection::default().with_pages("SELECT homes", vec![page]));
    let session = SessionBuilder::new().build(connection).await.unwrap();

    type Shape = (Home, (i32, Option<String>));

    let result = session.query_unpaged("SELECT homes").await.unwrap();
    let lazy_rows = result.rows_result().unwrap();
    let lazy: Vec<Shape> = lazy_rows
        .rows::<Shape>()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let lazy_residents: Vec<Resident> = lazy_rows
        .rows::<Resident>()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        lazy[0],
        (
            Home {
                street: "Main".to_string(),
                number: Some(5)
            },
            (1, Some("a".to_string()))
        )
    );

    let legacy = result.into_legacy_result().unwrap();
    let eager: Vec<Shape> = legacy
        .clone()
        .rows_typed::<Shape>()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(lazy, eager);

    let owned = legacy.into_owned_rows().unwrap();
    let eager_residents: Vec<Resident> = owned.rows().collect::<Result<_, _>>().unwrap();
    assert_eq!(lazy_residents, eager_residents);
    assert_eq!(eager_residents[1].home.number, None);
    assert_eq!(eager_residents[1].pair, (2, None));
}

/// Cells with bytes past their last element are rejected by both APIs.
#[tokio::test]
async fn test_malformed_cells_rejected_by_both_apis() {
    let mut list_cell = Vec::new();
    write_int(1, &mut list_cell);
    CqlValue::Int(7).write_cell(&mut list_cell);
    list_cell.push(0xFF);

    let mut duration_cell = Vec::new();
    write_vint(1, &mut duration_cell);
    write_vint(2, &mut duration_cell);
    write_vint(3, &mut duration_cell);
    duration_cell.extend_from_slice(&[0x00, 0x00]);

    let page = |typ: ColumnType, cell: &[u8]| {
        let mut raw_rows = Vec::new();
        write_bytes_opt(Some(cell), &mut raw_rows);
        let metadata = Arc::new(ResultMetadata::new(vec![ColumnSpec::new("c", typ)]));
        RowsFrame::new(metadata, 1, Bytes::from(raw_rows))
    };
    let connection = Arc::new(
        MockConnection::default()
            .with_pages(
                "SELECT list",
                vec![page(ColumnType::List(Box::new(ColumnType::Int)), &list_cell[..])],
            )
            .with_pages("SELECT duration", vec![page(ColumnType::Duration, &duration_cell[..])]),
    );
    let session = SessionBuilder::new().build(connection).await.unwrap();
    let legacy_session = session.make_shared_session_legacy();

    let lists = session.query_unpaged("SELECT list").await.unwrap();
    let rows = lists.rows_result().unwrap();
    assert!(rows.first_row::<(Vec<i32>,)>().is_err());
    assert!(rows.first_row::<(CqlValue,)>().is_err());
    let (mut lazy,) = rows.first_row::<(ListlikeIterator<i32>,)>().unwrap();
    assert_eq!(lazy.next().unwrap().unwrap(), 7);
    assert!(lazy.next().unwrap().is_err());
    assert!(lazy.next().is_none());
    assert!(rows.into_legacy_rows().is_err());
    assert!(lists.into_legacy_result().is_err());

    let durations = session.query_unpaged("SELECT duration").await.unwrap();
    let rows = durations.rows_result().unwrap();
    assert!(rows.first_row::<(CqlDuration,)>().is_err());
    assert!(rows.first_row::<(CqlValue,)>().is_err());
    assert!(durations.into_legacy_result().is_err());

    for statement in ["SELECT list", "SELECT duration"] {
        let err = legacy_session.query(statement).await.unwrap_err();
        assert!(matches!(err, ExecutionError::IntoLegacy(_)));
    }
}

/// Non-rows results are reported as such by both APIs.
#[tokio::test]
async fn test_non_rows_result() {
    let connection = Arc::new(MockConnection::default());
    let session = SessionBuilder::new().build(connection).await.unwrap();

    let result = session.query_unpaged("USE other").await.unwrap();
    assert!(!result.is_rows());
    assert_eq!(result.set_keyspace(), Some("other"));
    assert!(result.into_rows_result().is_err());

    let legacy = session
        .make_shared_session_legacy()
        .query("USE other")
        .await
        .unwrap();
    assert_eq!(legacy.rows_num(), Err(ConversionError::RowsExpected));
}

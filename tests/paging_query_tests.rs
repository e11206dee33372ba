mod common;

use std::time::Duration;

use common::{seeded_store, ScriptedStore, COLLECTION};
use paginated_query::{
    Error, PaginationInfo, PaginationQuery, PagingQuery, Phase, SortOrder, StoreError,
};
use serde::Deserialize;
use serde_json::{json, Value};

fn projection() -> Value {
    json!({"status": 1, "title": 1})
}

#[tokio::test]
async fn test_find_first_page_with_page_zero() -> anyhow::Result<()> {
    let store = seeded_store(20).await;

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(0)
        .sort("price", -1)
        .select(projection())
        .filter(json!({}))
        .find()
        .await?;

    assert_eq!(page.data().len(), 10);
    assert_eq!(
        page.pagination(),
        &PaginationInfo {
            total: 20,
            page: 1,
            per_page: 10,
            prev: None,
            next: Some(2),
            total_page: 2,
        }
    );
    assert_eq!(page.data()[0]["title"], json!("todo-19"));
    assert!(page.data()[0].get("price").is_none());
    assert!(page.data()[0].get("_id").is_some());
    Ok(())
}

#[tokio::test]
async fn test_find_second_page_with_default_limit() -> anyhow::Result<()> {
    let store = seeded_store(20).await;

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(0)
        .page(2)
        .filter(json!({}))
        .find()
        .await?;

    assert_eq!(page.data().len(), 10);
    assert_eq!(
        page.pagination(),
        &PaginationInfo {
            total: 20,
            page: 2,
            per_page: 10,
            prev: Some(1),
            next: None,
            total_page: 2,
        }
    );
    // No sort: natural insertion order.
    assert_eq!(page.data()[0]["title"], json!("todo-10"));
    assert_eq!(page.data()[9]["title"], json!("todo-19"));
    Ok(())
}

#[tokio::test]
async fn test_find_counts_the_filtered_set() -> anyhow::Result<()> {
    let store = seeded_store(20).await;

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(3)
        .page(2)
        .sort("price", SortOrder::Asc)
        .filter(json!({"price": {"$gte": 12}}))
        .find()
        .await?;

    let prices: Vec<_> = page.data().iter().map(|d| d["price"].clone()).collect();
    assert_eq!(prices, vec![json!(15), json!(16), json!(17)]);
    assert_eq!(page.pagination().total, 8);
    assert_eq!(page.pagination().total_page, 3);
    assert_eq!(page.pagination().next, Some(3));
    Ok(())
}

#[tokio::test]
async fn test_find_without_filter_fails_before_io() {
    let store = ScriptedStore::wrap(seeded_store(20).await);

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .sort("price", -1)
        .select(projection())
        .find()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingFilter), "got {err:?}");
    assert_eq!(store.calls(), 0);

    // A null filter is no filter.
    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .filter(Value::Null)
        .find()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingFilter));

    // Missing filter is reported even when paging is missing too.
    let err = PagingQuery::new(&store, COLLECTION).find().await.unwrap_err();
    assert!(matches!(err, Error::MissingFilter));
}

#[tokio::test]
async fn test_find_without_paging_fails_before_io() {
    let store = ScriptedStore::wrap(seeded_store(20).await);

    let err = PagingQuery::new(&store, COLLECTION)
        .sort("price", -1)
        .select(projection())
        .filter(json!({}))
        .find()
        .await
        .unwrap_err();
    match err {
        Error::MissingPagingParams { missing } => assert_eq!(missing, vec!["limit", "page"]),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .filter(json!({}))
        .find()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingPagingParams { .. }));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_aggregate_second_page() -> anyhow::Result<()> {
    let store = seeded_store(20).await;

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(0)
        .page(2)
        .sort("price", -1)
        .aggregate(vec![json!({"$match": {"status": "active"}})])
        .await?;

    assert_eq!(page.data().len(), 10);
    assert_eq!(page.data()[0]["price"], json!(9));
    assert_eq!(
        page.pagination(),
        &PaginationInfo {
            total: 20,
            page: 2,
            per_page: 10,
            prev: Some(1),
            next: None,
            total_page: 2,
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_aggregate_with_projection_and_group() -> anyhow::Result<()> {
    let store = seeded_store(20).await;
    store
        .insert_many(COLLECTION, vec![json!({"title": "late", "status": "done", "price": 3})])
        .await?;

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(1)
        .page(1)
        .sort("_id", SortOrder::Asc)
        .select(json!({"n": 1}))
        .aggregate(vec![json!({"$group": {"_id": "$status", "n": {"$sum": 1}}})])
        .await?;

    assert_eq!(page.data(), &[json!({"_id": "active", "n": 20})]);
    assert_eq!(page.pagination().total, 2);
    assert_eq!(page.pagination().next, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_aggregate_rejects_filter() {
    let store = ScriptedStore::wrap(seeded_store(20).await);

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(0)
        .page(2)
        .filter(json!({}))
        .sort("price", -1)
        .aggregate(vec![json!({"$match": {"status": "active"}})])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConflictingMode), "got {err:?}");
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_aggregate_without_paging_fails() {
    let store = ScriptedStore::wrap(seeded_store(20).await);

    let err = PagingQuery::new(&store, COLLECTION)
        .sort("price", -1)
        .aggregate(vec![json!({"$match": {"status": "active"}})])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingPagingParams { .. }));

    let err = PagingQuery::new(&store, COLLECTION)
        .aggregate(vec![json!({"$match": {"status": "active"}})])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingPagingParams { .. }));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_aggregate_empty_match_skips_fetch() -> anyhow::Result<()> {
    let store = ScriptedStore::wrap(seeded_store(20).await);

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .aggregate(vec![json!({"$match": {"status": "archived"}})])
        .await?;

    assert!(page.data().is_empty());
    assert_eq!(page.pagination().total, 0);
    assert_eq!(page.pagination().total_page, 0);
    assert_eq!(page.pagination().prev, None);
    assert_eq!(page.pagination().next, None);
    assert_eq!(store.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_aggregate_unreadable_count_row_is_an_error() {
    let mut store = ScriptedStore::wrap(seeded_store(20).await);
    store.count_rows = Some(vec![json!({"total": "x"})]);

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .aggregate(vec![json!({"$match": {"status": "active"}})])
        .await
        .unwrap_err();

    assert!(
        matches!(
            &err,
            Error::Upstream { phase: Phase::Count, source: StoreError::MalformedResult(row) }
                if row.contains("\"x\"")
        ),
        "got {err:?}"
    );
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_aggregate_count_row_without_total_is_an_error() {
    let mut store = ScriptedStore::wrap(seeded_store(20).await);
    store.count_rows = Some(vec![json!({"count": 20})]);

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .aggregate(Vec::new())
        .await
        .unwrap_err();

    assert!(
        matches!(&err, Error::Upstream { phase: Phase::Count, source: StoreError::MalformedResult(_) }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_aggregate_no_count_rows_means_empty_page() -> anyhow::Result<()> {
    let mut store = ScriptedStore::wrap(seeded_store(20).await);
    store.count_rows = Some(Vec::new());

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .aggregate(Vec::new())
        .await?;

    assert!(page.data().is_empty());
    assert_eq!(page.pagination().total, 0);
    assert_eq!(store.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_aggregate_malformed_stage_surfaces() {
    let store = seeded_store(20).await;

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .sort("price", -1)
        .aggregate(vec![json!({"$matches": {"status": "active"}})])
        .await
        .unwrap_err();

    match err {
        Error::Upstream { phase, source } => {
            assert_eq!(phase, Phase::Count);
            assert_eq!(source, StoreError::UnknownStage("$matches".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_find_unknown_operator_surfaces() {
    let store = seeded_store(5).await;

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .filter(json!({"price": {"$around": 3}}))
        .find()
        .await
        .unwrap_err();

    assert!(
        matches!(&err, Error::Upstream { source: StoreError::UnknownOperator(op), .. } if op == "$around"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_upstream_failure_names_the_phase() {
    let mut store = ScriptedStore::wrap(seeded_store(20).await);
    store.fail_count = true;

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .filter(json!({}))
        .find()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream { phase: Phase::Count, .. }), "got {err:?}");

    store.fail_count = false;
    store.fail_fetch = true;
    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .filter(json!({}))
        .find()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream { phase: Phase::Fetch, .. }), "got {err:?}");

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .aggregate(vec![])
        .await
        .unwrap_err();
    match err {
        Error::Upstream { phase, source } => {
            assert_eq!(phase, Phase::Fetch);
            assert_eq!(source, StoreError::Db("connection reset by peer".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_aborts_the_call() {
    let mut store = ScriptedStore::wrap(seeded_store(20).await);
    store.delay = Some(Duration::from_millis(500));

    let err = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(1)
        .filter(json!({}))
        .timeout(Duration::from_millis(20))
        .find()
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Upstream { source: StoreError::Timeout, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_generous_timeout_still_succeeds() -> anyhow::Result<()> {
    let mut store = ScriptedStore::wrap(seeded_store(20).await);
    store.delay = Some(Duration::from_millis(5));

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(5)
        .page(4)
        .filter(json!({}))
        .timeout(Duration::from_secs(5))
        .find()
        .await?;

    assert_eq!(page.data().len(), 5);
    assert_eq!(page.pagination().next, None);
    assert_eq!(store.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_identical_queries_are_idempotent() -> anyhow::Result<()> {
    let store = seeded_store(20).await;

    let run = || {
        PagingQuery::new(&store, COLLECTION)
            .limit(7)
            .page(2)
            .sort("title", SortOrder::Desc)
            .filter(json!({"status": "active"}))
            .find()
    };

    let first = run().await?;
    let second = run().await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_page_beyond_last_is_empty() -> anyhow::Result<()> {
    let store = seeded_store(20).await;

    let page = PagingQuery::new(&store, COLLECTION)
        .limit(10)
        .page(5)
        .filter(json!({}))
        .find()
        .await?;

    assert!(page.data().is_empty());
    assert_eq!(page.pagination().page, 5);
    assert_eq!(page.pagination().prev, Some(4));
    assert_eq!(page.pagination().next, None);
    assert_eq!(page.pagination().total_page, 2);
    Ok(())
}

#[tokio::test]
async fn test_with_query_applies_http_parameters() -> anyhow::Result<()> {
    let store = seeded_store(20).await;
    let query = PaginationQuery {
        page: Some(2),
        limit: Some(5),
        sort_by: Some("price".to_string()),
        sort_direction: Some(SortOrder::Desc),
    };

    let page = PagingQuery::new(&store, COLLECTION)
        .with_query(&query)
        .filter(json!({}))
        .find()
        .await?;
    assert_eq!(page.data()[0]["price"], json!(14));
    assert_eq!(page.pagination().per_page, 5);

    let err = PagingQuery::new(&store, COLLECTION)
        .with_query(&PaginationQuery::default())
        .filter(json!({}))
        .find()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingPagingParams { .. }));
    Ok(())
}

#[tokio::test]
async fn test_decode_typed_documents() -> anyhow::Result<()> {
    #[derive(Debug, Deserialize)]
    struct TodoTest {
        title: String,
        status: String,
    }

    let store = seeded_store(20).await;
    let page = PagingQuery::new(&store, COLLECTION)
        .limit(2)
        .page(1)
        .filter(json!({"title": "todo-4"}))
        .find()
        .await?;

    let todos: Vec<TodoTest> = page.decode()?;
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].title, "todo-4");
    assert_eq!(todos[0].status, "active");
    Ok(())
}

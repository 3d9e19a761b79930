//! Statement-shape tests: the repository runs against the recording datastore and
//! every test asserts on the exact SQL and parameters it produced.

use record_repository::storage::dialect::{dialect_for, DialectKind};
use record_repository::storage::{Datastore, KeyGeneration, MockDatastore};
use record_repository::{Filter, Query, Record, RecordId, Repository, RepositoryError, SortDirection};
use serde_json::json;
use std::sync::Arc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn repository(store: &MockDatastore, engine: DialectKind, keys: KeyGeneration) -> Repository {
    let datastore: Arc<dyn Datastore> = Arc::new(store.clone());
    Repository::new("article", datastore, dialect_for(engine), keys).unwrap()
}

fn record(value: serde_json::Value) -> Record {
    Record::from_json(value).unwrap()
}

#[tokio::test]
async fn test_add_attaches_time_ordered_key() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());

    let mut article = record(json!({"title": "hello", "views": 0}));
    let id = repo.add(&mut article).await?.expect("generated id");

    let RecordId::Text(digits) = &id else {
        panic!("time-ordered keys are text, got {id:?}");
    };
    assert!(digits.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(article.id("id"), Some(id.clone()));

    let statements = store.statements().await;
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql,
        "INSERT INTO article (title, views, id) VALUES (?, ?, ?)"
    );
    assert_eq!(statements[0].params, vec![json!("hello"), json!(0), id.to_json()]);
    Ok(())
}

#[tokio::test]
async fn test_add_keeps_supplied_id() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());

    let mut article = record(json!({"id": "a-1", "title": "x"}));
    assert_eq!(repo.add(&mut article).await?, Some(RecordId::from("a-1")));
    assert_eq!(
        store.statements().await[0].sql,
        "INSERT INTO article (id, title) VALUES (?, ?)"
    );
    Ok(())
}

#[tokio::test]
async fn test_add_store_delegated_reads_back_returning() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Postgres, KeyGeneration::StoreDelegated);
    store.push_rows(vec![record(json!({"id": 7}))]).await;

    let mut article = record(json!({"id": null, "title": "hello"}));
    let id = repo.add(&mut article).await?;

    assert_eq!(id, Some(RecordId::Int(7)));
    assert_eq!(article.get("id"), Some(&json!(7)));
    let statements = store.statements().await;
    assert_eq!(
        statements[0].sql,
        "INSERT INTO article (title) VALUES ($1) RETURNING id"
    );
    assert_eq!(statements[0].params, vec![json!("hello")]);
    Ok(())
}

#[tokio::test]
async fn test_add_store_delegated_uses_last_insert_id() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::MySql, KeyGeneration::StoreDelegated);
    store.push_affected(1, Some(42)).await;

    let mut article = record(json!({"title": "hello"}));
    assert_eq!(repo.add(&mut article).await?, Some(RecordId::Int(42)));
    assert_eq!(
        store.statements().await[0].sql,
        "INSERT INTO article (title) VALUES (?)"
    );
    Ok(())
}

#[tokio::test]
async fn test_update_touches_only_changed_fields() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store
        .push_rows(vec![record(json!({"id": "1", "a": 1, "b": 2}))])
        .await;

    let id = RecordId::from("1");
    repo.update(&id, &record(json!({"a": 1, "b": 3}))).await?;

    let statements = store.statements().await;
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].sql, "SELECT * FROM article WHERE id = ?");
    assert_eq!(statements[1].sql, "UPDATE article SET b = ? WHERE id = ?");
    assert_eq!(statements[1].params, vec![json!(3), json!("1")]);
    Ok(())
}

#[tokio::test]
async fn test_identical_update_is_a_no_op() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store
        .push_rows(vec![record(json!({"id": "1", "a": 1, "b": "two"}))])
        .await;

    let affected = repo
        .update(&RecordId::from("1"), &record(json!({"id": "1", "a": "1", "b": "two"})))
        .await?;

    assert_eq!(affected, 0);
    let statements = store.statements().await;
    assert_eq!(statements.len(), 1, "only the read, no UPDATE");
    Ok(())
}

#[tokio::test]
async fn test_update_of_missing_record_writes_every_field() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_rows(vec![]).await;
    store.push_affected(0, None).await;

    let affected = repo
        .update(&RecordId::from("9"), &record(json!({"id": "9", "a": 1, "b": null})))
        .await?;

    assert_eq!(affected, 0);
    let statements = store.statements().await;
    assert_eq!(statements[1].sql, "UPDATE article SET a = ?, b = ? WHERE id = ?");
    assert_eq!(statements[1].params, vec![json!(1), json!(null), json!("9")]);
    Ok(())
}

#[tokio::test]
async fn test_update_fields_skips_the_read() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());

    repo.update_fields(
        &RecordId::from("1"),
        &record(json!({"a": 1, "b": 2})),
        &["b", "id", "c"],
    )
    .await?;

    let statements = store.statements().await;
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].sql, "UPDATE article SET b = ?, c = ? WHERE id = ?");
    assert_eq!(statements[0].params, vec![json!(2), json!(null), json!("1")]);
    Ok(())
}

#[tokio::test]
async fn test_remove_is_idempotent() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_affected(1, None).await;
    store.push_affected(0, None).await;

    let id = RecordId::from("1");
    assert_eq!(repo.remove(&id).await?, 1);
    assert_eq!(repo.remove(&id).await?, 0);

    let statements = store.statements().await;
    assert_eq!(statements.len(), 2);
    assert!(statements
        .iter()
        .all(|s| s.sql == "DELETE FROM article WHERE id = ?"));
    Ok(())
}

#[tokio::test]
async fn test_zero_count_skips_page_query() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_rows(vec![record(json!({"cnt": 0}))]).await;

    let query = Query::new().filter(Filter::eq("status", "published")).page(1, 20);
    let result = repo.get_by_query(&query).await?;

    assert_eq!(result.pagination.page_count, 0);
    assert_eq!(result.pagination.record_count, 0);
    assert!(result.rows.is_empty());
    let statements = store.statements().await;
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql,
        "SELECT COUNT(id) AS cnt FROM article WHERE status = ?"
    );
    assert_eq!(statements[0].params, vec![json!("published")]);
    Ok(())
}

#[tokio::test]
async fn test_page_count_is_computed_from_count() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_rows(vec![record(json!({"cnt": 101}))]).await;
    store.push_rows(vec![record(json!({"id": "21"}))]).await;

    let query = Query::new()
        .filter(Filter::eq("status", "published"))
        .sort("created", SortDirection::Desc)
        .sort("id", SortDirection::Asc)
        .page(2, 20);
    let result = repo.get_by_query(&query).await?;

    assert_eq!(result.pagination.page_count, 6);
    assert_eq!(result.pagination.record_count, 101);
    assert_eq!(result.rows.len(), 1);
    let statements = store.statements().await;
    assert_eq!(
        statements[1].sql,
        "SELECT * FROM article WHERE status = ? ORDER BY created DESC, id ASC LIMIT 20 OFFSET 20"
    );
    assert_eq!(statements[1].params, vec![json!("published")]);
    Ok(())
}

#[tokio::test]
async fn test_supplied_page_count_is_trusted() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::MySql, KeyGeneration::default());

    let query = Query::new().page(3, 10).page_count(5).select(["title"]);
    let result = repo.get_by_query(&query).await?;

    assert_eq!(result.pagination.page_count, 5);
    assert_eq!(result.pagination.record_count, 0);
    let statements = store.statements().await;
    assert_eq!(statements.len(), 1, "no COUNT when the page count is supplied");
    assert_eq!(statements[0].sql, "SELECT id, title FROM article LIMIT 20, 10");
    Ok(())
}

#[tokio::test]
async fn test_postgres_numbers_placeholders_and_ignores_hint() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Postgres, KeyGeneration::default());
    store.push_rows(vec![record(json!({"cnt": 3}))]).await;

    let query = Query::new()
        .filter(Filter::and(vec![
            Filter::in_values("tag", ["rust", "sql"]),
            Filter::or(vec![Filter::gt("views", 10), Filter::like("title", "%db%")]),
        ]))
        .index_hint("idx_tag");
    repo.get_by_query(&query).await?;

    let statements = store.statements().await;
    assert_eq!(
        statements[0].sql,
        "SELECT COUNT(id) AS cnt FROM article WHERE (tag IN ($1, $2) AND (views > $3 OR title LIKE $4))"
    );
    assert_eq!(
        statements[1].sql,
        format!(
            "SELECT * FROM article WHERE (tag IN ($1, $2) AND (views > $3 OR title LIKE $4)) LIMIT {} OFFSET 0",
            i32::MAX
        )
    );
    assert_eq!(
        statements[1].params,
        vec![json!("rust"), json!("sql"), json!(10), json!("%db%")]
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_in_never_matches() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_rows(vec![record(json!({"cnt": 0}))]).await;

    let query = Query::new().filter(Filter::in_values("id", Vec::<String>::new()));
    let result = repo.get_by_query(&query).await?;

    assert_eq!(result.pagination.page_count, 0);
    assert_eq!(
        store.statements().await[0].sql,
        "SELECT COUNT(id) AS cnt FROM article WHERE 1 != 1"
    );
    Ok(())
}

#[tokio::test]
async fn test_malformed_filter_runs_nothing() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());

    let query = Query::new().filter(Filter::and(vec![Filter::eq("a", 1)]));
    let err = repo.get_by_query(&query).await.unwrap_err();
    assert!(err.is_malformed_filter());

    let err = repo.get_by_query(&Query::new().page(0, 10)).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidQuery(_)));

    let err = repo
        .get_by_query(&Query::new().filter(Filter::eq("a; DROP TABLE x", 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidIdentifier(_)));

    assert!(store.statements().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_get_first_and_random() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::MySql, KeyGeneration::default());
    store.push_rows(vec![record(json!({"id": "1"}))]).await;

    let first = repo
        .get_first(&Query::new().sort("created", SortDirection::Desc))
        .await?;
    assert_eq!(first.and_then(|r| r.id("id")), Some(RecordId::from("1")));

    assert!(repo.get_randomly(0).await?.is_empty());
    repo.get_randomly(3).await?;

    let statements = store.statements().await;
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].sql,
        "SELECT * FROM article ORDER BY created DESC LIMIT 0, 1"
    );
    assert_eq!(statements[1].sql, "SELECT * FROM article ORDER BY RAND() LIMIT 3");
    Ok(())
}

#[tokio::test]
async fn test_remove_matching_and_count() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_affected(4, None).await;
    store.push_rows(vec![record(json!({"cnt": 2}))]).await;

    let removed = repo
        .remove_matching(&Filter::or(vec![
            Filter::eq("status", "draft"),
            Filter::lt("views", 1),
        ]))
        .await?;
    assert_eq!(removed, 4);
    assert_eq!(repo.count().await?, 2);

    let statements = store.statements().await;
    assert_eq!(
        statements[0].sql,
        "DELETE FROM article WHERE (status = ? OR views < ?)"
    );
    assert_eq!(statements[1].sql, "SELECT COUNT(id) AS cnt FROM article");
    Ok(())
}

#[tokio::test]
async fn test_session_groups_operations() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());

    let mut session = store.begin().await?;
    let mut a = record(json!({"title": "a"}));
    let mut b = record(json!({"title": "b"}));
    repo.add_with(&mut session, &mut a).await?;
    repo.add_with(&mut session, &mut b).await?;
    session.commit().await?;

    let rolled_back = store.begin().await?;
    rolled_back.rollback().await?;

    let statements = store.statements().await;
    assert_eq!(statements.len(), 2);
    assert!(statements.iter().all(|s| s.session == Some(1)));
    assert_eq!(store.acquired().await, 0, "no pooled connection outside the session");
    assert_eq!(store.committed().await, vec![1]);
    assert_eq!(store.rolled_back().await, vec![2]);
    Ok(())
}

#[tokio::test]
async fn test_unreadable_count_is_an_error() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_rows(vec![]).await;
    store.push_rows(vec![record(json!({"total": 5}))]).await;

    let err = repo.get_by_query(&Query::new()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Persistence(_)));
    let err = repo.count().await.unwrap_err();
    assert!(matches!(err, RepositoryError::Persistence(_)));

    assert_eq!(store.statements().await.len(), 2, "no page query after a failed COUNT");
    Ok(())
}

#[tokio::test]
async fn test_driver_failure_is_persistence_error() -> TestResult {
    let store = MockDatastore::new();
    let repo = repository(&store, DialectKind::Sqlite, KeyGeneration::default());
    store.push_failure("connection reset").await;

    let err = repo.get(&RecordId::from("1")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Persistence(_)));
    assert!(!err.is_caller_error());
    Ok(())
}

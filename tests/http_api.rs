//! Drives the HTTP surface in-process: router on an ephemeral port, SQLite in memory.

use record_repository::domain::{FieldDefinition, FieldType, SchemaCatalog, TableDefinition};
use record_repository::storage::dialect::DialectKind;
use record_repository::storage::{PoolSettings, SqlDatastore};
use record_repository::{transport, DatabaseService, KeyGeneration};
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;

async fn start_server() -> Result<String, Box<dyn std::error::Error>> {
    let mut catalog = SchemaCatalog::new();
    catalog.register(TableDefinition::new(
        "article",
        vec![
            FieldDefinition::key("id", FieldType::String).length(32),
            FieldDefinition::new("title", FieldType::String),
            FieldDefinition::new("views", FieldType::Int),
        ],
    ))?;

    let settings = PoolSettings {
        max_connections: 1,
        min_connections: 1,
        acquire_timeout: Duration::from_secs(5),
    };
    let datastore = SqlDatastore::connect("sqlite::memory:", &settings).await?;
    let db_service = DatabaseService::new(Arc::new(datastore), DialectKind::Sqlite, KeyGeneration::default())
        .with_catalog(catalog);

    let app_state = transport::http::AppState {
        db_service: Arc::new(db_service),
    };
    let router = transport::http::create_router(app_state);

    // Bind to an ephemeral port to avoid conflicts if an API server is already running.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Ok(format!("http://127.0.0.1:{}", port))
}

async fn body(resp: reqwest::Response) -> Result<JsonValue, reqwest::Error> {
    resp.json::<JsonValue>().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_record_lifecycle_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = start_server().await?;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/health", base_url)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let health = body(resp).await?;
    assert_eq!(health["data"]["engine"], "sqlite");

    // --- BOOTSTRAP ---
    let resp = client
        .post(format!("{}/bootstrap/init-tables", base_url))
        .json(&json!({ "confirm": false }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{}/bootstrap/init-tables", base_url))
        .json(&json!({ "confirm": true }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await?["data"]["tables"], json!(["article"]));

    // --- CREATE ---
    let resp = client
        .post(format!("{}/api/repositories/article/records", base_url))
        .json(&json!({ "title": "hello", "views": 3 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body(resp).await?;
    assert_eq!(created["success"], true);
    let id = created["data"]["id"].as_str().expect("text id").to_string();
    let record_url = format!("{}/api/repositories/article/records/{}", base_url, id);

    // --- READ ---
    let resp = client.get(&record_url).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched = body(resp).await?;
    assert_eq!(fetched["data"]["title"], "hello");
    assert_eq!(fetched["data"]["views"], 3);

    // --- UPDATE ---
    let resp = client
        .put(&record_url)
        .json(&json!({ "title": "hello", "views": 4 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await?["data"]["rows_affected"], 1);

    // --- QUERY ---
    let resp = client
        .post(format!("{}/api/repositories/article/query", base_url))
        .json(&json!({
            "filter": { "field": "views", "operator": "GT", "value": 3 },
            "sorts": [{ "field": "title", "direction": "DESC" }],
            "page_num": 1,
            "page_size": 10
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body(resp).await?;
    assert_eq!(page["data"]["pagination"]["page_count"], 1);
    assert_eq!(page["data"]["pagination"]["record_count"], 1);
    assert_eq!(page["data"]["rows"][0]["views"], 4);

    let resp = client
        .post(format!("{}/api/repositories/article/query", base_url))
        .json(&json!({
            "filter": { "combinator": "AND", "children": [
                { "field": "views", "operator": "GT", "value": 3 }
            ]}
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(resp).await?["success"], false);

    let resp = client
        .post(format!("{}/api/repositories/article/query", base_url))
        .json(&json!({
            "filter": { "combinator": "OR", "children": [
                { "field": "views", "operator": "GT", "value": 3 },
                { "field": "views", "operator": "BETWEEN", "value": [1, 5] }
            ]}
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let rejected = body(resp).await?;
    assert_eq!(rejected["success"], false);
    assert!(
        rejected["error"].as_str().unwrap_or_default().contains("BETWEEN"),
        "{rejected}"
    );

    let resp = client
        .post(format!("{}/api/repositories/article/query", base_url))
        .json(&json!({ "filter": { "field": "views", "operator": "eq", "value": 4 } }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await?["data"]["pagination"]["record_count"], 1);

    let resp = client
        .get(format!("{}/api/repositories/article/count", base_url))
        .send()
        .await?;
    assert_eq!(body(resp).await?["data"]["count"], 1);

    let resp = client
        .get(format!("{}/api/repositories/article/random?size=5", base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await?["data"].as_array().map(Vec::len), Some(1));

    // --- DELETE ---
    let resp = client.delete(&record_url).send().await?;
    assert_eq!(body(resp).await?["data"]["rows_affected"], 1);
    let resp = client.delete(&record_url).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await?["data"]["rows_affected"], 0);

    let resp = client.get(&record_url).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .get(format!("{}/api/repositories/bad-name/count", base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

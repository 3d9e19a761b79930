use crate::transport::http::handlers::{bootstrap, health, query, records};
use crate::transport::http::types::{
    ApiResponse, InitTablesRequest, QueryRequest, RecordBody, SortSpec,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        records::add_record_handler,
        records::get_record_handler,
        records::update_record_handler,
        records::delete_record_handler,
        records::count_handler,
        records::random_handler,
        query::query_handler,
        bootstrap::init_tables_handler
    ),
    components(schemas(ApiResponse, RecordBody, QueryRequest, SortSpec, InitTablesRequest))
)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/api/repositories/:name/records",
            post(records::add_record_handler),
        )
        .route(
            "/api/repositories/:name/records/:id",
            get(records::get_record_handler)
                .put(records::update_record_handler)
                .delete(records::delete_record_handler),
        )
        .route("/api/repositories/:name/query", post(query::query_handler))
        .route("/api/repositories/:name/count", get(records::count_handler))
        .route("/api/repositories/:name/random", get(records::random_handler))
        .route("/bootstrap/init-tables", post(bootstrap::init_tables_handler))
        .with_state(app_state)
}

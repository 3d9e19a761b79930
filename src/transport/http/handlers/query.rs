use crate::domain::query::Query;
use crate::transport::http::handlers::common::{
    json_body, repository_error, repository_for, respond, to_data, HandlerResult,
};
use crate::transport::http::types::{ApiResponse, AppState, QueryRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/repositories/{name}/query",
    params(("name" = String, Path, description = "Logical table name")),
    request_body = QueryRequest,
    responses(
        (status = 200, description = "One page of records plus pagination", body = ApiResponse),
        (status = 400, description = "Malformed filter or invalid paging", body = ApiResponse),
        (status = 422, description = "Body is not a valid query", body = ApiResponse)
    )
)]
pub async fn query_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> impl IntoResponse {
    respond(run_query(&state, &name, request).await)
}

async fn run_query(
    state: &AppState,
    name: &str,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> HandlerResult {
    let query = Query::try_from(json_body(request)?).map_err(repository_error)?;
    let repository = repository_for(state, name)?;
    let result = repository
        .get_by_query(&query)
        .await
        .map_err(repository_error)?;
    Ok((StatusCode::OK, to_data(&result)?))
}

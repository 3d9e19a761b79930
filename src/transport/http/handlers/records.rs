use crate::domain::record::Record;
use crate::transport::http::handlers::common::{
    error_response, json_body, repository_error, repository_for, respond, to_data, HandlerResult,
};
use crate::transport::http::types::{ApiResponse, AppState, RandomParams, RecordBody};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

#[utoipa::path(
    post,
    path = "/api/repositories/{name}/records",
    params(("name" = String, Path, description = "Logical table name")),
    request_body = RecordBody,
    responses(
        (status = 201, description = "Record stored; data carries the id used", body = ApiResponse),
        (status = 400, description = "Bad request", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn add_record_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Result<Json<RecordBody>, JsonRejection>,
) -> impl IntoResponse {
    respond(add_record(&state, &name, request).await)
}

async fn add_record(
    state: &AppState,
    name: &str,
    request: Result<Json<RecordBody>, JsonRejection>,
) -> HandlerResult {
    let repository = repository_for(state, name)?;
    let mut record = Record::from_json(json_body(request)?.0).map_err(repository_error)?;
    let id = repository.add(&mut record).await.map_err(repository_error)?;
    Ok((
        StatusCode::CREATED,
        json!({ "id": id, "record": record }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/repositories/{name}/records/{id}",
    params(
        ("name" = String, Path, description = "Logical table name"),
        ("id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Stored record", body = ApiResponse),
        (status = 404, description = "No record with this id", body = ApiResponse)
    )
)]
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> impl IntoResponse {
    respond(get_record(&state, &name, &id).await)
}

async fn get_record(state: &AppState, name: &str, raw_id: &str) -> HandlerResult {
    let repository = repository_for(state, name)?;
    let id = repository.parse_id(raw_id);
    match repository.get(&id).await.map_err(repository_error)? {
        Some(record) => Ok((StatusCode::OK, record.into_json())),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No record '{}' in '{}'", id, name),
        )),
    }
}

#[utoipa::path(
    put,
    path = "/api/repositories/{name}/records/{id}",
    params(
        ("name" = String, Path, description = "Logical table name"),
        ("id" = String, Path, description = "Record id")
    ),
    request_body = RecordBody,
    responses(
        (status = 200, description = "Rows affected (0 when nothing changed)", body = ApiResponse),
        (status = 400, description = "Bad request", body = ApiResponse)
    )
)]
pub async fn update_record_handler(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    request: Result<Json<RecordBody>, JsonRejection>,
) -> impl IntoResponse {
    respond(update_record(&state, &name, &id, request).await)
}

async fn update_record(
    state: &AppState,
    name: &str,
    raw_id: &str,
    request: Result<Json<RecordBody>, JsonRejection>,
) -> HandlerResult {
    let repository = repository_for(state, name)?;
    let record = Record::from_json(json_body(request)?.0).map_err(repository_error)?;
    let id = repository.parse_id(raw_id);
    let rows_affected = repository
        .update(&id, &record)
        .await
        .map_err(repository_error)?;
    Ok((StatusCode::OK, json!({ "rows_affected": rows_affected })))
}

#[utoipa::path(
    delete,
    path = "/api/repositories/{name}/records/{id}",
    params(
        ("name" = String, Path, description = "Logical table name"),
        ("id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Rows affected; removing a missing record is not an error", body = ApiResponse)
    )
)]
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> impl IntoResponse {
    respond(delete_record(&state, &name, &id).await)
}

async fn delete_record(state: &AppState, name: &str, raw_id: &str) -> HandlerResult {
    let repository = repository_for(state, name)?;
    let id = repository.parse_id(raw_id);
    let rows_affected = repository.remove(&id).await.map_err(repository_error)?;
    Ok((StatusCode::OK, json!({ "rows_affected": rows_affected })))
}

#[utoipa::path(
    get,
    path = "/api/repositories/{name}/count",
    params(("name" = String, Path, description = "Logical table name")),
    responses(
        (status = 200, description = "Number of stored records", body = ApiResponse)
    )
)]
pub async fn count_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    respond(count(&state, &name).await)
}

async fn count(state: &AppState, name: &str) -> HandlerResult {
    let repository = repository_for(state, name)?;
    let count = repository.count().await.map_err(repository_error)?;
    Ok((StatusCode::OK, json!({ "count": count })))
}

#[utoipa::path(
    get,
    path = "/api/repositories/{name}/random",
    params(("name" = String, Path, description = "Logical table name"), RandomParams),
    responses(
        (status = 200, description = "Randomly sampled records", body = ApiResponse)
    )
)]
pub async fn random_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    QueryParams(params): QueryParams<RandomParams>,
) -> impl IntoResponse {
    respond(random(&state, &name, params.size).await)
}

async fn random(state: &AppState, name: &str, size: u64) -> HandlerResult {
    let repository = repository_for(state, name)?;
    let rows = repository.get_randomly(size).await.map_err(repository_error)?;
    Ok((StatusCode::OK, to_data(&rows)?))
}

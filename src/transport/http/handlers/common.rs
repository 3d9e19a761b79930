use crate::app::repository::Repository;
use crate::error::RepositoryError;
use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value as JsonValue;

pub type HandlerError = (StatusCode, Json<ApiResponse>);

pub type HandlerResult = Result<(StatusCode, JsonValue), HandlerError>;

pub fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (status, Json(ApiResponse::err(message)))
}

/// Caller mistakes are 400s; strategy and persistence failures are 500s.
pub fn status_for(err: &RepositoryError) -> StatusCode {
    if err.is_caller_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub fn repository_error(err: RepositoryError) -> HandlerError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "Repository operation failed");
    }
    error_response(status, err.to_string())
}

pub fn repository_for(state: &AppState, name: &str) -> Result<Repository, HandlerError> {
    state.db_service.repository(name).map_err(repository_error)
}

pub fn json_body<T>(request: Result<Json<T>, JsonRejection>) -> Result<T, HandlerError> {
    request.map(|Json(v)| v).map_err(|e| {
        error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Invalid JSON body: {}", e),
        )
    })
}

pub fn to_data<T: Serialize>(value: &T) -> Result<JsonValue, HandlerError> {
    serde_json::to_value(value).map_err(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize response: {}", e),
        )
    })
}

pub fn respond(result: HandlerResult) -> Response {
    match result {
        Ok((status, data)) => (status, Json(ApiResponse::ok(data))).into_response(),
        Err(err) => err.into_response(),
    }
}

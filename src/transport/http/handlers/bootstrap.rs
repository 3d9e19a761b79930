use crate::transport::http::handlers::common::{error_response, json_body, respond, HandlerResult};
use crate::transport::http::types::{ApiResponse, AppState, InitTablesRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

#[utoipa::path(
    post,
    path = "/bootstrap/init-tables",
    request_body = InitTablesRequest,
    responses(
        (status = 200, description = "Every catalog table created", body = ApiResponse),
        (status = 400, description = "Not confirmed, or no table definitions loaded", body = ApiResponse),
        (status = 500, description = "At least one table failed", body = ApiResponse)
    )
)]
pub async fn init_tables_handler(
    State(state): State<AppState>,
    request: Result<Json<InitTablesRequest>, JsonRejection>,
) -> impl IntoResponse {
    respond(init_tables(&state, request).await)
}

async fn init_tables(
    state: &AppState,
    request: Result<Json<InitTablesRequest>, JsonRejection>,
) -> HandlerResult {
    let request = json_body(request)?;
    if !request.confirm {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "confirm must be true",
        ));
    }
    if state.db_service.catalog().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "no table definitions loaded",
        ));
    }

    let outcome = state.db_service.init_tables(request.drop_first).await;
    let failed: Vec<&str> = outcome
        .iter()
        .filter(|(_, created)| !created)
        .map(|(name, _)| name.as_str())
        .collect();
    if !failed.is_empty() {
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to initialize tables: {}", failed.join(", ")),
        ));
    }

    let tables: Vec<&str> = outcome.iter().map(|(name, _)| name.as_str()).collect();
    Ok((
        StatusCode::OK,
        json!({ "tables": tables, "dropped": request.drop_first }),
    ))
}

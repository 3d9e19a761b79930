use crate::app::database_service::DatabaseService;
use crate::domain::filter::Filter;
use crate::domain::query::{Query, Sort, DEFAULT_PAGE_SIZE};
use crate::error::RepositoryError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone)]
pub struct AppState {
    pub db_service: Arc<DatabaseService>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// A record as a JSON object of field → value.
#[derive(Deserialize, Debug, ToSchema)]
#[schema(value_type = Object)]
pub struct RecordBody(pub JsonValue);

#[derive(Deserialize, Serialize, Debug, ToSchema)]
pub struct SortSpec {
    pub field: String,
    /// `ASC` (default) or `DESC`.
    #[serde(default)]
    #[schema(value_type = String)]
    pub direction: crate::domain::query::SortDirection,
}

/// Body of `POST /api/repositories/:name/query`.
#[derive(Deserialize, Debug, ToSchema)]
pub struct QueryRequest {
    /// `{"field","operator","value"}` or `{"combinator":"AND"|"OR","children":[…]}`.
    ///
    /// Kept as raw JSON so filter errors map to 400 rather than a body rejection.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filter: Option<JsonValue>,
    #[serde(default)]
    pub sorts: Vec<SortSpec>,
    #[serde(default = "default_page_num")]
    pub page_num: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Trusted page count; skips the COUNT query when set.
    #[serde(default)]
    pub page_count: Option<u64>,
    #[serde(default)]
    pub projections: Vec<String>,
    #[serde(default)]
    pub index_hint: Option<String>,
}

fn default_page_num() -> u64 {
    1
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl TryFrom<QueryRequest> for Query {
    type Error = RepositoryError;

    fn try_from(request: QueryRequest) -> Result<Self, Self::Error> {
        let filter = match request.filter {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(Filter::from_json(&value)?),
        };
        Ok(Query {
            filter,
            sorts: request
                .sorts
                .into_iter()
                .map(|s| Sort {
                    field: s.field,
                    direction: s.direction,
                })
                .collect(),
            page_num: request.page_num,
            page_size: request.page_size,
            page_count: request.page_count,
            projections: request.projections,
            index_hint: request.index_hint,
        })
    }
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RandomParams {
    /// Number of rows to sample.
    #[serde(default = "default_sample_size")]
    pub size: u64,
}

fn default_sample_size() -> u64 {
    1
}

#[derive(Deserialize, Serialize, Debug, ToSchema)]
pub struct InitTablesRequest {
    /// Safety switch to prevent accidental wipes.
    #[serde(default)]
    pub confirm: bool,
    /// Drop every catalog table before recreating it.
    #[serde(default)]
    pub drop_first: bool,
}

//! HTTP handlers
//!
//! Bodies are taken as raw JSON so missing or mistyped fields produce a
//! `400 {"message": ...}` rather than an extractor rejection. Store calls block
//! and run on the blocking pool.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, warn};

use crate::assistant::AIResponse;
use crate::engine::{ColumnDescriptor, Page, PageRequest, QueryResult, RowId, RowRecord, TableDescriptor};
use crate::error::DeskError;
use crate::saved::{NewSavedQuery, SavedQuery};
use crate::server::AppState;

/// `{"message": ...}` error body with a status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        Self { status: err.status_code(), message: err.message() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a store call on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!(error = %e, "blocking task failed");
            ApiError::internal(format!("internal task failure: {e}"))
        })?
        .map_err(|e| {
            warn!(code = e.error_code(), error = %e, "request failed");
            ApiError::from(e)
        })
}

/// Unwrap a JSON body or turn the rejection into a 400
fn body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected request body");
        ApiError::bad_request(rejection.body_text())
    })
}

/// A required, non-empty string field
fn required_str(body: &Value, field: &str, message: &str) -> Result<String, ApiError> {
    match body.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => {
            warn!(field, "missing required field");
            Err(ApiError::bad_request(message))
        }
    }
}

fn row_values(body: Value) -> Result<RowRecord, ApiError> {
    serde_json::from_value(body).map_err(|_| ApiError::bad_request("Row values must be a JSON object"))
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

// ── Catalog and rows ─────────────────────────────────────────────

/// `GET /api/tables`
pub async fn list_tables(State(state): State<AppState>) -> ApiResult<Vec<TableDescriptor>> {
    let catalog = state.catalog.clone();
    blocking(move || catalog.list_tables()).await.map(Json)
}

/// `GET /api/tables/{name}/schema`
pub async fn table_schema(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Vec<ColumnDescriptor>> {
    let catalog = state.catalog.clone();
    blocking(move || catalog.describe_table(&name)).await.map(Json)
}

/// `GET /api/tables/{name}/data?limit&offset`
pub async fn table_data(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Page> {
    let request = PageRequest::parse(
        params.get("limit").map(String::as_str),
        params.get("offset").map(String::as_str),
    );
    let pages = state.pages.clone();
    blocking(move || pages.page(&name, request)).await.map(Json)
}

/// `POST /api/tables/{name}/rows`
pub async fn insert_row(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let values = row_values(body(payload)?)?;
    let mutator = state.mutator.clone();
    blocking(move || mutator.insert_row(&name, &values)).await?;
    Ok(success())
}

/// `PUT /api/tables/{name}/rows/{id}`
pub async fn update_row(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let values = row_values(body(payload)?)?;
    let id = RowId::from(id.as_str());
    let mutator = state.mutator.clone();
    blocking(move || mutator.update_row(&name, &id, &values)).await?;
    Ok(success())
}

/// `DELETE /api/tables/{name}/rows/{id}`
pub async fn delete_row(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let id = RowId::from(id.as_str());
    let mutator = state.mutator.clone();
    blocking(move || mutator.delete_row(&name, &id)).await?;
    Ok(success())
}

// ── Raw SQL ──────────────────────────────────────────────────────

/// Every failure here is reported as 400
pub async fn execute_query(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<QueryResult> {
    let sql = required_str(&body(payload)?, "sql", "SQL query is required")?;
    let executor = state.executor.clone();

    blocking(move || executor.execute(&sql))
        .await
        .map(Json)
        .map_err(|e| ApiError { status: StatusCode::BAD_REQUEST, ..e })
}

// ── Assistant ────────────────────────────────────────────────────

/// `POST /api/ai/generate` with `{prompt, tableSchema?}`
pub async fn ai_generate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<AIResponse> {
    let body = body(payload)?;
    let prompt = required_str(&body, "prompt", "Prompt is required")?;
    let table_schema = body.get("tableSchema").and_then(Value::as_str);

    Ok(Json(state.gateway.generate(&prompt, table_schema).await))
}

/// `POST /api/ai/optimize` with `{sqlQuery}`
pub async fn ai_optimize(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<AIResponse> {
    let sql = required_str(&body(payload)?, "sqlQuery", "SQL query is required")?;
    Ok(Json(state.gateway.optimize(&sql).await))
}

/// `POST /api/ai/explain` with `{sqlQuery}`
pub async fn ai_explain(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<AIResponse> {
    let sql = required_str(&body(payload)?, "sqlQuery", "SQL query is required")?;
    Ok(Json(state.gateway.explain(&sql).await))
}

// ── Saved queries ────────────────────────────────────────────────

/// `GET /api/queries?userId`
pub async fn list_queries(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<SavedQuery>> {
    state
        .saved
        .list(params.get("userId").map(String::as_str))
        .map(Json)
        .map_err(ApiError::from)
}

/// `POST /api/queries` with `{name, sql, userId?}`
pub async fn save_query(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<SavedQuery> {
    let new: NewSavedQuery = serde_json::from_value(body(payload)?)
        .map_err(|e| ApiError::bad_request(format!("Invalid saved query: {e}")))?;
    state.saved.save(new).map(Json).map_err(ApiError::from)
}

/// `DELETE /api/queries/{id}`
pub async fn delete_query(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    state.saved.delete(&id).map_err(ApiError::from)?;
    Ok(success())
}

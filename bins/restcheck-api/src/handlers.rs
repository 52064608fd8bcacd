// HTTP route handlers for the restcheck reporting API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use restcheck_common::sqlite::{self, ExecutionRecord, StoredResult};
use restcheck_common::types::{format_duration, ExecutionSummary};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{metrics, AppState};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(String),
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => {
                error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// One-based paging as shown on the dashboard
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageParams {
    fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultsPage {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
    pub results: Vec<StoredResult>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionDetail {
    pub id: i64,
    pub name: String,
    pub summary: Option<ExecutionSummary>,
    pub pass_rate: Option<f64>,
    pub avg_duration: Option<String>,
    pub status_distribution: BTreeMap<String, u64>,
}

pub fn query_execution(conn: &Connection, id: i64) -> Result<ExecutionDetail, ApiError> {
    let name = sqlite::execution_name(conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("execution {id} not found")))?;
    let summary = sqlite::fetch_summary(conn, id)?;
    let status_distribution = sqlite::status_counts(conn, id)?
        .into_iter()
        .map(|(status, count)| (status.to_string(), count))
        .collect();

    Ok(ExecutionDetail {
        id,
        name,
        pass_rate: summary.as_ref().map(ExecutionSummary::pass_rate),
        avg_duration: summary.as_ref().map(|s| format_duration(s.avg_duration_seconds)),
        summary,
        status_distribution,
    })
}

pub fn query_results(
    conn: &Connection,
    execution_id: Option<i64>,
    params: PageParams,
) -> Result<ResultsPage, ApiError> {
    if let Some(id) = execution_id {
        if sqlite::execution_name(conn, id)?.is_none() {
            return Err(ApiError::NotFound(format!("execution {id} not found")));
        }
    }

    let params = params.normalized();
    let total = sqlite::count_results(conn, execution_id)?;
    let results = sqlite::fetch_results(conn, execution_id, params.page - 1, params.page_size)?;

    Ok(ResultsPage {
        page: params.page,
        page_size: params.page_size,
        total,
        total_pages: total.div_ceil(u64::from(params.page_size)),
        results,
    })
}

/// Run a query against the results database on the blocking pool
async fn with_db<T, F>(state: &AppState, query: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
{
    let path = state.db_path.clone();
    tokio::task::spawn_blocking(move || {
        let conn = sqlite::open(&path)?;
        query(&conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("query task failed: {e}")))?
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "time": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /executions - All runs, most recent first
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ExecutionRecord>>, ApiError> {
    let executions = with_db(&state, |conn| Ok(sqlite::list_executions(conn)?)).await?;
    debug!(count = executions.len(), "Listed executions");
    Ok(Json(executions))
}

/// GET /executions/:id - Summary and status distribution of one run
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ExecutionDetail>, ApiError> {
    with_db(&state, move |conn| query_execution(conn, id)).await.map(Json)
}

/// GET /executions/:id/results - Paged results of one run
pub async fn execution_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<ResultsPage>, ApiError> {
    with_db(&state, move |conn| query_results(conn, Some(id), params))
        .await
        .map(Json)
}

/// GET /results - Paged results across all runs
pub async fn all_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<ResultsPage>, ApiError> {
    with_db(&state, move |conn| query_results(conn, None, params))
        .await
        .map(Json)
}

/// GET /metrics - Prometheus exposition
pub async fn metrics_handler() -> Result<String, ApiError> {
    metrics::render().map_err(|e| ApiError::Internal(e.to_string()))
}

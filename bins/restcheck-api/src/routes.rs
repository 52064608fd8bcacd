// Route table for the restcheck reporting API

use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::{handlers, metrics, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/executions", get(handlers::list_executions))
        .route("/executions/:id", get(handlers::get_execution))
        .route("/executions/:id/results", get(handlers::execution_results))
        .route("/results", get(handlers::all_results))
        .route("/metrics", get(handlers::metrics_handler))
        .route_layer(middleware::from_fn(metrics::track))
}

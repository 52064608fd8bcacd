mod handlers;
mod metrics;
mod routes;

use axum::Router;
use restcheck_common::config::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("restcheck API booting...");

    let settings = Settings::from_env();

    if let Err(e) = metrics::register() {
        error!(error = %e, "Failed to register metrics");
        std::process::exit(1);
    }

    // Make sure the schema exists before the first request
    if let Err(e) = restcheck_common::store::SqliteStore::open(&settings.db_path) {
        error!(path = %settings.db_path.display(), error = %e, "Failed to open results database");
        std::process::exit(1);
    }
    info!(path = %settings.db_path.display(), "Results database ready");

    let state = Arc::new(AppState {
        db_path: settings.db_path.clone(),
    });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let listener = match TcpListener::bind(&settings.api_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %settings.api_addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    info!("HTTP server listening on {}", settings.api_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

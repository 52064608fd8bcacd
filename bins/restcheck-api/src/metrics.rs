// Prometheus counters for the reporting API

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("restcheck_api_requests_total", "HTTP requests served, by route and status"),
        &["route", "status"],
    )
    .expect("valid metric definition");
}

/// Register every collector with the API registry. Call once at startup.
pub fn register() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(HTTP_REQUESTS.clone()))
}

/// Middleware counting requests per matched route
pub async fn track(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    HTTP_REQUESTS
        .with_label_values(&[route.as_str(), response.status().as_str()])
        .inc();
    response
}

/// Text exposition of the registry
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counter() {
        let _ = register();
        HTTP_REQUESTS.with_label_values(&["/health", "200"]).inc();

        let text = render().unwrap();

        assert!(text.contains("restcheck_api_requests_total"));
        assert!(text.contains(r#"route="/health""#));
    }
}

/// Request Engine - Dispatch of a Single HTTP Request
///
/// **Core Responsibility:**
/// Send one test case's request and capture the raw response.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to talk HTTP (reqwest, headers, JSON bodies, Basic auth)
/// - Engine does NOT know expectations
/// - Engine does NOT decide pass/fail
/// - Engine returns raw responses for the Evaluator to judge
///
/// **Measurements:**
/// - Duration: wall-clock seconds around the network call, including the body read
/// - Size: byte length of the decoded response text
///
/// Transport failures come back as a `DispatchFailure`: the typed
/// `TransportError` plus the time spent before the call gave up. Its message
/// carries the whole cause chain (timeout, refused connection, DNS, TLS).

use crate::auth::BasicCredential;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use restcheck_common::types::HttpMethod;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Raw response handed to the evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub response: HttpResponse,
    pub duration_seconds: f64,
    pub size_bytes: u64,
}

/// Everything needed to put one request on the wire
#[derive(Debug, Clone)]
pub struct DispatchRequest<'a> {
    pub method: HttpMethod,
    pub base_url: &'a str,
    pub endpoint: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub body: Option<&'a Value>,
    pub credential: Option<&'a BasicCredential>,
}

impl DispatchRequest<'_> {
    /// Base URL and endpoint are joined as-is, no slash normalisation
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("Request failed: {}", error_chain(.0))]
    Send(#[source] reqwest::Error),
    #[error("Failed to read response: {}", error_chain(.0))]
    Read(#[source] reqwest::Error),
}

/// A transport error together with the wall-clock time it took to surface
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct DispatchFailure {
    #[source]
    pub error: TransportError,
    pub duration_seconds: f64,
}

/// Render an error and its sources joined with `": "`.
///
/// A cause whose text already appears in the message so far is skipped.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Anything that can execute a dispatch request.
#[allow(async_fn_in_trait)]
pub trait HttpEngine {
    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<Dispatched, DispatchFailure>;
}

pub fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

/// Production engine backed by a shared reqwest client
pub struct ReqwestEngine {
    client: reqwest::Client,
}

impl ReqwestEngine {
    /// `timeout` is passed straight to the client; `None` keeps reqwest's default
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    fn build(&self, request: &DispatchRequest<'_>) -> Result<reqwest::RequestBuilder, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url());

        for (name, value) in request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.header(header_name, header_value);
        }

        if let Some(credential) = request.credential {
            builder = builder.basic_auth(&credential.username, Some(&credential.password));
        }

        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        Ok(builder)
    }
}

impl HttpEngine for ReqwestEngine {
    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<Dispatched, DispatchFailure> {
        let started = Instant::now();
        let failed = |error| DispatchFailure {
            error,
            duration_seconds: started.elapsed().as_secs_f64(),
        };

        let builder = self.build(request).map_err(failed)?;

        debug!(
            method = %request.method,
            url = %request.url(),
            headers = request.headers.len(),
            has_body = request.body.is_some(),
            basic_auth = request.credential.is_some(),
            "Dispatching request"
        );

        let response = builder
            .send()
            .await
            .map_err(|e| failed(TransportError::Send(e)))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| failed(TransportError::Read(e)))?;
        let duration_seconds = started.elapsed().as_secs_f64();

        let size_bytes = body.len() as u64;
        Ok(Dispatched {
            response: HttpResponse {
                status,
                content_type,
                body,
            },
            duration_seconds,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_is_plain_concatenation() {
        let headers = BTreeMap::new();
        let request = DispatchRequest {
            method: HttpMethod::Get,
            base_url: "http://localhost:8080/",
            endpoint: "/users",
            headers: &headers,
            body: None,
            credential: None,
        };

        assert_eq!(request.url(), "http://localhost:8080//users");
    }

    #[test]
    fn test_method_mapping() {
        for method in HttpMethod::ALL {
            assert_eq!(to_reqwest_method(method).as_str(), method.as_str());
        }
    }

    #[test]
    fn test_invalid_header_is_a_transport_error() {
        let engine = ReqwestEngine::new(None).unwrap();
        let headers = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        let request = DispatchRequest {
            method: HttpMethod::Get,
            base_url: "http://localhost",
            endpoint: "/",
            headers: &headers,
            body: None,
            credential: None,
        };

        let err = engine.build(&request).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { ref name, .. } if name == "bad header"));
        assert!(err.to_string().starts_with("Invalid header `bad header`"));
    }

    #[derive(Debug)]
    struct Layer {
        message: &'static str,
        source: Option<Box<Layer>>,
    }

    impl std::fmt::Display for Layer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source.as_deref().map(|s| s as &(dyn std::error::Error + 'static))
        }
    }

    fn layer(message: &'static str, source: Option<Layer>) -> Layer {
        Layer {
            message,
            source: source.map(Box::new),
        }
    }

    #[test]
    fn test_error_chain_joins_causes() {
        let err = layer(
            "error sending request",
            Some(layer("client error (Connect)", Some(layer("Connection refused", None)))),
        );

        assert_eq!(
            error_chain(&err),
            "error sending request: client error (Connect): Connection refused"
        );
    }

    #[test]
    fn test_error_chain_skips_repeated_text() {
        let err = layer("tcp connect error: Connection refused", Some(layer("Connection refused", None)));

        assert_eq!(error_chain(&err), "tcp connect error: Connection refused");
    }
}

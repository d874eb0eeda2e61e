//! Monitoring API client.
//!
//! Issues one GET per operation against a fixed base URL with the configured
//! API key appended to the query, and classifies failures into [`ApiError`].
//! Failures are logged with full detail; callers show
//! [`ApiError::user_message`] to the end user.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_BASE_URL: &str = "https://monitoringapi.solaredge.com";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("could not reach the monitoring API: {0}")]
    Network(#[source] reqwest::Error),
    #[error("requested date range exceeds the maximum for this time unit: {body}")]
    DateRangeTooLong { body: String },
    #[error("monitoring API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("monitoring API returned a body that is not JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl ApiError {
    /// Short text suitable for the end user. Never includes response bodies.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::MissingApiKey => {
                "API key not found in configuration. Please configure it.".to_string()
            }
            ApiError::Network(_) => {
                "Could not connect to the SolarEdge API. Please try again later.".to_string()
            }
            ApiError::DateRangeTooLong { .. } => {
                "The selected period is too long for this time unit. Please shorten the date range."
                    .to_string()
            }
            ApiError::Http { status, .. } => format!("An API error occurred (HTTP {status})."),
            ApiError::InvalidBody(_) => {
                "The SolarEdge API returned a response that could not be read.".to_string()
            }
        }
    }
}

/// Classify a 4xx/5xx response.
pub fn classify(status: u16, body: &str) -> ApiError {
    let lower = body.to_lowercase();
    if status == 403 && lower.contains("date range") && lower.contains("maximum") {
        ApiError::DateRangeTooLong {
            body: body.to_string(),
        }
    } else {
        ApiError::Http {
            status,
            body: body.to_string(),
        }
    }
}

/// Client for the monitoring REST API.
#[derive(Clone)]
pub struct Gateway {
    /// Injected from configuration, never from user input.
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Gateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// GET `<base>/<endpoint>` with `query` plus the API key.
    pub async fn call(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value, ApiError> {
        let result = match self.api_key.as_deref() {
            Some(key) => self.fetch(endpoint, query, key).await,
            None => Err(ApiError::MissingApiKey),
        };

        if let Err(e) = &result {
            error!(endpoint, error = %e, "monitoring API call failed");
        }
        result
    }

    async fn fetch(
        &self,
        endpoint: &str,
        query: &[(String, String)],
        api_key: &str,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!(endpoint, params = query.len(), "calling monitoring API");

        // The key travels in the URL, so strip it from transport errors.
        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("api_key", api_key)])
            .send()
            .await
            .map_err(|e| ApiError::Network(e.without_url()))?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    let e = e.without_url();
                    warn!(endpoint, status = status.as_u16(), error = %e, "could not read error body");
                    format!("<unreadable response body: {e}>")
                }
            };
            return Err(classify(status.as_u16(), &body));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.without_url()))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn classify_date_range_too_long() {
        let err = classify(403, "Date range exceeds MAXIMUM allowed for time unit DAY");
        assert!(matches!(err, ApiError::DateRangeTooLong { .. }));
    }

    #[test]
    fn classify_unrelated_403_is_generic() {
        let err = classify(403, "Invalid token");
        assert!(matches!(err, ApiError::Http { status: 403, .. }));
    }

    #[test]
    fn classify_requires_both_phrases() {
        assert!(matches!(classify(403, "date range invalid"), ApiError::Http { .. }));
        assert!(matches!(classify(403, "maximum exceeded"), ApiError::Http { .. }));
    }

    #[test]
    fn classify_date_range_text_on_other_status_is_generic() {
        let err = classify(400, "date range exceeds maximum");
        assert!(matches!(err, ApiError::Http { status: 400, .. }));
    }

    #[test]
    fn user_message_surfaces_status() {
        let err = ApiError::Http { status: 502, body: "upstream secret detail".into() };
        let msg = err.user_message();
        assert!(msg.contains("502"));
        assert!(!msg.contains("secret"));
    }

    #[tokio::test]
    async fn call_injects_api_key_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/site/1/energy"))
            .and(query_param("api_key", "k3y"))
            .and(query_param("timeUnit", "DAY"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"energy": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gw = Gateway::new(server.uri(), Some("k3y".into()));
        let body = gw
            .call("site/1/energy", &[("timeUnit".into(), "DAY".into())])
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"energy": {}}));
    }

    #[tokio::test]
    async fn call_classifies_date_range_403() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string("Requested Date range exceeds the Maximum allowed"),
            )
            .mount(&server)
            .await;

        let gw = Gateway::new(server.uri(), Some("k".into()));
        let err = gw.call("site/1/power", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::DateRangeTooLong { .. }));
    }

    #[tokio::test]
    async fn call_classifies_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let gw = Gateway::new(server.uri(), Some("k".into()));
        let err = gw.call("site/1/details", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn call_without_api_key_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gw = Gateway::new(server.uri(), Some("   ".into()));
        assert!(!gw.has_api_key());
        let err = gw.call("sites/list", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingApiKey));
    }

    #[tokio::test]
    async fn call_reports_network_error_when_unreachable() {
        let gw = Gateway::new("http://127.0.0.1:1", Some("k".into()));
        let err = gw.call("sites/list", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert!(!err.to_string().contains("api_key"));
    }

    #[tokio::test]
    async fn call_rejects_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let gw = Gateway::new(server.uri(), Some("k".into()));
        let err = gw.call("sites/list", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn truncated_error_body_is_kept_in_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            // Promises 100 bytes, sends fewer, then hangs up.
            socket
                .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 100\r\n\r\ndate range maximum")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let gw = Gateway::new(format!("http://{addr}"), Some("k".into()));
        let err = gw.call("site/1/power", &[]).await.unwrap_err();
        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("unreadable response body"));
                assert!(!body.contains("api_key"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn debug_redacts_api_key() {
        let gw = Gateway::new("http://x/", Some("topsecret".into()));
        let dbg = format!("{gw:?}");
        assert!(!dbg.contains("topsecret"));
        assert!(dbg.contains("http://x"));
    }
}

//! Upstream tracking source interface and the HTTP batch client.

use crate::config::UpstreamConfig;
use crate::errors::FetchError;
use crate::models::{TrackKey, TrackRecord};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Source of tracking data, queried one batch at a time.
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Fetches records for `keys` in a single upstream call. A key absent
    /// from the returned map is "not found", not an error.
    async fn fetch_batch(
        &self,
        cancel: &CancellationToken,
        keys: &[TrackKey],
    ) -> Result<HashMap<TrackKey, TrackRecord>, FetchError>;

    async fn health(&self, cancel: &CancellationToken) -> Result<(), FetchError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct BatchTrackRequest {
    track_codes: Vec<TrackKey>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BatchTrackResponse {
    results: HashMap<TrackKey, TrackRecord>,
}

/// Batch client for an HTTP tracking backend.
///
/// `POST {base_url}/track/batch` with `{"track_codes": [...]}`; the response
/// maps each recognized code to its record. The timeout covers the whole
/// request/response cycle including body collection.
pub struct HttpTrackSource {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    timeout: Duration,
}

impl HttpTrackSource {
    pub fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<(hyper::StatusCode, Bytes), FetchError> {
        let response = timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| FetchError::Timeout(self.base_url.clone()))?
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?
            .to_bytes();

        Ok((status, body))
    }
}

#[async_trait]
impl TrackSource for HttpTrackSource {
    async fn fetch_batch(
        &self,
        cancel: &CancellationToken,
        keys: &[TrackKey],
    ) -> Result<HashMap<TrackKey, TrackRecord>, FetchError> {
        if keys.is_empty() {
            return Err(FetchError::EmptyBatch);
        }

        let body = serde_json::to_vec(&BatchTrackRequest {
            track_codes: keys.to_vec(),
        })
        .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("{}/track/batch", self.base_url))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        let (status, body) = tokio::select! {
            sent = self.send(request) => sent?,
            _ = cancel.cancelled() => {
                return Err(FetchError::RequestFailed("fetch cancelled".to_string()));
            }
        };

        if status.is_client_error() {
            // the upstream names the offending code in its body
            let message = String::from_utf8_lossy(&body).trim().to_string();
            return Err(FetchError::InvalidCode(message));
        }
        if !status.is_success() {
            return Err(FetchError::RequestFailed(format!(
                "upstream returned {status}"
            )));
        }

        let parsed: BatchTrackResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        Ok(parsed.results)
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("{}/health", self.base_url))
            .body(Full::new(Bytes::new()))
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        let (status, _body) = tokio::select! {
            sent = self.send(request) => sent?,
            _ = cancel.cancelled() => {
                return Err(FetchError::RequestFailed("health probe cancelled".to_string()));
            }
        };

        if !status.is_success() {
            return Err(FetchError::RequestFailed(format!(
                "upstream health returned {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackEvent;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpTrackSource {
        HttpTrackSource::new(&UpstreamConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        })
    }

    fn record() -> TrackRecord {
        TrackRecord {
            countries: vec!["China".into(), "Russia".into()],
            events: vec![TrackEvent {
                status: "Package received".into(),
                date: "2024-03-01T10:00:00Z".into(),
            }],
        }
    }

    #[tokio::test]
    async fn fetch_batch_parses_results() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/track/batch"))
            .and(body_json(serde_json::json!({
                "track_codes": ["LK1", "LK2"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {
                    "LK1": record(),
                }
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let results = source
            .fetch_batch(&CancellationToken::new(), &["LK1".into(), "LK2".into()])
            .await
            .unwrap();

        // LK2 absent from the map means "not found", not an error
        assert_eq!(results.len(), 1);
        assert_eq!(results.get("LK1"), Some(&record()));
        assert!(!results.contains_key("LK2"));
    }

    #[tokio::test]
    async fn upstream_rejection_is_a_client_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/track/batch"))
            .respond_with(ResponseTemplate::new(400).set_body_string("code must be alphanumeric"))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let error = source
            .fetch_batch(&CancellationToken::new(), &["bad key".into()])
            .await
            .unwrap_err();

        assert!(error.is_client_error());
        assert_eq!(
            error.to_string(),
            "invalid tracking code format: code must be alphanumeric"
        );
    }

    #[tokio::test]
    async fn upstream_server_error_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/track/batch"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let error = source
            .fetch_batch(&CancellationToken::new(), &["LK1".into()])
            .await
            .unwrap_err();

        assert!(!error.is_client_error());
        assert!(matches!(error, FetchError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn empty_batch_never_hits_the_network() {
        let source = HttpTrackSource::new(&UpstreamConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
        });

        let error = source
            .fetch_batch(&CancellationToken::new(), &[])
            .await
            .unwrap_err();
        assert!(matches!(error, FetchError::EmptyBatch));
        assert!(error.is_client_error());
    }

    #[tokio::test]
    async fn health_checks_the_upstream_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let source = source_for(&server);
        source.health(&CancellationToken::new()).await.unwrap();
    }
}

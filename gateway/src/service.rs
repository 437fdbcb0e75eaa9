//! Request handling and the error-string → status-code mapping.

use crate::GatewayError;
use crate::metrics_defs::{REQUEST_DURATION, TRACK_REQUESTS};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::http::make_error_response;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracker::service::TrackingService;

#[derive(Clone)]
pub struct GatewayService {
    tracking: Arc<TrackingService>,
}

impl GatewayService {
    pub fn new(tracking: Arc<TrackingService>) -> Self {
        Self { tracking }
    }
}

impl<B> Service<Request<B>> for GatewayService
where
    B: Send + 'static,
{
    type Response = Response<Full<Bytes>>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let tracking = self.tracking.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        Box::pin(async move {
            let started = Instant::now();
            let response = route(tracking, &method, &path).await;
            metrics::histogram!(
                REQUEST_DURATION.name,
                "status" => response.status().as_u16().to_string(),
            )
            .record(started.elapsed().as_secs_f64());
            Ok(response.map(Full::new))
        })
    }
}

async fn route(tracking: Arc<TrackingService>, method: &Method, path: &str) -> Response<Bytes> {
    if method != Method::GET {
        return make_error_response(StatusCode::METHOD_NOT_ALLOWED, "only GET method is supported");
    }

    match path {
        "/" => service_info(),
        "/health" => health(tracking).await,
        _ => match path.strip_prefix("/track/") {
            Some(code) if !code.is_empty() && !code.contains('/') => {
                track(tracking, code.trim()).await
            }
            Some(_) => make_error_response(StatusCode::BAD_REQUEST, "track_code is required"),
            None => make_error_response(StatusCode::NOT_FOUND, "not found"),
        },
    }
}

async fn track(tracking: Arc<TrackingService>, code: &str) -> Response<Bytes> {
    metrics::counter!(TRACK_REQUESTS.name).increment(1);

    let cancel = CancellationToken::new();
    let mut rx = tracking.track_package(&cancel, code).await;

    let Some(response) = rx.recv().await else {
        return make_error_response(StatusCode::INTERNAL_SERVER_ERROR, "no response produced");
    };

    if !response.status {
        let message = response.error.as_deref().unwrap_or("unknown error");
        return make_error_response(status_code_for_error(message), message);
    }

    json_response(StatusCode::OK, &response)
}

async fn health(tracking: Arc<TrackingService>) -> Response<Bytes> {
    match tracking.health(&CancellationToken::new()).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &serde_json::json!({
                "status": true,
                "message": "service is healthy",
            }),
        ),
        Err(error) => make_error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &format!("service unhealthy: {error}"),
        ),
    }
}

fn service_info() -> Response<Bytes> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "trackgate",
            "endpoints": {
                "track": "GET /track/{trackCode}",
                "health": "GET /health",
            },
        }),
    )
}

/// Maps a response error string onto an HTTP status per the public contract.
/// Matching is by substring so wrapped messages still classify.
fn status_code_for_error(message: &str) -> StatusCode {
    if message.contains("tracking code not found") {
        StatusCode::NOT_FOUND
    } else if message.contains("invalid tracking code format") {
        StatusCode::BAD_REQUEST
    } else if message.contains("tracking service temporarily unavailable") {
        StatusCode::SERVICE_UNAVAILABLE
    } else if message.contains("request timeout") || message.contains("request cancelled") {
        StatusCode::REQUEST_TIMEOUT
    } else if message.contains("too many requests") || message.contains("service busy") {
        StatusCode::TOO_MANY_REQUESTS
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => Bytes::from(bytes),
        Err(error) => {
            tracing::error!(error = %error, "response serialization failed");
            return make_error_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization failure");
        }
    };

    let mut response = Response::new(bytes);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

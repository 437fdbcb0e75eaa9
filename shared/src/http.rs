use hyper::StatusCode;
use hyper::body::Body;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Accepts connections on `host:port` and hands each one to `service` until
/// `shutdown` is cancelled. In-flight connections are left to finish on their
/// own tasks.
pub async fn run_http_service<S, B, E>(
    host: &str,
    port: u16,
    service: S,
    shutdown: CancellationToken,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<B>, Error = E> + Send + Sync + 'static,
    S::Future: Send + 'static,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    let service_arc = Arc::new(service);

    loop {
        let (stream, _peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => {
                tracing::info!("listener shutting down");
                return Ok(());
            }
        };

        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            let _ = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await;
        });
    }
}

/// Creates an error response with a JSON `{"status": false, "error": ...}` body.
pub fn make_error_response(status_code: StatusCode, message: &str) -> Response<Bytes> {
    let body = serde_json::json!({
        "status": false,
        "error": message,
    });

    let mut response = Response::new(Bytes::from(body.to_string()));
    *response.status_mut() = status_code;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_carries_json_body() {
        let response = make_error_response(StatusCode::NOT_FOUND, "no such tracking code");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let parsed: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(parsed["status"], false);
        assert_eq!(parsed["error"], "no such tracking code");
    }
}

//! HTTP/1.1 over the engine's Unix socket.
//!
//! Every request opens its own connection and drops it once the body has
//! been read. Nothing is pooled.

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::error::DeveError;

use super::request::EngineRequest;
use super::response::EngineResponse;

/// Send one request and read the whole response.
pub async fn send(
    socket_path: &Path,
    api_version: &str,
    request: EngineRequest,
) -> Result<EngineResponse, DeveError> {
    let operation = request.operation;
    let uri = request.uri(api_version);
    let start = Instant::now();

    let stream = UnixStream::connect(socket_path).await.map_err(|e| {
        DeveError::unavailable(
            operation,
            format!("failed to connect to {}: {}", socket_path.display(), e),
        )
    })?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| DeveError::unavailable(operation, format!("HTTP handshake failed: {}", e)))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "Engine connection closed with error");
        }
    });

    let builder = Request::builder()
        .method(request.method.clone())
        .uri(&uri)
        .header("Host", "localhost");

    let http_request = match request.body {
        Some(body) => {
            trace!(operation, body = %String::from_utf8_lossy(&body), "Engine request body");
            builder
                .header("Content-Type", "application/json")
                .header("Content-Length", body.len())
                .body(Full::new(Bytes::from(body)))
        }
        None => builder.body(Full::new(Bytes::new())),
    }
    .map_err(|e| DeveError::unavailable(operation, format!("failed to build request: {}", e)))?;

    debug!(operation, method = %request.method, uri = %uri, "Sending engine request");

    let response = sender
        .send_request(http_request)
        .await
        .map_err(|e| DeveError::unavailable(operation, format!("request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| DeveError::unavailable(operation, format!("failed to read response: {}", e)))?
        .to_bytes();

    debug!(
        operation,
        status = status.as_u16(),
        bytes = body.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Engine responded"
    );
    trace!(operation, body = %String::from_utf8_lossy(&body), "Engine response body");

    Ok(EngineResponse::new(operation, status, body))
}

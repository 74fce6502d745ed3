//! Forwarding middleware for requests arriving over HTTPS.
//!
//! The host dispatcher normally sees plain-HTTP traffic. Requests reaching it
//! through the proxy are marked with `X-Forwarded-Proto: https` and the TLS
//! peer's address, run inside an `https_request` span with a fresh UUID v4,
//! and answer with that id in `X-Request-Id`.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderName, HeaderValue};
use axum::{middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID inserted into request extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub Uuid);

/// Mark a request as forwarded from the TLS listener and log its completion.
pub async fn https_forwarding(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let span = tracing::info_span!(
        "https_request",
        request_id = %request_id,
        peer = tracing::field::Empty,
        method = %request.method(),
        path = %request.uri().path(),
        duration_ms = tracing::field::Empty,
    );

    let headers = request.headers_mut();
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
    if let Some(peer) = peer {
        span.record("peer", tracing::field::display(peer));
        // Keep any chain the client already sent.
        let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, peer.ip()),
            None => peer.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    request.extensions_mut().insert(RequestId(request_id));

    let start = Instant::now();
    async move {
        let mut response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::debug!(
            status = response.status().as_u16(),
            duration_ms,
            "HTTPS request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
    .instrument(span)
    .await
}

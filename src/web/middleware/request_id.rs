//! Per-request tracing spans with request IDs.
//!
//! An incoming `X-Request-Id` header is reused so logs correlate with an
//! upstream proxy; otherwise a ULID is generated. The resolved ID is always
//! echoed back in the `X-Request-Id` response header.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::response::Response;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

static REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID accepted verbatim.
const MAX_UPSTREAM_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

/// Upstream request ID if present and sane, else a fresh ULID.
fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_UPSTREAM_ID_LEN)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string())
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let req_id = resolve_request_id(&req);
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let span = tracing::info_span!("request", req_id = %req_id);
        let start = Instant::now();

        let future = self.inner.call(req);
        let header_value = HeaderValue::from_str(&req_id).ok();

        Box::pin(
            async move {
                let mut result = future.await;
                let duration_ms = start.elapsed().as_millis() as u64;

                // Louder logs for worse outcomes.
                match &result {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        match status {
                            200..=399 => {
                                tracing::debug!(method = %method, path = %path, status, duration_ms, "Response");
                            }
                            400..=499 => {
                                tracing::info!(method = %method, path = %path, status, duration_ms, "Response");
                            }
                            _ => {
                                tracing::warn!(method = %method, path = %path, status, duration_ms, "Response");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(method = %method, path = %path, error = ?e, duration_ms, "Request failed");
                    }
                }

                if let Ok(ref mut response) = result
                    && let Some(value) = header_value
                {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }

                result
            }
            .instrument(span),
        )
    }
}

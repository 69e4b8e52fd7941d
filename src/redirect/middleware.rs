use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// When the redirect server first saw the request. Feeds the
/// `x-linkcrush-timing-total-ms` header.
#[derive(Debug, Copy, Clone)]
pub struct RequestStart(pub Instant);

impl RequestStart {
    pub fn elapsed_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

pub async fn record_request_start(mut request: Request, next: Next) -> Response {
    request
        .extensions_mut()
        .insert(RequestStart(Instant::now()));
    next.run(request).await
}

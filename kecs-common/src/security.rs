use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};

/// Baseline response headers for an HTTP front door that also serves a
/// bundled WebUI console (spec.md §4.7's middleware chain step 3).
pub async fn headers(req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let h = res.headers_mut();
    h.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    h.insert("x-frame-options", HeaderValue::from_static("DENY"));
    h.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    res
}

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{HeaderMap, Request, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::{net::IpAddr, time::SystemTime};
use uuid::Uuid;

/// Stored per-request in `request.extensions()` by the access-log middleware.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub client_ip: Option<IpAddr>,
    pub received_at: SystemTime,
}

pub struct RequestContextExtractor(pub RequestContext);

impl std::ops::Deref for RequestContextExtractor {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for RequestContextExtractor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(RequestContextExtractor)
            .ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "RequestContext missing (did you add the middleware?)",
            ))
    }
}

pub async fn attach(mut req: Request<Body>, next: Next) -> Response {
    let headers = req.headers();
    let request_id = extract_request_id(headers).unwrap_or_else(Uuid::new_v4);
    let client_ip = extract_client_ip(headers);
    let ctx = RequestContext {
        request_id,
        client_ip,
        received_at: SystemTime::now(),
    };
    req.extensions_mut().insert(ctx);
    let mut res = next.run(req).await;
    if let Ok(v) = request_id.to_string().parse() {
        res.headers_mut().insert("x-request-id", v);
    }
    res
}

fn extract_request_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("x-amzn-requestid")
        .or_else(|| headers.get("x-request-id"))
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

pub fn extract_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(ip) = xff
            .split(',')
            .map(|s| s.trim())
            .find_map(|s| s.parse::<IpAddr>().ok())
    {
        return Some(ip);
    }
    if let Some(xri) = headers.get("x-real-ip").and_then(|v| v.to_str().ok())
        && let Ok(ip) = xri.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }
    None
}

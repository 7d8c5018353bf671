//! Transparent forwarding to the colocated LocalStack instance (spec.md
//! §4.7 step 3 / §6): any inbound AWS-SDK request that isn't ECS, ELBv2, or
//! Service Discovery is proxied verbatim — method, path, headers, body.

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::app::AppState;

pub async fn forward(app: &AppState, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let target = format!(
        "{}{}",
        app.args.localstack_endpoint.trim_end_matches('/'),
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
    );

    let mut req = app.http.request(method, target.as_str()).body(body);
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        req = req.header(name.clone(), value.clone());
    }

    match req.send().await {
        Ok(resp) => {
            let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut out_headers = HeaderMap::new();
            for (name, value) in resp.headers().iter() {
                if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes())
                    && let Ok(value) = HeaderValue::from_bytes(value.as_bytes())
                {
                    out_headers.insert(name, value);
                }
            }
            let body = resp.bytes().await.unwrap_or_default();
            (status, out_headers, body).into_response()
        }
        Err(e) => {
            (StatusCode::BAD_GATEWAY, format!("LocalStack proxy error: {e}")).into_response()
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection" | "host" | "content-length" | "transfer-encoding" | "keep-alive" | "upgrade"
    )
}

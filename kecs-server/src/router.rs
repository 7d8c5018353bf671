//! HTTP front door (spec.md §4.7): one entry point classifies every inbound
//! request into ServiceDiscovery / ELBv2 / KECS log access / ECS / LocalStack
//! proxy, in that order, then dispatches.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use kecs_types::KecsError;

use crate::app::AppState;
use crate::handlers::{ecs, elbv2, logs, sd};
use crate::localstack_proxy;

const ECS_TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113.";

pub fn build(app: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", post(dispatch))
        .fallback(dispatch)
        .layer(axum::middleware::from_fn(kecs_common::security::headers))
        .layer(kecs_common::cors::dev())
        .layer(axum::middleware::from_fn(kecs_common::access_log::log))
        .layer(axum::middleware::from_fn(kecs_common::request_context::attach))
        .with_state(app)
}

async fn healthz() -> StatusCode {
    kecs_common::access_log::healthz()
}

async fn readyz() -> StatusCode {
    StatusCode::OK
}

enum Route {
    ServiceDiscovery(String),
    Elbv2,
    Logs,
    Ecs(String),
    Proxy,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn classify(headers: &HeaderMap, uri: &Uri, form_action: Option<&str>) -> Route {
    if let Some(target) = header_str(headers, "x-amz-target") {
        if target.contains("ServiceDiscovery") || target.starts_with("Route53AutoNaming_") {
            let op = target.rsplit('.').next().unwrap_or(target).to_string();
            return Route::ServiceDiscovery(op);
        }
        if target.contains("ElasticLoadBalancing") {
            return Route::Elbv2;
        }
        if target.ends_with(".GetTaskLogs") || target == "GetTaskLogs" {
            return Route::Logs;
        }
        if let Some(op) = target.strip_prefix(ECS_TARGET_PREFIX) {
            return Route::Ecs(op.to_string());
        }
        return Route::Proxy;
    }

    if uri.path().contains("elasticloadbalancing") {
        return Route::Elbv2;
    }
    if let Some(action) = form_action
        && elbv2::ACTIONS.contains(&action)
    {
        return Route::Elbv2;
    }
    Route::Proxy
}

/// Single handler for every method/path; enforces the inbound request
/// deadline (spec.md §5) around the actual work, then buffers the body once
/// up front (spec.md §4.7: "Bodies are read once and restored") since ELBv2
/// detection needs to peek at the form-encoded `Action=` parameter before
/// dispatch.
async fn dispatch(
    State(app): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let timeout = std::time::Duration::from_secs(app.args.request_timeout_secs);
    match tokio::time::timeout(timeout, dispatch_inner(app, method, uri, headers, body)).await {
        Ok(response) => response,
        Err(_) => (StatusCode::GATEWAY_TIMEOUT, "request deadline exceeded").into_response(),
    }
}

async fn dispatch_inner(
    app: AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let is_form = header_str(&headers, "content-type")
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let form: Option<BTreeMap<String, String>> =
        if is_form { serde_urlencoded::from_bytes(&body).ok() } else { None };
    let form_action = form.as_ref().and_then(|f| f.get("Action")).map(String::as_str);

    let route = classify(&headers, &uri, form_action);

    let result = match route {
        Route::ServiceDiscovery(op) => match parse_json(&body) {
            Ok(v) => sd::dispatch(&app, &op, v).await,
            Err(e) => Err(e),
        },
        Route::Elbv2 => {
            let Some(form) = form else {
                return kecs_common::response::wire_error(&KecsError::invalid(
                    "expected form-urlencoded ELBv2 request",
                ));
            };
            let Some(action) = form.get("Action").cloned() else {
                return kecs_common::response::wire_error(&KecsError::invalid("missing Action parameter"));
            };
            return match elbv2::dispatch(&app, &action, &form).await {
                Ok(xml) => (
                    StatusCode::OK,
                    [("content-type", "text/xml")],
                    xml,
                )
                    .into_response(),
                Err(e) => kecs_common::response::wire_error(&e),
            };
        }
        Route::Logs => match parse_json(&body) {
            Ok(v) => logs::get_task_logs(&app, v).await,
            Err(e) => Err(e),
        },
        Route::Ecs(op) => match parse_json(&body) {
            Ok(v) => ecs::dispatch(&app, &op, v).await,
            Err(e) => Err(e),
        },
        Route::Proxy => {
            return localstack_proxy::forward(&app, method, uri, headers, body).await;
        }
    };

    match result {
        Ok(value) => axum::Json(value).into_response(),
        Err(e) => kecs_common::response::wire_error(&e),
    }
}

fn parse_json(body: &Bytes) -> kecs_types::KecsResult<serde_json::Value> {
    if body.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| KecsError::invalid(format!("invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use kecs_common::args::ServerArgs;
    use tower::ServiceExt;

    fn test_args(home: &std::path::Path) -> ServerArgs {
        ServerArgs {
            port: 0,
            kube_context: String::new(),
            localstack_endpoint: "http://localhost:4566".to_string(),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            instance_name: "router-test".to_string(),
            home: Some(home.to_string_lossy().into_owned()),
            keep_clusters_on_shutdown: false,
            gc_interval_secs: 300,
            task_retention_secs: 3600,
            request_timeout_secs: 30,
            cluster_ready_timeout_secs: 60,
            localstack_ready_timeout_secs: 120,
        }
    }

    /// Drives a real request through the built `axum::Router` (middleware
    /// stack included) via `tower::ServiceExt::oneshot`, without binding a
    /// socket, rather than calling `classify` directly.
    #[tokio::test]
    async fn healthz_is_reachable_through_the_full_router() {
        let dir = tempfile::tempdir().unwrap();
        let app = AppState::new(test_args(dir.path()), tokio_util::sync::CancellationToken::new())
            .await
            .unwrap();
        let router = build(app);

        let response = router
            .oneshot(
                hyper::Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    fn headers_with_target(target: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("x-amz-target", target.parse().unwrap());
        h
    }

    #[test]
    fn ecs_target_routes_to_ecs_with_bare_operation() {
        let headers = headers_with_target("AmazonEC2ContainerServiceV20141113.RunTask");
        let route = classify(&headers, &"/".parse().unwrap(), None);
        assert!(matches!(route, Route::Ecs(op) if op == "RunTask"));
    }

    #[test]
    fn service_discovery_target_routes_by_suffix() {
        let headers = headers_with_target("Route53AutoNaming_v20170314.CreateService");
        let route = classify(&headers, &"/".parse().unwrap(), None);
        assert!(matches!(route, Route::ServiceDiscovery(op) if op == "CreateService"));
    }

    #[test]
    fn get_task_logs_routes_to_logs_despite_no_ecs_prefix() {
        let headers = headers_with_target("KecsExtensions.GetTaskLogs");
        let route = classify(&headers, &"/".parse().unwrap(), None);
        assert!(matches!(route, Route::Logs));
    }

    #[test]
    fn elbv2_form_action_routes_without_any_target_header() {
        let headers = HeaderMap::new();
        let route = classify(&headers, &"/".parse().unwrap(), Some("CreateLoadBalancer"));
        assert!(matches!(route, Route::Elbv2));
    }

    #[test]
    fn unrecognized_request_falls_back_to_proxy() {
        let headers = HeaderMap::new();
        let route = classify(&headers, &"/".parse().unwrap(), Some("CreateBucket"));
        assert!(matches!(route, Route::Proxy));
    }

    #[test]
    fn unknown_target_prefix_falls_back_to_proxy_not_ecs() {
        let headers = headers_with_target("AmazonS3.PutObject");
        let route = classify(&headers, &"/".parse().unwrap(), None);
        assert!(matches!(route, Route::Proxy));
    }
}

//! Maps `KecsError` to the AWS JSON-1.1 error envelope clients branch on:
//! `{"__type": "...", "message": "..."}` with the matching HTTP status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kecs_types::KecsError;
use owo_colors::OwoColorize;

pub fn print_error(e: &KecsError) {
    eprintln!("{} {:?}", "error:".red(), e);
}

pub fn wire_error(e: &KecsError) -> Response {
    print_error(e);
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "__type": e.wire_type(),
        "message": e.to_string(),
    });
    (status, Json(body)).into_response()
}

pub fn internal(msg: impl Into<String>) -> Response {
    wire_error(&KecsError::internal(msg))
}

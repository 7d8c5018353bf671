use axum::http::StatusCode;
use owo_colors::OwoColorize;

use crate::request_context::extract_client_ip;

pub async fn log(req: axum::extract::Request, next: axum::middleware::Next) -> axum::response::Response {
    let ip = extract_client_ip(req.headers())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".into());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed();
    let is_success = response.status().is_success();
    let (a, b) = if is_success {
        ((20, 163, 73), (25, 163, 118))
    } else {
        ((230, 126, 16), (171, 85, 17))
    };
    println!(
        "{} {} {} {} {} {}{:?}{} {}{}",
        "[kecs]".truecolor(a.0, a.1, a.2),
        method.truecolor(b.0, b.1, b.2),
        path.truecolor(b.0, b.1, b.2),
        "->".truecolor(a.0, a.1, a.2),
        response.status().truecolor(b.0, b.1, b.2),
        "(".truecolor(a.0, a.1, a.2),
        duration.truecolor(b.0, b.1, b.2),
        ")".truecolor(a.0, a.1, a.2),
        "xff=".magenta(),
        ip.magenta().dimmed(),
    );
    response
}

pub fn healthz() -> StatusCode {
    StatusCode::OK
}

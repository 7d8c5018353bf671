//! KECS control-plane binary (spec.md §1, §5): the AWS-wire-protocol front
//! door plus its background reconcilers, one process per instance.

use clap::Parser;
use kecs_common::args::ServerArgs;
use tokio_util::sync::CancellationToken;

mod app;
mod handlers;
mod localstack_proxy;
mod reconciler;
mod router;

use app::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kecs_common::init();
    let args = ServerArgs::parse();
    let port = args.port;

    let cancel = CancellationToken::new();
    tokio::spawn(kecs_common::shutdown::shutdown_signal(cancel.clone()));

    let app = AppState::new(args, cancel.clone()).await?;

    reconciler::startup::recover(&app).await;

    let observer_handle = tokio::spawn(reconciler::observer::run(app.clone(), cancel.clone()));
    let gc_handle = tokio::spawn(reconciler::gc::run(app.clone(), cancel.clone()));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "kecs listening");

    let shutdown = cancel.clone();
    axum::serve(listener, router::build(app))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    observer_handle.abort();
    gc_handle.abort();
    Ok(())
}

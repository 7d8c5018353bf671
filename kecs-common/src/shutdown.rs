use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

/// Resolves on SIGINT/SIGTERM and cancels `token` so every background loop
/// (reconciler, GC, target health scheduler) threaded through it unwinds.
pub async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv()  => eprintln!("{}", "stopping: received SIGINT".red()),
            _ = sigterm.recv() => eprintln!("{}", "stopping: received SIGTERM".red()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
    }

    token.cancel();
}

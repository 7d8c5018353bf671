//! Background GC (spec.md §4.8, §5): a periodic timer that deletes
//! `STOPPED` tasks past the retention horizon, orphaned task sets, and
//! stale container instances.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::app::AppState;

pub async fn run(app: AppState, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(app.args.gc_interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => sweep(&app).await,
        }
    }
}

async fn sweep(app: &AppState) {
    let before = chrono::Utc::now() - chrono::Duration::seconds(app.args.task_retention_secs as i64);

    let clusters = match app.store.clusters.list(None, None).await {
        Ok((clusters, _)) => clusters,
        Err(e) => {
            tracing::warn!(error = %e, "gc: failed to list clusters");
            return;
        }
    };

    let mut live_service_arns = Vec::new();
    for cluster in &clusters {
        match app.store.tasks.delete_older_than(&cluster.arn, before).await {
            Ok(removed) if removed > 0 => {
                tracing::info!(cluster = %cluster.name, removed, "gc: removed stopped tasks")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(cluster = %cluster.name, error = %e, "gc: task sweep failed"),
        }

        match app.store.container_instances.delete_stale(&cluster.arn, before).await {
            Ok(removed) if removed > 0 => {
                tracing::info!(cluster = %cluster.name, removed, "gc: deregistered stale container instances")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(cluster = %cluster.name, error = %e, "gc: container instance sweep failed"),
        }

        live_service_arns.extend(
            app.store
                .services
                .list_all_in_cluster(&cluster.arn)
                .await
                .into_iter()
                .map(|s| s.arn),
        );
    }

    match app.store.task_sets.delete_orphaned(&live_service_arns).await {
        Ok(removed) if removed > 0 => tracing::info!(removed, "gc: deleted orphaned task sets"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "gc: task set sweep failed"),
    }
}

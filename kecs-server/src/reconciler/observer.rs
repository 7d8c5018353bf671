//! Task lifecycle observer (spec.md §4.8, §5): one work unit per watched
//! cluster, mapping pod status to the ordered ECS task lifecycle exactly
//! once per change via `Store::tasks::transition`.

use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use kube::ResourceExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kecs_events::Event;
use kecs_types::{Cluster, KecsResult, LastStatus};

use crate::app::AppState;

const TASK_LABEL: &str = "kecs.io/ecs-task";
const CLUSTER_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Ordered lifecycle, matching `LastStatus`'s declaration order; used to
/// walk a task forward one legal transition at a time.
const ORDER: [LastStatus; 7] = [
    LastStatus::Provisioning,
    LastStatus::Pending,
    LastStatus::Activating,
    LastStatus::Running,
    LastStatus::Deactivating,
    LastStatus::Stopping,
    LastStatus::Stopped,
];

/// Supervises one watch task per cluster for the process lifetime, picking
/// up clusters created after boot and dropping ones that get deleted.
pub async fn run(app: AppState, cancel: CancellationToken) {
    let mut watchers: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }
        match app.store.clusters.list(None, None).await {
            Ok((clusters, _)) => reconcile_watchers(&app, &cancel, &clusters, &mut watchers),
            Err(e) => tracing::warn!(error = %e, "observer: failed to list clusters"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(CLUSTER_POLL_INTERVAL) => {}
        }
    }

    for (_, handle) in watchers.drain() {
        handle.abort();
    }
}

fn reconcile_watchers(
    app: &AppState,
    cancel: &CancellationToken,
    clusters: &[Cluster],
    watchers: &mut HashMap<String, JoinHandle<()>>,
) {
    let live: Vec<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
    watchers.retain(|name, handle| {
        let keep = live.contains(&name.as_str());
        if !keep {
            handle.abort();
        }
        keep
    });

    for cluster in clusters {
        if watchers.contains_key(&cluster.name) {
            continue;
        }
        let name = cluster.name.clone();
        let app = app.clone();
        let cancel = cancel.child_token();
        let cluster = cluster.clone();
        let handle = tokio::spawn(async move {
            watch_cluster(app, cluster, cancel).await;
        });
        watchers.insert(name, handle);
    }
}

async fn watch_cluster(app: AppState, cluster: Cluster, cancel: CancellationToken) {
    let clients = match app
        .client_cache
        .get_or_connect(&cluster.k8s_cluster_name, &app.args.kube_context)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(cluster = %cluster.name, error = %e, "observer: could not connect to cluster");
            return;
        }
    };

    let api: Api<Pod> = Api::namespaced(clients.client, &cluster.k8s_cluster_name);
    let config = watcher::Config::default().labels(TASK_LABEL);
    let mut stream = Box::pin(watcher(api, config).touched_objects());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = stream.next() => {
                match next {
                    Some(Ok(pod)) => {
                        if let Err(e) = handle_pod(&app, &cluster.arn, &pod).await {
                            tracing::warn!(cluster = %cluster.name, error = %e, "observer: failed to apply pod event");
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(cluster = %cluster.name, error = %e, "observer: pod watch error");
                    }
                    None => return,
                }
            }
        }
    }
}

async fn handle_pod(app: &AppState, cluster_arn: &str, pod: &Pod) -> KecsResult<()> {
    let Some(task_id) = pod.labels().get(TASK_LABEL) else {
        return Ok(());
    };
    let Some(target) = desired_status(pod) else {
        return Ok(());
    };
    let task = match app.store.tasks.get(cluster_arn, task_id).await {
        Ok(t) => t,
        Err(_) => return Ok(()),
    };
    if task.last_status.is_terminal() || target <= task.last_status {
        return Ok(());
    }

    if target == LastStatus::Stopped {
        mark_stopped(app, cluster_arn, task_id, failure_reason(pod)).await?;
    } else {
        advance(app, task_id, task.last_status, target).await?;
    }

    app.events.publish(Event::TaskStateChanged {
        task_arn: task.arn,
        last_status: format!("{target:?}").to_uppercase(),
    });
    Ok(())
}

fn desired_status(pod: &Pod) -> Option<LastStatus> {
    let status = pod.status.as_ref()?;
    match status.phase.as_deref() {
        Some("Pending") => Some(LastStatus::Pending),
        Some("Running") => {
            let ready = status
                .conditions
                .as_ref()
                .is_some_and(|cs| cs.iter().any(|c| c.type_ == "Ready" && c.status == "True"));
            Some(if ready { LastStatus::Running } else { LastStatus::Activating })
        }
        Some("Succeeded") | Some("Failed") => Some(LastStatus::Stopped),
        _ => None,
    }
}

fn failure_reason(pod: &Pod) -> Option<String> {
    if pod.status.as_ref().and_then(|s| s.phase.as_deref()) != Some("Failed") {
        return None;
    }
    pod.status
        .as_ref()
        .and_then(|s| s.reason.clone())
        .or_else(|| Some("pod entered Failed phase".to_string()))
}

async fn advance(
    app: &AppState,
    task_id: &str,
    current: LastStatus,
    target: LastStatus,
) -> KecsResult<()> {
    for status in path_from(current, target) {
        app.store.tasks.transition(task_id, status).await?;
    }
    Ok(())
}

/// The legal transitions between `current` (exclusive) and `target`
/// (inclusive), walked one step at a time so no transition is skipped.
fn path_from(current: LastStatus, target: LastStatus) -> Vec<LastStatus> {
    let cur_idx = ORDER.iter().position(|s| *s == current).unwrap_or(0);
    let tgt_idx = ORDER.iter().position(|s| *s == target).unwrap_or(0);
    ((cur_idx + 1)..=tgt_idx).map(|idx| ORDER[idx]).collect()
}

async fn mark_stopped(
    app: &AppState,
    cluster_arn: &str,
    task_id: &str,
    reason: Option<String>,
) -> KecsResult<()> {
    if let Some(reason) = reason {
        let mut task = app.store.tasks.get(cluster_arn, task_id).await?;
        if task.stopped_reason.is_none() {
            task.stopped_reason = Some(reason);
            app.store.tasks.update(task).await?;
        }
    }
    app.store.tasks.transition(task_id, LastStatus::Stopped).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};

    fn pod_with_phase(phase: &str) -> Pod {
        Pod {
            status: Some(PodStatus { phase: Some(phase.to_string()), ..Default::default() }),
            ..Default::default()
        }
    }

    fn pod_running(ready: bool) -> Pod {
        let conditions = if ready {
            vec![PodCondition { type_: "Ready".to_string(), status: "True".to_string(), ..Default::default() }]
        } else {
            vec![PodCondition { type_: "Ready".to_string(), status: "False".to_string(), ..Default::default() }]
        };
        Pod {
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                conditions: Some(conditions),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn desired_status_pending_phase() {
        assert_eq!(desired_status(&pod_with_phase("Pending")), Some(LastStatus::Pending));
    }

    #[test]
    fn desired_status_running_and_ready_is_running() {
        assert_eq!(desired_status(&pod_running(true)), Some(LastStatus::Running));
    }

    #[test]
    fn desired_status_running_but_not_ready_is_activating() {
        assert_eq!(desired_status(&pod_running(false)), Some(LastStatus::Activating));
    }

    #[test]
    fn desired_status_succeeded_and_failed_both_map_to_stopped() {
        assert_eq!(desired_status(&pod_with_phase("Succeeded")), Some(LastStatus::Stopped));
        assert_eq!(desired_status(&pod_with_phase("Failed")), Some(LastStatus::Stopped));
    }

    #[test]
    fn desired_status_unknown_phase_yields_none() {
        assert_eq!(desired_status(&pod_with_phase("Unknown")), None);
    }

    #[test]
    fn desired_status_no_status_yields_none() {
        assert_eq!(desired_status(&Pod::default()), None);
    }

    #[test]
    fn failure_reason_uses_pod_reason_when_present() {
        let mut pod = pod_with_phase("Failed");
        pod.status.as_mut().unwrap().reason = Some("Evicted".to_string());
        assert_eq!(failure_reason(&pod), Some("Evicted".to_string()));
    }

    #[test]
    fn failure_reason_falls_back_to_generic_message() {
        let pod = pod_with_phase("Failed");
        assert_eq!(failure_reason(&pod), Some("pod entered Failed phase".to_string()));
    }

    #[test]
    fn failure_reason_none_outside_failed_phase() {
        assert_eq!(failure_reason(&pod_with_phase("Running")), None);
    }

    #[test]
    fn path_from_walks_every_intermediate_step() {
        let path = path_from(LastStatus::Pending, LastStatus::Running);
        assert_eq!(path, vec![LastStatus::Activating, LastStatus::Running]);
    }

    #[test]
    fn path_from_same_status_is_empty() {
        assert!(path_from(LastStatus::Running, LastStatus::Running).is_empty());
    }
}

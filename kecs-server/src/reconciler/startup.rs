//! Startup recovery (spec.md §4.8): walks the State Store, reconstructs any
//! missing k8s state, and re-establishes convergence after a process
//! restart. Runs once at boot; per-cluster failures are counted but never
//! abort recovery of the other clusters (spec.md §7 partial-failure policy).

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kecs_k8s::upsert::apply_namespace;
use kecs_k8s::wait::{wait_api_ready, wait_deployment_ready};
use kecs_types::{Cluster, KecsError, KecsResult, LastStatus, ServiceStatus};
use kube::api::{Api, Patch, PatchParams};

use crate::app::AppState;
use crate::handlers::ecs::{apply_service_deployment, parse_family_revision};

const LOCALSTACK_DEPLOYMENT: &str = "localstack";

/// Entry point spawned once from `main`.
pub async fn recover(app: &AppState) {
    let clusters = match app.store.clusters.list(None, None).await {
        Ok((clusters, _)) => clusters,
        Err(e) => {
            tracing::error!(error = %e, "startup recovery: failed to list clusters");
            return;
        }
    };

    let mut failures = 0usize;
    for cluster in &clusters {
        if let Err(e) = recover_cluster(app, cluster).await {
            failures += 1;
            tracing::warn!(cluster = %cluster.name, error = %e, "cluster recovery failed");
        }
    }
    if failures > 0 {
        tracing::warn!(failures, total = clusters.len(), "startup recovery finished with failures");
    } else {
        tracing::info!(clusters = clusters.len(), "startup recovery complete");
    }
}

async fn recover_cluster(app: &AppState, cluster: &Cluster) -> KecsResult<()> {
    let clients = app
        .client_cache
        .get_or_connect(&cluster.k8s_cluster_name, &app.args.kube_context)
        .await?;

    wait_api_ready(
        &clients.client,
        Duration::from_secs(app.args.cluster_ready_timeout_secs),
    )
    .await?;

    apply_namespace(
        &clients.client,
        &Namespace {
            metadata: ObjectMeta {
                name: Some(cluster.k8s_cluster_name.clone()),
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await?;

    if wants_localstack(cluster) {
        let wait = Duration::from_secs(app.args.localstack_ready_timeout_secs);
        if let Err(e) = restart_localstack(&clients.client, &cluster.k8s_cluster_name, wait).await {
            tracing::warn!(cluster = %cluster.name, error = %e, "LocalStack restart failed, continuing");
        }
    }

    recover_services(app, cluster).await?;
    recover_tasks(app, cluster, &clients.client).await?;
    Ok(())
}

fn wants_localstack(cluster: &Cluster) -> bool {
    cluster
        .local_stack_state
        .as_ref()
        .and_then(|v| v.get("status"))
        .and_then(|v| v.as_str())
        == Some("deployed")
}

/// Rolling-restart the in-cluster LocalStack deployment the way
/// `kubectl rollout restart` does, by touching a pod-template annotation,
/// then wait up to the spec's 2-minute LocalStack-readiness budget.
async fn restart_localstack(client: &kube::Client, namespace: &str, wait: Duration) -> KecsResult<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let patch = serde_json::json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        "kecs.io/restarted-at": chrono::Utc::now().to_rfc3339(),
                    }
                }
            }
        }
    });
    api.patch(LOCALSTACK_DEPLOYMENT, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| KecsError::internal(format!("restart localstack: {e}")))?;
    wait_deployment_ready(client, namespace, LOCALSTACK_DEPLOYMENT, wait).await
}

/// Re-creates the deployment for every non-`INACTIVE` service; k8s itself
/// then reschedules pods to match `desiredCount`.
async fn recover_services(app: &AppState, cluster: &Cluster) -> KecsResult<()> {
    let services = app.store.services.list_all_in_cluster(&cluster.arn).await;
    for service in services {
        if service.status == ServiceStatus::Inactive {
            continue;
        }
        let (family, revision) = match parse_family_revision(&service.task_definition_arn) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(service = %service.name, error = %e, "skipping service recovery, bad task definition arn");
                continue;
            }
        };
        let td = match app.store.task_definitions.get(&family, revision).await {
            Ok(td) => td,
            Err(e) => {
                tracing::warn!(service = %service.name, error = %e, "skipping service recovery, task definition missing");
                continue;
            }
        };
        if let Err(e) = apply_service_deployment(app, cluster, &service, &td).await {
            tracing::warn!(service = %service.name, error = %e, "failed to reapply service deployment");
        }
    }
    Ok(())
}

/// Standalone (non-service) tasks have no k8s controller reconstructing
/// their pod; any still marked non-terminal whose pod is gone is declared
/// failed rather than left to dangle forever.
async fn recover_tasks(app: &AppState, cluster: &Cluster, client: &kube::Client) -> KecsResult<()> {
    let (tasks, _) = app.store.tasks.list(&cluster.arn, None, None, None, None).await?;
    let pods: Api<Pod> = Api::namespaced(client.clone(), &cluster.k8s_cluster_name);

    for task in tasks {
        if task.last_status.is_terminal() {
            continue;
        }
        let Some(pod_name) = &task.pod_name else {
            fail_task(app, &cluster.arn, &task.id, "no pod was ever recorded for this task").await;
            continue;
        };
        match pods.get(pod_name).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {
                fail_task(app, &cluster.arn, &task.id, "backing pod no longer exists").await;
            }
            Err(e) => {
                tracing::warn!(task = %task.id, error = %e, "could not verify task pod, leaving state unchanged");
            }
        }
    }
    Ok(())
}

async fn fail_task(app: &AppState, cluster_arn: &str, task_id: &str, reason: &str) {
    let Ok(mut task) = app.store.tasks.get(cluster_arn, task_id).await else {
        return;
    };
    let task_arn = task.arn.clone();
    task.stopped_reason = Some(reason.to_string());
    if let Err(e) = app.store.tasks.update(task).await {
        tracing::warn!(task = %task_id, error = %e, "failed to persist task update before transition");
        return;
    }
    if let Err(e) = app.store.tasks.transition(task_id, LastStatus::Stopped).await {
        tracing::warn!(task = %task_id, error = %e, "failed to transition unreconstructable task to STOPPED");
    } else {
        app.events.publish(kecs_events::Event::TaskStateChanged {
            task_arn,
            last_status: "STOPPED".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::ClusterStatus;

    fn cluster_with_state(state: Option<serde_json::Value>) -> Cluster {
        Cluster {
            name: "default".to_string(),
            arn: "arn:cluster:default".to_string(),
            status: ClusterStatus::Active,
            k8s_cluster_name: "default".to_string(),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            local_stack_state: state,
            created_at: chrono::Utc::now(),
            tags: vec![],
        }
    }

    #[test]
    fn wants_localstack_true_when_status_deployed() {
        let cluster = cluster_with_state(Some(serde_json::json!({ "status": "deployed" })));
        assert!(wants_localstack(&cluster));
    }

    #[test]
    fn wants_localstack_false_when_no_state() {
        assert!(!wants_localstack(&cluster_with_state(None)));
    }

    #[test]
    fn wants_localstack_false_for_other_status_values() {
        let cluster = cluster_with_state(Some(serde_json::json!({ "status": "pending" })));
        assert!(!wants_localstack(&cluster));
    }

    #[test]
    fn wants_localstack_false_when_status_field_missing() {
        let cluster = cluster_with_state(Some(serde_json::json!({ "other": "x" })));
        assert!(!wants_localstack(&cluster));
    }
}

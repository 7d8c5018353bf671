//! `WaitDeploymentReady` (spec.md §4.3): poll every 5s until
//! `status.readyReplicas == spec.replicas`, or time out.

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use kecs_types::{KecsError, KecsResult};
use kube::api::Api;
use kube::Client;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls the API server's own version endpoint until it answers, or times
/// out (spec.md §5: startup recovery must not proceed against a cluster
/// that isn't reachable yet).
pub async fn wait_api_ready(client: &Client, timeout: Duration) -> KecsResult<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if client.apiserver_version().await.is_ok() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(KecsError::internal(format!(
                "kubernetes API not reachable after {timeout:?}"
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub async fn wait_deployment_ready(
    client: &Client,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> KecsResult<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let deployment = api
            .get(name)
            .await
            .map_err(|e| KecsError::internal(format!("get deployment {name}: {e}")))?;
        if is_ready(&deployment) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(KecsError::internal(format!(
                "deployment {namespace}/{name} not ready after {:?}",
                timeout
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn is_ready(deployment: &Deployment) -> bool {
    let wanted = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    ready >= wanted
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};

    #[test]
    fn not_ready_when_status_missing() {
        let d = Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(2),
                ..Default::default()
            }),
            status: None,
            ..Default::default()
        };
        assert!(!is_ready(&d));
    }

    #[test]
    fn ready_when_replicas_match() {
        let d = Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(2),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                ready_replicas: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(is_ready(&d));
    }
}

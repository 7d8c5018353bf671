//! Target health transitions (spec.md §4.4). Newly registered targets
//! start `initial`/`Elb.RegistrationInProgress`; after a 5s settle delay
//! they flip to `healthy` unless a readiness check already failed them.
//! Transitions are scheduled onto a `JoinSet` so a service shutdown can
//! abort every pending one in a single `abort_all()`.

use std::net::SocketAddr;
use std::time::Duration;

use kecs_store::Elbv2Store;
use kecs_types::{TargetHealth, TargetHealthState};
use kube::api::{Api, ListParams};
use kube::Client;
use tokio::net::TcpStream;
use tokio::task::JoinSet;

const SETTLE_DELAY: Duration = Duration::from_secs(5);
const TCP_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct HealthScheduler {
    pending: JoinSet<()>,
}

impl HealthScheduler {
    pub fn new() -> Self {
        HealthScheduler::default()
    }

    /// Schedules the `initial -> healthy` flip for a just-registered target,
    /// unless something has already marked it unhealthy in the meantime, or
    /// a readiness check run just before the flip reports it unhealthy
    /// (spec.md §4.4: the settle only wins when nothing has explicitly
    /// failed the target).
    pub fn schedule_settle(
        &mut self,
        store: Elbv2Store,
        client: Option<Client>,
        namespace: String,
        target_group_arn: String,
        target_id: String,
        target_port: u16,
    ) {
        self.pending.spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            let current = store
                .target_health_for_group(&target_group_arn)
                .await
                .into_iter()
                .find(|th| th.target_id == target_id && th.target_port == target_port);
            let registered_at = match &current {
                Some(th) if th.state == TargetHealthState::Unhealthy => return,
                Some(th) => th.registered_at,
                None => chrono::Utc::now(),
            };
            let (state, reason) =
                check_target_health(client.as_ref(), &namespace, &target_id, target_port).await;
            let _ = store
                .put_target_health(TargetHealth {
                    target_group_arn,
                    target_id,
                    target_port,
                    state,
                    reason,
                    registered_at,
                })
                .await;
        });
    }

    /// Aborts every pending settle transition (service shutdown, spec.md
    /// §5 cancellation contract).
    pub fn abort_all(&mut self) {
        self.pending.abort_all();
    }
}

/// Resolves the target by pod IP; requires `PodRunning` + `Ready == True`
/// and that the target port is exposed by some container. Falls back to a
/// TCP dial when no Kubernetes client is available (spec.md §4.4).
pub async fn check_target_health(
    client: Option<&Client>,
    namespace: &str,
    ip: &str,
    port: u16,
) -> (TargetHealthState, String) {
    match client {
        Some(client) => check_via_k8s(client, namespace, ip, port).await,
        None => check_via_tcp(ip, port).await,
    }
}

async fn check_via_k8s(
    client: &Client,
    namespace: &str,
    ip: &str,
    port: u16,
) -> (TargetHealthState, String) {
    let pods: Api<k8s_openapi::api::core::v1::Pod> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().fields(&format!("status.podIP={ip}"));
    let list = match pods.list(&params).await {
        Ok(l) => l,
        Err(_) => return check_via_tcp(ip, port).await,
    };
    let Some(pod) = list.items.into_iter().next() else {
        return (
            TargetHealthState::Unhealthy,
            "Target.NotRegistered".to_string(),
        );
    };

    let running = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|p| p == "Running")
        .unwrap_or(false);
    let ready = pod
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|cs| {
            cs.iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);
    let exposes_port = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers.iter().any(|c| {
                c.ports
                    .as_ref()
                    .map(|ports| ports.iter().any(|p| p.container_port as u16 == port))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);

    if running && ready && exposes_port {
        (TargetHealthState::Healthy, String::new())
    } else {
        (
            TargetHealthState::Unhealthy,
            "Target.FailedHealthChecks".to_string(),
        )
    }
}

async fn check_via_tcp(ip: &str, port: u16) -> (TargetHealthState, String) {
    let addr: SocketAddr = match format!("{ip}:{port}").parse() {
        Ok(a) => a,
        Err(_) => {
            return (
                TargetHealthState::Unhealthy,
                "Target.InvalidState".to_string(),
            )
        }
    };
    match tokio::time::timeout(TCP_DIAL_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => (TargetHealthState::Healthy, String::new()),
        _ => (
            TargetHealthState::Unhealthy,
            "Target.FailedHealthChecks".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_dial_fails_closed_when_nothing_listens() {
        let (state, reason) = check_via_tcp("127.0.0.1", 1).await;
        assert_eq!(state, TargetHealthState::Unhealthy);
        assert!(!reason.is_empty());
    }
}

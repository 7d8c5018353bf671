//! IAM adapter (spec.md §4.6): ensures a service account exists per task
//! role, named the way `kecs_translate::pod::service_account_name` derives
//! it, with an optional projected token mount for callers that want the
//! role ARN available inside the pod.

use k8s_openapi::api::core::v1::{
    ProjectedVolumeSource, ServiceAccount, ServiceAccountTokenProjection, Volume, VolumeProjection,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kecs_k8s::upsert::apply_service_account;
use kecs_translate::arn;
use kecs_types::{KecsError, KecsResult};
use kube::Client;

use crate::client::AwsClients;

pub const TASK_ROLE_ANNOTATION: &str = "kecs.io/task-role-arn";
pub const PROJECTED_TOKEN_VOLUME: &str = "aws-iam-token";

/// Confirms the role ARN resolves to a real IAM role in LocalStack before
/// a service account is minted for it.
pub async fn validate_task_role(clients: &AwsClients, role_arn: &str) -> KecsResult<()> {
    let parsed = arn::parse(role_arn)
        .ok_or_else(|| KecsError::invalid(format!("not a valid ARN: {role_arn}")))?;
    let role_name = parsed
        .resource
        .rsplit('/')
        .next()
        .unwrap_or(&parsed.resource);

    clients
        .iam
        .get_role()
        .role_name(role_name)
        .send()
        .await
        .map_err(|e| KecsError::not_found("iam-role", &format!("{role_arn}: {e}")))?;
    Ok(())
}

/// Ensures the task's service account exists, annotated with the role ARN
/// so the translator's `pod_annotations`/`service_account_name` pairing
/// stays consistent with what's actually live in the cluster.
pub async fn ensure_service_account(
    k8s_client: &Client,
    namespace: &str,
    family: &str,
    task_role_arn: &str,
    project_token: bool,
) -> KecsResult<String> {
    let name = kecs_translate::pod::service_account_name(family);

    let mut annotations = std::collections::BTreeMap::new();
    annotations.insert(TASK_ROLE_ANNOTATION.to_string(), task_role_arn.to_string());

    let sa = ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        ..Default::default()
    };
    apply_service_account(k8s_client, namespace, &sa).await?;

    if project_token {
        // Caller mounts this volume onto the pod spec; kept separate from
        // `apply_service_account` since the volume belongs to the pod, not
        // the service account object.
        let _ = projected_token_volume();
    }

    Ok(name)
}

pub fn projected_token_volume() -> Volume {
    Volume {
        name: PROJECTED_TOKEN_VOLUME.to_string(),
        projected: Some(ProjectedVolumeSource {
            sources: Some(vec![VolumeProjection {
                service_account_token: Some(ServiceAccountTokenProjection {
                    audience: Some("sts.amazonaws.com".to_string()),
                    expiration_seconds: Some(3600),
                    path: "token".to_string(),
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projected_volume_targets_sts_audience() {
        let vol = projected_token_volume();
        let proj = vol.projected.unwrap();
        let src = &proj.sources.unwrap()[0];
        assert_eq!(
            src.service_account_token.as_ref().unwrap().audience.as_deref(),
            Some("sts.amazonaws.com")
        );
    }
}

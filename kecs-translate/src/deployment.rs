//! Service -> Deployment (spec.md §4.2).

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, RollingUpdateDeployment};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kecs_types::{Cluster, Service, TaskDefinition};

use crate::pod::{self, ResolvedSecrets};

pub const SERVICE_LABEL: &str = "kecs.io/ecs-service";
pub const CLUSTER_LABEL: &str = "kecs.io/ecs-cluster";

pub fn selector_labels(cluster: &Cluster, service: &Service) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(CLUSTER_LABEL.to_string(), cluster.name.clone());
    labels.insert(SERVICE_LABEL.to_string(), service.name.clone());
    labels
}

/// `k8s_namespace` is the cluster's namespace; `revision_name` distinguishes
/// deployments across task-definition revisions during a rollout.
pub fn to_deployment(
    cluster: &Cluster,
    service: &Service,
    td: &TaskDefinition,
    secrets: &ResolvedSecrets,
    k8s_namespace: &str,
) -> Deployment {
    let labels = selector_labels(cluster, service);
    let mut pod_spec: PodSpec = pod::to_pod_spec(td, secrets);
    pod_spec.service_account_name = td
        .task_role_arn
        .as_ref()
        .map(|_| pod::service_account_name(&td.family));

    let annotations = pod::pod_annotations(td);

    let max_surge = service
        .deployment_configuration
        .maximum_percent
        .map(|p| p.saturating_sub(100))
        .unwrap_or(100);
    let max_unavailable = service
        .deployment_configuration
        .minimum_healthy_percent
        .map(|p| 100_u32.saturating_sub(p))
        .unwrap_or(0);

    Deployment {
        metadata: ObjectMeta {
            name: Some(service.name.clone()),
            namespace: Some(k8s_namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(service.desired_count),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            strategy: Some(k8s_openapi::api::apps::v1::DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateDeployment {
                    max_surge: Some(IntOrString::String(format!("{max_surge}%"))),
                    max_unavailable: Some(IntOrString::String(format!("{max_unavailable}%"))),
                }),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::{
        ClusterStatus, DeploymentConfiguration, LaunchType, NetworkConfiguration,
        NetworkMode, ServiceStatus, TaskDefinitionStatus,
    };

    fn cluster() -> Cluster {
        Cluster {
            name: "c1".to_string(),
            arn: "arn:aws:ecs:us-east-1:000000000000:cluster/c1".to_string(),
            status: ClusterStatus::Active,
            k8s_cluster_name: "kecs-c1".to_string(),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            local_stack_state: None,
            created_at: chrono::Utc::now(),
            tags: vec![],
        }
    }

    fn service() -> Service {
        Service {
            arn: "arn:aws:ecs:us-east-1:000000000000:service/c1/s1".to_string(),
            name: "s1".to_string(),
            cluster_arn: "arn:aws:ecs:us-east-1:000000000000:cluster/c1".to_string(),
            task_definition_arn: "arn:aws:ecs:us-east-1:000000000000:task-definition/web:1"
                .to_string(),
            desired_count: 2,
            running_count: 0,
            pending_count: 0,
            launch_type: LaunchType::Fargate,
            network_configuration: NetworkConfiguration::default(),
            load_balancers: vec![],
            service_registries: vec![],
            deployment_configuration: DeploymentConfiguration {
                maximum_percent: Some(200),
                minimum_healthy_percent: Some(100),
            },
            deployments: vec![],
            status: ServiceStatus::Active,
            started_by: None,
            updated_at: chrono::Utc::now(),
        }
    }

    fn task_def() -> TaskDefinition {
        TaskDefinition {
            family: "web".to_string(),
            revision: 1,
            arn: "arn:aws:ecs:us-east-1:000000000000:task-definition/web:1".to_string(),
            status: TaskDefinitionStatus::Active,
            containers: vec![],
            cpu: None,
            memory: None,
            network_mode: NetworkMode::Bridge,
            volumes: vec![],
            task_role_arn: None,
            execution_role_arn: None,
            registered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn replicas_follow_desired_count() {
        let dep = to_deployment(&cluster(), &service(), &task_def(), &ResolvedSecrets::new(), "kecs-c1");
        assert_eq!(dep.spec.unwrap().replicas, Some(2));
    }

    #[test]
    fn labels_identify_cluster_and_service() {
        let dep = to_deployment(&cluster(), &service(), &task_def(), &ResolvedSecrets::new(), "kecs-c1");
        let labels = dep.metadata.labels.unwrap();
        assert_eq!(labels.get(CLUSTER_LABEL).unwrap(), "c1");
        assert_eq!(labels.get(SERVICE_LABEL).unwrap(), "s1");
    }
}

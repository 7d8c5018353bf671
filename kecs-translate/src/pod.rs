//! TaskDefinition -> PodSpec (spec.md §4.2). Pure; secrets arrive
//! pre-resolved to k8s Secret name/key pairs (resolution itself is `kecs-aws`'s
//! job, keeping this module side-effect-free).

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, ExecAction, Lifecycle, LifecycleHandler,
    PodSpec, ResourceRequirements, SecretKeySelector, Volume as K8sVolume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kecs_types::{
    ContainerDefinition, DependsOnCondition, KecsError, KecsResult, NetworkConfiguration,
    NetworkMode, TaskDefinition,
};

use crate::cpu::ecs_cpu_units_to_millicores;

/// Where a `SecretRef` resolves to once `kecs-aws` has materialized it into
/// the task's namespace.
#[derive(Debug, Clone)]
pub struct ResolvedSecret {
    pub k8s_secret_name: String,
    pub key: String,
}

/// Keyed by `(container_name, secret_ref_name)`.
pub type ResolvedSecrets = BTreeMap<(String, String), ResolvedSecret>;

pub const LOG_DRIVER_ANNOTATION: &str = "kecs.io/log-driver";
pub const LOG_OPTIONS_ANNOTATION: &str = "kecs.io/log-options";
pub const TASK_ROLE_ANNOTATION: &str = "kecs.io/task-role-arn";
pub const SUBNETS_ANNOTATION: &str = "kecs.io/awsvpc-subnets";
pub const SECURITY_GROUPS_ANNOTATION: &str = "kecs.io/awsvpc-security-groups";
pub const ASSIGN_PUBLIC_IP_ANNOTATION: &str = "kecs.io/awsvpc-assign-public-ip";

pub fn service_account_name(family: &str) -> String {
    format!("{family}-task-role")
}

pub fn to_pod_spec(td: &TaskDefinition, secrets: &ResolvedSecrets) -> PodSpec {
    let mut init_containers = Vec::new();
    let mut containers = Vec::with_capacity(td.containers.len());
    let mut volumes = Vec::with_capacity(td.volumes.len());

    for v in &td.volumes {
        volumes.push(to_k8s_volume(v));
    }

    for c in &td.containers {
        init_containers.extend(start_dependency_init_containers(c, &td.containers));
        containers.push(to_container(c, td, secrets));
    }

    PodSpec {
        containers,
        init_containers: if init_containers.is_empty() {
            None
        } else {
            Some(init_containers)
        },
        volumes: if volumes.is_empty() {
            None
        } else {
            Some(volumes)
        },
        service_account_name: td.task_role_arn.as_ref().map(|_| service_account_name(&td.family)),
        host_network: Some(td.network_mode == NetworkMode::Host),
        restart_policy: Some("Always".to_string()),
        ..Default::default()
    }
}

/// `Condition = START|COMPLETE|SUCCESS` dependencies run to completion
/// before the dependent container starts, which is exactly what an init
/// container models; `Condition = HEALTHY` instead becomes a `postStart`
/// poll on the dependent container (see [`to_container`]).
fn start_dependency_init_containers(
    container: &ContainerDefinition,
    all: &[ContainerDefinition],
) -> Vec<Container> {
    container
        .depends_on
        .iter()
        .filter(|d| d.condition != DependsOnCondition::Healthy)
        .filter_map(|d| all.iter().find(|c| c.name == d.container_name))
        .map(|dep| Container {
            name: format!("{}-wait-{}", container.name, dep.name),
            image: Some(dep.image.clone()),
            command: if dep.entry_point.is_empty() {
                None
            } else {
                Some(dep.entry_point.clone())
            },
            args: if dep.command.is_empty() {
                None
            } else {
                Some(dep.command.clone())
            },
            ..Default::default()
        })
        .collect()
}

fn healthy_wait_lifecycle(
    container: &ContainerDefinition,
    all: &[ContainerDefinition],
) -> Option<Lifecycle> {
    let waits: Vec<String> = container
        .depends_on
        .iter()
        .filter(|d| d.condition == DependsOnCondition::Healthy)
        .filter_map(|d| all.iter().find(|c| c.name == d.container_name))
        .filter_map(|dep| dep.port_mappings.first())
        .map(|pm| format!("until nc -z 127.0.0.1 {}; do sleep 1; done", pm.container_port))
        .collect();
    if waits.is_empty() {
        return None;
    }
    Some(Lifecycle {
        post_start: Some(LifecycleHandler {
            exec: Some(ExecAction {
                command: Some(vec!["sh".to_string(), "-c".to_string(), waits.join(" && ")]),
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn to_container(
    c: &ContainerDefinition,
    td: &TaskDefinition,
    secrets: &ResolvedSecrets,
) -> Container {
    let mut env: Vec<EnvVar> = c
        .environment
        .iter()
        .map(|kv| EnvVar {
            name: kv.name.clone(),
            value: Some(kv.value.clone()),
            ..Default::default()
        })
        .collect();

    for secret in &c.secrets {
        let Some(resolved) = secrets.get(&(c.name.clone(), secret.name.clone())) else {
            continue;
        };
        env.push(EnvVar {
            name: secret.name.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: resolved.k8s_secret_name.clone(),
                    key: resolved.key.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    let resources = to_resource_requirements(c, td);

    let ports: Vec<ContainerPort> = c
        .port_mappings
        .iter()
        .map(|pm| ContainerPort {
            container_port: pm.container_port as i32,
            protocol: pm.protocol.clone().map(|p| p.to_uppercase()),
            ..Default::default()
        })
        .collect();

    let volume_mounts: Vec<VolumeMount> = c
        .mount_points
        .iter()
        .map(|mp| VolumeMount {
            name: mp.source_volume.clone(),
            mount_path: mp.container_path.clone(),
            read_only: mp.read_only,
            ..Default::default()
        })
        .collect();

    Container {
        name: c.name.clone(),
        image: Some(c.image.clone()),
        env: if env.is_empty() { None } else { Some(env) },
        resources: Some(resources),
        ports: if ports.is_empty() { None } else { Some(ports) },
        volume_mounts: if volume_mounts.is_empty() {
            None
        } else {
            Some(volume_mounts)
        },
        command: if c.entry_point.is_empty() {
            None
        } else {
            Some(c.entry_point.clone())
        },
        args: if c.command.is_empty() {
            None
        } else {
            Some(c.command.clone())
        },
        lifecycle: healthy_wait_lifecycle(c, &td.containers),
        ..Default::default()
    }
}

fn to_resource_requirements(c: &ContainerDefinition, td: &TaskDefinition) -> ResourceRequirements {
    let mut requests = BTreeMap::new();
    let mut limits = BTreeMap::new();

    let cpu_units = c.cpu.or_else(|| td.cpu.as_ref().and_then(|s| s.parse().ok()));
    if let Some(units) = cpu_units {
        let millicores = ecs_cpu_units_to_millicores(units);
        requests.insert("cpu".to_string(), Quantity(format!("{millicores}m")));
    }

    if let Some(mem) = c.memory {
        limits.insert("memory".to_string(), Quantity(format!("{mem}Mi")));
    }
    if let Some(reservation) = c.memory_reservation {
        requests.insert("memory".to_string(), Quantity(format!("{reservation}Mi")));
    } else if let Some(mem) = c.memory {
        requests.insert("memory".to_string(), Quantity(format!("{mem}Mi")));
    }

    ResourceRequirements {
        requests: if requests.is_empty() {
            None
        } else {
            Some(requests)
        },
        limits: if limits.is_empty() { None } else { Some(limits) },
        ..Default::default()
    }
}

fn to_k8s_volume(v: &kecs_types::Volume) -> K8sVolume {
    use k8s_openapi::api::core::v1::{HostPathVolumeSource, PersistentVolumeClaimVolumeSource};

    if let Some(efs) = &v.efs_volume_configuration {
        K8sVolume {
            name: v.name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: format!("{}-{}", v.name, efs.file_system_id),
                ..Default::default()
            }),
            ..Default::default()
        }
    } else {
        K8sVolume {
            name: v.name.clone(),
            host_path: Some(HostPathVolumeSource {
                path: v
                    .host
                    .as_ref()
                    .and_then(|h| h.source_path.clone())
                    .unwrap_or_else(|| format!("/var/lib/kecs/volumes/{}", v.name)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Pod annotations carrying the log-shipper contract and task-role linkage
/// (spec.md §4.2: "sidecar-free annotation consumed by the log shipper").
pub fn pod_annotations(td: &TaskDefinition) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    for c in &td.containers {
        if let Some(log) = &c.log_configuration
            && log.log_driver == "awslogs"
        {
            annotations.insert(LOG_DRIVER_ANNOTATION.to_string(), "awslogs".to_string());
            if let Ok(opts) = serde_json::to_string(&log.options) {
                annotations.insert(LOG_OPTIONS_ANNOTATION.to_string(), opts);
            }
        }
    }
    if let Some(role) = &td.task_role_arn {
        annotations.insert(TASK_ROLE_ANNOTATION.to_string(), role.clone());
    }
    annotations
}

/// Validates the `awsvpc` networking contract (spec.md §4.2: a task
/// definition using `NetworkMode::Awsvpc` requires a `networkConfiguration`
/// at run time, naming at least one subnet; any other network mode must not
/// carry one). K8s has no ENI-per-task equivalent, so there is nothing to
/// apply beyond record-keeping: the subnets/security groups/public-IP choice
/// are stamped onto the pod as annotations for the log shipper and anyone
/// auditing the task's intended network placement to read back.
pub fn network_annotations(
    network_mode: NetworkMode,
    network_configuration: Option<&NetworkConfiguration>,
) -> KecsResult<BTreeMap<String, String>> {
    match (network_mode, network_configuration) {
        (NetworkMode::Awsvpc, Some(nc)) => {
            if nc.subnets.is_empty() {
                return Err(KecsError::invalid(
                    "networkConfiguration.awsvpcConfiguration.subnets must not be empty for awsvpc network mode",
                ));
            }
            let mut annotations = BTreeMap::new();
            annotations.insert(SUBNETS_ANNOTATION.to_string(), nc.subnets.join(","));
            if !nc.security_groups.is_empty() {
                annotations.insert(SECURITY_GROUPS_ANNOTATION.to_string(), nc.security_groups.join(","));
            }
            if let Some(assign) = nc.assign_public_ip {
                annotations.insert(ASSIGN_PUBLIC_IP_ANNOTATION.to_string(), assign.to_string());
            }
            Ok(annotations)
        }
        (NetworkMode::Awsvpc, None) => Err(KecsError::invalid(
            "networkConfiguration is required when networkMode is awsvpc",
        )),
        (_, None) => Ok(BTreeMap::new()),
        (other, Some(_)) => Err(KecsError::invalid(format!(
            "networkConfiguration was provided but networkMode is {other:?}, not awsvpc"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::{KeyValuePair, NetworkMode, PortMapping, TaskDefinitionStatus};

    fn container(name: &str) -> ContainerDefinition {
        ContainerDefinition {
            name: name.to_string(),
            image: "nginx:1".to_string(),
            cpu: None,
            memory: Some(256),
            memory_reservation: None,
            essential: Some(true),
            port_mappings: vec![PortMapping {
                container_port: 80,
                host_port: None,
                protocol: Some("tcp".to_string()),
            }],
            environment: vec![KeyValuePair {
                name: "FOO".to_string(),
                value: "bar".to_string(),
            }],
            secrets: vec![],
            mount_points: vec![],
            depends_on: vec![],
            log_configuration: None,
            command: vec![],
            entry_point: vec![],
        }
    }

    fn task_def(containers: Vec<ContainerDefinition>) -> TaskDefinition {
        TaskDefinition {
            family: "web".to_string(),
            revision: 1,
            arn: "arn:aws:ecs:us-east-1:000000000000:task-definition/web:1".to_string(),
            status: TaskDefinitionStatus::Active,
            containers,
            cpu: Some("256".to_string()),
            memory: Some("512".to_string()),
            network_mode: NetworkMode::Bridge,
            volumes: vec![],
            task_role_arn: None,
            execution_role_arn: None,
            registered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn container_gets_cpu_and_memory_resources() {
        let td = task_def(vec![container("n")]);
        let spec = to_pod_spec(&td, &ResolvedSecrets::new());
        let res = spec.containers[0].resources.as_ref().unwrap();
        assert_eq!(
            res.requests.as_ref().unwrap().get("memory").unwrap().0,
            "256Mi"
        );
    }

    #[test]
    fn start_dependency_becomes_init_container() {
        let mut dependent = container("app");
        dependent.depends_on.push(kecs_types::ContainerDependency {
            container_name: "migrate".to_string(),
            condition: DependsOnCondition::Success,
        });
        let td = task_def(vec![container("migrate"), dependent]);
        let spec = to_pod_spec(&td, &ResolvedSecrets::new());
        let inits = spec.init_containers.unwrap();
        assert_eq!(inits.len(), 1);
        assert_eq!(inits[0].name, "app-wait-migrate");
    }

    #[test]
    fn awsvpc_requires_network_configuration() {
        let err = network_annotations(NetworkMode::Awsvpc, None).unwrap_err();
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn awsvpc_requires_at_least_one_subnet() {
        let nc = kecs_types::NetworkConfiguration::default();
        let err = network_annotations(NetworkMode::Awsvpc, Some(&nc)).unwrap_err();
        assert!(err.to_string().contains("subnets"));
    }

    #[test]
    fn awsvpc_annotates_subnets_and_security_groups() {
        let nc = kecs_types::NetworkConfiguration {
            subnets: vec!["subnet-1".to_string(), "subnet-2".to_string()],
            security_groups: vec!["sg-1".to_string()],
            assign_public_ip: Some(true),
        };
        let annotations = network_annotations(NetworkMode::Awsvpc, Some(&nc)).unwrap();
        assert_eq!(annotations.get(SUBNETS_ANNOTATION).unwrap(), "subnet-1,subnet-2");
        assert_eq!(annotations.get(SECURITY_GROUPS_ANNOTATION).unwrap(), "sg-1");
        assert_eq!(annotations.get(ASSIGN_PUBLIC_IP_ANNOTATION).unwrap(), "true");
    }

    #[test]
    fn non_awsvpc_mode_rejects_network_configuration() {
        let nc = kecs_types::NetworkConfiguration {
            subnets: vec!["subnet-1".to_string()],
            ..Default::default()
        };
        assert!(network_annotations(NetworkMode::Bridge, Some(&nc)).is_err());
    }

    #[test]
    fn non_awsvpc_mode_without_configuration_is_fine() {
        assert!(network_annotations(NetworkMode::Bridge, None).unwrap().is_empty());
    }

    #[test]
    fn healthy_dependency_adds_poststart_wait() {
        let mut dependent = container("app");
        dependent.depends_on.push(kecs_types::ContainerDependency {
            container_name: "db".to_string(),
            condition: DependsOnCondition::Healthy,
        });
        let td = task_def(vec![container("db"), dependent]);
        let spec = to_pod_spec(&td, &ResolvedSecrets::new());
        let app = spec.containers.iter().find(|c| c.name == "app").unwrap();
        assert!(app.lifecycle.as_ref().unwrap().post_start.is_some());
    }
}

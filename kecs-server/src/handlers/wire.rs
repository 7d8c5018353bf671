//! Entity -> AWS-JSON wire-shape mappers for the ECS protocol (spec.md §6).
//! Kept separate from `kecs_types` the same way `kecs-translate` keeps the
//! k8s-facing translation out of the entity definitions: these structs are
//! storage-agnostic, the wire shape is ECS's own contract.

use kecs_types::{
    Attribute, Cluster, ContainerInstance, Service, Task, TaskDefinition, TaskSet,
};
use serde_json::{Value, json};

pub fn cluster(c: &Cluster) -> Value {
    json!({
        "clusterArn": c.arn,
        "clusterName": c.name,
        "status": format!("{:?}", c.status).to_uppercase(),
        "registeredContainerInstancesCount": 0,
        "runningTasksCount": 0,
        "pendingTasksCount": 0,
        "activeServicesCount": 0,
        "tags": c.tags.iter().map(|t| json!({"key": t.key, "value": t.value})).collect::<Vec<_>>(),
    })
}

pub fn task_definition(td: &TaskDefinition) -> Value {
    json!({
        "taskDefinitionArn": td.arn,
        "family": td.family,
        "revision": td.revision,
        "status": format!("{:?}", td.status).to_uppercase(),
        "containerDefinitions": td.containers,
        "cpu": td.cpu,
        "memory": td.memory,
        "networkMode": serde_json::to_value(&td.network_mode).unwrap(),
        "volumes": td.volumes,
        "taskRoleArn": td.task_role_arn,
        "executionRoleArn": td.execution_role_arn,
        "registeredAt": td.registered_at.timestamp(),
    })
}

pub fn service(s: &Service) -> Value {
    json!({
        "serviceArn": s.arn,
        "serviceName": s.name,
        "clusterArn": s.cluster_arn,
        "taskDefinition": s.task_definition_arn,
        "desiredCount": s.desired_count,
        "runningCount": s.running_count,
        "pendingCount": s.pending_count,
        "launchType": serde_json::to_value(&s.launch_type).unwrap(),
        "networkConfiguration": s.network_configuration,
        "loadBalancers": s.load_balancers,
        "serviceRegistries": s.service_registries,
        "deployments": s.deployments,
        "status": format!("{:?}", s.status).to_uppercase(),
        "startedBy": s.started_by,
        "createdAt": s.updated_at.timestamp(),
    })
}

pub fn task(t: &Task) -> Value {
    json!({
        "taskArn": t.arn,
        "clusterArn": t.cluster_arn,
        "taskDefinitionArn": t.task_definition_arn,
        "group": t.service_name.as_ref().map(|n| format!("service:{n}")),
        "desiredStatus": format!("{:?}", t.desired_status).to_uppercase(),
        "lastStatus": format!("{:?}", t.last_status).to_uppercase(),
        "launchType": serde_json::to_value(&t.launch_type).unwrap(),
        "startedBy": t.started_by,
        "stoppedReason": t.stopped_reason,
        "createdAt": t.created_at.timestamp(),
        "startedAt": t.started_at.map(|d| d.timestamp()),
        "stoppedAt": t.stopped_at.map(|d| d.timestamp()),
        "cpu": t.cpu,
        "memory": t.memory,
    })
}

pub fn container_instance(ci: &ContainerInstance) -> Value {
    json!({
        "containerInstanceArn": ci.arn,
        "ec2InstanceId": Value::Null,
        "status": format!("{:?}", ci.status).to_uppercase(),
        "agentConnected": ci.agent_connected,
        "runningTasksCount": ci.running_tasks_count,
        "registeredResources": [
            {"name": "CPU", "type": "INTEGER", "integerValue": ci.registered_resources.cpu},
            {"name": "MEMORY", "type": "INTEGER", "integerValue": ci.registered_resources.memory},
        ],
        "remainingResources": [
            {"name": "CPU", "type": "INTEGER", "integerValue": ci.remaining_resources.cpu},
            {"name": "MEMORY", "type": "INTEGER", "integerValue": ci.remaining_resources.memory},
        ],
        "attributes": ci.attributes.iter().map(|(k, v)| json!({"name": k, "value": v})).collect::<Vec<_>>(),
        "registeredAt": ci.registered_at.timestamp(),
    })
}

pub fn attribute(a: &Attribute) -> Value {
    json!({
        "cluster": a.cluster,
        "targetType": a.target_type,
        "targetId": a.target_id,
        "name": a.name,
        "value": a.value,
    })
}

pub fn task_set(ts: &TaskSet) -> Value {
    json!({
        "id": ts.id,
        "taskSetArn": ts.arn,
        "serviceArn": ts.service_arn,
        "clusterArn": ts.cluster_arn,
        "taskDefinition": ts.task_definition_arn,
        "status": format!("{:?}", ts.status).to_uppercase(),
        "scale": ts.scale,
        "externalId": ts.external_id,
        "createdAt": ts.created_at.timestamp(),
    })
}

//! ECS operation handlers (spec.md §4.7, §6): one function per
//! `X-Amz-Target` operation, dispatched by `router.rs`. Each takes the
//! deserialized AWS-JSON request body and returns the wire-shaped response
//! `wire.rs` builds.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kecs_events::Event;
use kecs_k8s::upsert::{apply_deployment, apply_namespace, create_pod, delete_pod};
use kecs_translate::arn;
use kecs_translate::deployment::to_deployment;
use kecs_translate::pod::{ResolvedSecrets, network_annotations, to_pod_spec};
use kecs_types::{
    Attribute, Cluster, ClusterStatus, ContainerInstance, ContainerInstanceStatus,
    DesiredStatus, KecsError, KecsResult, LastStatus, LaunchType, Resources, Service,
    ServiceStatus, Tag, Task, TaskSet, TaskSetStatus,
};
use kube::api::Api;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::AppState;
use crate::handlers::wire;

fn region_account(app: &AppState) -> (&str, &str) {
    (&app.args.region, &app.args.account_id)
}

fn req<T: for<'de> Deserialize<'de>>(body: &Value) -> KecsResult<T> {
    serde_json::from_value(body.clone()).map_err(|e| KecsError::invalid(e.to_string()))
}

// ---------------------------------------------------------------- clusters

pub async fn create_cluster(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        #[serde(default = "default_cluster_name")]
        cluster_name: String,
        #[serde(default)]
        tags: Vec<WireTag>,
    }
    #[derive(Deserialize)]
    struct WireTag {
        key: String,
        value: String,
    }
    fn default_cluster_name() -> String {
        "default".to_string()
    }

    let r: Req = req(&body)?;
    let (region, account) = region_account(app);
    let k8s_cluster_name = format!("kecs-{}", r.cluster_name);
    let cluster = Cluster {
        name: r.cluster_name.clone(),
        arn: arn::cluster(region, account, &r.cluster_name),
        status: ClusterStatus::Active,
        k8s_cluster_name: k8s_cluster_name.clone(),
        region: region.to_string(),
        account_id: account.to_string(),
        local_stack_state: None,
        created_at: chrono::Utc::now(),
        tags: r.tags.into_iter().map(|t| Tag { key: t.key, value: t.value }).collect(),
    };
    let cluster = app.store.clusters.create(cluster).await?;

    let clients = app
        .client_cache
        .get_or_connect(&k8s_cluster_name, &app.args.kube_context)
        .await?;
    apply_namespace(
        &clients.client,
        &Namespace {
            metadata: ObjectMeta {
                name: Some(k8s_cluster_name),
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await?;

    app.events.publish(Event::ClusterChanged { cluster_arn: cluster.arn.clone() });
    Ok(json!({ "cluster": wire::cluster(&cluster) }))
}

pub async fn delete_cluster(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        cluster: String,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(&r.cluster).await?;

    let services = app.store.services.list_all_in_cluster(&cluster.arn).await;
    let non_inactive = services.iter().any(|s| s.status != ServiceStatus::Inactive);
    if non_inactive {
        return Err(KecsError::ClusterContainsServicesException(format!(
            "cluster {} still has active services",
            r.cluster
        )));
    }
    let (tasks, _) = app.store.tasks.list(&cluster.arn, None, None, None, None).await?;
    if tasks.iter().any(|t| t.last_status != LastStatus::Stopped) {
        return Err(KecsError::ClusterNotEmpty(format!(
            "cluster {} still has non-stopped tasks",
            r.cluster
        )));
    }

    app.store.clusters.delete(&cluster.name).await?;
    app.events.publish(Event::ClusterChanged { cluster_arn: cluster.arn.clone() });
    Ok(json!({ "cluster": wire::cluster(&cluster) }))
}

pub async fn list_clusters(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        max_results: Option<usize>,
        next_token: Option<String>,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let (clusters, next) = app
        .store
        .clusters
        .list(r.max_results, r.next_token.as_deref())
        .await?;
    Ok(json!({
        "clusterArns": clusters.into_iter().map(|c| c.arn).collect::<Vec<_>>(),
        "nextToken": next,
    }))
}

pub async fn describe_clusters(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        #[serde(default)]
        clusters: Vec<String>,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let names: Vec<String> = if r.clusters.is_empty() {
        let (all, _) = app.store.clusters.list(None, None).await?;
        all.into_iter().map(|c| c.name).collect()
    } else {
        r.clusters
            .into_iter()
            .map(|c| c.rsplit('/').next().unwrap_or(&c).to_string())
            .collect()
    };
    let clusters = app.store.clusters.describe_many(&names).await;
    let failures: Vec<Value> = names
        .iter()
        .filter(|n| !clusters.iter().any(|c| &c.name == *n))
        .map(|n| json!({ "arn": n, "reason": "MISSING" }))
        .collect();
    Ok(json!({
        "clusters": clusters.iter().map(wire::cluster).collect::<Vec<_>>(),
        "failures": failures,
    }))
}

// ----------------------------------------------------------- task defns

pub async fn register_task_definition(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        family: String,
        container_definitions: Vec<kecs_types::ContainerDefinition>,
        cpu: Option<String>,
        memory: Option<String>,
        #[serde(default)]
        network_mode: kecs_types::NetworkMode,
        #[serde(default)]
        volumes: Vec<kecs_types::Volume>,
        task_role_arn: Option<String>,
        execution_role_arn: Option<String>,
    }
    let r: Req = req(&body)?;
    let (region, account) = region_account(app);
    let td = app
        .store
        .task_definitions
        .register(&r.family, region, account, |revision, td_arn| kecs_types::TaskDefinition {
            family: r.family.clone(),
            revision,
            arn: td_arn,
            status: kecs_types::TaskDefinitionStatus::Active,
            containers: r.container_definitions.clone(),
            cpu: r.cpu.clone(),
            memory: r.memory.clone(),
            network_mode: r.network_mode,
            volumes: r.volumes.clone(),
            task_role_arn: r.task_role_arn.clone(),
            execution_role_arn: r.execution_role_arn.clone(),
            registered_at: chrono::Utc::now(),
        })
        .await?;
    Ok(json!({ "taskDefinition": wire::task_definition(&td) }))
}

pub(crate) fn parse_family_revision(s: &str) -> KecsResult<(String, u32)> {
    // Accepts either "family:rev" or a full taskDefinitionArn.
    let tail = s.rsplit('/').next().unwrap_or(s);
    let (family, rev) = tail
        .rsplit_once(':')
        .ok_or_else(|| KecsError::invalid(format!("invalid task definition id: {s}")))?;
    let rev: u32 = rev
        .parse()
        .map_err(|_| KecsError::invalid(format!("invalid revision in {s}")))?;
    Ok((family.to_string(), rev))
}

pub async fn deregister_task_definition(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        task_definition: String,
    }
    let r: Req = req(&body)?;
    let (family, revision) = parse_family_revision(&r.task_definition)?;
    let td = app.store.task_definitions.deregister(&family, revision).await?;
    Ok(json!({ "taskDefinition": wire::task_definition(&td) }))
}

pub async fn list_task_definitions(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        family_prefix: Option<String>,
        max_results: Option<usize>,
        next_token: Option<String>,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let (families, _) = app
        .store
        .task_definitions
        .list_families(r.family_prefix.as_deref(), None, None)
        .await?;
    let mut arns = Vec::new();
    for family in families {
        let (revisions, _) = app.store.task_definitions.list_revisions(&family, None, None).await?;
        arns.extend(revisions.into_iter().map(|td| td.arn));
    }
    let (page, next) = kecs_store::collection::paginate(
        arns.into_iter().map(|a| (a.clone(), a)).collect(),
        r.max_results,
        r.next_token.as_deref(),
    )?;
    Ok(json!({ "taskDefinitionArns": page, "nextToken": next }))
}

pub async fn describe_task_definition(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        task_definition: String,
    }
    let r: Req = req(&body)?;
    let (family, revision) = parse_family_revision(&r.task_definition)?;
    let td = app.store.task_definitions.get(&family, revision).await?;
    Ok(json!({ "taskDefinition": wire::task_definition(&td) }))
}

// -------------------------------------------------------------- services

fn resolve_cluster_name(cluster: &Option<String>) -> &str {
    cluster.as_deref().unwrap_or("default")
}

pub async fn create_service(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        service_name: String,
        task_definition: String,
        #[serde(default)]
        desired_count: i32,
        #[serde(default)]
        launch_type: LaunchType,
        #[serde(default)]
        network_configuration: kecs_types::NetworkConfiguration,
        #[serde(default)]
        load_balancers: Vec<kecs_types::ServiceLoadBalancer>,
        #[serde(default)]
        service_registries: Vec<kecs_types::ServiceRegistry>,
        #[serde(default)]
        deployment_configuration: kecs_types::DeploymentConfiguration,
        started_by: Option<String>,
    }
    let r: Req = req(&body)?;
    let (region, account) = region_account(app);
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let (family, revision) = parse_family_revision(&r.task_definition)?;
    let td = app.store.task_definitions.get(&family, revision).await?;
    if td.status != kecs_types::TaskDefinitionStatus::Active {
        return Err(KecsError::invalid(format!("task definition {} is not ACTIVE", r.task_definition)));
    }

    let service = Service {
        arn: arn::service(region, account, &cluster.name, &r.service_name),
        name: r.service_name.clone(),
        cluster_arn: cluster.arn.clone(),
        task_definition_arn: td.arn.clone(),
        desired_count: r.desired_count,
        running_count: 0,
        pending_count: r.desired_count,
        launch_type: r.launch_type,
        network_configuration: r.network_configuration,
        load_balancers: r.load_balancers,
        service_registries: r.service_registries,
        deployment_configuration: r.deployment_configuration,
        deployments: Vec::new(),
        status: ServiceStatus::Active,
        started_by: r.started_by,
        updated_at: chrono::Utc::now(),
    };
    let service = app.store.services.create(service).await?;

    apply_service_deployment(app, &cluster, &service, &td).await?;

    app.events.publish(Event::ServiceChanged { service_arn: service.arn.clone() });
    Ok(json!({ "service": wire::service(&service) }))
}

pub(crate) async fn apply_service_deployment(
    app: &AppState,
    cluster: &Cluster,
    service: &Service,
    td: &kecs_types::TaskDefinition,
) -> KecsResult<()> {
    let clients = app
        .client_cache
        .get_or_connect(&cluster.k8s_cluster_name, &app.args.kube_context)
        .await?;

    let containers: Vec<(String, Vec<kecs_types::SecretRef>)> = td
        .containers
        .iter()
        .map(|c| (c.name.clone(), c.secrets.clone()))
        .collect();
    let secrets: ResolvedSecrets = if containers.iter().any(|(_, s)| !s.is_empty()) {
        kecs_aws::secrets::resolve_and_materialize(
            &app.aws,
            &app.secret_cache,
            &clients.client,
            &cluster.k8s_cluster_name,
            &td.family,
            &containers,
        )
        .await?
    } else {
        ResolvedSecrets::new()
    };

    if let Some(role_arn) = &td.task_role_arn {
        kecs_aws::iam::ensure_service_account(
            &clients.client,
            &cluster.k8s_cluster_name,
            &td.family,
            role_arn,
            false,
        )
        .await?;
    }

    let deployment = to_deployment(cluster, service, td, &secrets, &cluster.k8s_cluster_name);
    apply_deployment(&clients.client, &cluster.k8s_cluster_name, &deployment).await?;
    Ok(())
}

/// `runningCount`/`pendingCount` aren't tracked on the stored `Service` row
/// (spec.md §8 scenario #1 needs them live); derive them at read time from
/// the backing Deployment's own replica counts instead of persisting a copy
/// that would drift every time a pod changes phase.
async fn refresh_service_counts(app: &AppState, cluster: &Cluster, service: &mut Service) {
    let clients = match app.client_cache.get_or_connect(&cluster.k8s_cluster_name, &app.args.kube_context).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(service = %service.name, error = %e, "could not refresh service counts");
            return;
        }
    };
    let api: Api<Deployment> = Api::namespaced(clients.client, &cluster.k8s_cluster_name);
    match api.get(&service.name).await {
        Ok(dep) => {
            let status = dep.status.unwrap_or_default();
            let ready = status.ready_replicas.unwrap_or(0);
            let total = status.replicas.unwrap_or(ready);
            service.running_count = ready;
            service.pending_count = (total - ready).max(0);
        }
        Err(kube::Error::Api(e)) if e.code == 404 => {}
        Err(e) => tracing::warn!(service = %service.name, error = %e, "could not fetch deployment status"),
    }
}

pub async fn update_service(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        service: String,
        desired_count: Option<i32>,
        task_definition: Option<String>,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let mut service = app.store.services.get(&cluster.arn, &r.service).await?;

    if let Some(dc) = r.desired_count {
        service.desired_count = dc;
    }
    if let Some(td_ref) = &r.task_definition {
        let (family, revision) = parse_family_revision(td_ref)?;
        let td = app.store.task_definitions.get(&family, revision).await?;
        if td.status != kecs_types::TaskDefinitionStatus::Active {
            return Err(KecsError::invalid(format!("task definition {td_ref} is not ACTIVE")));
        }
        service.task_definition_arn = td.arn.clone();
    }
    service.updated_at = chrono::Utc::now();
    let service = app.store.services.update(service).await?;

    let (family, revision) = parse_family_revision(&service.task_definition_arn)?;
    let td = app.store.task_definitions.get(&family, revision).await?;
    apply_service_deployment(app, &cluster, &service, &td).await?;

    app.events.publish(Event::ServiceChanged { service_arn: service.arn.clone() });
    Ok(json!({ "service": wire::service(&service) }))
}

pub async fn delete_service(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        service: String,
        #[serde(default)]
        force: bool,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let mut service = app.store.services.get(&cluster.arn, &r.service).await?;
    if service.desired_count > 0 && !r.force {
        return Err(KecsError::invalid(format!(
            "service {} still has desiredCount={}, pass force to delete anyway",
            r.service, service.desired_count
        )));
    }
    service.status = ServiceStatus::Inactive;
    service.desired_count = 0;
    service.updated_at = chrono::Utc::now();
    let service = app.store.services.update(service).await?;
    app.events.publish(Event::ServiceChanged { service_arn: service.arn.clone() });
    Ok(json!({ "service": wire::service(&service) }))
}

pub async fn list_services(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        launch_type: Option<LaunchType>,
        max_results: Option<usize>,
        next_token: Option<String>,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let (services, next) = app
        .store
        .services
        .list(&cluster.arn, None, r.launch_type, r.max_results, r.next_token.as_deref())
        .await?;
    Ok(json!({
        "serviceArns": services.into_iter().map(|s| s.arn).collect::<Vec<_>>(),
        "nextToken": next,
    }))
}

pub async fn describe_services(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        services: Vec<String>,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let mut found = Vec::new();
    let mut failures = Vec::new();
    for name in &r.services {
        let short = name.rsplit('/').next().unwrap_or(name);
        match app.store.services.get(&cluster.arn, short).await {
            Ok(mut s) => {
                refresh_service_counts(app, &cluster, &mut s).await;
                found.push(s);
            }
            Err(_) => failures.push(json!({ "arn": name, "reason": "MISSING" })),
        }
    }
    Ok(json!({
        "services": found.iter().map(wire::service).collect::<Vec<_>>(),
        "failures": failures,
    }))
}

// ----------------------------------------------------------------- tasks

pub async fn run_task(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        task_definition: String,
        #[serde(default)]
        count: u32,
        #[serde(default)]
        launch_type: LaunchType,
        #[serde(default)]
        network_configuration: Option<kecs_types::NetworkConfiguration>,
        started_by: Option<String>,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let (family, revision) = parse_family_revision(&r.task_definition)?;
    let td = app.store.task_definitions.get(&family, revision).await?;
    let count = r.count.max(1);
    let network_annotations = network_annotations(td.network_mode, r.network_configuration.as_ref())?;

    let clients = app
        .client_cache
        .get_or_connect(&cluster.k8s_cluster_name, &app.args.kube_context)
        .await?;

    let containers: Vec<(String, Vec<kecs_types::SecretRef>)> = td
        .containers
        .iter()
        .map(|c| (c.name.clone(), c.secrets.clone()))
        .collect();
    let secrets: ResolvedSecrets = if containers.iter().any(|(_, s)| !s.is_empty()) {
        kecs_aws::secrets::resolve_and_materialize(
            &app.aws,
            &app.secret_cache,
            &clients.client,
            &cluster.k8s_cluster_name,
            &td.family,
            &containers,
        )
        .await?
    } else {
        ResolvedSecrets::new()
    };
    if let Some(role_arn) = &td.task_role_arn {
        kecs_aws::iam::ensure_service_account(
            &clients.client,
            &cluster.k8s_cluster_name,
            &td.family,
            role_arn,
            false,
        )
        .await?;
    }

    let mut tasks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let pod_name = format!("task-{}", uuid::Uuid::new_v4().simple());
        let task_id = arn::deterministic_task_id(&pod_name);

        let pod_spec = to_pod_spec(&td, &secrets);

        let mut annotations = kecs_translate::pod_annotations(&td);
        annotations.extend(network_annotations.clone());

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(pod_name.clone()),
                namespace: Some(cluster.k8s_cluster_name.clone()),
                labels: Some(BTreeMap::from([(
                    "kecs.io/ecs-task".to_string(),
                    task_id.clone(),
                )])),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(pod_spec),
            ..Default::default()
        };
        create_pod(&clients.client, &cluster.k8s_cluster_name, &pod).await?;

        let task = Task {
            id: task_id.clone(),
            arn: arn::task(&app.args.region, &app.args.account_id, &cluster.name, &task_id),
            cluster_arn: cluster.arn.clone(),
            task_definition_arn: td.arn.clone(),
            service_name: None,
            desired_status: DesiredStatus::Running,
            last_status: LastStatus::Provisioning,
            launch_type: r.launch_type,
            pod_name: Some(pod_name),
            namespace: Some(cluster.k8s_cluster_name.clone()),
            started_by: r.started_by.clone(),
            stopped_reason: None,
            started_at: None,
            stopped_at: None,
            created_at: chrono::Utc::now(),
            cpu: td.cpu.clone(),
            memory: td.memory.clone(),
        };
        let task = app.store.tasks.create(task).await?;
        app.events.publish(Event::TaskStateChanged {
            task_arn: task.arn.clone(),
            last_status: "PROVISIONING".to_string(),
        });
        tasks.push(task);
    }

    Ok(json!({ "tasks": tasks.iter().map(wire::task).collect::<Vec<_>>(), "failures": [] }))
}

pub async fn stop_task(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        task: String,
        reason: Option<String>,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let task_id = r.task.rsplit('/').next().unwrap_or(&r.task).to_string();
    let mut task = app.store.tasks.get(&cluster.arn, &task_id).await?;
    task.desired_status = DesiredStatus::Stopped;
    task.stopped_reason = r.reason.clone();
    task = app.store.tasks.update(task).await?;
    let task = app.store.tasks.transition(&task.id, LastStatus::Stopping).await?;

    if let Some(pod_name) = &task.pod_name {
        let clients = app
            .client_cache
            .get_or_connect(&cluster.k8s_cluster_name, &app.args.kube_context)
            .await?;
        delete_pod(&clients.client, &cluster.k8s_cluster_name, pod_name).await?;
    }

    app.events.publish(Event::TaskStateChanged {
        task_arn: task.arn.clone(),
        last_status: "STOPPING".to_string(),
    });
    Ok(json!({ "task": wire::task(&task) }))
}

pub async fn list_tasks(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        service_name: Option<String>,
        desired_status: Option<DesiredStatus>,
        max_results: Option<usize>,
        next_token: Option<String>,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let (tasks, next) = app
        .store
        .tasks
        .list(
            &cluster.arn,
            r.service_name.as_deref(),
            r.desired_status,
            r.max_results,
            r.next_token.as_deref(),
        )
        .await?;
    Ok(json!({
        "taskArns": tasks.into_iter().map(|t| t.arn).collect::<Vec<_>>(),
        "nextToken": next,
    }))
}

pub async fn describe_tasks(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        tasks: Vec<String>,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let mut found = Vec::new();
    let mut failures = Vec::new();
    for t in &r.tasks {
        let id = t.rsplit('/').next().unwrap_or(t);
        match app.store.tasks.get(&cluster.arn, id).await {
            Ok(task) => found.push(task),
            Err(_) => failures.push(json!({ "arn": t, "reason": "MISSING" })),
        }
    }
    Ok(json!({
        "tasks": found.iter().map(wire::task).collect::<Vec<_>>(),
        "failures": failures,
    }))
}

// ------------------------------------------------------ container instances
//
// SPEC_FULL.md §3 SUPPLEMENT records the Open Question decision: container
// instances are first-class persisted entities, never synthesized from k8s
// Node objects at read time. Registration is still a stub in the sense that
// nothing in a Kubernetes-backed cluster needs an EC2-style agent to phone
// home; it exists so clients that call these APIs get a consistent object
// back rather than an error.

pub async fn register_container_instance(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        #[serde(default)]
        total_resources: Vec<WireResource>,
    }
    #[derive(Deserialize)]
    struct WireResource {
        name: String,
        #[serde(default)]
        integer_value: i64,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let id = uuid::Uuid::new_v4().simple().to_string();

    let mut resources = Resources::default();
    for res in &r.total_resources {
        match res.name.as_str() {
            "CPU" => resources.cpu = res.integer_value,
            "MEMORY" => resources.memory = res.integer_value,
            _ => {}
        }
    }

    let ci = ContainerInstance {
        arn: arn::container_instance(&app.args.region, &app.args.account_id, &cluster.name, &id),
        cluster_arn: cluster.arn.clone(),
        status: ContainerInstanceStatus::Active,
        agent_connected: true,
        running_tasks_count: 0,
        registered_resources: resources.clone(),
        remaining_resources: resources,
        attributes: BTreeMap::new(),
        registered_at: chrono::Utc::now(),
    };
    let ci = app.store.container_instances.create(ci).await?;
    Ok(json!({ "containerInstance": wire::container_instance(&ci) }))
}

pub async fn deregister_container_instance(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        container_instance: String,
    }
    let r: Req = req(&body)?;
    let ci = app.store.container_instances.get(&r.container_instance).await?;
    app.store.container_instances.delete(&ci.arn).await?;
    Ok(json!({ "containerInstance": wire::container_instance(&ci) }))
}

pub async fn list_container_instances(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        max_results: Option<usize>,
        next_token: Option<String>,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let (cis, next) = app
        .store
        .container_instances
        .list(&cluster.arn, None, r.max_results, r.next_token.as_deref())
        .await?;
    Ok(json!({
        "containerInstanceArns": cis.into_iter().map(|c| c.arn).collect::<Vec<_>>(),
        "nextToken": next,
    }))
}

pub async fn describe_container_instances(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        #[serde(default)]
        container_instances: Vec<String>,
    }
    let r: Req = req(&body)?;
    let mut found = Vec::new();
    let mut failures = Vec::new();
    for arn_str in &r.container_instances {
        match app.store.container_instances.get(arn_str).await {
            Ok(ci) => found.push(ci),
            Err(_) => failures.push(json!({ "arn": arn_str, "reason": "MISSING" })),
        }
    }
    Ok(json!({
        "containerInstances": found.iter().map(wire::container_instance).collect::<Vec<_>>(),
        "failures": failures,
    }))
}

// ------------------------------------------------------------- attributes

pub async fn put_attributes(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        attributes: Vec<WireAttribute>,
    }
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct WireAttribute {
        #[serde(default = "default_cluster")]
        cluster: String,
        #[serde(default)]
        target_type: String,
        target_id: String,
        name: String,
        value: Option<String>,
    }
    fn default_cluster() -> String {
        "default".to_string()
    }
    let r: Req = req(&body)?;
    let mut out = Vec::with_capacity(r.attributes.len());
    for a in r.attributes {
        let attribute = Attribute {
            cluster: a.cluster,
            target_type: a.target_type,
            target_id: a.target_id,
            name: a.name,
            value: a.value,
        };
        out.push(app.store.attributes.put(attribute).await?);
    }
    Ok(json!({ "attributes": out.iter().map(wire::attribute).collect::<Vec<_>>() }))
}

pub async fn delete_attributes(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        attributes: Vec<WireAttribute>,
    }
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct WireAttribute {
        #[serde(default = "default_cluster")]
        cluster: String,
        #[serde(default)]
        target_type: String,
        target_id: String,
        name: String,
    }
    fn default_cluster() -> String {
        "default".to_string()
    }
    let r: Req = req(&body)?;
    let mut out = Vec::with_capacity(r.attributes.len());
    for a in r.attributes {
        let attribute = Attribute {
            cluster: a.cluster,
            target_type: a.target_type,
            target_id: a.target_id,
            name: a.name,
            value: None,
        };
        app.store.attributes.delete(&attribute).await?;
        out.push(attribute);
    }
    Ok(json!({ "attributes": out.iter().map(wire::attribute).collect::<Vec<_>>() }))
}

pub async fn list_attributes(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        #[serde(default = "default_cluster")]
        cluster: String,
        target_type: Option<String>,
    }
    fn default_cluster() -> String {
        "default".to_string()
    }
    let r: Req = req(&body)?;
    let attrs = app.store.attributes.list(&r.cluster, r.target_type.as_deref()).await;
    Ok(json!({ "attributes": attrs.iter().map(wire::attribute).collect::<Vec<_>>() }))
}

// -------------------------------------------------------------- task sets

pub async fn create_task_set(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        service: String,
        task_definition: String,
        #[serde(default)]
        scale: kecs_types::Scale,
        external_id: Option<String>,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let service = app.store.services.get(&cluster.arn, &r.service).await?;
    let (family, revision) = parse_family_revision(&r.task_definition)?;
    let td = app.store.task_definitions.get(&family, revision).await?;

    let id = uuid::Uuid::new_v4().simple().to_string();
    let task_set = TaskSet {
        id: id.clone(),
        arn: arn::task_set(&app.args.region, &app.args.account_id, &cluster.name, &service.name, &id),
        service_arn: service.arn.clone(),
        cluster_arn: cluster.arn.clone(),
        task_definition_arn: td.arn.clone(),
        status: TaskSetStatus::Active,
        scale: r.scale,
        external_id: r.external_id,
        created_at: chrono::Utc::now(),
    };
    let task_set = app.store.task_sets.create(task_set).await?;
    Ok(json!({ "taskSet": wire::task_set(&task_set) }))
}

pub async fn update_task_set(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        task_set: String,
        #[serde(default)]
        scale: kecs_types::Scale,
    }
    let r: Req = req(&body)?;
    let mut task_set = app.store.task_sets.get(&r.task_set).await?;
    task_set.scale = r.scale;
    let task_set = app.store.task_sets.update(task_set).await?;
    Ok(json!({ "taskSet": wire::task_set(&task_set) }))
}

pub async fn delete_task_set(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        task_set: String,
    }
    let r: Req = req(&body)?;
    let task_set = app.store.task_sets.get(&r.task_set).await?;
    if task_set.status == TaskSetStatus::Primary {
        return Err(KecsError::invalid("cannot delete the PRIMARY task set"));
    }
    app.store.task_sets.delete(&task_set.id).await?;
    Ok(json!({ "taskSet": wire::task_set(&task_set) }))
}

pub async fn describe_task_sets(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        service: String,
    }
    let r: Req = req(&body)?;
    let (task_sets, _) = app.store.task_sets.list_for_service(&r.service, None, None).await?;
    Ok(json!({ "taskSets": task_sets.iter().map(wire::task_set).collect::<Vec<_>>() }))
}

pub async fn update_service_primary_task_set(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        service: String,
        primary_task_set: String,
    }
    let r: Req = req(&body)?;
    let cluster = app.store.clusters.get(resolve_cluster_name(&r.cluster)).await?;
    let service = app.store.services.get(&cluster.arn, &r.service).await?;
    let (existing, _) = app.store.task_sets.list_for_service(&service.arn, None, None).await?;

    let mut promoted = None;
    for mut ts in existing {
        if ts.id == r.primary_task_set {
            ts.status = TaskSetStatus::Primary;
            promoted = Some(app.store.task_sets.update(ts).await?);
        } else if ts.status == TaskSetStatus::Primary {
            ts.status = TaskSetStatus::Active;
            app.store.task_sets.update(ts).await?;
        }
    }
    let promoted = promoted.ok_or_else(|| KecsError::not_found("TaskSet", &r.primary_task_set))?;
    Ok(json!({ "taskSet": wire::task_set(&promoted) }))
}

// ------------------------------------------------------------------ dispatch

/// Dispatches on the operation name taken from the
/// `AmazonEC2ContainerServiceV20141113.<Op>` target header (spec.md §6).
pub async fn dispatch(app: &AppState, op: &str, body: Value) -> KecsResult<Value> {
    match op {
        "CreateCluster" => create_cluster(app, body).await,
        "DeleteCluster" => delete_cluster(app, body).await,
        "ListClusters" => list_clusters(app, body).await,
        "DescribeClusters" => describe_clusters(app, body).await,
        "RegisterTaskDefinition" => register_task_definition(app, body).await,
        "DeregisterTaskDefinition" => deregister_task_definition(app, body).await,
        "ListTaskDefinitions" => list_task_definitions(app, body).await,
        "DescribeTaskDefinition" => describe_task_definition(app, body).await,
        "CreateService" => create_service(app, body).await,
        "UpdateService" => update_service(app, body).await,
        "DeleteService" => delete_service(app, body).await,
        "ListServices" => list_services(app, body).await,
        "DescribeServices" => describe_services(app, body).await,
        "RunTask" => run_task(app, body).await,
        "StopTask" => stop_task(app, body).await,
        "ListTasks" => list_tasks(app, body).await,
        "DescribeTasks" => describe_tasks(app, body).await,
        "RegisterContainerInstance" => register_container_instance(app, body).await,
        "DeregisterContainerInstance" => deregister_container_instance(app, body).await,
        "ListContainerInstances" => list_container_instances(app, body).await,
        "DescribeContainerInstances" => describe_container_instances(app, body).await,
        "PutAttributes" => put_attributes(app, body).await,
        "DeleteAttributes" => delete_attributes(app, body).await,
        "ListAttributes" => list_attributes(app, body).await,
        "CreateTaskSet" => create_task_set(app, body).await,
        "UpdateTaskSet" => update_task_set(app, body).await,
        "DeleteTaskSet" => delete_task_set(app, body).await,
        "DescribeTaskSets" => describe_task_sets(app, body).await,
        "UpdateServicePrimaryTaskSet" => update_service_primary_task_set(app, body).await,
        other => Err(KecsError::invalid(format!("unsupported ECS operation: {other}"))),
    }
}

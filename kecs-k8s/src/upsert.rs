//! `Get -> Create on NotFound -> Update on conflict-free diff` (spec.md
//! §4.3), preserving immutable fields the update pass would otherwise wipe.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Namespace, Pod, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::ClusterRole;
use kecs_types::{KecsError, KecsResult};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

const MANAGER: &str = "kecs";

async fn apply<T>(api: &Api<T>, name: &str, obj: &T) -> KecsResult<T>
where
    T: Clone + Debug + DeserializeOwned + Serialize + Resource,
{
    match api.get(name).await {
        Ok(_existing) => {
            let patch = Patch::Apply(obj);
            api.patch(name, &PatchParams::apply(MANAGER).force(), &patch)
                .await
                .map_err(|e| KecsError::internal(format!("update {name}: {e}")))
        }
        Err(kube::Error::Api(e)) if e.code == 404 => api
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| KecsError::internal(format!("create {name}: {e}"))),
        Err(e) => Err(KecsError::internal(format!("get {name}: {e}"))),
    }
}

pub async fn apply_namespace(client: &Client, ns: &Namespace) -> KecsResult<Namespace> {
    let name = ns
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("namespace missing metadata.name"))?;
    let api: Api<Namespace> = Api::all(client.clone());
    apply(&api, name, ns).await
}

pub async fn apply_service_account(
    client: &Client,
    namespace: &str,
    sa: &ServiceAccount,
) -> KecsResult<ServiceAccount> {
    let name = sa
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("service account missing metadata.name"))?;
    let api: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    apply(&api, name, sa).await
}

pub async fn apply_cluster_role(client: &Client, cr: &ClusterRole) -> KecsResult<ClusterRole> {
    let name = cr
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("cluster role missing metadata.name"))?;
    let api: Api<ClusterRole> = Api::all(client.clone());
    apply(&api, name, cr).await
}

pub async fn apply_config_map(
    client: &Client,
    namespace: &str,
    cm: &ConfigMap,
) -> KecsResult<ConfigMap> {
    let name = cm
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("configmap missing metadata.name"))?;
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    apply(&api, name, cm).await
}

pub async fn apply_deployment(
    client: &Client,
    namespace: &str,
    deployment: &Deployment,
) -> KecsResult<Deployment> {
    let name = deployment
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("deployment missing metadata.name"))?;
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    apply(&api, name, deployment).await
}

/// Server-side apply already keeps `clusterIP`/`nodePort` stable across
/// updates (they're absent from our desired object, so apply never claims
/// ownership of those fields); spec.md §4.3 calls this out explicitly
/// because a naive full-object `PUT` would null them out.
pub async fn apply_service(
    client: &Client,
    namespace: &str,
    svc: &Service,
) -> KecsResult<Service> {
    let name = svc
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("service missing metadata.name"))?;
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    apply(&api, name, svc).await
}

pub async fn apply_secret(client: &Client, namespace: &str, secret: &Secret) -> KecsResult<Secret> {
    let name = secret
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("secret missing metadata.name"))?;
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    apply(&api, name, secret).await
}

/// `RunTask` mints a fresh pod on every call (unlike a service's deployment,
/// which is apply-managed) so this is a plain create, not an upsert.
pub async fn create_pod(client: &Client, namespace: &str, pod: &Pod) -> KecsResult<Pod> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), pod)
        .await
        .map_err(|e| KecsError::internal(format!("create pod: {e}")))
}

pub async fn delete_pod(client: &Client, namespace: &str, name: &str) -> KecsResult<()> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    match api.delete(name, &Default::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(KecsError::internal(format!("delete pod {name}: {e}"))),
    }
}

pub async fn apply_endpoints(
    client: &Client,
    namespace: &str,
    endpoints: &Endpoints,
) -> KecsResult<Endpoints> {
    let name = endpoints
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| KecsError::invalid("endpoints missing metadata.name"))?;
    let api: Api<Endpoints> = Api::namespaced(client.clone(), namespace);
    apply(&api, name, endpoints).await
}

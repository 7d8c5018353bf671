use std::collections::HashMap;
use std::sync::Arc;

use kecs_types::{KecsError, KecsResult};
use kube::{
    Client, Config,
    api::DynamicObject,
    config::KubeConfigOptions,
    core::gvk::GroupVersion,
    discovery,
};
use tokio::sync::RwLock;

/// Both the typed client (namespaces/deployments/services/RBAC/configmaps)
/// and the dynamic one needed for the Traefik `IngressRoute` CRD we don't
/// own (spec.md §4.3).
#[derive(Clone)]
pub struct ClusterClients {
    pub client: Client,
}

/// Keyed by `k8sClusterName` (spec.md §4.3: "per-cluster client cache keyed
/// by k8sClusterName").
#[derive(Clone, Default)]
pub struct ClientCache {
    inner: Arc<RwLock<HashMap<String, ClusterClients>>>,
}

impl ClientCache {
    pub fn new() -> Self {
        ClientCache::default()
    }

    pub async fn get_or_connect(
        &self,
        k8s_cluster_name: &str,
        kube_context: &str,
    ) -> KecsResult<ClusterClients> {
        if let Some(clients) = self.inner.read().await.get(k8s_cluster_name) {
            return Ok(clients.clone());
        }

        let options = KubeConfigOptions {
            context: if kube_context.is_empty() {
                None
            } else {
                Some(kube_context.to_string())
            },
            ..Default::default()
        };
        let config = Config::from_kubeconfig(&options)
            .await
            .map_err(|e| KecsError::internal(format!("load kubeconfig: {e}")))?;
        let client = Client::try_from(config)
            .map_err(|e| KecsError::internal(format!("build k8s client: {e}")))?;

        let clients = ClusterClients { client };
        self.inner
            .write()
            .await
            .insert(k8s_cluster_name.to_string(), clients.clone());
        Ok(clients)
    }

    pub async fn evict(&self, k8s_cluster_name: &str) {
        self.inner.write().await.remove(k8s_cluster_name);
    }
}

/// Resolves the dynamic `Api<DynamicObject>` for a CRD not statically typed
/// in this crate (Traefik's `IngressRoute`), the idiomatic escape hatch for
/// unowned CRDs (SPEC_FULL.md §4.3).
pub async fn dynamic_api(
    client: &Client,
    group: &str,
    version: &str,
    kind: &str,
    namespace: &str,
) -> KecsResult<kube::Api<DynamicObject>> {
    let gv = GroupVersion::gv(group, version);
    let apigroup = discovery::oneshot::pinned_group(client, &gv)
        .await
        .map_err(|e| KecsError::internal(format!("discover group {group}: {e}")))?;
    let (ar, _caps) = apigroup
        .versioned_resources(version)
        .into_iter()
        .find(|(ar, _)| ar.kind == kind)
        .ok_or_else(|| KecsError::internal(format!("CRD {group}/{version} {kind} not found")))?;
    Ok(kube::Api::namespaced_with(client.clone(), namespace, &ar))
}

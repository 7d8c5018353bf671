//! Namespace/service/instance CRUD plus the k8s side effects spec.md §4.5
//! describes: a headless Service per SD service, its Endpoints kept in
//! sync with registered instances.

use kecs_k8s::upsert::{apply_endpoints, apply_namespace as apply_k8s_namespace, apply_service};
use kecs_k8s::ClientCache;
use kecs_store::ServiceDiscoveryStore;
use kecs_translate::arn;
use kecs_types::{
    DnsConfig, KecsResult, SdHealthCheckConfig, SdInstance, SdNamespace, SdNamespaceType,
    SdService,
};

use crate::instance::endpoints_for_instances;
use crate::namespace::derive_k8s_namespace;
use crate::service::{headless_service, k8s_service_name};

/// Which k8s cluster a namespace's services/instances land on.
pub struct K8sTarget<'a> {
    pub cluster_name: &'a str,
    pub kube_context: &'a str,
}

pub struct SdManager {
    store: ServiceDiscoveryStore,
    client_cache: ClientCache,
}

impl SdManager {
    pub fn new(store: ServiceDiscoveryStore, client_cache: ClientCache) -> Self {
        SdManager {
            store,
            client_cache,
        }
    }

    pub async fn create_namespace(
        &self,
        region: &str,
        account: &str,
        name: &str,
        ns_type: SdNamespaceType,
        hosted_zone_id: Option<String>,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<SdNamespace> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let k8s_namespace = derive_k8s_namespace(name);
        let ns = SdNamespace {
            id: id.clone(),
            arn: arn::sd_namespace(region, account, &id),
            name: name.to_string(),
            ns_type,
            hosted_zone_id,
            k8s_namespace: k8s_namespace.clone(),
        };
        let ns = self.store.create_namespace(ns).await?;

        let clients = self
            .client_cache
            .get_or_connect(k8s.cluster_name, k8s.kube_context)
            .await?;
        apply_k8s_namespace(
            &clients.client,
            &k8s_openapi::api::core::v1::Namespace {
                metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                    name: Some(k8s_namespace),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await?;
        Ok(ns)
    }

    pub async fn create_service(
        &self,
        region: &str,
        account: &str,
        name: &str,
        namespace_id: &str,
        dns_config: DnsConfig,
        health_check: Option<SdHealthCheckConfig>,
        port: u16,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<SdService> {
        let namespace = self.store.get_namespace(namespace_id).await?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let svc = SdService {
            id: id.clone(),
            arn: arn::sd_service(region, account, &id),
            name: name.to_string(),
            namespace_id: namespace_id.to_string(),
            dns_config,
            health_check,
        };
        let svc = self.store.create_service(svc).await?;

        let clients = self
            .client_cache
            .get_or_connect(k8s.cluster_name, k8s.kube_context)
            .await?;
        apply_service(
            &clients.client,
            &namespace.k8s_namespace,
            &headless_service(&svc.name, &namespace.k8s_namespace, port),
        )
        .await?;
        Ok(svc)
    }

    pub async fn register_instance(
        &self,
        service_id: &str,
        instance: SdInstance,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<SdInstance> {
        let instance = self.store.register_instance(instance).await?;
        self.sync_endpoints(service_id, k8s).await?;
        Ok(instance)
    }

    pub async fn deregister_instance(
        &self,
        service_id: &str,
        instance_id: &str,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<()> {
        self.store.deregister_instance(service_id, instance_id).await?;
        self.sync_endpoints(service_id, k8s).await
    }

    async fn sync_endpoints(&self, service_id: &str, k8s: &K8sTarget<'_>) -> KecsResult<()> {
        let svc = self.store.get_service(service_id).await?;
        let namespace = self.store.get_namespace(&svc.namespace_id).await?;
        let instances = self.store.instances_for_service(service_id).await;

        let clients = self
            .client_cache
            .get_or_connect(k8s.cluster_name, k8s.kube_context)
            .await?;
        let endpoints = endpoints_for_instances(
            &k8s_service_name(&svc.name),
            &namespace.k8s_namespace,
            &instances,
        );
        apply_endpoints(&clients.client, &namespace.k8s_namespace, &endpoints).await?;
        Ok(())
    }
}

use std::path::Path;

use kecs_types::{KecsError, KecsResult, SdInstance, SdNamespace, SdService};

use crate::collection::Collection;

#[derive(Clone)]
pub struct ServiceDiscoveryStore {
    pub namespaces: Collection<SdNamespace>,
    pub services: Collection<SdService>,
    pub instances: Collection<SdInstance>,
}

impl ServiceDiscoveryStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(ServiceDiscoveryStore {
            namespaces: Collection::open(dir, "sd_namespaces").await?,
            services: Collection::open(dir, "sd_services").await?,
            instances: Collection::open(dir, "sd_instances").await?,
        })
    }

    pub async fn create_namespace(&self, ns: SdNamespace) -> KecsResult<SdNamespace> {
        self.namespaces.create(ns.id.clone(), ns).await
    }

    pub async fn get_namespace(&self, id: &str) -> KecsResult<SdNamespace> {
        self.namespaces
            .get(id)
            .await
            .ok_or_else(|| KecsError::not_found("Namespace", id))
    }

    pub async fn create_service(&self, svc: SdService) -> KecsResult<SdService> {
        self.services.create(svc.id.clone(), svc).await
    }

    pub async fn get_service(&self, id: &str) -> KecsResult<SdService> {
        self.services
            .get(id)
            .await
            .ok_or_else(|| KecsError::not_found("Service", id))
    }

    pub async fn services_in_namespace(&self, namespace_id: &str) -> Vec<SdService> {
        self.services
            .list_all()
            .await
            .into_iter()
            .filter(|s| s.namespace_id == namespace_id)
            .collect()
    }

    pub async fn register_instance(&self, instance: SdInstance) -> KecsResult<SdInstance> {
        self.instances
            .put(format!("{}::{}", instance.service_id, instance.id), instance)
            .await
    }

    pub async fn deregister_instance(&self, service_id: &str, instance_id: &str) -> KecsResult<()> {
        self.instances
            .delete(&format!("{service_id}::{instance_id}"))
            .await
    }

    pub async fn instances_for_service(&self, service_id: &str) -> Vec<SdInstance> {
        self.instances
            .list_all()
            .await
            .into_iter()
            .filter(|i| i.service_id == service_id)
            .collect()
    }
}

pub mod attributes;
pub mod collection;
pub mod container_instances;
pub mod clusters;
pub mod elbv2;
pub mod service_discovery;
pub mod services;
pub mod task_definitions;
pub mod task_logs;
pub mod task_sets;
pub mod tasks;
pub mod transaction;

use std::path::Path;

use kecs_types::{KecsResult, Service, TaskSet};

pub use attributes::AttributeStore;
pub use clusters::ClusterStore;
pub use container_instances::ContainerInstanceStore;
pub use elbv2::Elbv2Store;
pub use service_discovery::ServiceDiscoveryStore;
pub use services::ServiceStore;
pub use task_definitions::TaskDefinitionStore;
pub use task_logs::TaskLogStore;
pub use task_sets::TaskSetStore;
pub use tasks::TaskStore;
pub use transaction::StoreTransaction;

/// C1: one substore per entity kind, each durable under
/// `<instance-dir>/data/<entity>.json` (spec.md §4.1).
#[derive(Clone)]
pub struct Store {
    pub clusters: ClusterStore,
    pub task_definitions: TaskDefinitionStore,
    pub services: ServiceStore,
    pub tasks: TaskStore,
    pub task_sets: TaskSetStore,
    pub container_instances: ContainerInstanceStore,
    pub attributes: AttributeStore,
    pub elbv2: Elbv2Store,
    pub service_discovery: ServiceDiscoveryStore,
    pub task_logs: TaskLogStore,
}

impl Store {
    pub async fn open(data_dir: &Path) -> KecsResult<Self> {
        Ok(Store {
            clusters: ClusterStore::open(data_dir).await?,
            task_definitions: TaskDefinitionStore::open(data_dir).await?,
            services: ServiceStore::open(data_dir).await?,
            tasks: TaskStore::open(data_dir).await?,
            task_sets: TaskSetStore::open(data_dir).await?,
            container_instances: ContainerInstanceStore::open(data_dir).await?,
            attributes: AttributeStore::open(data_dir).await?,
            elbv2: Elbv2Store::open(data_dir).await?,
            service_discovery: ServiceDiscoveryStore::open(data_dir).await?,
            task_logs: TaskLogStore::open(data_dir).await?,
        })
    }

    /// Updates a service's row and creates its next-deployment task set as
    /// one logical change; if creating the task set fails, the service row
    /// is rolled back to `previous` (spec.md §4.1's multi-row example).
    pub async fn update_service_with_task_set(
        &self,
        previous: Service,
        updated: Service,
        new_task_set: TaskSet,
    ) -> KecsResult<(Service, TaskSet)> {
        let mut txn = StoreTransaction::new();
        let service = self.services.update(updated).await?;

        let services = self.services.clone();
        txn.on_abort(async move {
            let _ = services.update(previous).await;
        });

        match self.task_sets.create(new_task_set).await {
            Ok(ts) => {
                txn.commit();
                Ok((service, ts))
            }
            Err(e) => {
                txn.abort().await;
                Err(e)
            }
        }
    }
}

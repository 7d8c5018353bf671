use std::path::Path;

use kecs_types::{ContainerInstance, ContainerInstanceStatus, KecsError, KecsResult};

use crate::collection::{Collection, paginate};

#[derive(Clone)]
pub struct ContainerInstanceStore {
    rows: Collection<ContainerInstance>,
}

impl ContainerInstanceStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(ContainerInstanceStore {
            rows: Collection::open(dir, "container_instances").await?,
        })
    }

    pub async fn create(&self, ci: ContainerInstance) -> KecsResult<ContainerInstance> {
        self.rows.create(ci.arn.clone(), ci).await
    }

    pub async fn get(&self, arn: &str) -> KecsResult<ContainerInstance> {
        self.rows
            .get(arn)
            .await
            .ok_or_else(|| KecsError::not_found("ContainerInstance", arn))
    }

    pub async fn update(&self, ci: ContainerInstance) -> KecsResult<ContainerInstance> {
        self.rows.update(&ci.arn.clone(), ci).await
    }

    pub async fn delete(&self, arn: &str) -> KecsResult<()> {
        self.rows.delete(arn).await
    }

    pub async fn list(
        &self,
        cluster_arn: &str,
        status: Option<ContainerInstanceStatus>,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> KecsResult<(Vec<ContainerInstance>, Option<String>)> {
        let items: Vec<(String, ContainerInstance)> = self
            .rows
            .list_all()
            .await
            .into_iter()
            .filter(|ci| ci.cluster_arn == cluster_arn)
            .filter(|ci| status.is_none_or(|s| ci.status == s))
            .map(|ci| (ci.arn.clone(), ci))
            .collect();
        paginate(items, limit, token)
    }

    /// GC: deregisters instances that have been disconnected since before `before`.
    pub async fn delete_stale(
        &self,
        cluster_arn: &str,
        before: chrono::DateTime<chrono::Utc>,
    ) -> KecsResult<usize> {
        self.rows
            .retain(|_, ci| {
                !(ci.cluster_arn == cluster_arn
                    && !ci.agent_connected
                    && ci.registered_at < before)
            })
            .await
    }
}

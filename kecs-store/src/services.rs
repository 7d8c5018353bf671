use std::path::Path;

use kecs_types::{KecsError, KecsResult, LaunchType, Service};

use crate::collection::{Collection, paginate};

fn key(cluster_arn: &str, name: &str) -> String {
    format!("{cluster_arn}::{name}")
}

/// Keyed by `(clusterArn, name)`, unique per spec.md §3.
#[derive(Clone)]
pub struct ServiceStore {
    rows: Collection<Service>,
}

impl ServiceStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(ServiceStore {
            rows: Collection::open(dir, "services").await?,
        })
    }

    pub async fn create(&self, service: Service) -> KecsResult<Service> {
        self.rows
            .create(key(&service.cluster_arn, &service.name), service)
            .await
    }

    pub async fn get(&self, cluster_arn: &str, name: &str) -> KecsResult<Service> {
        self.rows
            .get(&key(cluster_arn, name))
            .await
            .ok_or_else(|| KecsError::not_found("Service", name))
    }

    pub async fn update(&self, service: Service) -> KecsResult<Service> {
        self.rows
            .update(&key(&service.cluster_arn, &service.name), service)
            .await
    }

    pub async fn delete(&self, cluster_arn: &str, name: &str) -> KecsResult<()> {
        self.rows.delete(&key(cluster_arn, name)).await
    }

    pub async fn list(
        &self,
        cluster_arn: &str,
        name_filter: Option<&str>,
        launch_type: Option<LaunchType>,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> KecsResult<(Vec<Service>, Option<String>)> {
        let items: Vec<(String, Service)> = self
            .rows
            .list_all()
            .await
            .into_iter()
            .filter(|s| s.cluster_arn == cluster_arn)
            .filter(|s| name_filter.is_none_or(|f| s.name.contains(f)))
            .filter(|s| launch_type.is_none_or(|lt| s.launch_type == lt))
            .map(|s| (s.name.clone(), s))
            .collect();
        paginate(items, limit, token)
    }

    pub async fn list_all_in_cluster(&self, cluster_arn: &str) -> Vec<Service> {
        self.rows
            .list_all()
            .await
            .into_iter()
            .filter(|s| s.cluster_arn == cluster_arn)
            .collect()
    }
}

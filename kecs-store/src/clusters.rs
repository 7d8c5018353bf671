use std::path::Path;

use kecs_types::{Cluster, KecsError, KecsResult};

use crate::collection::{Collection, paginate};

/// Keyed by cluster name (unique per spec.md §3).
#[derive(Clone)]
pub struct ClusterStore {
    rows: Collection<Cluster>,
}

impl ClusterStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(ClusterStore {
            rows: Collection::open(dir, "clusters").await?,
        })
    }

    pub async fn create(&self, cluster: Cluster) -> KecsResult<Cluster> {
        self.rows.create(cluster.name.clone(), cluster).await
    }

    pub async fn get(&self, name: &str) -> KecsResult<Cluster> {
        self.rows
            .get(name)
            .await
            .ok_or_else(|| KecsError::not_found("Cluster", name))
    }

    pub async fn update(&self, cluster: Cluster) -> KecsResult<Cluster> {
        self.rows.update(&cluster.name.clone(), cluster).await
    }

    pub async fn delete(&self, name: &str) -> KecsResult<()> {
        self.rows.delete(name).await
    }

    pub async fn list(
        &self,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> KecsResult<(Vec<Cluster>, Option<String>)> {
        let items = self
            .rows
            .list_all()
            .await
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();
        paginate(items, limit, token)
    }

    pub async fn describe_many(&self, names: &[String]) -> Vec<Cluster> {
        let mut out = Vec::with_capacity(names.len());
        for n in names {
            if let Some(c) = self.rows.get(n).await {
                out.push(c);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::ClusterStatus;

    fn cluster(name: &str) -> Cluster {
        Cluster {
            name: name.to_string(),
            arn: format!("arn:aws:ecs:us-east-1:000000000000:cluster/{name}"),
            status: ClusterStatus::Active,
            k8s_cluster_name: format!("kecs-{name}"),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            local_stack_state: None,
            created_at: chrono::Utc::now(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClusterStore::open(dir.path()).await.unwrap();
        store.create(cluster("c1")).await.unwrap();
        let got = store.get("c1").await.unwrap();
        assert_eq!(got.name, "c1");
    }

    #[tokio::test]
    async fn duplicate_create_is_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClusterStore::open(dir.path()).await.unwrap();
        store.create(cluster("c1")).await.unwrap();
        let err = store.create(cluster("c1")).await.unwrap_err();
        assert!(matches!(err, KecsError::ResourceAlreadyExists(_)));
    }

    #[tokio::test]
    async fn missing_get_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClusterStore::open(dir.path()).await.unwrap();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, KecsError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn list_paginates_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClusterStore::open(dir.path()).await.unwrap();
        for n in ["a", "b", "c"] {
            store.create(cluster(n)).await.unwrap();
        }
        let (page1, token) = store.list(Some(2), None).await.unwrap();
        assert_eq!(page1.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        let token = token.unwrap();
        let (page2, token2) = store.list(Some(2), Some(&token)).await.unwrap();
        assert_eq!(page2.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["c"]);
        assert!(token2.is_none());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ClusterStore::open(dir.path()).await.unwrap();
            store.create(cluster("c1")).await.unwrap();
        }
        let reopened = ClusterStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("c1").await.unwrap().name, "c1");
    }
}

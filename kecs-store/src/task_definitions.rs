use std::path::Path;

use kecs_types::{KecsError, KecsResult, TaskDefinition, TaskDefinitionStatus};

use crate::collection::{Collection, paginate};

/// Keyed by `family:revision` (unique per spec.md §3); `family` alone
/// resolves to the highest active revision.
#[derive(Clone)]
pub struct TaskDefinitionStore {
    rows: Collection<TaskDefinition>,
}

impl TaskDefinitionStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(TaskDefinitionStore {
            rows: Collection::open(dir, "task_definitions").await?,
        })
    }

    fn max_revision(items: &[TaskDefinition], family: &str) -> u32 {
        items
            .iter()
            .filter(|td| td.family == family)
            .map(|td| td.revision)
            .max()
            .unwrap_or(0)
    }

    /// Assigns `revision = max(family) + 1` atomically and mints the ARN,
    /// matching spec.md §4.1's `TaskDefinitionStore.Register`.
    pub async fn register(
        &self,
        family: &str,
        region: &str,
        account: &str,
        mut build: impl FnMut(u32, String) -> TaskDefinition,
    ) -> KecsResult<TaskDefinition> {
        let existing = self.rows.list_all().await;
        let revision = Self::max_revision(&existing, family) + 1;
        let arn = kecs_translate::arn::task_definition(region, account, family, revision);
        let td = build(revision, arn);
        self.rows
            .create(td.family_revision(), td)
            .await
    }

    pub async fn get(&self, family: &str, revision: u32) -> KecsResult<TaskDefinition> {
        self.rows
            .get(&format!("{family}:{revision}"))
            .await
            .ok_or_else(|| KecsError::not_found("TaskDefinition", &format!("{family}:{revision}")))
    }

    pub async fn get_latest_active(&self, family: &str) -> KecsResult<TaskDefinition> {
        let items = self.rows.list_all().await;
        items
            .into_iter()
            .filter(|td| td.family == family && td.status == TaskDefinitionStatus::Active)
            .max_by_key(|td| td.revision)
            .ok_or_else(|| KecsError::not_found("TaskDefinition", family))
    }

    /// Flips status to `INACTIVE`; never deletes the row (spec.md §3 invariant).
    pub async fn deregister(&self, family: &str, revision: u32) -> KecsResult<TaskDefinition> {
        let mut td = self.get(family, revision).await?;
        td.status = TaskDefinitionStatus::Inactive;
        self.rows.update(&td.family_revision(), td).await
    }

    pub async fn list_families(
        &self,
        family_prefix: Option<&str>,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> KecsResult<(Vec<String>, Option<String>)> {
        let items = self.rows.list_all().await;
        let mut families: Vec<String> = items
            .into_iter()
            .map(|td| td.family)
            .filter(|f| family_prefix.is_none_or(|p| f.starts_with(p)))
            .collect();
        families.sort();
        families.dedup();
        let keyed = families.into_iter().map(|f| (f.clone(), f)).collect();
        paginate(keyed, limit, token)
    }

    pub async fn list_revisions(
        &self,
        family: &str,
        status: Option<TaskDefinitionStatus>,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> KecsResult<(Vec<TaskDefinition>, Option<String>)> {
        let items: Vec<(String, TaskDefinition)> = self
            .rows
            .list_all()
            .await
            .into_iter()
            .filter(|td| td.family == family)
            .filter(|td| status.is_none_or(|s| td.status == s))
            .map(|td| (td.family_revision(), td))
            .collect();
        paginate(items, limit, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::{NetworkMode, TaskDefinitionStatus};

    fn build(containers_family: &str) -> impl FnMut(u32, String) -> TaskDefinition + '_ {
        move |revision, arn| TaskDefinition {
            family: containers_family.to_string(),
            revision,
            arn,
            status: TaskDefinitionStatus::Active,
            containers: vec![],
            cpu: None,
            memory: None,
            network_mode: NetworkMode::Bridge,
            volumes: vec![],
            task_role_arn: None,
            execution_role_arn: None,
            registered_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn revision_increments_per_family() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskDefinitionStore::open(dir.path()).await.unwrap();
        let td1 = store
            .register("web", "us-east-1", "000000000000", build("web"))
            .await
            .unwrap();
        let td2 = store
            .register("web", "us-east-1", "000000000000", build("web"))
            .await
            .unwrap();
        assert_eq!(td1.revision, 1);
        assert_eq!(td2.revision, 2);
    }

    #[tokio::test]
    async fn deregister_flips_status_without_deleting() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskDefinitionStore::open(dir.path()).await.unwrap();
        store
            .register("web", "us-east-1", "000000000000", build("web"))
            .await
            .unwrap();
        let td = store.deregister("web", 1).await.unwrap();
        assert_eq!(td.status, TaskDefinitionStatus::Inactive);
        assert!(store.get("web", 1).await.is_ok());
    }
}

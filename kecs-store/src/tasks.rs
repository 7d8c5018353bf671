use std::path::Path;

use kecs_types::{KecsError, KecsResult, LastStatus, Task};

use crate::collection::{Collection, paginate};

/// Keyed by task id (32-hex, unique within a cluster and globally by
/// construction since ids are content-derived or random).
#[derive(Clone)]
pub struct TaskStore {
    rows: Collection<Task>,
}

impl TaskStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(TaskStore {
            rows: Collection::open(dir, "tasks").await?,
        })
    }

    pub async fn create(&self, task: Task) -> KecsResult<Task> {
        self.rows.create(task.id.clone(), task).await
    }

    pub async fn get(&self, cluster_arn: &str, id: &str) -> KecsResult<Task> {
        let task = self
            .rows
            .get(id)
            .await
            .ok_or_else(|| KecsError::not_found("Task", id))?;
        if task.cluster_arn != cluster_arn {
            return Err(KecsError::not_found("Task", id));
        }
        Ok(task)
    }

    /// Enforces the ordered-transition invariant before persisting.
    pub async fn transition(&self, id: &str, next: LastStatus) -> KecsResult<Task> {
        let mut task = self
            .rows
            .get(id)
            .await
            .ok_or_else(|| KecsError::not_found("Task", id))?;
        if !task.last_status.can_transition_to(next) {
            return Err(KecsError::invalid(format!(
                "illegal task transition {:?} -> {:?}",
                task.last_status, next
            )));
        }
        task.last_status = next;
        if next == LastStatus::Stopped {
            task.stopped_at = Some(chrono::Utc::now());
        }
        if next == LastStatus::Running && task.started_at.is_none() {
            task.started_at = Some(chrono::Utc::now());
        }
        self.rows.update(id, task).await
    }

    pub async fn update(&self, task: Task) -> KecsResult<Task> {
        self.rows.update(&task.id.clone(), task).await
    }

    pub async fn delete(&self, id: &str) -> KecsResult<()> {
        self.rows.delete(id).await
    }

    pub async fn list(
        &self,
        cluster_arn: &str,
        service_name: Option<&str>,
        desired_status: Option<kecs_types::DesiredStatus>,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> KecsResult<(Vec<Task>, Option<String>)> {
        let items: Vec<(String, Task)> = self
            .rows
            .list_all()
            .await
            .into_iter()
            .filter(|t| t.cluster_arn == cluster_arn)
            .filter(|t| service_name.is_none_or(|s| t.service_name.as_deref() == Some(s)))
            .filter(|t| desired_status.is_none_or(|d| t.desired_status == d))
            .map(|t| (t.id.clone(), t))
            .collect();
        paginate(items, limit, token)
    }

    /// GC: deletes `STOPPED` tasks in `cluster` whose `stoppedAt` predates
    /// `before` (spec.md §4.1).
    pub async fn delete_older_than(
        &self,
        cluster_arn: &str,
        before: chrono::DateTime<chrono::Utc>,
    ) -> KecsResult<usize> {
        self.rows
            .retain(|_, t| {
                !(t.cluster_arn == cluster_arn
                    && t.last_status == LastStatus::Stopped
                    && t.stopped_at.is_some_and(|s| s < before))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::{DesiredStatus, LaunchType};

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            arn: format!("arn:aws:ecs:us-east-1:000000000000:task/c1/{id}"),
            cluster_arn: "arn:aws:ecs:us-east-1:000000000000:cluster/c1".to_string(),
            task_definition_arn: "arn:aws:ecs:us-east-1:000000000000:task-definition/web:1"
                .to_string(),
            service_name: None,
            desired_status: DesiredStatus::Running,
            last_status: LastStatus::Provisioning,
            launch_type: LaunchType::Fargate,
            pod_name: None,
            namespace: None,
            started_by: None,
            stopped_reason: None,
            started_at: None,
            stopped_at: None,
            created_at: chrono::Utc::now(),
            cpu: None,
            memory: None,
        }
    }

    #[tokio::test]
    async fn transition_must_follow_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();
        store.create(task("t1")).await.unwrap();
        let err = store.transition("t1", LastStatus::Running).await.unwrap_err();
        assert!(matches!(err, KecsError::InvalidParameterValue(_)));
        store.transition("t1", LastStatus::Pending).await.unwrap();
    }

    #[tokio::test]
    async fn stopped_reachable_from_any_nonterminal_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();
        store.create(task("t1")).await.unwrap();
        let stopped = store.transition("t1", LastStatus::Stopped).await.unwrap();
        assert_eq!(stopped.last_status, LastStatus::Stopped);
        assert!(stopped.stopped_at.is_some());
    }

    #[tokio::test]
    async fn gc_deletes_only_old_stopped_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();
        let mut old = task("old");
        old.last_status = LastStatus::Stopped;
        old.stopped_at = Some(chrono::Utc::now() - chrono::Duration::hours(2));
        store.create(old).await.unwrap();
        store.create(task("fresh")).await.unwrap();

        let removed = store
            .delete_older_than(
                "arn:aws:ecs:us-east-1:000000000000:cluster/c1",
                chrono::Utc::now() - chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("arn:aws:ecs:us-east-1:000000000000:cluster/c1", "fresh").await.is_ok());
    }
}

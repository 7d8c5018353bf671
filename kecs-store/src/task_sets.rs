use std::path::Path;

use kecs_types::{KecsError, KecsResult, TaskSet, TaskSetStatus};

use crate::collection::{Collection, paginate};

#[derive(Clone)]
pub struct TaskSetStore {
    rows: Collection<TaskSet>,
}

impl TaskSetStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(TaskSetStore {
            rows: Collection::open(dir, "task_sets").await?,
        })
    }

    /// Rejects a second `PRIMARY` task set for the same service
    /// (spec.md §3 invariant).
    pub async fn create(&self, task_set: TaskSet) -> KecsResult<TaskSet> {
        if task_set.status == TaskSetStatus::Primary {
            let existing = self.rows.list_all().await;
            if existing
                .iter()
                .any(|ts| ts.service_arn == task_set.service_arn && ts.status == TaskSetStatus::Primary)
            {
                return Err(KecsError::invalid(format!(
                    "service {} already has a PRIMARY task set",
                    task_set.service_arn
                )));
            }
        }
        self.rows.create(task_set.id.clone(), task_set).await
    }

    pub async fn get(&self, id: &str) -> KecsResult<TaskSet> {
        self.rows
            .get(id)
            .await
            .ok_or_else(|| KecsError::not_found("TaskSet", id))
    }

    pub async fn update(&self, task_set: TaskSet) -> KecsResult<TaskSet> {
        self.rows.update(&task_set.id.clone(), task_set).await
    }

    pub async fn delete(&self, id: &str) -> KecsResult<()> {
        self.rows.delete(id).await
    }

    pub async fn list_for_service(
        &self,
        service_arn: &str,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> KecsResult<(Vec<TaskSet>, Option<String>)> {
        let items: Vec<(String, TaskSet)> = self
            .rows
            .list_all()
            .await
            .into_iter()
            .filter(|ts| ts.service_arn == service_arn)
            .map(|ts| (ts.id.clone(), ts))
            .collect();
        paginate(items, limit, token)
    }

    /// GC: deletes task sets whose owning service no longer exists.
    pub async fn delete_orphaned(&self, live_service_arns: &[String]) -> KecsResult<usize> {
        self.rows
            .retain(|_, ts| live_service_arns.contains(&ts.service_arn))
            .await
    }
}

use std::path::Path;

use kecs_types::{KecsResult, TaskLog};

use crate::collection::Collection;

/// Append-only, keyed by an incrementing sequence stamped by the caller so
/// log lines from the same task/container sort in arrival order.
#[derive(Clone)]
pub struct TaskLogStore {
    rows: Collection<TaskLog>,
}

impl TaskLogStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(TaskLogStore {
            rows: Collection::open(dir, "task_logs").await?,
        })
    }

    pub async fn append(&self, seq: u64, log: TaskLog) -> KecsResult<()> {
        self.rows
            .put(format!("{}::{:020}", log.task_arn, seq), log)
            .await?;
        Ok(())
    }

    pub async fn for_task(&self, task_arn: &str, tail: Option<usize>) -> Vec<TaskLog> {
        let mut logs: Vec<TaskLog> = self
            .rows
            .list_all()
            .await
            .into_iter()
            .filter(|l| l.task_arn == task_arn)
            .collect();
        logs.sort_by_key(|l| l.timestamp);
        if let Some(tail) = tail
            && logs.len() > tail
        {
            logs = logs.split_off(logs.len() - tail);
        }
        logs
    }
}

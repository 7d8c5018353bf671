use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLog {
    pub task_arn: String,
    pub container_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: String,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Transient per-instance provisioning progress, not persisted to disk
/// (spec.md §3: "CreationStatus (transient, per-instance)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationStatus {
    pub step: String,
    pub state: CreationState,
    pub message: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationState {
    Pending,
    InProgress,
    Done,
    Failed,
}

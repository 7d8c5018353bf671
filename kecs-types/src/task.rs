use serde::{Deserialize, Serialize};

use crate::service::LaunchType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DesiredStatus {
    Running,
    Stopped,
}

/// Ordered ECS task lifecycle, mirroring pod status (spec.md §3). Each
/// transition moves strictly forward through this ordering; `Stopped` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LastStatus {
    Provisioning,
    Pending,
    Activating,
    Running,
    Deactivating,
    Stopping,
    Stopped,
}

impl LastStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LastStatus::Stopped)
    }

    /// The legal next states from this one, per spec.md's "explicit ordered
    /// transitions" invariant. `Stopped` can be reached directly from any
    /// non-terminal state (task failure / StopTask).
    pub fn can_transition_to(&self, next: LastStatus) -> bool {
        if next == LastStatus::Stopped {
            return !self.is_terminal();
        }
        (*self as u8) + 1 == next as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 32-hex task id.
    pub id: String,
    pub arn: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    pub service_name: Option<String>,
    pub desired_status: DesiredStatus,
    pub last_status: LastStatus,
    pub launch_type: LaunchType,
    pub pod_name: Option<String>,
    pub namespace: Option<String>,
    pub started_by: Option<String>,
    pub stopped_reason: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub stopped_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

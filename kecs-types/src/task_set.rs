use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskSetStatus {
    Primary,
    Active,
    Draining,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scale {
    pub unit: String,
    pub value: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Scale {
            unit: "PERCENT".to_string(),
            value: 100.0,
        }
    }
}

/// spec.md §3: at most one `PRIMARY` task set per service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSet {
    pub id: String,
    pub arn: String,
    pub service_arn: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    pub status: TaskSetStatus,
    pub scale: Scale,
    pub external_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

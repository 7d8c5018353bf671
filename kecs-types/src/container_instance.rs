use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerInstanceStatus {
    Active,
    Draining,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Resources {
    pub cpu: i64,
    pub memory: i64,
}

/// First-class persisted entity (see SPEC_FULL.md §3 SUPPLEMENT: container
/// instances are never synthesized from k8s Node objects at read time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInstance {
    pub arn: String,
    pub cluster_arn: String,
    pub status: ContainerInstanceStatus,
    pub agent_connected: bool,
    pub running_tasks_count: i32,
    pub registered_resources: Resources,
    pub remaining_resources: Resources,
    pub attributes: BTreeMap<String, String>,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClusterStatus {
    Active,
    Inactive,
}

impl Default for ClusterStatus {
    fn default() -> Self {
        ClusterStatus::Active
    }
}

/// spec.md §3: `Cluster {name (unique), arn, status, k8sClusterName, region,
/// accountId, localStackState (opaque blob), createdAt}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub arn: String,
    pub status: ClusterStatus,
    pub k8s_cluster_name: String,
    pub region: String,
    pub account_id: String,
    /// Opaque LocalStack state blob (serialized JSON), restored verbatim
    /// across restarts per spec.md §4.8 (C8 recovery).
    pub local_stack_state: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

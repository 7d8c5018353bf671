use serde::{Deserialize, Serialize};

/// Keyed uniquely on `(cluster, target_type, target_id, name)` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttributeKey {
    pub cluster: String,
    pub target_type: String,
    pub target_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub cluster: String,
    pub target_type: String,
    pub target_id: String,
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn key(&self) -> AttributeKey {
        AttributeKey {
            cluster: self.cluster.clone(),
            target_type: self.target_type.clone(),
            target_id: self.target_id.clone(),
            name: self.name.clone(),
        }
    }
}

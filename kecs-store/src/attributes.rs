use std::path::Path;

use kecs_types::{Attribute, KecsResult};

use crate::collection::Collection;

fn key(a: &Attribute) -> String {
    format!("{}::{}::{}::{}", a.cluster, a.target_type, a.target_id, a.name)
}

/// Keyed uniquely on `(cluster, targetType, targetId, name)` (spec.md §3).
#[derive(Clone)]
pub struct AttributeStore {
    rows: Collection<Attribute>,
}

impl AttributeStore {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(AttributeStore {
            rows: Collection::open(dir, "attributes").await?,
        })
    }

    pub async fn put(&self, attribute: Attribute) -> KecsResult<Attribute> {
        self.rows.put(key(&attribute), attribute).await
    }

    pub async fn delete(&self, attribute: &Attribute) -> KecsResult<()> {
        self.rows.delete(&key(attribute)).await
    }

    pub async fn list(&self, cluster: &str, target_type: Option<&str>) -> Vec<Attribute> {
        self.rows
            .list_all()
            .await
            .into_iter()
            .filter(|a| a.cluster == cluster)
            .filter(|a| target_type.is_none_or(|t| a.target_type == t))
            .collect()
    }
}

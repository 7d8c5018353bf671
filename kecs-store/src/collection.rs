use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kecs_types::{KecsError, KecsResult, page_token};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

/// One JSON file per entity kind, the whole map rewritten on every mutating
/// call. Good enough for the scale KECS runs at (a handful of clusters on a
/// developer's laptop); a substore that needs more survives behind the same
/// `Create/Get/Update/Delete/List` surface.
pub struct Collection<T> {
    path: PathBuf,
    rows: Arc<RwLock<BTreeMap<String, T>>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Collection {
            path: self.path.clone(),
            rows: self.rows.clone(),
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub async fn open(dir: &Path, name: &str) -> KecsResult<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| KecsError::internal(format!("create store dir: {e}")))?;
        let path = dir.join(format!("{name}.json"));
        let rows = if path.exists() {
            let raw = tokio::fs::read(&path)
                .await
                .map_err(|e| KecsError::internal(format!("read {name} store: {e}")))?;
            if raw.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&raw)
                    .map_err(|e| KecsError::internal(format!("parse {name} store: {e}")))?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Collection {
            path,
            rows: Arc::new(RwLock::new(rows)),
        })
    }

    async fn flush(&self, rows: &BTreeMap<String, T>) -> KecsResult<()> {
        let body = serde_json::to_vec_pretty(rows)
            .map_err(|e| KecsError::internal(format!("serialize store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| KecsError::internal(format!("write store: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| KecsError::internal(format!("commit store: {e}")))?;
        Ok(())
    }

    pub async fn create(&self, key: String, value: T) -> KecsResult<T> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&key) {
            return Err(KecsError::already_exists("resource", &key));
        }
        rows.insert(key, value.clone());
        self.flush(&rows).await?;
        Ok(value)
    }

    pub async fn put(&self, key: String, value: T) -> KecsResult<T> {
        let mut rows = self.rows.write().await;
        rows.insert(key, value.clone());
        self.flush(&rows).await?;
        Ok(value)
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        self.rows.read().await.get(key).cloned()
    }

    pub async fn update(&self, key: &str, value: T) -> KecsResult<T> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(key) {
            return Err(KecsError::not_found("resource", key));
        }
        rows.insert(key.to_string(), value.clone());
        self.flush(&rows).await?;
        Ok(value)
    }

    pub async fn delete(&self, key: &str) -> KecsResult<()> {
        let mut rows = self.rows.write().await;
        if rows.remove(key).is_none() {
            return Err(KecsError::not_found("resource", key));
        }
        self.flush(&rows).await?;
        Ok(())
    }

    pub async fn list_all(&self) -> Vec<T> {
        self.rows.read().await.values().cloned().collect()
    }

    pub async fn retain<F>(&self, mut keep: F) -> KecsResult<usize>
    where
        F: FnMut(&str, &T) -> bool,
    {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|k, v| keep(k, v));
        let removed = before - rows.len();
        if removed > 0 {
            self.flush(&rows).await?;
        }
        Ok(removed)
    }
}

/// A page of `limit` items starting strictly after `token` (if any), sorted
/// by key, plus the continuation token for the next page (`None` at the end).
pub fn paginate<T: Clone>(
    mut items: Vec<(String, T)>,
    limit: Option<usize>,
    token: Option<&str>,
) -> KecsResult<(Vec<T>, Option<String>)> {
    items.sort_by(|a, b| a.0.cmp(&b.0));

    let start = match token {
        None => 0,
        Some(t) => {
            let last_key = page_token::decode(t)?;
            items
                .iter()
                .position(|(k, _)| k.as_str() > last_key.as_str())
                .unwrap_or(items.len())
        }
    };

    let limit = limit.unwrap_or(items.len().saturating_sub(start).max(1));
    let end = (start + limit).min(items.len());
    let page: Vec<T> = items[start..end].iter().map(|(_, v)| v.clone()).collect();
    let next = if end < items.len() {
        Some(page_token::encode(&items[end - 1].0))
    } else {
        None
    };
    Ok((page, next))
}

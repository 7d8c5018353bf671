//! SSM/Secrets Manager resolution (spec.md §4.6): materializes referenced
//! parameters/secrets into a k8s `Secret` in the task's namespace, producing
//! the `ResolvedSecrets` map `kecs_translate::pod::to_pod_spec` consumes.
//! Resolved values are cached with a TTL so repeated task launches that
//! reference the same secret don't re-hit LocalStack on every launch.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kecs_k8s::upsert::apply_secret;
use kecs_translate::arn;
use kecs_translate::pod::{ResolvedSecret, ResolvedSecrets};
use kecs_types::{KecsError, KecsResult, SecretRef};
use kube::Client;

use crate::client::AwsClients;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// k8s `Secret` that mirrors a single task definition's resolved
/// `secrets[]`, named after the family so repeat launches of the same task
/// definition reuse one object instead of minting a fresh one each time.
pub fn secret_name(family: &str) -> String {
    format!("{family}-secrets")
}

/// One cached plaintext value, keyed by the originating ARN.
struct CacheEntry {
    value: String,
    fetched_at: Instant,
}

/// TTL cache over resolved ARNs. Guarded by a plain `Mutex` — resolution
/// happens once per task launch per secret, not on a request hot path.
pub struct SecretCache {
    ttl: Duration,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl Default for SecretCache {
    fn default() -> Self {
        SecretCache::new(DEFAULT_TTL)
    }
}

impl SecretCache {
    pub fn new(ttl: Duration) -> Self {
        SecretCache {
            ttl,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn get(&self, arn: &str) -> Option<String> {
        let entries = self.entries.lock().expect("secret cache poisoned");
        entries.get(arn).and_then(|e| {
            if e.fetched_at.elapsed() < self.ttl {
                Some(e.value.clone())
            } else {
                None
            }
        })
    }

    fn put(&self, arn: &str, value: String) {
        let mut entries = self.entries.lock().expect("secret cache poisoned");
        entries.insert(
            arn.to_string(),
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }
}

/// Fetches the plaintext value an SSM-or-Secrets-Manager ARN points at,
/// consulting `cache` first. The ARN's service segment (`ssm` vs
/// `secretsmanager`) selects which client resolves it.
async fn resolve_value(
    clients: &AwsClients,
    cache: &SecretCache,
    value_from: &str,
) -> KecsResult<String> {
    if let Some(cached) = cache.get(value_from) {
        return Ok(cached);
    }

    let parsed = arn::parse(value_from)
        .ok_or_else(|| KecsError::invalid(format!("not a valid ARN: {value_from}")))?;

    let value = match parsed.service.as_str() {
        "ssm" => {
            // resource looks like "parameter/<name>"
            let name = parsed
                .resource
                .strip_prefix("parameter/")
                .unwrap_or(&parsed.resource);
            let resp = clients
                .ssm
                .get_parameter()
                .name(name)
                .with_decryption(true)
                .send()
                .await
                .map_err(|e| KecsError::internal(format!("ssm GetParameter {name}: {e}")))?;
            resp.parameter
                .and_then(|p| p.value)
                .ok_or_else(|| KecsError::not_found("ssm-parameter", name))?
        }
        "secretsmanager" => {
            let resp = clients
                .secretsmanager
                .get_secret_value()
                .secret_id(value_from)
                .send()
                .await
                .map_err(|e| {
                    KecsError::internal(format!("secretsmanager GetSecretValue {value_from}: {e}"))
                })?;
            resp.secret_string
                .ok_or_else(|| KecsError::not_found("secret", value_from))?
        }
        other => {
            return Err(KecsError::invalid(format!(
                "unsupported secret ARN service: {other}"
            )));
        }
    };

    cache.put(value_from, value.clone());
    Ok(value)
}

/// Resolves every `SecretRef` across a task definition's containers,
/// materializes them into one k8s `Secret` in `namespace`, and returns the
/// `ResolvedSecrets` map the pod translator expects.
pub async fn resolve_and_materialize(
    clients: &AwsClients,
    cache: &SecretCache,
    k8s_client: &Client,
    namespace: &str,
    family: &str,
    containers: &[(String, Vec<SecretRef>)],
) -> KecsResult<ResolvedSecrets> {
    let mut data = BTreeMap::new();
    let mut resolved = ResolvedSecrets::new();
    let name = secret_name(family);

    for (container_name, secrets) in containers {
        for secret_ref in secrets {
            let value = resolve_value(clients, cache, &secret_ref.value_from).await?;
            let key = format!("{container_name}-{}", secret_ref.name);
            data.insert(key.clone(), value);
            resolved.insert(
                (container_name.clone(), secret_ref.name.clone()),
                ResolvedSecret {
                    k8s_secret_name: name.clone(),
                    key,
                },
            );
        }
    }

    if data.is_empty() {
        return Ok(resolved);
    }

    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.into_iter()
                .map(|(k, v)| (k, k8s_openapi::ByteString(v.into_bytes())))
                .collect(),
        ),
        ..Default::default()
    };
    apply_secret(k8s_client, namespace, &secret).await?;

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_name_derives_from_family() {
        assert_eq!(secret_name("web"), "web-secrets");
    }

    #[test]
    fn cache_expires_after_ttl() {
        let cache = SecretCache::new(Duration::from_millis(1));
        cache.put("arn:aws:ssm:us-east-1:000000000000:parameter/x", "v".into());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache
            .get("arn:aws:ssm:us-east-1:000000000000:parameter/x")
            .is_none());
    }

    #[test]
    fn cache_hits_within_ttl() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.put("arn:aws:ssm:us-east-1:000000000000:parameter/x", "v".into());
        assert_eq!(
            cache.get("arn:aws:ssm:us-east-1:000000000000:parameter/x"),
            Some("v".to_string())
        );
    }
}

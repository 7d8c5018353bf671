//! S3 adapter (spec.md §4.6): pods that talk to S3 need the LocalStack
//! endpoint and credentials injected as environment variables, with
//! path-style addressing forced since LocalStack doesn't serve
//! virtual-hosted-style buckets by default.

use kecs_types::KeyValuePair;

pub const ENV_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL_S3";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_FORCE_PATH_STYLE: &str = "AWS_S3_FORCE_PATH_STYLE";

/// LocalStack accepts any non-empty access key/secret pair; these are the
/// conventional placeholder credentials its own docs use.
pub const LOCALSTACK_ACCESS_KEY_ID: &str = "test";
pub const LOCALSTACK_SECRET_ACCESS_KEY: &str = "test";

/// Env vars a pod needs to reach LocalStack's S3 endpoint directly,
/// mirrored onto the container the same way secrets are (spec.md's
/// "provide an endpoint and credentials suitable for pod consumption").
pub fn pod_env_vars(localstack_endpoint: &str) -> Vec<KeyValuePair> {
    vec![
        KeyValuePair {
            name: ENV_ENDPOINT_URL.to_string(),
            value: localstack_endpoint.to_string(),
        },
        KeyValuePair {
            name: ENV_ACCESS_KEY_ID.to_string(),
            value: LOCALSTACK_ACCESS_KEY_ID.to_string(),
        },
        KeyValuePair {
            name: ENV_SECRET_ACCESS_KEY.to_string(),
            value: LOCALSTACK_SECRET_ACCESS_KEY.to_string(),
        },
        KeyValuePair {
            name: ENV_FORCE_PATH_STYLE.to_string(),
            value: "true".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_env_vars_force_path_style() {
        let vars = pod_env_vars("http://localstack.kecs.svc.cluster.local:4566");
        let path_style = vars
            .iter()
            .find(|kv| kv.name == ENV_FORCE_PATH_STYLE)
            .unwrap();
        assert_eq!(path_style.value, "true");
    }
}

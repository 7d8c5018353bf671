//! `GetTaskLogs` (spec.md §6): a KECS-specific operation, not part of the
//! AWS ECS API surface, that reads straight from the task's pod logs rather
//! than routing through CloudWatch.

use kube::api::LogParams;
use kube::Api;

use kecs_types::{KecsError, KecsResult};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;

fn req<T: for<'de> Deserialize<'de>>(body: &Value) -> KecsResult<T> {
    serde_json::from_value(body.clone()).map_err(|e| KecsError::invalid(e.to_string()))
}

/// Heuristic level inference from message content (spec.md §6: "level
/// heuristically inferred from message content"); pod logs carry no
/// structured level of their own.
fn infer_level(message: &str) -> &'static str {
    let upper = message.to_uppercase();
    if upper.contains("ERROR") || upper.contains("FATAL") || upper.contains("PANIC") {
        "ERROR"
    } else if upper.contains("WARN") {
        "WARN"
    } else if upper.contains("DEBUG") || upper.contains("TRACE") {
        "DEBUG"
    } else {
        "INFO"
    }
}

pub async fn get_task_logs(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        cluster: Option<String>,
        task_arn: String,
        #[serde(default)]
        timestamps: bool,
        since: Option<i64>,
        tail: Option<i64>,
    }
    let r: Req = req(&body)?;
    let cluster_name = r.cluster.as_deref().unwrap_or("default");
    let cluster = app.store.clusters.get(cluster_name).await?;

    let task_id = r.task_arn.rsplit('/').next().unwrap_or(&r.task_arn);
    let task = app.store.tasks.get(&cluster.arn, task_id).await?;
    let pod_name = task
        .pod_name
        .as_deref()
        .ok_or_else(|| KecsError::invalid(format!("task {task_id} has no running pod")))?;
    let namespace = task.namespace.as_deref().unwrap_or(&cluster.k8s_cluster_name);

    let (family, revision) = {
        let tail = task
            .task_definition_arn
            .rsplit('/')
            .next()
            .unwrap_or(&task.task_definition_arn);
        let mut parts = tail.rsplitn(2, ':');
        let revision: u32 = parts
            .next()
            .and_then(|r| r.parse().ok())
            .ok_or_else(|| KecsError::invalid("malformed taskDefinitionArn"))?;
        let family = parts
            .next()
            .ok_or_else(|| KecsError::invalid("malformed taskDefinitionArn"))?
            .to_string();
        (family, revision)
    };
    let td = app.store.task_definitions.get(&family, revision).await?;

    let clients = app
        .client_cache
        .get_or_connect(&cluster.k8s_cluster_name, &app.args.kube_context)
        .await?;
    let api: Api<k8s_openapi::api::core::v1::Pod> = Api::namespaced(clients.client.clone(), namespace);

    let mut entries = Vec::new();
    for container in &td.containers {
        let lp = LogParams {
            container: Some(container.name.clone()),
            timestamps: r.timestamps,
            since_seconds: r.since,
            tail_lines: r.tail,
            ..Default::default()
        };
        let raw = match api.logs(pod_name, &lp).await {
            Ok(text) => text,
            Err(kube::Error::Api(e)) if e.code == 404 => continue,
            Err(e) => return Err(KecsError::internal(format!("fetch logs for {pod_name}/{}: {e}", container.name))),
        };
        for line in raw.lines() {
            entries.push(json!({
                "timestamp": chrono::Utc::now().timestamp(),
                "level": infer_level(line),
                "message": line,
                "container": container.name,
            }));
        }
    }
    Ok(json!({ "logs": entries }))
}

#[cfg(test)]
mod tests {
    use super::infer_level;

    #[test]
    fn classifies_error_lines() {
        assert_eq!(infer_level("2026-08-01T00:00:00Z ERROR: connection refused"), "ERROR");
        assert_eq!(infer_level("panic: index out of bounds"), "ERROR");
    }

    #[test]
    fn classifies_warn_and_debug() {
        assert_eq!(infer_level("WARN: retrying"), "WARN");
        assert_eq!(infer_level("debug: entering handler"), "DEBUG");
    }

    #[test]
    fn defaults_to_info() {
        assert_eq!(infer_level("listening on :8080"), "INFO");
    }
}

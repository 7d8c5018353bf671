//! CloudWatch Logs adapter (spec.md §4.6): ensures the log group/stream
//! referenced by a container's `awslogs-group`/`awslogs-stream-prefix`
//! options exist before the `awslogs` driver needs them.

use kecs_types::{KecsError, KecsResult};

use crate::client::AwsClients;

pub const OPT_GROUP: &str = "awslogs-group";
pub const OPT_REGION: &str = "awslogs-region";
pub const OPT_STREAM_PREFIX: &str = "awslogs-stream-prefix";

/// Creates the log group if it doesn't already exist. Idempotent:
/// `ResourceAlreadyExistsException` from a concurrent creator is swallowed.
pub async fn ensure_log_group(
    clients: &AwsClients,
    group_name: &str,
    retention_days: Option<i32>,
) -> KecsResult<()> {
    match clients.cloudwatch_logs.create_log_group().log_group_name(group_name).send().await {
        Ok(_) => {}
        Err(e) if is_already_exists(&e) => {}
        Err(e) => return Err(KecsError::internal(format!("create log group {group_name}: {e}"))),
    }

    if let Some(days) = retention_days {
        clients
            .cloudwatch_logs
            .put_retention_policy()
            .log_group_name(group_name)
            .retention_in_days(days)
            .send()
            .await
            .map_err(|e| KecsError::internal(format!("set retention {group_name}: {e}")))?;
    }
    Ok(())
}

/// Creates the log stream a task's container will write to, named
/// `<prefix>/<container_name>/<task_id>` per the `awslogs` driver's
/// convention.
pub async fn ensure_log_stream(
    clients: &AwsClients,
    group_name: &str,
    stream_prefix: &str,
    container_name: &str,
    task_id: &str,
) -> KecsResult<String> {
    let stream_name = format!("{stream_prefix}/{container_name}/{task_id}");
    match clients
        .cloudwatch_logs
        .create_log_stream()
        .log_group_name(group_name)
        .log_stream_name(&stream_name)
        .send()
        .await
    {
        Ok(_) => {}
        Err(e) if is_already_exists(&e) => {}
        Err(e) => {
            return Err(KecsError::internal(format!(
                "create log stream {stream_name}: {e}"
            )))
        }
    }
    Ok(stream_name)
}

fn is_already_exists(err: &impl std::fmt::Display) -> bool {
    err.to_string().contains("ResourceAlreadyExistsException")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_name_embeds_prefix_container_and_task() {
        let stream = format!("{}/{}/{}", "prefix", "app", "abc123");
        assert_eq!(stream, "prefix/app/abc123");
    }
}

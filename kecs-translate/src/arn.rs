//! ARN minting and parsing (spec.md §4.2). Pure functions, no I/O.

use sha2::{Digest, Sha256};

fn ecs(region: &str, account: &str, rest: &str) -> String {
    format!("arn:aws:ecs:{region}:{account}:{rest}")
}

pub fn cluster(region: &str, account: &str, name: &str) -> String {
    ecs(region, account, &format!("cluster/{name}"))
}

pub fn task_definition(region: &str, account: &str, family: &str, revision: u32) -> String {
    ecs(region, account, &format!("task-definition/{family}:{revision}"))
}

pub fn service(region: &str, account: &str, cluster_name: &str, name: &str) -> String {
    ecs(region, account, &format!("service/{cluster_name}/{name}"))
}

pub fn task(region: &str, account: &str, cluster_name: &str, task_id: &str) -> String {
    ecs(region, account, &format!("task/{cluster_name}/{task_id}"))
}

pub fn container_instance(region: &str, account: &str, cluster_name: &str, id: &str) -> String {
    ecs(
        region,
        account,
        &format!("container-instance/{cluster_name}/{id}"),
    )
}

pub fn task_set(
    region: &str,
    account: &str,
    cluster_name: &str,
    service_name: &str,
    id: &str,
) -> String {
    ecs(
        region,
        account,
        &format!("task-set/{cluster_name}/{service_name}/{id}"),
    )
}

fn elb(region: &str, account: &str, rest: &str) -> String {
    format!("arn:aws:elasticloadbalancing:{region}:{account}:{rest}")
}

pub fn load_balancer(region: &str, account: &str, name: &str, id: &str) -> String {
    elb(region, account, &format!("loadbalancer/app/{name}/{id}"))
}

pub fn target_group(region: &str, account: &str, name: &str, id: &str) -> String {
    elb(region, account, &format!("targetgroup/{name}/{id}"))
}

/// `listener_arn` is derived from its owning load balancer's ARN by
/// replacing the `loadbalancer/` segment with `listener/`, matching the
/// real ELBv2 convention of embedding the LB id in the listener ARN.
pub fn listener(lb_arn: &str, lb_name: &str, lb_id: &str, listener_id: &str) -> String {
    let prefix = lb_arn
        .split(':')
        .take(5)
        .collect::<Vec<_>>()
        .join(":");
    format!("{prefix}:listener/app/{lb_name}/{lb_id}/{listener_id}")
}

pub fn rule(listener_arn: &str, rule_id: &str) -> String {
    let prefix = listener_arn.replacen("listener/", "listener-rule/", 1);
    format!("{prefix}/{rule_id}")
}

fn sd(region: &str, account: &str, rest: &str) -> String {
    format!("arn:aws:servicediscovery:{region}:{account}:{rest}")
}

pub fn sd_namespace(region: &str, account: &str, id: &str) -> String {
    sd(region, account, &format!("namespace/{id}"))
}

pub fn sd_service(region: &str, account: &str, id: &str) -> String {
    sd(region, account, &format!("service/{id}"))
}

/// 32 lowercase hex chars, deterministic from a pod name when one already
/// exists (spec.md §4.2: "SHA-256, first 16 bytes hex").
pub fn deterministic_task_id(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    hex::encode(&digest[..16])
}

pub struct ParsedArn {
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

/// Splits `arn:partition:service:region:account:resource` into its parts.
/// Returns `None` if `arn` doesn't have the expected six colon-separated
/// segments.
pub fn parse(arn: &str) -> Option<ParsedArn> {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() != 6 || parts[0] != "arn" {
        return None;
    }
    Some(ParsedArn {
        service: parts[2].to_string(),
        region: parts[3].to_string(),
        account: parts[4].to_string(),
        resource: parts[5].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_definition_arn_embeds_family_and_revision() {
        let a = task_definition("us-east-1", "000000000000", "web", 3);
        assert_eq!(
            a,
            "arn:aws:ecs:us-east-1:000000000000:task-definition/web:3"
        );
    }

    #[test]
    fn deterministic_task_id_is_32_hex_chars() {
        let id = deterministic_task_id("pod-abc-123");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, deterministic_task_id("pod-abc-123"));
    }

    #[test]
    fn parse_roundtrips_resource_segment() {
        let a = cluster("us-east-1", "000000000000", "prod");
        let parsed = parse(&a).unwrap();
        assert_eq!(parsed.service, "ecs");
        assert_eq!(parsed.resource, "cluster/prod");
    }
}

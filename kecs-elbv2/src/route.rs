//! Rule → route conversion (spec.md §4.4): builds the Traefik match
//! expression and weighted backend list a [`kecs_k8s::RouteSpec`] needs from
//! an ECS-shaped [`Rule`].

use kecs_types::{
    Action, ActionType, ForwardConfig, KecsResult, Rule, RuleCondition, TargetGroup,
};
use kecs_k8s::{RouteSpec, StickyConfig, WeightedBackend};

fn escape_backtick(s: &str) -> String {
    s.replace('`', "")
}

/// A trailing `*` with no other wildcard in the value becomes a literal
/// prefix match (spec.md §4.4: `/api/*` -> `PathPrefix("/api/")`, trailing
/// slash kept; `/x*` -> `PathPrefix("/x")`); anything else with a `*`/`?`
/// falls back to a regex match.
fn path_expr(values: &[String]) -> String {
    values
        .iter()
        .map(|v| {
            if let Some(prefix) = v.strip_suffix('*') {
                if !prefix.contains('*') && !prefix.contains('?') {
                    return format!("PathPrefix(`{}`)", escape_backtick(prefix));
                }
            }
            if v.contains('*') || v.contains('?') {
                let pattern = regex_escape_wildcards(v);
                format!("PathRegexp(`^{pattern}$`)")
            } else {
                format!("Path(`{}`)", escape_backtick(v))
            }
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

fn regex_escape_wildcards(v: &str) -> String {
    let mut out = String::new();
    for c in v.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

fn host_expr(values: &[String]) -> String {
    values
        .iter()
        .map(|v| {
            if let Some(rest) = v.strip_prefix("*.") {
                format!("HostRegexp(`^[a-zA-Z0-9-]+\\.{}$`)", regex_escape_wildcards(rest))
            } else {
                format!("Host(`{}`)", escape_backtick(v))
            }
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

fn header_expr(name: &str, values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("Header(`{}`,`{}`)", escape_backtick(name), escape_backtick(v)))
        .collect::<Vec<_>>()
        .join(" || ")
}

fn query_expr(values: &[kecs_types::QueryStringKv]) -> String {
    values
        .iter()
        .map(|kv| match &kv.key {
            Some(k) => format!("Query(`{}`,`{}`)", escape_backtick(k), escape_backtick(&kv.value)),
            None => format!("Query(`{}`)", escape_backtick(&kv.value)),
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

fn method_expr(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("Method(`{}`)", escape_backtick(v)))
        .collect::<Vec<_>>()
        .join(" || ")
}

fn source_ip_expr(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("ClientIP(`{}`)", escape_backtick(v)))
        .collect::<Vec<_>>()
        .join(" || ")
}

/// AND's every condition together; within a single condition, multiple
/// values OR together (wrapped in parens so the AND binds correctly).
pub fn match_expr(conditions: &[RuleCondition]) -> String {
    if conditions.is_empty() {
        return "PathPrefix(`/`)".to_string();
    }
    conditions
        .iter()
        .map(|c| {
            let inner = match c {
                RuleCondition::PathPattern(p) => path_expr(&p.values),
                RuleCondition::HostHeader(h) => host_expr(&h.values),
                RuleCondition::HttpHeader(h) => header_expr(&h.header_name, &h.values),
                RuleCondition::QueryString(q) => query_expr(&q.values),
                RuleCondition::HttpRequestMethod(m) => method_expr(&m.values),
                RuleCondition::SourceIp(s) => source_ip_expr(&s.values),
            };
            format!("({inner})")
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// `kecs-sticky[-<durationSeconds>]` (spec.md §4.4).
pub fn sticky_cookie_name(duration_seconds: Option<u32>) -> String {
    match duration_seconds {
        Some(d) => format!("kecs-sticky-{d}"),
        None => "kecs-sticky".to_string(),
    }
}

/// Normalizes weights to equal shares when they all sum to zero; otherwise
/// passes them through unchanged and lets the gateway normalize (spec.md
/// §4.4).
pub fn weighted_backends(
    forward: &ForwardConfig,
    resolve_target_group: impl Fn(&str) -> KecsResult<TargetGroup>,
) -> KecsResult<(Vec<WeightedBackend>, Option<StickyConfig>)> {
    let total: u32 = forward.target_groups.iter().map(|t| t.weight).sum();
    let mut backends = Vec::with_capacity(forward.target_groups.len());
    for tuple in &forward.target_groups {
        let tg = resolve_target_group(&tuple.target_group_arn)?;
        let bound = tg.bound_service.ok_or_else(|| {
            kecs_types::KecsError::invalid(format!(
                "target group {} has no registered backend service",
                tg.arn
            ))
        })?;
        let weight = if total == 0 { 1 } else { tuple.weight };
        backends.push(WeightedBackend {
            k8s_service_name: bound.k8s_service_name,
            port: bound.container_port,
            weight,
        });
    }
    let sticky = forward
        .target_group_stickiness_config
        .as_ref()
        .filter(|s| s.enabled)
        .map(|s| StickyConfig {
            cookie_name: sticky_cookie_name(s.duration_seconds),
        });
    Ok((backends, sticky))
}

/// Converts one rule into the `RouteSpec` the k8s driver's IngressRoute
/// synthesis consumes, resolving the rule's forward action (the only
/// action type spec.md §4.4 models; redirect/fixed-response are rejected
/// at rule-creation time upstream).
pub fn rule_to_route(
    rule: &Rule,
    resolve_target_group: impl Fn(&str) -> KecsResult<TargetGroup>,
) -> KecsResult<RouteSpec> {
    let forward = forward_action(&rule.actions)?;
    let (backends, sticky) = weighted_backends(forward, resolve_target_group)?;
    Ok(RouteSpec {
        match_expr: match_expr(&rule.conditions),
        priority: rule.priority as i64,
        backends,
        sticky,
    })
}

fn forward_action(actions: &[Action]) -> KecsResult<&ForwardConfig> {
    actions
        .iter()
        .find_map(|a| match &a.action_type {
            ActionType::Forward(f) => Some(f),
            _ => None,
        })
        .ok_or_else(|| kecs_types::KecsError::invalid("rule has no forward action"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::PathPatternConfig;

    #[test]
    fn prefix_path_becomes_path_prefix() {
        let expr = match_expr(&[RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/api/*".to_string()],
        })]);
        assert_eq!(expr, "(PathPrefix(`/api/`))");
    }

    #[test]
    fn bare_wildcard_path_keeps_prefix_up_to_the_star() {
        let expr = match_expr(&[RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/x*".to_string()],
        })]);
        assert_eq!(expr, "(PathPrefix(`/x`))");
    }

    #[test]
    fn interior_wildcard_falls_back_to_regex() {
        let expr = match_expr(&[RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/a*b".to_string()],
        })]);
        assert_eq!(expr, "(PathRegexp(`^/a.*b$`))");
    }

    #[test]
    fn empty_conditions_is_catchall() {
        assert_eq!(match_expr(&[]), "PathPrefix(`/`)");
    }

    #[test]
    fn sticky_cookie_name_includes_duration_when_set() {
        assert_eq!(sticky_cookie_name(Some(3600)), "kecs-sticky-3600");
        assert_eq!(sticky_cookie_name(None), "kecs-sticky");
    }

    #[test]
    fn zero_sum_weights_normalize_to_equal_shares() {
        use kecs_types::{BoundService, HealthCheckConfig, TargetGroupTuple, TargetType};
        let forward = ForwardConfig {
            target_groups: vec![
                TargetGroupTuple {
                    target_group_arn: "tg-a".to_string(),
                    weight: 0,
                },
                TargetGroupTuple {
                    target_group_arn: "tg-b".to_string(),
                    weight: 0,
                },
            ],
            target_group_stickiness_config: None,
        };
        let (backends, _) = weighted_backends(&forward, |arn| {
            Ok(TargetGroup {
                arn: arn.to_string(),
                name: "tg".to_string(),
                port: 80,
                protocol: "HTTP".to_string(),
                target_type: TargetType::Ip,
                vpc_id: None,
                health_check: HealthCheckConfig::default(),
                bound_service: Some(BoundService {
                    k8s_namespace: "kecs-c1".to_string(),
                    k8s_service_name: "svc".to_string(),
                    container_port: 8080,
                }),
            })
        })
        .unwrap();
        assert!(backends.iter().all(|b| b.weight == 1));
    }
}

//! ELBv2 emulator handler (spec.md §4.4, §6): AWS Query-protocol
//! form-urlencoded requests in, XML responses out, matching what the SDKs'
//! XML-over-HTTP parsers expect from the real `elasticloadbalancing` API.
//!
//! Responses are built by hand rather than through a generic serializer:
//! each AWS Query action names its own `<ActionResponse>`/`<ActionResult>`
//! wrapper tags, which a single derived type can't vary per call.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use kecs_elbv2::K8sTarget;
use kecs_translate::arn;
use kecs_types::{
    Action, ActionType, ForwardConfig, KecsError, KecsResult, Listener, LoadBalancer,
    LoadBalancerType, Rule, RuleCondition, Scheme, TargetGroup, TargetGroupTuple, TargetHealth,
    TargetType,
};

use crate::app::AppState;

/// Known ELBv2 `Action=` verbs (spec.md §4.7's routing sniff list), used by
/// `router.rs` to decide whether a form-urlencoded `POST /` belongs here.
pub const ACTIONS: &[&str] = &[
    "CreateLoadBalancer",
    "DeleteLoadBalancer",
    "DescribeLoadBalancers",
    "CreateTargetGroup",
    "DeleteTargetGroup",
    "DescribeTargetGroups",
    "RegisterTargets",
    "DeregisterTargets",
    "DescribeTargetHealth",
    "CreateListener",
    "DeleteListener",
    "DescribeListeners",
    "CreateRule",
    "DeleteRule",
    "DescribeRules",
];

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn tag(name: &str, value: impl std::fmt::Display) -> String {
    format!("<{name}>{}</{name}>", escape(&value.to_string()))
}

fn wrap(action: &str, result_tag: &str, body: &str) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<{action}Response><{result_tag}>{body}</{result_tag}><ResponseMetadata><RequestId>{}</RequestId></ResponseMetadata></{action}Response>",
        uuid::Uuid::new_v4()
    );
    out
}

/// `Delete*` and `Register`/`DeregisterTargets` carry no result payload.
fn empty_response(action: &str) -> String {
    format!(
        "<{action}Response><ResponseMetadata><RequestId>{}</RequestId></ResponseMetadata></{action}Response>",
        uuid::Uuid::new_v4()
    )
}

fn k8s_target<'a>(app: &'a AppState, k8s_cluster_name: &'a str) -> K8sTarget<'a> {
    K8sTarget { cluster_name: k8s_cluster_name, kube_context: &app.args.kube_context, namespace: k8s_cluster_name }
}

fn field<'a>(form: &'a BTreeMap<String, String>, key: &str) -> KecsResult<&'a str> {
    form.get(key)
        .map(String::as_str)
        .ok_or_else(|| KecsError::invalid(format!("missing required parameter {key}")))
}

async fn cluster_from_form(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<kecs_types::Cluster> {
    let name = form.get("KecsClusterName").map(String::as_str).unwrap_or("default");
    app.store.clusters.get(name).await
}

/// Dispatch entry point called from `router.rs` once the body has been
/// sniffed as ELBv2; `form` is the already-decoded `application/
/// x-www-form-urlencoded` body as a flat key/value map (AWS Query protocol
/// flattens nested lists into `Foo.member.N.Bar`-style keys).
pub async fn dispatch(app: &AppState, action: &str, form: &BTreeMap<String, String>) -> KecsResult<String> {
    match action {
        "CreateLoadBalancer" => create_load_balancer(app, form).await,
        "DeleteLoadBalancer" => delete_load_balancer(app, form).await,
        "DescribeLoadBalancers" => describe_load_balancers(app, form).await,
        "CreateTargetGroup" => create_target_group(app, form).await,
        "DeleteTargetGroup" => delete_target_group(app, form).await,
        "DescribeTargetGroups" => describe_target_groups(app, form).await,
        "RegisterTargets" => register_targets(app, form).await,
        "DeregisterTargets" => deregister_targets(app, form).await,
        "DescribeTargetHealth" => describe_target_health(app, form).await,
        "CreateListener" => create_listener(app, form).await,
        "DeleteListener" => delete_listener(app, form).await,
        "DescribeListeners" => describe_listeners(app, form).await,
        "CreateRule" => create_rule(app, form).await,
        "DeleteRule" => delete_rule(app, form).await,
        "DescribeRules" => describe_rules(app, form).await,
        other => Err(KecsError::invalid(format!("unsupported ELBv2 action: {other}"))),
    }
}

fn load_balancer_xml(lb: &LoadBalancer) -> String {
    let lb_type = match lb.lb_type {
        LoadBalancerType::Application => "application",
        LoadBalancerType::Network => "network",
    };
    let scheme = match lb.scheme {
        Scheme::InternetFacing => "internet-facing",
        Scheme::Internal => "internal",
    };
    format!(
        "<member>{}{}{}{}{}{}{}</member>",
        tag("LoadBalancerArn", &lb.arn),
        tag("LoadBalancerName", &lb.name),
        tag("DNSName", &lb.dns_name),
        tag("State", format!("{:?}", lb.state).to_lowercase()),
        tag("Type", lb_type),
        tag("Scheme", scheme),
        tag("VpcId", &lb.vpc_id),
    )
}

fn load_balancers_result(lbs: &[LoadBalancer]) -> String {
    format!("<LoadBalancers>{}</LoadBalancers>", lbs.iter().map(load_balancer_xml).collect::<String>())
}

async fn create_load_balancer(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let name = field(form, "Name")?;
    let lb_type = match form.get("Type").map(String::as_str) {
        Some("network") => LoadBalancerType::Network,
        _ => LoadBalancerType::Application,
    };
    let scheme = match form.get("Scheme").map(String::as_str) {
        Some("internal") => Scheme::Internal,
        _ => Scheme::InternetFacing,
    };
    let lb = app
        .elbv2
        .create_load_balancer(
            &app.args.region,
            &app.args.account_id,
            name,
            lb_type,
            scheme,
            form.get("VpcId").cloned().unwrap_or_default(),
            vec![],
        )
        .await?;
    Ok(wrap("CreateLoadBalancer", "CreateLoadBalancerResult", &load_balancers_result(&[lb])))
}

async fn delete_load_balancer(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let lb_arn = field(form, "LoadBalancerArn")?;
    let cluster = cluster_from_form(app, form).await?;
    app.elbv2.delete_load_balancer(lb_arn, &k8s_target(app, &cluster.k8s_cluster_name)).await?;
    Ok(empty_response("DeleteLoadBalancer"))
}

async fn describe_load_balancers(app: &AppState, _form: &BTreeMap<String, String>) -> KecsResult<String> {
    let lbs = app.store.elbv2.list_load_balancers().await;
    Ok(wrap("DescribeLoadBalancers", "DescribeLoadBalancersResult", &load_balancers_result(&lbs)))
}

fn target_group_xml(tg: &TargetGroup) -> String {
    let target_type = match tg.target_type {
        TargetType::Instance => "instance",
        TargetType::Ip => "ip",
        TargetType::Lambda => "lambda",
    };
    format!(
        "<member>{}{}{}{}{}</member>",
        tag("TargetGroupArn", &tg.arn),
        tag("TargetGroupName", &tg.name),
        tag("Protocol", &tg.protocol),
        tag("Port", tg.port),
        tag("TargetType", target_type),
    )
}

fn target_groups_result(tgs: &[TargetGroup]) -> String {
    format!("<TargetGroups>{}</TargetGroups>", tgs.iter().map(target_group_xml).collect::<String>())
}

async fn create_target_group(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let name = field(form, "Name")?.to_string();
    let id = uuid::Uuid::new_v4().simple().to_string();
    let target_type = match form.get("TargetType").map(String::as_str) {
        Some("instance") => TargetType::Instance,
        Some("lambda") => TargetType::Lambda,
        _ => TargetType::Ip,
    };
    let tg = TargetGroup {
        arn: arn::target_group(&app.args.region, &app.args.account_id, &name, &id),
        name,
        port: form.get("Port").and_then(|p| p.parse().ok()).unwrap_or(80),
        protocol: form.get("Protocol").cloned().unwrap_or_else(|| "HTTP".to_string()),
        target_type,
        vpc_id: form.get("VpcId").cloned(),
        health_check: Default::default(),
        bound_service: None,
    };
    let tg = app.elbv2.create_target_group(tg).await?;
    Ok(wrap("CreateTargetGroup", "CreateTargetGroupResult", &target_groups_result(&[tg])))
}

async fn delete_target_group(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let tg_arn = field(form, "TargetGroupArn")?;
    app.elbv2.delete_target_group(tg_arn).await?;
    Ok(empty_response("DeleteTargetGroup"))
}

async fn describe_target_groups(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let tgs = if let Some(arn) = form.get("TargetGroupArns.member.1") {
        vec![app.store.elbv2.get_target_group(arn).await?]
    } else {
        app.store.elbv2.target_groups.list_all().await
    };
    Ok(wrap("DescribeTargetGroups", "DescribeTargetGroupsResult", &target_groups_result(&tgs)))
}

fn parse_targets(form: &BTreeMap<String, String>) -> Vec<(String, u16)> {
    let mut out = Vec::new();
    let mut i = 1;
    loop {
        let Some(id) = form.get(&format!("Targets.member.{i}.Id")) else {
            break;
        };
        let port = form
            .get(&format!("Targets.member.{i}.Port"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(80);
        out.push((id.clone(), port));
        i += 1;
    }
    out
}

async fn register_targets(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let tg_arn = field(form, "TargetGroupArn")?;
    let cluster = cluster_from_form(app, form).await?;
    app.elbv2
        .register_targets(tg_arn, parse_targets(form), &k8s_target(app, &cluster.k8s_cluster_name))
        .await?;
    Ok(empty_response("RegisterTargets"))
}

async fn deregister_targets(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let tg_arn = field(form, "TargetGroupArn")?;
    let ids: Vec<String> = parse_targets(form).into_iter().map(|(id, _)| id).collect();
    app.elbv2.deregister_targets(tg_arn, &ids).await?;
    Ok(empty_response("DeregisterTargets"))
}

fn target_health_xml(h: &TargetHealth) -> String {
    format!(
        "<member><Target>{}{}</Target><TargetHealth>{}{}</TargetHealth></member>",
        tag("Id", &h.target_id),
        tag("Port", h.target_port),
        tag("State", format!("{:?}", h.state).to_lowercase()),
        tag("Reason", &h.reason),
    )
}

async fn describe_target_health(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let tg_arn = field(form, "TargetGroupArn")?;
    let health = app.elbv2.describe_target_health(tg_arn).await;
    let body = format!(
        "<TargetHealthDescriptions>{}</TargetHealthDescriptions>",
        health.iter().map(target_health_xml).collect::<String>()
    );
    Ok(wrap("DescribeTargetHealth", "DescribeTargetHealthResult", &body))
}

fn listener_xml(l: &Listener) -> String {
    format!(
        "<member>{}{}{}{}</member>",
        tag("ListenerArn", &l.arn),
        tag("LoadBalancerArn", &l.load_balancer_arn),
        tag("Port", l.port),
        tag("Protocol", &l.protocol),
    )
}

fn listeners_result(ls: &[Listener]) -> String {
    format!("<Listeners>{}</Listeners>", ls.iter().map(listener_xml).collect::<String>())
}

fn default_forward_action(form: &BTreeMap<String, String>) -> Vec<Action> {
    let Some(tg_arn) = form.get("DefaultActions.member.1.TargetGroupArn") else {
        return vec![];
    };
    vec![Action {
        order: 1,
        action_type: ActionType::Forward(ForwardConfig {
            target_groups: vec![TargetGroupTuple { target_group_arn: tg_arn.clone(), weight: 1 }],
            target_group_stickiness_config: None,
        }),
    }]
}

async fn create_listener(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let lb_arn = field(form, "LoadBalancerArn")?;
    let port: u16 = field(form, "Port")?.parse().map_err(|_| KecsError::invalid("invalid Port"))?;
    let protocol = form.get("Protocol").cloned().unwrap_or_else(|| "HTTP".to_string());
    let cluster = cluster_from_form(app, form).await?;

    let listener = app
        .elbv2
        .create_listener(
            &app.args.region,
            &app.args.account_id,
            lb_arn,
            port,
            protocol,
            default_forward_action(form),
            &k8s_target(app, &cluster.k8s_cluster_name),
        )
        .await?;
    Ok(wrap("CreateListener", "CreateListenerResult", &listeners_result(&[listener])))
}

async fn delete_listener(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let listener_arn = field(form, "ListenerArn")?;
    let cluster = cluster_from_form(app, form).await?;
    app.elbv2.delete_listener(listener_arn, &k8s_target(app, &cluster.k8s_cluster_name)).await?;
    Ok(empty_response("DeleteListener"))
}

async fn describe_listeners(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let lb_arn = field(form, "LoadBalancerArn")?;
    let listeners = app.store.elbv2.listeners_for_load_balancer(lb_arn).await;
    Ok(wrap("DescribeListeners", "DescribeListenersResult", &listeners_result(&listeners)))
}

fn rule_xml(r: &Rule) -> String {
    format!(
        "<member>{}{}{}</member>",
        tag("RuleArn", &r.arn),
        tag("Priority", r.priority),
        tag("IsDefault", r.is_default),
    )
}

fn rules_result(rules: &[Rule]) -> String {
    format!("<Rules>{}</Rules>", rules.iter().map(rule_xml).collect::<String>())
}

fn parse_conditions(form: &BTreeMap<String, String>) -> Vec<RuleCondition> {
    let mut out = Vec::new();
    let mut i = 1;
    loop {
        let Some(field_name) = form.get(&format!("Conditions.member.{i}.Field")) else {
            break;
        };
        let mut values = Vec::new();
        let mut j = 1;
        while let Some(v) = form.get(&format!("Conditions.member.{i}.Values.member.{j}")) {
            values.push(v.clone());
            j += 1;
        }
        let condition = match field_name.as_str() {
            "path-pattern" => RuleCondition::PathPattern(kecs_types::PathPatternConfig { values }),
            "host-header" => RuleCondition::HostHeader(kecs_types::HostHeaderConfig { values }),
            _ => {
                i += 1;
                continue;
            }
        };
        out.push(condition);
        i += 1;
    }
    out
}

async fn create_rule(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let listener_arn = field(form, "ListenerArn")?;
    let priority = form.get("Priority").and_then(|p| p.parse().ok());
    let cluster = cluster_from_form(app, form).await?;

    let rule = app
        .elbv2
        .create_rule(
            listener_arn,
            priority,
            parse_conditions(form),
            default_forward_action(form),
            &k8s_target(app, &cluster.k8s_cluster_name),
        )
        .await?;
    Ok(wrap("CreateRule", "CreateRuleResult", &rules_result(&[rule])))
}

async fn delete_rule(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let rule_arn = field(form, "RuleArn")?;
    let cluster = cluster_from_form(app, form).await?;
    app.elbv2.delete_rule(rule_arn, &k8s_target(app, &cluster.k8s_cluster_name)).await?;
    Ok(empty_response("DeleteRule"))
}

async fn describe_rules(app: &AppState, form: &BTreeMap<String, String>) -> KecsResult<String> {
    let listener_arn = field(form, "ListenerArn")?;
    let rules = app.store.elbv2.rules_for_listener(listener_arn).await;
    Ok(wrap("DescribeRules", "DescribeRulesResult", &rules_result(&rules)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn escape_covers_xml_special_chars() {
        assert_eq!(escape("a & b <c> \"d\""), "a &amp; b &lt;c&gt; &quot;d&quot;");
    }

    #[test]
    fn parse_targets_reads_sequential_members() {
        let f = form(&[
            ("Targets.member.1.Id", "10.0.0.1"),
            ("Targets.member.1.Port", "8080"),
            ("Targets.member.2.Id", "10.0.0.2"),
        ]);
        let targets = parse_targets(&f);
        assert_eq!(targets, vec![("10.0.0.1".to_string(), 8080), ("10.0.0.2".to_string(), 80)]);
    }

    #[test]
    fn parse_targets_empty_when_no_members_present() {
        assert!(parse_targets(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn parse_conditions_reads_path_pattern_and_host_header() {
        let f = form(&[
            ("Conditions.member.1.Field", "path-pattern"),
            ("Conditions.member.1.Values.member.1", "/api/*"),
            ("Conditions.member.2.Field", "host-header"),
            ("Conditions.member.2.Values.member.1", "example.com"),
        ]);
        let conditions = parse_conditions(&f);
        assert_eq!(conditions.len(), 2);
        assert!(matches!(&conditions[0], RuleCondition::PathPattern(c) if c.values == vec!["/api/*".to_string()]));
        assert!(matches!(&conditions[1], RuleCondition::HostHeader(c) if c.values == vec!["example.com".to_string()]));
    }

    #[test]
    fn parse_conditions_skips_unknown_field_but_keeps_scanning() {
        let f = form(&[
            ("Conditions.member.1.Field", "http-header"),
            ("Conditions.member.2.Field", "path-pattern"),
            ("Conditions.member.2.Values.member.1", "/health"),
        ]);
        let conditions = parse_conditions(&f);
        assert_eq!(conditions.len(), 1);
        assert!(matches!(&conditions[0], RuleCondition::PathPattern(_)));
    }

    #[test]
    fn default_forward_action_empty_without_target_group() {
        assert!(default_forward_action(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn default_forward_action_builds_single_forward_with_full_weight() {
        let f = form(&[("DefaultActions.member.1.TargetGroupArn", "arn:tg:1")]);
        let actions = default_forward_action(&f);
        assert_eq!(actions.len(), 1);
        match &actions[0].action_type {
            ActionType::Forward(cfg) => {
                assert_eq!(cfg.target_groups.len(), 1);
                assert_eq!(cfg.target_groups[0].target_group_arn, "arn:tg:1");
                assert_eq!(cfg.target_groups[0].weight, 1);
            }
            other => panic!("expected Forward action, got {other:?}"),
        }
    }
}

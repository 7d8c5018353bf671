use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerState {
    Provisioning,
    Active,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadBalancerType {
    #[serde(rename = "application")]
    Application,
    #[serde(rename = "network")]
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    #[serde(rename = "internet-facing")]
    InternetFacing,
    #[serde(rename = "internal")]
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub arn: String,
    pub name: String,
    pub dns_name: String,
    pub state: LoadBalancerState,
    pub lb_type: LoadBalancerType,
    pub scheme: Scheme,
    pub vpc_id: String,
    pub availability_zones: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Instance,
    Ip,
    Lambda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub protocol: String,
    pub port: String,
    pub path: String,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub healthy_threshold_count: u32,
    pub unhealthy_threshold_count: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        HealthCheckConfig {
            protocol: "HTTP".to_string(),
            port: "traffic-port".to_string(),
            path: "/".to_string(),
            interval_seconds: 30,
            timeout_seconds: 5,
            healthy_threshold_count: 5,
            unhealthy_threshold_count: 2,
        }
    }
}

/// The k8s Service a target group's registered targets resolve to, set when
/// an ECS service attaches the group via `loadBalancers[]` (spec.md §4.4:
/// routing ultimately needs a k8s Service name/port, not a raw target list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundService {
    pub k8s_namespace: String,
    pub k8s_service_name: String,
    pub container_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetGroup {
    pub arn: String,
    pub name: String,
    pub port: u16,
    pub protocol: String,
    pub target_type: TargetType,
    pub vpc_id: Option<String>,
    pub health_check: HealthCheckConfig,
    pub bound_service: Option<BoundService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetGroupTuple {
    pub target_group_arn: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetGroupStickinessConfig {
    pub enabled: bool,
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    pub target_groups: Vec<TargetGroupTuple>,
    pub target_group_stickiness_config: Option<TargetGroupStickinessConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionType {
    Forward(ForwardConfig),
    Redirect,
    FixedResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub order: u32,
    pub action_type: ActionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listener {
    pub arn: String,
    pub load_balancer_arn: String,
    pub port: u16,
    pub protocol: String,
    pub default_actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathPatternConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostHeaderConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpHeaderConfig {
    pub header_name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStringKv {
    pub key: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStringConfig {
    pub values: Vec<QueryStringKv>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequestMethodConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIpConfig {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleCondition {
    PathPattern(PathPatternConfig),
    HostHeader(HostHeaderConfig),
    HttpHeader(HttpHeaderConfig),
    QueryString(QueryStringConfig),
    HttpRequestMethod(HttpRequestMethodConfig),
    SourceIp(SourceIpConfig),
}

/// `priority ∈ [1,49999]`; lower wins (spec.md §3/§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub arn: String,
    pub listener_arn: String,
    pub priority: u32,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<Action>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealthState {
    Initial,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetHealth {
    pub target_group_arn: String,
    pub target_id: String,
    pub target_port: u16,
    pub state: TargetHealthState,
    pub reason: String,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

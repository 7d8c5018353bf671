use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdNamespaceType {
    #[serde(rename = "DNS_PRIVATE")]
    DnsPrivate,
    #[serde(rename = "DNS_PUBLIC")]
    DnsPublic,
    #[serde(rename = "HTTP")]
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdNamespace {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub ns_type: SdNamespaceType,
    pub hosted_zone_id: Option<String>,
    /// Derived k8s namespace name (stripped/replaced/clamped per spec.md
    /// §4.5), cached here so repeated registrations don't recompute it.
    pub k8s_namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub ttl: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DnsConfig {
    pub records: Vec<DnsRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdHealthCheckConfig {
    #[serde(rename = "type")]
    pub check_type: String,
    pub resource_path: Option<String>,
    pub failure_threshold: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdService {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub namespace_id: String,
    pub dns_config: DnsConfig,
    pub health_check: Option<SdHealthCheckConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdInstance {
    pub id: String,
    pub service_id: String,
    pub attributes: std::collections::BTreeMap<String, String>,
    pub health_status: HealthStatus,
}

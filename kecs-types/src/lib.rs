pub mod attribute;
pub mod cluster;
pub mod container_instance;
pub mod elbv2;
pub mod error;
pub mod log;
pub mod ptr;
pub mod service;
pub mod service_discovery;
pub mod task;
pub mod task_definition;
pub mod task_set;

pub use attribute::{Attribute, AttributeKey};
pub use cluster::{Cluster, ClusterStatus, Tag};
pub use container_instance::{ContainerInstance, ContainerInstanceStatus, Resources};
pub use elbv2::{
    Action, ActionType, BoundService, ForwardConfig, HealthCheckConfig, HostHeaderConfig,
    HttpHeaderConfig, HttpRequestMethodConfig, Listener, LoadBalancer, LoadBalancerState,
    LoadBalancerType, PathPatternConfig, QueryStringConfig, QueryStringKv, Rule, RuleCondition,
    Scheme, SourceIpConfig, TargetGroup, TargetGroupStickinessConfig, TargetGroupTuple,
    TargetHealth, TargetHealthState, TargetType,
};
pub use error::{KecsError, KecsResult};
pub use log::{CreationState, CreationStatus, TaskLog};
pub use service::{
    Deployment, DeploymentConfiguration, DeploymentRolloutState, LaunchType, NetworkConfiguration,
    Service, ServiceLoadBalancer, ServiceRegistry, ServiceStatus,
};
pub use service_discovery::{
    DnsConfig, DnsRecord, HealthStatus, SdHealthCheckConfig, SdInstance, SdNamespace,
    SdNamespaceType, SdService,
};
pub use task::{DesiredStatus, LastStatus, Task};
pub use task_definition::{
    ContainerDefinition, ContainerDependency, DependsOnCondition, EfsVolumeConfiguration,
    HostVolumeSource, KeyValuePair, LogConfiguration, MountPoint, NetworkMode, PortMapping,
    SecretRef, TaskDefinition, TaskDefinitionStatus, Volume,
};
pub use task_set::{Scale, TaskSet, TaskSetStatus};

/// `(family, revision)` page-style cursors and similar opaque tokens use
/// this wrapper so callers don't hand-roll base64 everywhere.
pub mod page_token {
    use base64::Engine;

    pub fn encode(key: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(key.as_bytes())
    }

    pub fn decode(token: &str) -> Result<String, crate::KecsError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(token.as_bytes())
            .map_err(|_| crate::KecsError::invalid("invalid pagination token"))?;
        String::from_utf8(bytes).map_err(|_| crate::KecsError::invalid("invalid pagination token"))
    }
}

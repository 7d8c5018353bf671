pub mod arn;
pub mod cpu;
pub mod deployment;
pub mod pod;

pub use deployment::to_deployment;
pub use pod::{
    ResolvedSecret, ResolvedSecrets, network_annotations, pod_annotations, service_account_name,
    to_pod_spec,
};

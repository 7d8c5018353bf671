//! Instance registration maintains the headless Service's Endpoints
//! (spec.md §4.5): only `HEALTHY`/`UNKNOWN` instances are addressable.

use k8s_openapi::api::core::v1::{
    Endpoints, EndpointAddress, EndpointPort, EndpointSubset,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kecs_types::{HealthStatus, SdInstance};

pub const INSTANCE_IPV4_ATTR: &str = "AWS_INSTANCE_IPV4";
pub const INSTANCE_PORT_ATTR: &str = "AWS_INSTANCE_PORT";

fn addressable(instance: &SdInstance) -> bool {
    matches!(instance.health_status, HealthStatus::Healthy | HealthStatus::Unknown)
}

fn address(instance: &SdInstance) -> Option<EndpointAddress> {
    instance
        .attributes
        .get(INSTANCE_IPV4_ATTR)
        .map(|ip| EndpointAddress {
            ip: ip.clone(),
            target_ref: None,
            hostname: None,
            node_name: None,
        })
}

fn port(instance: &SdInstance) -> i32 {
    instance
        .attributes
        .get(INSTANCE_PORT_ATTR)
        .and_then(|p| p.parse().ok())
        .unwrap_or(80)
}

/// Rebuilds the Endpoints object from scratch for the full current
/// membership — spec.md's update model is "whole endpoints list", not
/// incremental patches, matching how `sync_listener_route` rewrites the
/// whole route list on any rule change.
pub fn endpoints_for_instances(
    k8s_service_name: &str,
    namespace: &str,
    instances: &[SdInstance],
) -> Endpoints {
    let addresses: Vec<EndpointAddress> = instances
        .iter()
        .filter(|i| addressable(i))
        .filter_map(address)
        .collect();

    let ports: Vec<i32> = instances
        .iter()
        .filter(|i| addressable(i))
        .map(port)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let subsets = if addresses.is_empty() {
        None
    } else {
        Some(
            ports
                .into_iter()
                .map(|p| EndpointSubset {
                    addresses: Some(addresses.clone()),
                    not_ready_addresses: None,
                    ports: Some(vec![EndpointPort {
                        port: p,
                        ..Default::default()
                    }]),
                })
                .collect(),
        )
    };

    Endpoints {
        metadata: ObjectMeta {
            name: Some(k8s_service_name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        subsets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn instance(ip: &str, status: HealthStatus) -> SdInstance {
        let mut attributes = BTreeMap::new();
        attributes.insert(INSTANCE_IPV4_ATTR.to_string(), ip.to_string());
        attributes.insert(INSTANCE_PORT_ATTR.to_string(), "8080".to_string());
        SdInstance {
            id: ip.to_string(),
            service_id: "svc".to_string(),
            attributes,
            health_status: status,
        }
    }

    #[test]
    fn unhealthy_instances_are_excluded() {
        let instances = vec![
            instance("10.0.0.1", HealthStatus::Healthy),
            instance("10.0.0.2", HealthStatus::Unhealthy),
        ];
        let endpoints = endpoints_for_instances("sd-svc", "ns", &instances);
        let subsets = endpoints.subsets.unwrap();
        assert_eq!(subsets[0].addresses.as_ref().unwrap().len(), 1);
        assert_eq!(subsets[0].addresses.as_ref().unwrap()[0].ip, "10.0.0.1");
    }

    #[test]
    fn unknown_instances_are_included() {
        let instances = vec![instance("10.0.0.3", HealthStatus::Unknown)];
        let endpoints = endpoints_for_instances("sd-svc", "ns", &instances);
        assert!(endpoints.subsets.is_some());
    }

    #[test]
    fn no_addressable_instances_yields_no_subsets() {
        let instances = vec![instance("10.0.0.4", HealthStatus::Unhealthy)];
        let endpoints = endpoints_for_instances("sd-svc", "ns", &instances);
        assert!(endpoints.subsets.is_none());
    }
}

//! Headless Service synthesis for a Cloud-Map-compatible SD service
//! (spec.md §4.5): `sd-<service>`, no selector — instance membership is
//! driven entirely by the Endpoints object `instance.rs` maintains.

use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

pub fn k8s_service_name(sd_service_name: &str) -> String {
    format!("sd-{sd_service_name}")
}

pub fn headless_service(sd_service_name: &str, namespace: &str, port: u16) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(k8s_service_name(sd_service_name)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            ports: Some(vec![k8s_openapi::api::core::v1::ServicePort {
                port: port as i32,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_has_sd_prefix() {
        assert_eq!(k8s_service_name("billing"), "sd-billing");
    }

    #[test]
    fn headless_service_has_no_cluster_ip() {
        let svc = headless_service("billing", "ns", 80);
        assert_eq!(svc.spec.unwrap().cluster_ip.as_deref(), Some("None"));
    }
}

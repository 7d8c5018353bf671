//! Service Discovery operation handlers (spec.md §4.5, §6): AWS JSON over
//! `POST /`, dispatched by `router.rs` on an `X-Amz-Target` substring match
//! rather than an exact operation enum the way ECS's target header works.

use kecs_sd::K8sTarget;
use kecs_types::{
    DnsConfig, KecsError, KecsResult, SdHealthCheckConfig, SdInstance, SdNamespace,
    SdNamespaceType, SdService,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::AppState;

/// Service Discovery has no notion of an ECS cluster; every namespace/service
/// lands on whatever single kube context the server was started with, so the
/// `ClientCache` key is a fixed label rather than one derived per request.
const SD_CLUSTER_NAME: &str = "kecs-sd";

fn k8s_target(app: &AppState) -> K8sTarget<'_> {
    K8sTarget { cluster_name: SD_CLUSTER_NAME, kube_context: &app.args.kube_context }
}

fn req<T: for<'de> Deserialize<'de>>(body: &Value) -> KecsResult<T> {
    serde_json::from_value(body.clone()).map_err(|e| KecsError::invalid(e.to_string()))
}

fn namespace_wire(ns: &SdNamespace) -> Value {
    json!({
        "Id": ns.id,
        "Arn": ns.arn,
        "Name": ns.name,
        "Type": ns.ns_type,
        "Properties": { "DnsProperties": { "HostedZoneId": ns.hosted_zone_id } },
    })
}

fn service_wire(svc: &SdService) -> Value {
    json!({
        "Id": svc.id,
        "Arn": svc.arn,
        "Name": svc.name,
        "NamespaceId": svc.namespace_id,
        "DnsConfig": svc.dns_config,
        "HealthCheckConfig": svc.health_check,
    })
}

fn instance_wire(i: &SdInstance) -> Value {
    json!({
        "Id": i.id,
        "Attributes": i.attributes,
    })
}

/// Dispatches on the operation name carried in the `X-Amz-Target` tail
/// (`...ServiceDiscovery_XXXX.<Operation>`), mirroring ECS's own header
/// convention (spec.md §4.7).
pub async fn dispatch(app: &AppState, op: &str, body: Value) -> KecsResult<Value> {
    match op {
        "CreateHttpNamespace" => create_namespace(app, body, SdNamespaceType::Http).await,
        "CreatePrivateDnsNamespace" => create_namespace(app, body, SdNamespaceType::DnsPrivate).await,
        "CreatePublicDnsNamespace" => create_namespace(app, body, SdNamespaceType::DnsPublic).await,
        "GetNamespace" => get_namespace(app, body).await,
        "ListNamespaces" => list_namespaces(app, body).await,
        "CreateService" => create_service(app, body).await,
        "GetService" => get_service(app, body).await,
        "ListServices" => list_services(app, body).await,
        "RegisterInstance" => register_instance(app, body).await,
        "DeregisterInstance" => deregister_instance(app, body).await,
        "ListInstances" => list_instances(app, body).await,
        "DiscoverInstances" => discover_instances(app, body).await,
        other => Err(KecsError::invalid(format!("unsupported ServiceDiscovery operation: {other}"))),
    }
}

async fn create_namespace(app: &AppState, body: Value, ns_type: SdNamespaceType) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Properties", default)]
        properties: Option<NamespaceProperties>,
    }
    #[derive(Deserialize)]
    struct NamespaceProperties {
        #[serde(rename = "DnsProperties", default)]
        dns: Option<DnsProperties>,
    }
    #[derive(Deserialize)]
    struct DnsProperties {
        #[serde(rename = "HostedZoneId", default)]
        hosted_zone_id: Option<String>,
    }
    let r: Req = req(&body)?;
    let hosted_zone_id = r.properties.and_then(|p| p.dns).and_then(|d| d.hosted_zone_id);

    let ns = app
        .sd
        .create_namespace(
            &app.args.region,
            &app.args.account_id,
            &r.name,
            ns_type,
            hosted_zone_id,
            &k8s_target(app),
        )
        .await?;
    Ok(json!({ "Namespace": namespace_wire(&ns) }))
}

async fn get_namespace(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "Id")]
        id: String,
    }
    let r: Req = req(&body)?;
    let ns = app.store.service_discovery.namespaces.get(&r.id).await.ok_or_else(|| KecsError::not_found("Namespace", &r.id))?;
    Ok(json!({ "Namespace": namespace_wire(&ns) }))
}

async fn list_namespaces(app: &AppState, _body: Value) -> KecsResult<Value> {
    let namespaces = app.store.service_discovery.namespaces.list_all().await;
    Ok(json!({ "Namespaces": namespaces.iter().map(namespace_wire).collect::<Vec<_>>() }))
}

async fn create_service(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "NamespaceId")]
        namespace_id: String,
        #[serde(rename = "DnsConfig", default)]
        dns_config: DnsConfig,
        #[serde(rename = "HealthCheckConfig", default)]
        health_check: Option<SdHealthCheckConfig>,
        #[serde(rename = "Port", default = "default_port")]
        port: u16,
    }
    fn default_port() -> u16 {
        80
    }
    let r: Req = req(&body)?;
    let svc = app
        .sd
        .create_service(
            &app.args.region,
            &app.args.account_id,
            &r.name,
            &r.namespace_id,
            r.dns_config,
            r.health_check,
            r.port,
            &k8s_target(app),
        )
        .await?;
    Ok(json!({ "Service": service_wire(&svc) }))
}

async fn get_service(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "Id")]
        id: String,
    }
    let r: Req = req(&body)?;
    let svc = app.store.service_discovery.services.get(&r.id).await.ok_or_else(|| KecsError::not_found("Service", &r.id))?;
    Ok(json!({ "Service": service_wire(&svc) }))
}

async fn list_services(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize, Default)]
    struct Req {
        #[serde(rename = "Filters", default)]
        filters: Vec<Filter>,
    }
    #[derive(Deserialize)]
    struct Filter {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Values")]
        values: Vec<String>,
    }
    let r: Req = if body.is_null() { Req::default() } else { req(&body)? };
    let namespace_id = r
        .filters
        .iter()
        .find(|f| f.name == "NAMESPACE_ID")
        .and_then(|f| f.values.first())
        .cloned();

    let services = match namespace_id {
        Some(ns_id) => app.store.service_discovery.services_in_namespace(&ns_id).await,
        None => app.store.service_discovery.services.list_all().await,
    };
    Ok(json!({ "Services": services.iter().map(service_wire).collect::<Vec<_>>() }))
}

async fn register_instance(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "ServiceId")]
        service_id: String,
        #[serde(rename = "InstanceId")]
        instance_id: String,
        #[serde(rename = "Attributes", default)]
        attributes: std::collections::BTreeMap<String, String>,
    }
    let r: Req = req(&body)?;
    let instance = SdInstance {
        id: r.instance_id,
        service_id: r.service_id.clone(),
        attributes: r.attributes,
        health_status: kecs_types::HealthStatus::Unknown,
    };
    app.sd.register_instance(&r.service_id, instance, &k8s_target(app)).await?;
    Ok(json!({ "OperationId": uuid::Uuid::new_v4().simple().to_string() }))
}

async fn deregister_instance(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "ServiceId")]
        service_id: String,
        #[serde(rename = "InstanceId")]
        instance_id: String,
    }
    let r: Req = req(&body)?;
    app.sd.deregister_instance(&r.service_id, &r.instance_id, &k8s_target(app)).await?;
    Ok(json!({ "OperationId": uuid::Uuid::new_v4().simple().to_string() }))
}

async fn list_instances(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "ServiceId")]
        service_id: String,
    }
    let r: Req = req(&body)?;
    let instances = app.store.service_discovery.instances_for_service(&r.service_id).await;
    Ok(json!({ "Instances": instances.iter().map(instance_wire).collect::<Vec<_>>() }))
}

/// spec.md §4.5's DNS-resolution-fallback entry point: AWS's real
/// `DiscoverInstances` call resolves by namespace/service *name*, not id, so
/// this is the one operation that needs the name → id lookups the rest of
/// the module avoids.
async fn discover_instances(app: &AppState, body: Value) -> KecsResult<Value> {
    #[derive(Deserialize)]
    struct Req {
        #[serde(rename = "NamespaceName")]
        namespace_name: String,
        #[serde(rename = "ServiceName")]
        service_name: String,
        #[serde(rename = "HealthStatus", default)]
        health_status: Option<String>,
    }
    let r: Req = req(&body)?;

    let namespace = app
        .store
        .service_discovery
        .namespaces
        .list_all()
        .await
        .into_iter()
        .find(|ns| ns.name == r.namespace_name)
        .ok_or_else(|| KecsError::not_found("Namespace", &r.namespace_name))?;
    let service = app
        .store
        .service_discovery
        .services_in_namespace(&namespace.id)
        .await
        .into_iter()
        .find(|s| s.name == r.service_name)
        .ok_or_else(|| KecsError::not_found("Service", &r.service_name))?;

    let instances: Vec<Value> = app
        .store
        .service_discovery
        .instances_for_service(&service.id)
        .await
        .into_iter()
        .filter(|i| match r.health_status.as_deref() {
            Some("HEALTHY") => i.health_status == kecs_types::HealthStatus::Healthy,
            Some("UNHEALTHY") => i.health_status == kecs_types::HealthStatus::Unhealthy,
            _ => !matches!(i.health_status, kecs_types::HealthStatus::Unhealthy),
        })
        .map(|i| {
            json!({
                "InstanceId": i.id,
                "NamespaceName": namespace.name,
                "ServiceName": service.name,
                "HealthStatus": format!("{:?}", i.health_status).to_uppercase(),
                "Attributes": i.attributes,
            })
        })
        .collect();
    Ok(json!({ "Instances": instances }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn namespace_wire_nests_dns_properties() {
        let ns = SdNamespace {
            id: "ns-1".to_string(),
            arn: "arn:ns-1".to_string(),
            name: "internal".to_string(),
            ns_type: SdNamespaceType::DnsPrivate,
            hosted_zone_id: Some("Z123".to_string()),
            k8s_namespace: "internal".to_string(),
        };
        let wire = namespace_wire(&ns);
        assert_eq!(wire["Id"], "ns-1");
        assert_eq!(wire["Properties"]["DnsProperties"]["HostedZoneId"], "Z123");
    }

    #[test]
    fn service_wire_carries_namespace_id() {
        let svc = SdService {
            id: "srv-1".to_string(),
            arn: "arn:srv-1".to_string(),
            name: "web".to_string(),
            namespace_id: "ns-1".to_string(),
            dns_config: DnsConfig::default(),
            health_check: None,
        };
        let wire = service_wire(&svc);
        assert_eq!(wire["NamespaceId"], "ns-1");
        assert_eq!(wire["Name"], "web");
    }

    #[test]
    fn instance_wire_exposes_attributes() {
        let mut attrs = BTreeMap::new();
        attrs.insert("AWS_INSTANCE_IPV4".to_string(), "10.0.0.5".to_string());
        let instance = SdInstance {
            id: "i-1".to_string(),
            service_id: "srv-1".to_string(),
            attributes: attrs,
            health_status: kecs_types::HealthStatus::Healthy,
        };
        let wire = instance_wire(&instance);
        assert_eq!(wire["Id"], "i-1");
        assert_eq!(wire["Attributes"]["AWS_INSTANCE_IPV4"], "10.0.0.5");
    }
}

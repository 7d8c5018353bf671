//! IngressRoute synthesis, invoked by the ELBv2 emulator (spec.md §4.3/§4.4).
//! One CRD per listener; routes sorted by priority ascending (lower wins),
//! always ending in a catch-all to `default-backend` at priority 99999.

use kecs_types::KecsResult;
use kube::api::{Api, Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};
use kube::Client;
use serde_json::json;

pub const CATCHALL_PRIORITY: i64 = 99999;

#[derive(Debug, Clone)]
pub struct WeightedBackend {
    pub k8s_service_name: String,
    pub port: u16,
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct StickyConfig {
    pub cookie_name: String,
}

#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// Traefik match expression, e.g. `PathPrefix(\`/x\`) && Host(\`a.b\`)`.
    pub match_expr: String,
    pub priority: i64,
    pub backends: Vec<WeightedBackend>,
    pub sticky: Option<StickyConfig>,
}

fn service_json(b: &WeightedBackend, sticky: Option<&StickyConfig>) -> serde_json::Value {
    let mut svc = json!({
        "name": b.k8s_service_name,
        "port": b.port,
        "weight": b.weight,
    });
    if let Some(sticky) = sticky {
        svc["sticky"] = json!({
            "cookie": {
                "name": sticky.cookie_name,
                "secure": true,
                "httpOnly": true,
                "sameSite": "lax",
            }
        });
    }
    svc
}

fn route_json(route: &RouteSpec) -> serde_json::Value {
    json!({
        "kind": "Rule",
        "match": route.match_expr,
        "priority": route.priority,
        "services": route
            .backends
            .iter()
            .map(|b| service_json(b, route.sticky.as_ref()))
            .collect::<Vec<_>>(),
    })
}

fn default_backend_route() -> serde_json::Value {
    json!({
        "kind": "Rule",
        "match": "PathPrefix(`/`)",
        "priority": CATCHALL_PRIORITY,
        "services": [{"name": "default-backend", "port": 80}],
    })
}

/// Routes arrive already sorted by priority (ascending) from the caller;
/// the catch-all is always appended last.
pub fn build_ingress_route(
    name: &str,
    namespace: &str,
    entry_points: &[String],
    routes: &[RouteSpec],
) -> DynamicObject {
    let mut all_routes: Vec<serde_json::Value> = routes.iter().map(route_json).collect();
    all_routes.push(default_backend_route());

    let mut obj = DynamicObject::new(
        name,
        &ApiResource::from_gvk(&GroupVersionKind::gvk("traefik.io", "v1alpha1", "IngressRoute")),
    );
    obj.metadata.namespace = Some(namespace.to_string());
    obj.types = Some(TypeMeta {
        api_version: "traefik.io/v1alpha1".to_string(),
        kind: "IngressRoute".to_string(),
    });
    obj.data = json!({
        "entryPoints": entry_points,
        "routes": all_routes,
    });
    obj
}

pub async fn delete_ingress_route(client: &Client, namespace: &str, name: &str) -> KecsResult<()> {
    let ar = ApiResource::from_gvk(&GroupVersionKind::gvk("traefik.io", "v1alpha1", "IngressRoute"));
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &ar);
    match api.delete(name, &Default::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(kecs_types::KecsError::internal(format!(
            "delete IngressRoute {name}: {e}"
        ))),
    }
}

pub async fn apply_ingress_route(client: &Client, route: &DynamicObject) -> KecsResult<()> {
    let ar = ApiResource::from_gvk(&GroupVersionKind::gvk("traefik.io", "v1alpha1", "IngressRoute"));
    let namespace = route.metadata.namespace.as_deref().unwrap_or("default");
    let name = route
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| kecs_types::KecsError::invalid("IngressRoute missing metadata.name"))?;
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &ar);
    let patch = Patch::Apply(route);
    api.patch(name, &PatchParams::apply("kecs").force(), &patch)
        .await
        .map_err(|e| kecs_types::KecsError::internal(format!("apply IngressRoute {name}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catchall_is_always_appended_last() {
        let dynamic = build_ingress_route(
            "lb-80",
            "kecs-c1",
            &["web".to_string()],
            &[RouteSpec {
                match_expr: "PathPrefix(`/api`)".to_string(),
                priority: 100,
                backends: vec![WeightedBackend {
                    k8s_service_name: "svc".to_string(),
                    port: 80,
                    weight: 1,
                }],
                sticky: None,
            }],
        );
        let routes = dynamic.data["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes.last().unwrap()["priority"], CATCHALL_PRIORITY);
    }
}

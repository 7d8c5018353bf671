//! Installs the `ingressroutes.traefik.io` CRD on first Traefik deployment
//! (spec.md §4.3). Traefik's CRD is third-party and unowned, so unlike the
//! teacher's own `Cluster` CRD (statically typed via `kube-derive`) we only
//! need its `CustomResourceDefinition` manifest, not a generated type.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceColumnDefinition, CustomResourceDefinition, CustomResourceDefinitionNames,
    CustomResourceDefinitionSpec, CustomResourceDefinitionVersion, CustomResourceValidation,
    JSONSchemaProps,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kecs_types::{KecsError, KecsResult};
use kube::api::{Api, PostParams};
use kube::Client;

pub const INGRESS_ROUTE_CRD_NAME: &str = "ingressroutes.traefik.io";

fn ingress_route_crd() -> CustomResourceDefinition {
    let open_schema = JSONSchemaProps {
        x_kubernetes_preserve_unknown_fields: Some(true),
        type_: Some("object".to_string()),
        ..Default::default()
    };

    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(INGRESS_ROUTE_CRD_NAME.to_string()),
            ..Default::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: "traefik.io".to_string(),
            names: CustomResourceDefinitionNames {
                kind: "IngressRoute".to_string(),
                plural: "ingressroutes".to_string(),
                singular: Some("ingressroute".to_string()),
                short_names: Some(vec!["ir".to_string()]),
                ..Default::default()
            },
            scope: "Namespaced".to_string(),
            versions: vec![CustomResourceDefinitionVersion {
                name: "v1alpha1".to_string(),
                served: true,
                storage: true,
                schema: Some(CustomResourceValidation {
                    open_api_v3_schema: Some(open_schema),
                }),
                additional_printer_columns: Some(vec![CustomResourceColumnDefinition {
                    name: "Age".to_string(),
                    type_: "date".to_string(),
                    json_path: ".metadata.creationTimestamp".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn ensure_ingress_route_crd_installed(client: &Client) -> KecsResult<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    if api.get(INGRESS_ROUTE_CRD_NAME).await.is_ok() {
        return Ok(());
    }
    match api.create(&PostParams::default(), &ingress_route_crd()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
        Err(e) => Err(KecsError::internal(format!("install IngressRoute CRD: {e}"))),
    }
}

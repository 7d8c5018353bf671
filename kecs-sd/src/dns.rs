//! DNS resolution fallback chain (spec.md §4.5): internal k8s DNS first,
//! then an external (Route 53-style) resolver if configured, then the
//! standard host resolver. This module only builds the ordered candidate
//! list; callers resolve each candidate with whatever resolver is at hand
//! (`tokio::net::lookup_host` for the cluster-internal and host-resolver
//! steps).

pub fn internal_k8s_name(k8s_service_name: &str, k8s_namespace: &str) -> String {
    format!("{k8s_service_name}.{k8s_namespace}.svc.cluster.local")
}

/// Ordered resolution candidates for an SD service name. `external_name`
/// is `Some` only when an external (Route 53-style) DNS zone is actually
/// configured for the owning namespace.
pub fn resolution_chain(
    k8s_service_name: &str,
    k8s_namespace: &str,
    external_name: Option<&str>,
    sd_service_dns_name: &str,
) -> Vec<String> {
    let mut chain = vec![internal_k8s_name(k8s_service_name, k8s_namespace)];
    if let Some(external) = external_name {
        chain.push(external.to_string());
    }
    chain.push(sd_service_dns_name.to_string());
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_tries_internal_dns_first() {
        let chain = resolution_chain("sd-billing", "corp", None, "billing.corp.local");
        assert_eq!(chain[0], "sd-billing.corp.svc.cluster.local");
        assert_eq!(chain.last().unwrap(), "billing.corp.local");
    }

    #[test]
    fn external_resolver_is_tried_before_host_resolver() {
        let chain = resolution_chain(
            "sd-billing",
            "corp",
            Some("billing.corp.example.com"),
            "billing.corp.local",
        );
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[1], "billing.corp.example.com");
    }
}

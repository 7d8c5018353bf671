//! Kubernetes driver (C3): per-cluster client cache, upsert helpers, the
//! Traefik `IngressRoute` CRD, and deployment readiness polling.

pub mod client_cache;
pub mod crd;
pub mod ingressroute;
pub mod upsert;
pub mod wait;

pub use client_cache::{ClientCache, ClusterClients};
pub use ingressroute::{RouteSpec, StickyConfig, WeightedBackend};

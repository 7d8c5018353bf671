//! Service Discovery (C5): Cloud-Map-compatible namespaces/services/
//! instances backed by a headless Service + Endpoints per registration.

pub mod dns;
pub mod instance;
pub mod manager;
pub mod namespace;
pub mod service;

pub use manager::{K8sTarget, SdManager};

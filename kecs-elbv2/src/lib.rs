//! ELBv2 emulator (C4): in-memory LB/TG/listener/rule store, priority
//! manager, rule->route conversion, and target health transitions.

pub mod conflict;
pub mod health;
pub mod manager;
pub mod priority;
pub mod route;

pub use manager::{Elbv2Manager, K8sTarget};

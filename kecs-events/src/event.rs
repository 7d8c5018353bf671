//! Event kinds the bus fans out (spec.md §4.9).

use kecs_types::CreationStatus;

#[derive(Debug, Clone)]
pub enum Event {
    ClusterChanged { cluster_arn: String },
    ServiceChanged { service_arn: String },
    TaskStateChanged { task_arn: String, last_status: String },
    LocalStackEvent { message: String },
    CreationStatus { target_id: String, status: CreationStatus },
}

impl Event {
    /// The coarse kind name a subscriber filter matches against, without
    /// requiring it to destructure every variant's payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ClusterChanged { .. } => "ClusterChanged",
            Event::ServiceChanged { .. } => "ServiceChanged",
            Event::TaskStateChanged { .. } => "TaskStateChanged",
            Event::LocalStackEvent { .. } => "LocalStackEvent",
            Event::CreationStatus { .. } => "CreationStatus",
        }
    }
}

//! AWS Integration Adapters (C6): IAM/CloudWatch Logs/SSM/Secrets Manager/S3
//! glue to LocalStack, used by the ECS handler when launching a task
//! (spec.md §4.6). All adapters share one `AwsClients` bundle pointed at
//! the LocalStack endpoint discovered at startup.

pub mod client;
pub mod iam;
pub mod logs;
pub mod s3;
pub mod secrets;

pub use client::AwsClients;
pub use secrets::SecretCache;

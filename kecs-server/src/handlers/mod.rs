pub mod ecs;
pub mod elbv2;
pub mod logs;
pub mod sd;
pub mod wire;

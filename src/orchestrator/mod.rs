//! Instance orchestration: registry, port allocation, process supervision,
//! and the manager facade that ties them together.

pub mod manager;
pub mod ports;
pub mod registry;
pub mod supervisor;

pub use manager::PlayerManager;
pub use registry::{InstanceRecord, InstanceRegistry, InstanceStatus};
pub use supervisor::{PlayerCommand, ProcessSupervisor, Supervise};

// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent revision/image/container ID confusion.

mod id;
mod service_name;

pub use id::{ContainerId, ImageId, Revision, SnapshotId};
pub use service_name::{ServiceName, ServiceNameError};

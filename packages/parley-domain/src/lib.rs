pub mod batching;
pub mod content;
pub mod entry;
pub mod text;
pub mod thread;
pub mod usage;

pub use batching::{WorkspaceBatch, group_by_workspace, wire_batches};
pub use entry::{MessageType, QueueEntry, RoutingAttributes};
pub use thread::{MessageDetail, ThreadContext};

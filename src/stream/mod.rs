//! Stream plumbing between pipeline stages

mod queue;

pub use queue::{BackpressurePolicy, QueueClosed, QueueReceiver, QueueSender, frame_queue};

//! Frame pipelining: slot ring, deferred deletion and the frame state machine

pub mod deletion_queue;
pub mod lifecycle;
pub mod ring;

pub use deletion_queue::DeletionQueue;
pub use lifecycle::{FrameEvent, FrameLifecycle, FrameState};
pub use ring::FrameRing;

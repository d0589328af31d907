//! Geometry and uniform memory suballocation

pub mod pool;
pub mod region;

pub use pool::MemoryPool;
pub use region::{align_down, align_up, MemoryRegion};

//! Foundation module - math and logging utilities shared by the renderer

pub mod logging;
pub mod math;

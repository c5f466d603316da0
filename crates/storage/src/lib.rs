//! Recorder implementations for Vantage

mod memory;

pub use memory::{MemoryRecorder, STALE_AFTER_MINUTES};

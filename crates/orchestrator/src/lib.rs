//! Orchestrator - probe planning, per-asset scan pipeline and worker pool

mod dispatcher;
mod orchestrator;
mod pool;
mod progress;

pub use dispatcher::{ProbeDispatcher, COMMON_PORTS};
pub use orchestrator::ScanOrchestrator;
pub use pool::{ScanHandle, ScanPool};
pub use progress::{ProgressSnapshot, ProgressTracker};

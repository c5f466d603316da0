//! Progress tracking

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub submitted: usize,
    pub completed: usize,
    /// Completed scans that contain at least one FAILED detection.
    pub failed: usize,
}

impl ProgressSnapshot {
    pub fn in_flight(&self) -> usize {
        self.submitted.saturating_sub(self.completed)
    }
}

pub struct ProgressTracker {
    submitted: Mutex<usize>,
    completed: Mutex<usize>,
    failed: Mutex<usize>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(0),
            completed: Mutex::new(0),
            failed: Mutex::new(0),
        }
    }

    pub async fn increment_submitted(&self) {
        *self.submitted.lock().await += 1;
    }

    pub async fn record_finished(&self, had_failures: bool) {
        *self.completed.lock().await += 1;
        if had_failures {
            *self.failed.lock().await += 1;
        }
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            submitted: *self.submitted.lock().await,
            completed: *self.completed.lock().await,
            failed: *self.failed.lock().await,
        }
    }

    pub async fn print_summary(&self) {
        let s = self.snapshot().await;

        info!("Scan Summary:");
        info!("  Assets submitted: {}", s.submitted);
        info!("  Completed: {}", s.completed);
        info!("  With failed probes: {}", s.failed);
        if s.completed > 0 {
            let clean = s.completed - s.failed;
            info!("  Clean rate: {:.1}%", (clean as f64 / s.completed as f64) * 100.0);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

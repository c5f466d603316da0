//! Running detection statistics

use crate::types::{Detection, DetectionStatus, Outcome};
use serde::{Deserialize, Serialize};

/// Aggregate view over a set of detections.
///
/// `average_response_ms` only counts COMPLETED detections, so timeouts do
/// not drag the mean toward the probe timeout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub average_response_ms: f64,
    #[serde(skip)]
    completed: usize,
}

impl DetectionStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_detections<'a, I>(detections: I) -> Self
    where
        I: IntoIterator<Item = &'a Detection>,
    {
        let mut stats = Self::new();
        for d in detections {
            stats.update(d);
        }
        stats
    }

    /// Fold in one terminal detection. Non-terminal records are ignored.
    pub fn update(&mut self, detection: &Detection) {
        match detection.status {
            DetectionStatus::Pending | DetectionStatus::Running => return,
            DetectionStatus::Timeout => self.timed_out = self.timed_out.saturating_add(1),
            DetectionStatus::Failed => self.failed = self.failed.saturating_add(1),
            DetectionStatus::Completed => {
                match detection.outcome {
                    Some(Outcome::Online) => self.online = self.online.saturating_add(1),
                    Some(Outcome::Offline) => self.offline = self.offline.saturating_add(1),
                    None => {}
                }
                if let Some(rtt) = detection.response_time_ms {
                    // new_avg = old_avg + (x - old_avg) / n
                    self.completed += 1;
                    let n = self.completed as f64;
                    self.average_response_ms += (rtt as f64 - self.average_response_ms) / n;
                }
            }
        }
        self.total = self.total.saturating_add(1);
    }

    /// Share of terminal detections that came back ONLINE, in [0.0, 100.0].
    #[must_use]
    pub fn online_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.online as f64 / self.total as f64) * 100.0
        }
    }
}

//! In-memory recorder

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, info};

use vantage_common::{Detection, DetectionStats, DetectionStatus, Fingerprint, FingerprintType, Recorder};

/// RUNNING detections older than this many minutes are presumed abandoned.
pub const STALE_AFTER_MINUTES: i64 = 10;

#[derive(Default)]
struct Tables {
    next_id: u64,
    detections: BTreeMap<u64, Detection>,
    fingerprints: Vec<Fingerprint>,
}

/// Process-local store. Ids start at 1 and increase by one per detection.
#[derive(Default)]
pub struct MemoryRecorder {
    tables: Mutex<Tables>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored detections in id order.
    pub fn detections(&self) -> Vec<Detection> {
        self.tables.lock().detections.values().cloned().collect()
    }

    pub fn detection(&self, id: u64) -> Option<Detection> {
        self.tables.lock().detections.get(&id).cloned()
    }

    pub fn detections_for(&self, asset_id: u64) -> Vec<Detection> {
        self.tables
            .lock()
            .detections
            .values()
            .filter(|d| d.asset_id == asset_id)
            .cloned()
            .collect()
    }

    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        self.tables.lock().fingerprints.clone()
    }

    pub fn stats(&self) -> DetectionStats {
        DetectionStats::from_detections(self.tables.lock().detections.values())
    }

    /// Time out RUNNING detections started more than `max_age` ago.
    /// Returns how many were swept.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut tables = self.tables.lock();
        let mut swept = 0;
        for detection in tables.detections.values_mut() {
            let stale = detection.status == DetectionStatus::Running
                && detection.started_at.map_or(false, |t| t < cutoff);
            if stale && detection.time_out("detection abandoned while running") {
                swept += 1;
            }
        }
        if swept > 0 {
            info!(swept, "timed out stale detections");
        }
        swept
    }
}

#[async_trait]
impl Recorder for MemoryRecorder {
    async fn create_detection(&self, detection: &Detection) -> Result<u64> {
        let mut tables = self.tables.lock();
        tables.next_id += 1;
        let id = tables.next_id;
        let mut stored = detection.clone();
        stored.id = Some(id);
        tables.detections.insert(id, stored);
        debug!(id, kind = %detection.kind, "detection created");
        Ok(id)
    }

    async fn update_detection(&self, detection: &Detection) -> Result<()> {
        let id = detection.id.ok_or_else(|| anyhow!("detection has no id"))?;
        let mut tables = self.tables.lock();
        match tables.detections.get_mut(&id) {
            Some(slot) => {
                *slot = detection.clone();
                Ok(())
            }
            None => bail!("unknown detection {id}"),
        }
    }

    async fn fingerprint_exists(&self, asset_id: u64, kind: FingerprintType, name: &str) -> Result<bool> {
        let tables = self.tables.lock();
        Ok(tables.fingerprints.iter().any(|f| f.key() == (asset_id, kind, name)))
    }

    async fn save_fingerprint(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.tables.lock().fingerprints.push(fingerprint.clone());
        Ok(())
    }
}

//! Collaborator traits
//!
//! The prober never owns persistence. Whatever stores detections and
//! fingerprints plugs in through [`Recorder`].

use crate::types::{Detection, Fingerprint, FingerprintType};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence backend for detections and fingerprints.
///
/// Calls are assumed durable once they return.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Insert a new detection, returning its id.
    async fn create_detection(&self, detection: &Detection) -> Result<u64>;

    /// Overwrite the stored detection with the same id.
    async fn update_detection(&self, detection: &Detection) -> Result<()>;

    /// Whether a fingerprint with this logical key is already stored.
    async fn fingerprint_exists(&self, asset_id: u64, kind: FingerprintType, name: &str) -> Result<bool>;

    async fn save_fingerprint(&self, fingerprint: &Fingerprint) -> Result<()>;

    /// Store fingerprints that are not yet known, returning how many were new.
    ///
    /// Duplicates within `fingerprints` itself are also skipped, since each
    /// save is visible to the next existence check.
    async fn save_new_fingerprints(&self, fingerprints: &[Fingerprint]) -> Result<usize> {
        let mut saved = 0;
        for fp in fingerprints {
            if !self.fingerprint_exists(fp.asset_id, fp.kind, &fp.name).await? {
                self.save_fingerprint(fp).await?;
                saved += 1;
            }
        }
        Ok(saved)
    }
}

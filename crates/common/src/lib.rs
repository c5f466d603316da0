//! Vantage Common - Shared types and traits
//!
//! Data model, error taxonomy and collaborator traits used across the
//! Vantage asset prober.

pub mod config;
pub mod error;
pub mod stats;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{ProbeConfig, ERROR_PAGE_PATHS, USER_AGENT};
pub use error::{ProbeError, ProbeResult};
pub use stats::DetectionStats;
pub use traits::Recorder;
pub use types::{
    Asset, AssetCategory, AssetStatus, Detection, DetectionStatus, Fingerprint, FingerprintType,
    HttpResponse, IdentificationMethod, Outcome, ProbeKind, ProbeSpec, ScanOutcome, Scheme,
    EVIDENCE_LIMIT,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

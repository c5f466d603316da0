//! Fingerprint Engine - software identification from captured evidence
//!
//! This crate provides:
//! - An ordered, immutable rule registry built once per process
//! - A stateless matcher for header, page-content and error-page evidence
//! - Port-number heuristics for database services

mod matcher;
pub mod ports;
pub mod rules;

pub use matcher::{page_title, Evidence, FingerprintMatcher, Origin, PORT_SERVICE_CONFIDENCE};
pub use ports::{database_product, database_vendor, DATABASE_PORTS};
pub use rules::{Rule, RuleRegistry, RuleTarget};

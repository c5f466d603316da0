//! TLS client construction and peer certificate summaries

use std::fmt::Write as _;
use tracing::warn;
use x509_parser::prelude::*;

use vantage_common::{ProbeConfig, ProbeError, ProbeResult};

/// Builds the HTTPS client and describes the certificates it sees.
pub trait SecureClientFactory: Send + Sync {
    fn build_client(&self, config: &ProbeConfig) -> ProbeResult<reqwest::Client>;

    /// Human-readable summary of a DER-encoded peer certificate.
    fn certificate_summary(&self, der: &[u8]) -> String;
}

/// rustls-backed factory. Verification is on unless explicitly disabled.
#[derive(Debug, Clone)]
pub struct RustlsClientFactory {
    verify_certificates: bool,
}

impl RustlsClientFactory {
    pub fn new() -> Self {
        Self {
            verify_certificates: true,
        }
    }

    /// Accept any certificate and hostname. Lab networks only.
    #[must_use]
    pub fn insecure() -> Self {
        Self {
            verify_certificates: false,
        }
    }

    pub fn verifies_certificates(&self) -> bool {
        self.verify_certificates
    }
}

impl Default for RustlsClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureClientFactory for RustlsClientFactory {
    fn build_client(&self, config: &ProbeConfig) -> ProbeResult<reqwest::Client> {
        if !self.verify_certificates {
            warn!("certificate verification disabled");
        }
        reqwest::Client::builder()
            .use_rustls_tls()
            .tls_info(true)
            .danger_accept_invalid_certs(!self.verify_certificates)
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProbeError::Unexpected(format!("failed to build TLS client: {e}")))
    }

    fn certificate_summary(&self, der: &[u8]) -> String {
        summarize_certificate(der).unwrap_or_else(|| "unparseable certificate".to_string())
    }
}

/// Subject, issuer, validity window and DNS names of a certificate.
pub fn summarize_certificate(der: &[u8]) -> Option<String> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;
    let validity = cert.validity();

    let mut summary = format!(
        "subject: {}; issuer: {}; valid: {} to {}",
        cert.subject(),
        cert.issuer(),
        validity.not_before,
        validity.not_after
    );

    let mut names = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for name in &san.general_names {
                if let GeneralName::DNSName(dns) = name {
                    names.push(dns.to_string());
                }
            }
        }
    }
    if !names.is_empty() {
        names.sort();
        names.dedup();
        let _ = write!(summary, "; dns: {}", names.join(", "));
    }
    Some(summary)
}

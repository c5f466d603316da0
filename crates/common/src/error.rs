//! Error types for Vantage probes
//!
//! Every variant maps onto exactly one terminal detection state; see
//! [`ProbeError::is_offline`].

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// Target name could not be turned into an address.
    #[error("cannot resolve host: {0}")]
    Resolution(String),

    /// Connection actively refused. A legitimate OFFLINE outcome, not a failure.
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// TLS handshake or protocol-level failure.
    #[error("TLS handshake failed: {0}")]
    Protocol(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProbeError {
    /// Classify a socket error the way every probe does: refusal and
    /// timeouts get their own variants, everything else stays I/O.
    pub fn from_connect(err: io::Error, timeout_ms: u64) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ProbeError::Refused(err.to_string()),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProbeError::Timeout(timeout_ms),
            _ => ProbeError::Io(err),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, ProbeError::Refused(_))
    }

    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }
}

/// Result type alias for probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

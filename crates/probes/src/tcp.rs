//! TCP connect probes: plain port reachability and database listeners

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use vantage_common::{Detection, HttpResponse, Outcome, ProbeError, ProbeResult};
use vantage_fingerprint::database_vendor;
use vantage_target_resolver::TargetResolver;

use crate::executor::ProbeExecutor;

/// Connect with a hard deadline, classifying the failure.
#[instrument(level = "debug")]
pub async fn connect(addr: SocketAddr, limit: Duration) -> ProbeResult<TcpStream> {
    let limit_ms = limit.as_millis() as u64;
    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ProbeError::from_connect(e, limit_ms)),
        Err(_) => Err(ProbeError::Timeout(limit_ms)),
    }
}

/// Resolve `host` and connect to `port`. Both steps share one `limit`.
pub async fn open(host: &str, port: u16, limit: Duration) -> ProbeResult<TcpStream> {
    let limit_ms = limit.as_millis() as u64;
    let start = Instant::now();
    let addr = TargetResolver::resolve_socket(host, port, limit).await?;

    let remaining = limit.saturating_sub(start.elapsed());
    if remaining.is_zero() {
        return Err(ProbeError::Timeout(limit_ms));
    }
    connect(addr, remaining).await.map_err(|e| match e {
        ProbeError::Timeout(_) => ProbeError::Timeout(limit_ms),
        other => other,
    })
}

fn port_of(detection: &mut Detection) -> Option<u16> {
    if detection.port.is_none() {
        detection.fail(format!("{} probe needs a port", detection.kind));
    }
    detection.port
}

/// TCP_PORT: open means ONLINE, refusal means OFFLINE.
pub struct TcpPortProbe {
    timeout: Duration,
}

impl TcpPortProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeExecutor for TcpPortProbe {
    async fn execute(&self, detection: &mut Detection) -> Option<HttpResponse> {
        let port = port_of(detection)?;
        let start = Instant::now();
        let result = open(&detection.target, port, self.timeout).await;
        detection.set_response_time(start.elapsed());

        match result {
            Ok(_stream) => {
                detection.complete(Outcome::Online, format!("port {port} open"));
            }
            Err(e) if e.is_timeout() => {
                detection.time_out(format!("port {port}: {e}"));
            }
            Err(e) if e.is_offline() => {
                debug!(port, "refused");
                detection.complete(Outcome::Offline, format!("port {port} closed or filtered"));
            }
            Err(e) => {
                detection.fail(e.to_string());
            }
        }
        None
    }

    fn name(&self) -> &str {
        "TCP Port Probe"
    }
}

/// DATABASE_SERVICE: a listener on a known database port. No handshake.
pub struct DatabaseProbe {
    timeout: Duration,
}

impl DatabaseProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeExecutor for DatabaseProbe {
    async fn execute(&self, detection: &mut Detection) -> Option<HttpResponse> {
        let port = port_of(detection)?;
        let start = Instant::now();
        let result = open(&detection.target, port, self.timeout).await;
        detection.set_response_time(start.elapsed());

        match result {
            Ok(_stream) => {
                let vendor = database_vendor(port);
                detection.complete(Outcome::Online, format!("{vendor} listening on port {port}"));
            }
            Err(e) => {
                detection.fail(format!("database port {port}: {e}"));
            }
        }
        None
    }

    fn name(&self) -> &str {
        "Database Probe"
    }
}

//! Host reachability (PING)

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use vantage_common::{Detection, HttpResponse, Outcome, ProbeError};
use vantage_target_resolver::TargetResolver;

use crate::executor::ProbeExecutor;
use crate::tcp::connect;

/// Echo service port used for the unprivileged reachability check.
pub const ECHO_PORT: u16 = 7;

/// Answers "is this address up" within a deadline.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self, ip: IpAddr, limit: Duration) -> bool;
}

/// Connects to the echo port. An accepted or actively refused connection
/// both prove a live host; silence does not.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpEchoReachability;

#[async_trait]
impl Reachability for TcpEchoReachability {
    #[instrument(skip(self))]
    async fn is_reachable(&self, ip: IpAddr, limit: Duration) -> bool {
        match connect(SocketAddr::new(ip, ECHO_PORT), limit).await {
            Ok(_) => true,
            Err(ProbeError::Refused(_)) => true,
            Err(e) => {
                debug!("echo check failed: {}", e);
                false
            }
        }
    }
}

pub struct PingProbe {
    reachability: Arc<dyn Reachability>,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(reachability: Arc<dyn Reachability>, timeout: Duration) -> Self {
        Self { reachability, timeout }
    }
}

#[async_trait]
impl ProbeExecutor for PingProbe {
    async fn execute(&self, detection: &mut Detection) -> Option<HttpResponse> {
        let start = Instant::now();
        let ip = match TargetResolver::resolve(&detection.target, self.timeout).await {
            Ok(ip) => ip,
            Err(e) => {
                detection.set_response_time(start.elapsed());
                detection.fail(e.to_string());
                return None;
            }
        };

        // Resolution and the reachability check share one budget.
        let remaining = self.timeout.saturating_sub(start.elapsed());
        let up = !remaining.is_zero() && self.reachability.is_reachable(ip, remaining).await;
        detection.set_response_time(start.elapsed());
        if up {
            detection.complete(Outcome::Online, format!("{ip} is reachable"));
        } else {
            detection.complete(Outcome::Offline, format!("{ip} did not answer"));
        }
        None
    }

    fn name(&self) -> &str {
        "Ping Probe"
    }
}

//! SSH banner grabbing

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use vantage_common::{Detection, HttpResponse, Outcome, ProbeConfig};

use crate::executor::ProbeExecutor;
use crate::tcp::open;

/// Outcome of a single passive read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BannerRead {
    Banner(String),
    /// Timed out or closed without sending anything.
    Silent,
}

pub struct BannerGrabber {
    timeout: Duration,
    max_bytes: usize,
}

impl BannerGrabber {
    pub fn new(timeout: Duration, max_bytes: usize) -> Self {
        Self { timeout, max_bytes }
    }

    /// Passive read: servers like SSH speak first, so nothing is sent.
    #[instrument(skip(self, stream))]
    pub async fn grab(&self, stream: &mut TcpStream) -> std::io::Result<BannerRead> {
        let mut buf = vec![0u8; self.max_bytes];
        match timeout(self.timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                debug!("banner: {} bytes", n);
                let banner = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                Ok(BannerRead::Banner(banner))
            }
            Ok(Ok(_)) => Ok(BannerRead::Silent),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!("banner timeout");
                Ok(BannerRead::Silent)
            }
        }
    }
}

/// SSH_SERVICE: connect, then read whatever the server announces.
pub struct SshBannerProbe {
    connect_timeout: Duration,
    grabber: BannerGrabber,
}

impl SshBannerProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            grabber: BannerGrabber::new(config.banner_timeout, config.banner_limit),
        }
    }
}

#[async_trait]
impl ProbeExecutor for SshBannerProbe {
    async fn execute(&self, detection: &mut Detection) -> Option<HttpResponse> {
        let port = detection.port.unwrap_or(22);
        let start = Instant::now();
        let mut stream = match open(&detection.target, port, self.connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                detection.set_response_time(start.elapsed());
                detection.fail(format!("ssh connect failed: {e}"));
                return None;
            }
        };
        detection.set_response_time(start.elapsed());

        match self.grabber.grab(&mut stream).await {
            Ok(BannerRead::Banner(banner)) => {
                let detail = format!("ssh service on port {port}, banner: {banner}");
                detection.complete(Outcome::Online, detail);
                detection.banner = Some(banner);
            }
            Ok(BannerRead::Silent) => {
                detection.complete(Outcome::Online, "no banner");
            }
            Err(e) => {
                detection.fail(format!("banner read failed: {e}"));
            }
        }
        None
    }

    fn name(&self) -> &str {
        "SSH Banner Probe"
    }
}

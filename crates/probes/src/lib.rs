//! Vantage probes
//!
//! One executor per probe kind. Each executor turns a started
//! [`Detection`](vantage_common::Detection) into exactly one terminal
//! state; [`ProbeRunner`] handles recording around them.

pub mod banner;
pub mod executor;
pub mod http;
pub mod ping;
pub mod tcp;
pub mod tls;

pub use banner::{BannerGrabber, BannerRead, SshBannerProbe};
pub use executor::{ProbeExecutor, ProbeReport, ProbeRunner};
pub use http::{classify, fetch_error_pages, HttpFetcher, HttpProbe, ReqwestFetcher};
pub use ping::{PingProbe, Reachability, TcpEchoReachability, ECHO_PORT};
pub use tcp::{DatabaseProbe, TcpPortProbe};
pub use tls::{summarize_certificate, RustlsClientFactory, SecureClientFactory};

use std::sync::Arc;
use vantage_common::{ProbeConfig, ProbeKind, Recorder, Scheme};

/// Runner with every probe kind registered.
pub fn standard_runner(
    recorder: Arc<dyn Recorder>,
    config: &ProbeConfig,
    fetcher: Arc<dyn HttpFetcher>,
    reachability: Arc<dyn Reachability>,
) -> ProbeRunner {
    ProbeRunner::new(recorder)
        .with(ProbeKind::Ping, Arc::new(PingProbe::new(reachability, config.ping_timeout)))
        .with(ProbeKind::TcpPort, Arc::new(TcpPortProbe::new(config.connect_timeout)))
        .with(ProbeKind::HttpService, Arc::new(HttpProbe::new(fetcher.clone(), Scheme::Http)))
        .with(ProbeKind::HttpsService, Arc::new(HttpProbe::new(fetcher, Scheme::Https)))
        .with(ProbeKind::DatabaseService, Arc::new(DatabaseProbe::new(config.connect_timeout)))
        .with(ProbeKind::SshService, Arc::new(SshBannerProbe::new(config)))
}

//! HTTP and HTTPS service probing

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;
use tracing::{debug, instrument, warn};

use vantage_common::{Detection, HttpResponse, Outcome, ProbeConfig, ProbeError, ProbeResult, Scheme};
use vantage_target_resolver::url_host;

use crate::executor::ProbeExecutor;
use crate::tls::SecureClientFactory;

/// Issues one GET and captures status, headers, a bounded body and, over
/// TLS, the peer certificate summary.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, scheme: Scheme, target: &str, port: u16, path: &str) -> ProbeResult<HttpResponse>;
}

pub struct ReqwestFetcher {
    plain: reqwest::Client,
    secure: reqwest::Client,
    factory: Arc<dyn SecureClientFactory>,
    line_limit: usize,
    byte_limit: usize,
    read_timeout: Duration,
    deadline: Duration,
}

impl ReqwestFetcher {
    pub fn new(config: &ProbeConfig, factory: Arc<dyn SecureClientFactory>) -> ProbeResult<Self> {
        let plain = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProbeError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        let secure = factory.build_client(config)?;

        Ok(Self {
            plain,
            secure,
            factory,
            line_limit: config.body_line_limit,
            byte_limit: config.body_byte_limit,
            read_timeout: config.read_timeout,
            deadline: config.request_deadline(),
        })
    }

    fn client(&self, scheme: Scheme) -> &reqwest::Client {
        match scheme {
            Scheme::Http => &self.plain,
            Scheme::Https => &self.secure,
        }
    }

    fn limit_ms(&self) -> u64 {
        self.read_timeout.as_millis() as u64
    }

    /// Body up to `line_limit` lines or `byte_limit` bytes, whichever comes
    /// first. A read error or the request deadline keeps what arrived.
    async fn read_body(&self, resp: &mut reqwest::Response, deadline: tokio::time::Instant) -> String {
        let mut buf: Vec<u8> = Vec::new();
        let mut lines = 0;
        loop {
            match timeout_at(deadline, resp.chunk()).await {
                Ok(Ok(Some(chunk))) => {
                    lines += chunk.iter().filter(|b| **b == b'\n').count();
                    buf.extend_from_slice(&chunk);
                    if buf.len() >= self.byte_limit {
                        buf.truncate(self.byte_limit);
                        break;
                    }
                    if lines >= self.line_limit {
                        break;
                    }
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    debug!("body read stopped: {}", e);
                    break;
                }
                Err(_) => {
                    debug!(bytes = buf.len(), "request deadline reached during body");
                    break;
                }
            }
        }

        let text = String::from_utf8_lossy(&buf);
        let mut body = String::new();
        for line in text.lines().take(self.line_limit) {
            body.push_str(line);
            body.push('\n');
        }
        body
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, scheme: Scheme, target: &str, port: u16, path: &str) -> ProbeResult<HttpResponse> {
        let url = format!("{}://{}:{}{}", scheme.as_str(), url_host(target), port, path);
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.deadline;

        let mut resp = match timeout_at(deadline, self.client(scheme).get(&url).send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(classify(e, scheme, self.limit_ms())),
            Err(_) => return Err(ProbeError::Timeout(self.deadline.as_millis() as u64)),
        };

        let mut response = HttpResponse::new(resp.status().as_u16());
        for name in resp.headers().keys() {
            for value in resp.headers().get_all(name) {
                response.push_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
            }
        }

        if scheme == Scheme::Https {
            response.certificate = resp
                .extensions()
                .get::<reqwest::tls::TlsInfo>()
                .and_then(|info| info.peer_certificate())
                .map(|der| self.factory.certificate_summary(der));
        }

        response.body = self.read_body(&mut resp, deadline).await;
        response.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(response)
    }
}

/// Map a transport error onto the probe taxonomy.
///
/// Over HTTPS, a connect-phase failure that is neither a refusal nor a
/// timeout happened in the TLS handshake.
pub fn classify(err: reqwest::Error, scheme: Scheme, limit_ms: u64) -> ProbeError {
    if err.is_timeout() {
        return ProbeError::Timeout(limit_ms);
    }

    let mut root = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return ProbeError::Refused(io_err.to_string()),
                io::ErrorKind::TimedOut => return ProbeError::Timeout(limit_ms),
                io::ErrorKind::InvalidData => return ProbeError::Protocol(io_err.to_string()),
                _ => {}
            }
        }
        root = cause.to_string();
        source = cause.source();
    }

    let lowered = format!("{err:?}").to_lowercase();
    if lowered.contains("dns error") || lowered.contains("failed to lookup address") {
        let host = err.url().and_then(|u| u.host_str()).unwrap_or_default();
        ProbeError::Resolution(host.to_string())
    } else if lowered.contains("refused") {
        ProbeError::Refused(root)
    } else if ["certificate", "handshake", "tls", "corrupt message"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        ProbeError::Protocol(root)
    } else if scheme == Scheme::Https && err.is_connect() {
        ProbeError::Protocol(root)
    } else {
        ProbeError::Unexpected(root)
    }
}

/// HTTP_SERVICE / HTTPS_SERVICE. Any status code means the service is up.
pub struct HttpProbe {
    fetcher: Arc<dyn HttpFetcher>,
    scheme: Scheme,
}

impl HttpProbe {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, scheme: Scheme) -> Self {
        Self { fetcher, scheme }
    }

    fn default_port(&self) -> u16 {
        match self.scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

#[async_trait]
impl ProbeExecutor for HttpProbe {
    async fn execute(&self, detection: &mut Detection) -> Option<HttpResponse> {
        let port = detection.port.unwrap_or_else(|| self.default_port());
        let label = self.scheme.label();
        let start = Instant::now();
        let result = self.fetcher.fetch(self.scheme, &detection.target, port, "/").await;
        detection.set_response_time(start.elapsed());

        match result {
            Ok(response) => {
                let mut detail = if (200..400).contains(&response.status) {
                    format!("{label} service responding with status {}", response.status)
                } else {
                    format!("{label} service reachable, status {}", response.status)
                };
                if let Some(cert) = &response.certificate {
                    detail.push_str("; certificate ");
                    detail.push_str(cert);
                }
                detection.http_status = Some(response.status);
                detection.banner = Some(response.header_block());
                detection.complete(Outcome::Online, detail);
                Some(response)
            }
            Err(ProbeError::Timeout(ms)) => {
                detection.time_out(format!("{label} request timed out after {ms}ms"));
                None
            }
            Err(ProbeError::Refused(_)) => {
                detection.complete(Outcome::Offline, format!("{label} connection refused on port {port}"));
                None
            }
            Err(e) => {
                if matches!(e, ProbeError::Protocol(_)) {
                    warn!(port, "{}", e);
                }
                detection.fail(e.to_string());
                None
            }
        }
    }

    fn name(&self) -> &str {
        match self.scheme {
            Scheme::Http => "HTTP Probe",
            Scheme::Https => "HTTPS Probe",
        }
    }
}

/// Request each path and keep the pages that came back. Failed requests
/// are skipped.
pub async fn fetch_error_pages(
    fetcher: &dyn HttpFetcher,
    scheme: Scheme,
    target: &str,
    port: u16,
    paths: &[String],
) -> Vec<(String, HttpResponse)> {
    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        match fetcher.fetch(scheme, target, port, path).await {
            Ok(page) => pages.push((path.clone(), page)),
            Err(e) => debug!(path = %path, "error page fetch failed: {}", e),
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::RustlsClientFactory;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::sleep;
    use vantage_common::{DetectionStatus, ProbeKind};

    /// One-shot HTTP server answering every connection with `reply`.
    async fn serve(reply: String) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let reply = reply.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = sock.read(&mut buf).await;
                    let _ = sock.write_all(reply.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        port
    }

    fn fetcher() -> ReqwestFetcher {
        ReqwestFetcher::new(&ProbeConfig::fast(), Arc::new(RustlsClientFactory::new())).unwrap()
    }

    fn http(port: u16) -> Detection {
        let mut d = Detection::new(1, ProbeKind::HttpService, "127.0.0.1", Some(port));
        d.mark_started();
        d
    }

    struct Failing(fn() -> ProbeError);

    struct Answer(HttpResponse);

    #[async_trait]
    impl HttpFetcher for Answer {
        async fn fetch(&self, _: Scheme, _: &str, _: u16, _: &str) -> ProbeResult<HttpResponse> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl HttpFetcher for Failing {
        async fn fetch(&self, _: Scheme, _: &str, _: u16, _: &str) -> ProbeResult<HttpResponse> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn not_found_is_still_online() {
        let port = serve(
            "HTTP/1.1 404 Not Found\r\nServer: nginx/1.18.0\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found"
                .to_string(),
        )
        .await;

        let mut d = http(port);
        let response = HttpProbe::new(Arc::new(fetcher()), Scheme::Http)
            .execute(&mut d)
            .await
            .unwrap();

        assert!(d.is_online());
        assert_eq!(d.http_status, Some(404));
        assert!(d.banner.unwrap().contains("nginx/1.18.0"));
        assert_eq!(response.header("Server"), Some("nginx/1.18.0"));
        assert_eq!(response.body, "not found\n");
    }

    #[tokio::test]
    async fn body_is_capped_by_lines() {
        let body: String = (0..150).map(|i| format!("line {i}\n")).collect();
        let port = serve(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let page = fetcher().fetch(Scheme::Http, "127.0.0.1", port, "/").await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body.lines().count(), 100);
        assert!(page.body.starts_with("line 0\n"));
    }

    #[tokio::test]
    async fn body_is_capped_by_bytes() {
        let body = "x".repeat(200 * 1024);
        let port = serve(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let page = fetcher().fetch(Scheme::Http, "127.0.0.1", port, "/").await.unwrap();
        assert_eq!(page.body.len(), ProbeConfig::fast().body_byte_limit + 1);
    }

    #[tokio::test]
    async fn trickling_body_stops_at_the_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4000\r\nConnection: close\r\n\r\n")
                .await;
            for _ in 0..40 {
                if sock.write_all(b".").await.is_err() {
                    break;
                }
                sleep(Duration::from_millis(200)).await;
            }
        });

        let started = Instant::now();
        let page = fetcher().fetch(Scheme::Http, "127.0.0.1", port, "/").await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(1500));
        assert_eq!(page.status, 200);
        assert!(!page.body.is_empty());
        assert!(page.body.trim_end().len() < 4000);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            sleep(Duration::from_secs(3)).await;
        });

        let started = Instant::now();
        let err = fetcher().fetch(Scheme::Http, "127.0.0.1", port, "/").await.unwrap_err();

        assert!(err.is_timeout(), "{err:?}");
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn tls_against_plain_listener_is_a_protocol_error() {
        let port = serve("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()).await;

        let err = fetcher().fetch(Scheme::Https, "127.0.0.1", port, "/").await.unwrap_err();
        assert!(matches!(err, ProbeError::Protocol(_)), "{err:?}");

        let mut d = Detection::new(1, ProbeKind::HttpsService, "127.0.0.1", Some(port));
        d.mark_started();
        HttpProbe::new(Arc::new(fetcher()), Scheme::Https).execute(&mut d).await;
        assert_eq!(d.status, DetectionStatus::Failed);
        assert!(d.error.unwrap().starts_with("TLS handshake failed"));
    }

    #[tokio::test]
    async fn refused_https_is_refused_not_tls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = fetcher().fetch(Scheme::Https, "127.0.0.1", port, "/").await.unwrap_err();
        assert!(err.is_offline(), "{err:?}");
    }

    #[tokio::test]
    async fn certificate_summary_lands_in_detail() {
        let cert = "subject: CN=portal.example; issuer: CN=Example CA";
        let fetcher = Arc::new(Answer(HttpResponse {
            certificate: Some(cert.to_string()),
            ..HttpResponse::new(200)
        }));

        let mut d = Detection::new(1, ProbeKind::HttpsService, "127.0.0.1", Some(443));
        d.mark_started();
        HttpProbe::new(fetcher, Scheme::Https).execute(&mut d).await;

        assert!(d.is_online());
        assert_eq!(
            d.detail.as_deref(),
            Some("HTTPS service responding with status 200; certificate subject: CN=portal.example; issuer: CN=Example CA")
        );
    }

    #[tokio::test]
    async fn refused_connection_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut d = http(port);
        HttpProbe::new(Arc::new(fetcher()), Scheme::Http).execute(&mut d).await;
        assert!(d.is_offline());
    }

    #[tokio::test]
    async fn timeout_and_tls_failures_are_distinct() {
        let mut timed = http(80);
        HttpProbe::new(Arc::new(Failing(|| ProbeError::Timeout(5000))), Scheme::Http)
            .execute(&mut timed)
            .await;
        assert_eq!(timed.status, DetectionStatus::Timeout);

        let mut tls = http(443);
        HttpProbe::new(Arc::new(Failing(|| ProbeError::Protocol("bad cert".into()))), Scheme::Https)
            .execute(&mut tls)
            .await;
        assert_eq!(tls.status, DetectionStatus::Failed);
        assert_eq!(tls.error.as_deref(), Some("TLS handshake failed: bad cert"));
    }

    #[tokio::test]
    async fn error_pages_skip_failures() {
        let pages = fetch_error_pages(
            &Failing(|| ProbeError::Unexpected("boom".into())),
            Scheme::Http,
            "127.0.0.1",
            80,
            &["/404".to_string(), "/error".to_string()],
        )
        .await;
        assert!(pages.is_empty());

        let port = serve("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()).await;
        let pages = fetch_error_pages(
            &fetcher(),
            Scheme::Http,
            "127.0.0.1",
            port,
            &["/nonexistent".to_string(), "/404".to_string()],
        )
        .await;
        let paths: Vec<&str> = pages.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["/nonexistent", "/404"]);
    }
}

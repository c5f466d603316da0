//! Core data types for the Vantage prober
//!
//! Public fields throughout, same as the rest of the workspace: executors
//! and the matcher read and fill these directly. Lifecycle changes on
//! [`Detection`] still go through its methods so a terminal state is never
//! left.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Asset categories the dispatcher knows how to plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetCategory {
    Host,
    Workstation,
    WebApplication,
    Database,
    NetworkDevice,
    Generic,
}

impl AssetCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Host => "HOST",
            AssetCategory::Workstation => "WORKSTATION",
            AssetCategory::WebApplication => "WEB_APPLICATION",
            AssetCategory::Database => "DATABASE",
            AssetCategory::NetworkDevice => "NETWORK_DEVICE",
            AssetCategory::Generic => "GENERIC",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered asset. Read-only input to a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub name: String,
    pub category: AssetCategory,
    pub ip: Option<String>,
    pub domain: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
}

impl Asset {
    #[must_use]
    pub fn new<S: Into<String>>(id: u64, name: S, category: AssetCategory) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            ip: None,
            domain: None,
            port: None,
            protocol: None,
        }
    }

    #[must_use]
    pub fn with_ip<S: Into<String>>(mut self, ip: S) -> Self {
        self.ip = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_protocol<S: Into<String>>(mut self, protocol: S) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Declared port, with 0 treated as unset.
    #[inline]
    #[must_use]
    pub fn declared_port(&self) -> Option<u16> {
        self.port.filter(|p| *p > 0)
    }

    /// Whether the protocol hint asks for TLS.
    #[must_use]
    pub fn prefers_https(&self) -> bool {
        self.protocol
            .as_deref()
            .map(|p| p.to_ascii_lowercase().contains("https"))
            .unwrap_or(false)
    }
}

/// Kind of probe, and therefore of the detection it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeKind {
    Ping,
    TcpPort,
    HttpService,
    HttpsService,
    DatabaseService,
    SshService,
}

impl ProbeKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Ping => "PING",
            ProbeKind::TcpPort => "TCP_PORT",
            ProbeKind::HttpService => "HTTP_SERVICE",
            ProbeKind::HttpsService => "HTTPS_SERVICE",
            ProbeKind::DatabaseService => "DATABASE_SERVICE",
            ProbeKind::SshService => "SSH_SERVICE",
        }
    }

    /// HTTP and HTTPS probes yield evidence for the fingerprint matcher.
    #[inline]
    #[must_use]
    pub const fn is_web(&self) -> bool {
        matches!(self, ProbeKind::HttpService | ProbeKind::HttpsService)
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL scheme for web probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Protocol label stored on fingerprints.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Scheme::Http => "HTTP",
            Scheme::Https => "HTTPS",
        }
    }
}

/// One entry of a probe plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub kind: ProbeKind,
    pub target: String,
    pub port: Option<u16>,
    /// Only run once a PING in the same plan has come back ONLINE.
    pub gated: bool,
}

impl ProbeSpec {
    #[must_use]
    pub fn ping<S: Into<String>>(target: S) -> Self {
        Self {
            kind: ProbeKind::Ping,
            target: target.into(),
            port: None,
            gated: false,
        }
    }

    #[must_use]
    pub fn on_port<S: Into<String>>(kind: ProbeKind, target: S, port: u16) -> Self {
        Self {
            kind,
            target: target.into(),
            port: Some(port),
            gated: false,
        }
    }

    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }
}

impl fmt::Display for ProbeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{} {}:{}", self.kind, self.target, port),
            None => write!(f, "{} {}", self.kind, self.target),
        }
    }
}

/// Lifecycle of a detection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionStatus {
    Pending,
    Running,
    Completed,
    Timeout,
    Failed,
}

impl DetectionStatus {
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            DetectionStatus::Completed | DetectionStatus::Timeout | DetectionStatus::Failed
        )
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DetectionStatus::Pending => "pending",
            DetectionStatus::Running => "running",
            DetectionStatus::Completed => "completed",
            DetectionStatus::Timeout => "timeout",
            DetectionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Online,
    Offline,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Online => "online",
            Outcome::Offline => "offline",
        })
    }
}

/// Record of one probe attempt against one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Assigned by the recorder on create.
    pub id: Option<u64>,
    pub asset_id: u64,
    pub kind: ProbeKind,
    pub target: String,
    pub port: Option<u16>,
    pub status: DetectionStatus,
    pub outcome: Option<Outcome>,
    pub response_time_ms: Option<u64>,
    pub detail: Option<String>,
    pub error: Option<String>,
    pub banner: Option<String>,
    pub http_status: Option<u16>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Detection {
    #[must_use]
    pub fn new<S: Into<String>>(asset_id: u64, kind: ProbeKind, target: S, port: Option<u16>) -> Self {
        Self {
            id: None,
            asset_id,
            kind,
            target: target.into(),
            port,
            status: DetectionStatus::Pending,
            outcome: None,
            response_time_ms: None,
            detail: None,
            error: None,
            banner: None,
            http_status: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[must_use]
    pub fn for_spec(asset_id: u64, spec: &ProbeSpec) -> Self {
        Self::new(asset_id, spec.kind, spec.target.clone(), spec.port)
    }

    /// PENDING -> RUNNING. Returns false if the detection already left PENDING.
    pub fn mark_started(&mut self) -> bool {
        if self.status != DetectionStatus::Pending {
            return false;
        }
        self.status = DetectionStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Record a measured round-trip. Ignored once terminal.
    pub fn set_response_time(&mut self, rtt: Duration) {
        if !self.is_terminal() {
            self.response_time_ms = Some(rtt.as_millis() as u64);
        }
    }

    pub fn complete(&mut self, outcome: Outcome, detail: impl Into<String>) -> bool {
        if !self.finish(DetectionStatus::Completed) {
            return false;
        }
        self.outcome = Some(outcome);
        self.detail = Some(detail.into());
        true
    }

    pub fn time_out(&mut self, detail: impl Into<String>) -> bool {
        if !self.finish(DetectionStatus::Timeout) {
            return false;
        }
        self.detail = Some(detail.into());
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.finish(DetectionStatus::Failed) {
            return false;
        }
        let message = message.into();
        self.detail = Some(message.clone());
        self.error = Some(message);
        true
    }

    fn finish(&mut self, status: DetectionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        let started = *self.started_at.get_or_insert(now);
        if self.response_time_ms.is_none() {
            let elapsed = (now - started).num_milliseconds().max(0);
            self.response_time_ms = Some(elapsed as u64);
        }
        self.status = status;
        self.finished_at = Some(now);
        true
    }

    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[inline]
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == DetectionStatus::Completed && self.outcome == Some(Outcome::Online)
    }

    #[inline]
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.status == DetectionStatus::Completed && self.outcome == Some(Outcome::Offline)
    }
}

/// Fingerprint categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FingerprintType {
    WebServer,
    ApplicationServer,
    ProgrammingLanguage,
    WebFramework,
    Cms,
    Database,
}

impl FingerprintType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FingerprintType::WebServer => "WEB_SERVER",
            FingerprintType::ApplicationServer => "APPLICATION_SERVER",
            FingerprintType::ProgrammingLanguage => "PROGRAMMING_LANGUAGE",
            FingerprintType::WebFramework => "WEB_FRAMEWORK",
            FingerprintType::Cms => "CMS",
            FingerprintType::Database => "DATABASE",
        }
    }
}

impl fmt::Display for FingerprintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fingerprint was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentificationMethod {
    HttpHeader,
    PageContent,
    ErrorPage,
    PortService,
}

impl IdentificationMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IdentificationMethod::HttpHeader => "HTTP_HEADER",
            IdentificationMethod::PageContent => "PAGE_CONTENT",
            IdentificationMethod::ErrorPage => "ERROR_PAGE",
            IdentificationMethod::PortService => "PORT_SERVICE",
        }
    }
}

/// Maximum length, in characters, of a fingerprint's evidence snippet.
pub const EVIDENCE_LIMIT: usize = 1000;

/// Inferred software identity for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub asset_id: u64,
    pub kind: FingerprintType,
    pub name: String,
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub confidence: u8,
    pub method: IdentificationMethod,
    pub signature: String,
    pub port: u16,
    pub protocol: String,
    pub evidence: Option<String>,
}

impl Fingerprint {
    #[must_use]
    pub fn new<S: Into<String>>(
        asset_id: u64,
        kind: FingerprintType,
        name: S,
        confidence: u8,
        method: IdentificationMethod,
    ) -> Self {
        Self {
            asset_id,
            kind,
            name: name.into(),
            vendor: None,
            version: None,
            confidence: confidence.min(100),
            method,
            signature: String::new(),
            port: 0,
            protocol: String::new(),
            evidence: None,
        }
    }

    #[must_use]
    pub fn with_signature<S: Into<String>>(mut self, signature: S) -> Self {
        self.signature = signature.into();
        self
    }

    #[must_use]
    pub fn with_vendor(mut self, vendor: Option<String>) -> Self {
        self.vendor = vendor;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn on(mut self, port: u16, protocol: &str) -> Self {
        self.port = port;
        self.protocol = protocol.to_string();
        self
    }

    /// Attach an evidence snippet, capped at [`EVIDENCE_LIMIT`] characters.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Option<&str>) -> Self {
        self.evidence = evidence.map(truncate_evidence);
        self
    }

    /// Key the recorder deduplicates on.
    #[must_use]
    pub fn key(&self) -> (u64, FingerprintType, &str) {
        (self.asset_id, self.kind, self.name.as_str())
    }
}

/// Cut text to [`EVIDENCE_LIMIT`] characters without splitting a code point.
#[must_use]
pub fn truncate_evidence(text: &str) -> String {
    match text.char_indices().nth(EVIDENCE_LIMIT) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Response captured by a web probe, used as fingerprint evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    /// Header name and all of its values joined with ", ", in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub certificate: Option<String>,
    pub elapsed_ms: u64,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Append a header value, joining with an existing entry of the same name.
    pub fn push_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.push_header(name, value);
        self
    }

    #[must_use]
    pub fn with_body<S: Into<String>>(mut self, body: S) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers as a "name: value" block, one per line.
    #[must_use]
    pub fn header_block(&self) -> String {
        self.headers
            .iter()
            .map(|(k, v)| format!("{k}: {v}\n"))
            .collect()
    }
}

/// Derived status of an asset after a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    Active,
    Inactive,
}

/// Everything one scan of one asset produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    pub asset_id: u64,
    pub detections: Vec<Detection>,
    pub fingerprints: Vec<Fingerprint>,
}

impl ScanOutcome {
    #[must_use]
    pub fn new(asset_id: u64) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            asset_id,
            detections: Vec::new(),
            fingerprints: Vec::new(),
        }
    }

    /// ACTIVE when any detection came back ONLINE.
    #[must_use]
    pub fn asset_status(&self) -> AssetStatus {
        if self.detections.iter().any(Detection::is_online) {
            AssetStatus::Active
        } else {
            AssetStatus::Inactive
        }
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.detections
            .iter()
            .any(|d| d.status == DetectionStatus::Failed)
    }
}

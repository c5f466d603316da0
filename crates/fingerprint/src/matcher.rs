//! Evidence matching against the rule registry
//!
//! The matcher is stateless: identical evidence always yields identical
//! fingerprints, and nothing is deduplicated here. A header match and a
//! content match for the same product both come back.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, trace};
use vantage_common::{
    Fingerprint, FingerprintType, HttpResponse, IdentificationMethod, Scheme,
};

use crate::ports::database_product;
use crate::rules::{RuleRegistry, RuleTarget};

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").unwrap());

/// Confidence of a fingerprint inferred from the port number alone.
pub const PORT_SERVICE_CONFIDENCE: u8 = 70;

/// Captured material a rule is tested against.
#[derive(Debug, Clone, Copy)]
pub enum Evidence<'a> {
    Headers(&'a [(String, String)]),
    Body(&'a str),
    ErrorPage { path: &'a str, body: &'a str },
}

/// Where the evidence came from.
#[derive(Debug, Clone, Copy)]
pub struct Origin {
    pub asset_id: u64,
    pub port: u16,
    pub scheme: Scheme,
}

pub struct FingerprintMatcher {
    registry: Arc<RuleRegistry>,
}

impl FingerprintMatcher {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        debug!(rules = registry.len(), "fingerprint matcher ready");
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Run every applicable rule against one piece of evidence.
    pub fn match_evidence(&self, origin: Origin, evidence: Evidence<'_>) -> Vec<Fingerprint> {
        match evidence {
            Evidence::Headers(headers) => self.match_headers(origin, headers),
            Evidence::Body(body) => self.match_body(origin, body),
            Evidence::ErrorPage { path, body } => {
                self.match_error_page(origin, path, body).into_iter().collect()
            }
        }
    }

    /// Header and body evidence of one response.
    pub fn match_response(&self, origin: Origin, response: &HttpResponse) -> Vec<Fingerprint> {
        let mut found = self.match_evidence(origin, Evidence::Headers(&response.headers));
        found.extend(self.match_evidence(origin, Evidence::Body(&response.body)));
        found
    }

    fn match_headers(&self, origin: Origin, headers: &[(String, String)]) -> Vec<Fingerprint> {
        let mut found = Vec::new();
        let mut block: Option<String> = None;

        for (name, value) in headers {
            for rule in self.registry.by_method(IdentificationMethod::HttpHeader) {
                let RuleTarget::Header(wanted) = rule.target else { continue };
                if !name.eq_ignore_ascii_case(wanted) || !rule.pattern.is_match(value) {
                    continue;
                }
                trace!("rule {} matched header {}", rule.id, name);
                let block = block.get_or_insert_with(|| {
                    headers.iter().map(|(k, v)| format!("{k}: {v}\n")).collect()
                });
                found.push(
                    Fingerprint::new(origin.asset_id, rule.kind, rule.name, rule.confidence, rule.method())
                        .with_version(rule.extract_version(value))
                        .with_vendor(Some(rule.vendor.to_string()))
                        .with_signature(format!("{name}: {value}"))
                        .on(origin.port, origin.scheme.label())
                        .with_evidence(Some(block.as_str())),
                );
            }
        }
        found
    }

    fn match_body(&self, origin: Origin, body: &str) -> Vec<Fingerprint> {
        if body.is_empty() {
            return Vec::new();
        }
        let title = page_title(body);

        self.registry
            .by_method(IdentificationMethod::PageContent)
            .filter_map(|rule| {
                let hit = rule.pattern.find(body)?;
                trace!("rule {} matched page content", rule.id);
                Some(
                    Fingerprint::new(origin.asset_id, rule.kind, rule.name, rule.confidence, rule.method())
                        .with_version(rule.extract_version(body))
                        .with_vendor(Some(rule.vendor.to_string()))
                        .with_signature(hit.as_str())
                        .on(origin.port, origin.scheme.label())
                        .with_evidence(title.as_deref()),
                )
            })
            .collect()
    }

    /// At most one fingerprint per page: the first error-page rule that matches.
    fn match_error_page(&self, origin: Origin, path: &str, body: &str) -> Option<Fingerprint> {
        if body.is_empty() {
            return None;
        }
        self.registry
            .by_method(IdentificationMethod::ErrorPage)
            .find_map(|rule| {
                let hit = rule.pattern.find(body)?;
                debug!("error page {} matched rule {}", path, rule.id);
                Some(
                    Fingerprint::new(origin.asset_id, rule.kind, rule.name, rule.confidence, rule.method())
                        .with_version(rule.extract_version(body))
                        .with_vendor(Some(rule.vendor.to_string()))
                        .with_signature(hit.as_str())
                        .on(origin.port, origin.scheme.label())
                        .with_evidence(Some(body)),
                )
            })
    }

    /// Database identity inferred from a declared port.
    pub fn match_port_service(&self, asset_id: u64, port: u16) -> Option<Fingerprint> {
        let product = database_product(port)?;
        Some(
            Fingerprint::new(
                asset_id,
                FingerprintType::Database,
                product,
                PORT_SERVICE_CONFIDENCE,
                IdentificationMethod::PortService,
            )
            .with_signature("Port-based identification")
            .on(port, "TCP"),
        )
    }
}

impl Default for FingerprintMatcher {
    fn default() -> Self {
        Self::new(RuleRegistry::builtin())
    }
}

/// Trimmed text of the first `<title>` element, if any.
pub fn page_title(body: &str) -> Option<String> {
    TITLE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn origin() -> Origin {
        Origin { asset_id: 42, port: 80, scheme: Scheme::Http }
    }

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn nginx_server_header() {
        let matcher = FingerprintMatcher::default();
        let h = headers(&[("Server", "nginx/1.18.0"), ("Content-Type", "text/html")]);
        let found = matcher.match_evidence(origin(), Evidence::Headers(&h));

        assert_eq!(found.len(), 1);
        let fp = &found[0];
        assert_eq!(fp.kind, FingerprintType::WebServer);
        assert_eq!(fp.name, "Nginx");
        assert_eq!(fp.vendor.as_deref(), Some("Nginx Inc."));
        assert_eq!(fp.version.as_deref(), Some("1.18.0"));
        assert_eq!(fp.confidence, 90);
        assert_eq!(fp.method, IdentificationMethod::HttpHeader);
        assert_eq!(fp.signature, "Server: nginx/1.18.0");
        assert_eq!(fp.protocol, "HTTP");
        assert_eq!(fp.evidence.as_deref(), Some("Server: nginx/1.18.0\nContent-Type: text/html\n"));
    }

    #[test]
    fn header_names_compare_case_insensitively() {
        let matcher = FingerprintMatcher::default();
        let h = headers(&[("x-powered-by", "PHP/7.4.3"), ("server", "Apache/2.4.41 (Ubuntu)")]);
        let found = matcher.match_evidence(origin(), Evidence::Headers(&h));

        let names: Vec<(&str, Option<&str>)> =
            found.iter().map(|f| (f.name.as_str(), f.version.as_deref())).collect();
        assert_eq!(names, vec![("PHP", Some("7.4.3")), ("Apache HTTP Server", Some("2.4.41"))]);
    }

    #[test]
    fn header_match_without_version() {
        let matcher = FingerprintMatcher::default();
        let h = headers(&[("Server", "nginx")]);
        let found = matcher.match_evidence(origin(), Evidence::Headers(&h));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, None);
    }

    #[test]
    fn coyote_header_hits_apache_and_not_tomcat() {
        let matcher = FingerprintMatcher::default();
        let h = headers(&[("Server", "Apache-Coyote/1.1")]);
        let found = matcher.match_evidence(origin(), Evidence::Headers(&h));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Apache HTTP Server");
        assert_eq!(found[0].version, None);
    }

    #[test]
    fn wordpress_body_independent_of_headers() {
        let matcher = FingerprintMatcher::default();
        let response = HttpResponse::new(200)
            .with_header("Server", "nginx/1.18.0")
            .with_body("<html><head><title> My Blog </title></head>\
                        <link href=\"/wp-content/themes/x.css\"></html>");

        let found = matcher.match_response(origin(), &response);
        let wp = found.iter().find(|f| f.name == "WordPress").unwrap();
        assert_eq!(wp.kind, FingerprintType::Cms);
        assert_eq!(wp.method, IdentificationMethod::PageContent);
        assert_eq!(wp.signature, "wp-content");
        assert_eq!(wp.evidence.as_deref(), Some("My Blog"));
        assert!(found.iter().any(|f| f.name == "Nginx"));
    }

    #[test]
    fn content_version_is_extracted() {
        let matcher = FingerprintMatcher::default();
        let body = r#"<meta name="generator" content="WordPress 6.4.2" />"#;
        let found = matcher.match_evidence(origin(), Evidence::Body(body));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version.as_deref(), Some("6.4.2"));
        assert_eq!(found[0].evidence, None);
    }

    #[test]
    fn error_page_first_match_wins() {
        let matcher = FingerprintMatcher::default();
        let body = "<h3>Apache Tomcat/9.0.41</h3> served via Internet Information Services";
        let found = matcher.match_evidence(origin(), Evidence::ErrorPage { path: "/404", body });

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Apache Tomcat");
        assert_eq!(found[0].version.as_deref(), Some("9.0.41"));
        assert_eq!(found[0].method, IdentificationMethod::ErrorPage);
        assert_eq!(found[0].evidence.as_deref(), Some(body));
    }

    #[test]
    fn error_page_evidence_is_truncated() {
        let matcher = FingerprintMatcher::default();
        let body = format!("Internet Information Services{}", "-".repeat(2000));
        let found = matcher.match_evidence(origin(), Evidence::ErrorPage { path: "/error", body: &body });
        assert_eq!(found[0].evidence.as_ref().map(|e| e.len()), Some(1000));
    }

    #[test]
    fn empty_evidence_yields_nothing() {
        let matcher = FingerprintMatcher::default();
        assert!(matcher.match_evidence(origin(), Evidence::Body("")).is_empty());
        assert!(matcher
            .match_evidence(origin(), Evidence::ErrorPage { path: "/test", body: "" })
            .is_empty());
        assert!(matcher.match_evidence(origin(), Evidence::Headers(&[])).is_empty());
    }

    #[test]
    fn matching_is_idempotent() {
        let matcher = FingerprintMatcher::default();
        let response = HttpResponse::new(200)
            .with_header("Server", "Apache/2.4.41")
            .with_header("X-Powered-By", "PHP/8.1.2")
            .with_body("<title>Site</title> powered by Drupal 10.1");

        let first: HashSet<Fingerprint> = matcher.match_response(origin(), &response).into_iter().collect();
        let second: HashSet<Fingerprint> = matcher.match_response(origin(), &response).into_iter().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn port_service_identification() {
        let matcher = FingerprintMatcher::default();
        let fp = matcher.match_port_service(5, 1433).unwrap();
        assert_eq!(fp.name, "Microsoft SQL Server");
        assert_eq!(fp.kind, FingerprintType::Database);
        assert_eq!(fp.confidence, PORT_SERVICE_CONFIDENCE);
        assert_eq!(fp.method, IdentificationMethod::PortService);
        assert!(matcher.match_port_service(5, 8080).is_none());
    }

    #[test]
    fn title_extraction() {
        assert_eq!(page_title("<TITLE lang=\"en\">Login</TITLE>").as_deref(), Some("Login"));
        assert_eq!(page_title("<p>no title</p>"), None);
    }
}

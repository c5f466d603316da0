//! Built-in fingerprint rules
//!
//! The table is an ordered `Vec`, built once on first use and never
//! mutated. Order only matters for error-page rules, where the first match
//! per page wins.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use vantage_common::{FingerprintType, IdentificationMethod};

/// What part of the evidence a rule is tested against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// Value of one response header, compared case-insensitively by name.
    Header(&'static str),
    /// Full response body.
    Content,
    /// Body of a provoked error page.
    ErrorPage,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: &'static str,
    pub kind: FingerprintType,
    pub name: &'static str,
    pub target: RuleTarget,
    pub pattern: Regex,
    pub version: Option<Regex>,
    pub vendor: &'static str,
    pub confidence: u8,
}

impl Rule {
    #[must_use]
    pub fn method(&self) -> IdentificationMethod {
        match self.target {
            RuleTarget::Header(_) => IdentificationMethod::HttpHeader,
            RuleTarget::Content => IdentificationMethod::PageContent,
            RuleTarget::ErrorPage => IdentificationMethod::ErrorPage,
        }
    }

    /// First capture group of the version pattern, else the whole match.
    #[must_use]
    pub fn extract_version(&self, text: &str) -> Option<String> {
        let caps = self.version.as_ref()?.captures(text)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    }
}

/// Ordered, immutable rule set.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

static BUILTIN: Lazy<Arc<RuleRegistry>> = Lazy::new(|| Arc::new(RuleRegistry::new(builtin_rules())));

impl RuleRegistry {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Shared handle to the built-in table.
    #[must_use]
    pub fn builtin() -> Arc<RuleRegistry> {
        Arc::clone(&BUILTIN)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn by_method(&self, method: IdentificationMethod) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.method() == method)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
fn rule(
    id: &'static str,
    kind: FingerprintType,
    name: &'static str,
    target: RuleTarget,
    pattern: &str,
    version: Option<&str>,
    vendor: &'static str,
    confidence: u8,
) -> Rule {
    Rule {
        id,
        kind,
        name,
        target,
        pattern: Regex::new(pattern).unwrap(),
        version: version.map(|v| Regex::new(v).unwrap()),
        vendor,
        confidence,
    }
}

fn builtin_rules() -> Vec<Rule> {
    use FingerprintType::*;
    use RuleTarget::*;

    vec![
        // Web servers
        rule(
            "apache",
            WebServer,
            "Apache HTTP Server",
            Header("Server"),
            r"(?i)Apache",
            Some(r"Apache/([\d.]+)"),
            "Apache Software Foundation",
            90,
        ),
        rule(
            "nginx",
            WebServer,
            "Nginx",
            Header("Server"),
            r"(?i)nginx",
            Some(r"nginx/([\d.]+)"),
            "Nginx Inc.",
            90,
        ),
        rule(
            "iis",
            WebServer,
            "Microsoft IIS",
            Header("Server"),
            r"(?i)Microsoft-IIS",
            Some(r"Microsoft-IIS/([\d.]+)"),
            "Microsoft",
            90,
        ),

        // Application servers
        rule(
            "tomcat",
            ApplicationServer,
            "Apache Tomcat",
            Header("Server"),
            r"(?i)Tomcat",
            Some(r"Tomcat/([\d.]+)"),
            "Apache Software Foundation",
            85,
        ),
        rule(
            "jetty",
            ApplicationServer,
            "Eclipse Jetty",
            Header("Server"),
            r"(?i)Jetty",
            Some(r"Jetty\(([\d.]+)\)"),
            "Eclipse Foundation",
            85,
        ),

        // Languages and frameworks
        rule(
            "php",
            ProgrammingLanguage,
            "PHP",
            Header("X-Powered-By"),
            r"(?i)PHP",
            Some(r"PHP/([\d.]+)"),
            "PHP Group",
            80,
        ),
        rule(
            "aspnet",
            WebFramework,
            "ASP.NET",
            Header("X-AspNet-Version"),
            r".*",
            Some(r"([\d.]+)"),
            "Microsoft",
            85,
        ),

        // CMS
        rule(
            "wordpress",
            Cms,
            "WordPress",
            Content,
            r"(?i)wp-content|wordpress",
            Some(r"WordPress ([\d.]+)"),
            "WordPress.org",
            75,
        ),
        rule(
            "drupal",
            Cms,
            "Drupal",
            Content,
            r"(?i)Drupal",
            Some(r"Drupal ([\d.]+)"),
            "Drupal Association",
            75,
        ),

        // Error pages, first match wins
        rule(
            "tomcat_error",
            ApplicationServer,
            "Apache Tomcat",
            ErrorPage,
            r"(?i)Apache Tomcat",
            Some(r"Apache Tomcat/([\d.]+)"),
            "Apache Software Foundation",
            80,
        ),
        rule(
            "iis_error",
            WebServer,
            "Microsoft IIS",
            ErrorPage,
            r"(?i)Internet Information Services",
            None,
            "Microsoft",
            75,
        ),
    ]
}

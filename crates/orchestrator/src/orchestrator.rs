//! Scan orchestration: plan, probe, fingerprint, record

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use vantage_common::{
    Asset, AssetCategory, Detection, Fingerprint, ProbeConfig, ProbeKind, ProbeSpec, ScanOutcome, Scheme,
};
use vantage_fingerprint::{Evidence, FingerprintMatcher, Origin};
use vantage_probes::{fetch_error_pages, HttpFetcher, ProbeReport, ProbeRunner};
use vantage_target_resolver::TargetResolver;

use crate::dispatcher::ProbeDispatcher;

/// Runs the full pipeline for one asset. Never fails: anything that goes
/// wrong is reported as a FAILED PING detection in the outcome.
pub struct ScanOrchestrator {
    dispatcher: ProbeDispatcher,
    runner: Arc<ProbeRunner>,
    fetcher: Arc<dyn HttpFetcher>,
    matcher: Arc<FingerprintMatcher>,
    config: ProbeConfig,
}

impl ScanOrchestrator {
    pub fn new(
        runner: Arc<ProbeRunner>,
        fetcher: Arc<dyn HttpFetcher>,
        matcher: Arc<FingerprintMatcher>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            dispatcher: ProbeDispatcher::new(),
            runner,
            fetcher,
            matcher,
            config,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    #[instrument(skip(self, asset), fields(asset_id = asset.id, category = %asset.category))]
    pub async fn scan(&self, asset: &Asset) -> ScanOutcome {
        let mut outcome = ScanOutcome::new(asset.id);

        let result = AssertUnwindSafe(self.pipeline(asset, &mut outcome))
            .catch_unwind()
            .await;
        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(panic) => Some(panic_message(panic)),
        };
        if let Some(message) = failure {
            self.record_failure(asset, &mut outcome, &message).await;
        }

        info!(
            detections = outcome.detections.len(),
            fingerprints = outcome.fingerprints.len(),
            status = ?outcome.asset_status(),
            "scan finished"
        );
        outcome
    }

    async fn pipeline(&self, asset: &Asset, outcome: &mut ScanOutcome) -> Result<()> {
        let plan = self.dispatcher.plan(asset);
        let (gated, ungated): (Vec<ProbeSpec>, Vec<ProbeSpec>) = plan.into_iter().partition(|s| s.gated);

        let mut reports = self.run_specs(asset.id, &ungated, outcome).await?;

        if !gated.is_empty() {
            let alive = reports
                .iter()
                .any(|r| r.detection.kind == ProbeKind::Ping && r.detection.is_online());
            if alive {
                reports.extend(self.run_specs(asset.id, &gated, outcome).await?);
            } else {
                debug!(skipped = gated.len(), "host did not answer ping, skipping port probes");
            }
        }

        let mut fingerprints = Vec::new();
        for report in &reports {
            fingerprints.extend(self.web_fingerprints(asset.id, report).await);
        }

        if asset.category == AssetCategory::Database {
            if let Some(port) = asset.declared_port() {
                fingerprints.extend(self.matcher.match_port_service(asset.id, port));
            }
        }

        let saved = self.runner.recorder().save_new_fingerprints(&fingerprints).await?;
        debug!(matched = fingerprints.len(), saved, "fingerprints recorded");
        outcome.fingerprints = fingerprints;
        Ok(())
    }

    /// Run specs with bounded concurrency. Every spec runs to a terminal
    /// detection, pushed to `outcome` in plan order; the first recorder
    /// failure is returned only after all of them have finished.
    async fn run_specs(
        &self,
        asset_id: u64,
        specs: &[ProbeSpec],
        outcome: &mut ScanOutcome,
    ) -> Result<Vec<ProbeReport>> {
        let pending: Vec<BoxFuture<'_, ProbeReport>> = specs
            .iter()
            .map(|spec| self.runner.run(asset_id, spec).boxed())
            .collect();
        let reports: Vec<ProbeReport> = stream::iter(pending)
            .buffered(self.config.max_concurrent_probes.max(1))
            .collect()
            .await;

        let mut record_error = None;
        for report in &reports {
            outcome.detections.push(report.detection.clone());
            if record_error.is_none() {
                record_error = report.record_error.clone();
            }
        }
        match record_error {
            Some(e) => Err(anyhow!(e)),
            None => Ok(reports),
        }
    }

    /// Header, body and error-page evidence for an ONLINE web detection.
    async fn web_fingerprints(&self, asset_id: u64, report: &ProbeReport) -> Vec<Fingerprint> {
        let detection = &report.detection;
        let (Some(scheme), Some(response)) = (scheme_of(detection.kind), report.response.as_ref()) else {
            return Vec::new();
        };
        if !detection.is_online() {
            return Vec::new();
        }
        let port = detection.port.unwrap_or(match scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        });
        let origin = Origin { asset_id, port, scheme };

        let mut found = self.matcher.match_response(origin, response);
        let pages = fetch_error_pages(
            self.fetcher.as_ref(),
            scheme,
            &detection.target,
            port,
            &self.config.error_paths,
        )
        .await;
        for (path, page) in &pages {
            found.extend(self.matcher.match_evidence(origin, Evidence::ErrorPage { path, body: &page.body }));
        }
        found
    }

    async fn record_failure(&self, asset: &Asset, outcome: &mut ScanOutcome, message: &str) {
        warn!("scan of asset {} failed: {}", asset.id, message);
        let mut detection = Detection::new(asset.id, ProbeKind::Ping, TargetResolver::target_of(asset), None);
        detection.mark_started();
        detection.fail(format!("scan failed: {message}"));

        match self.runner.recorder().create_detection(&detection).await {
            Ok(id) => detection.id = Some(id),
            Err(e) => warn!("could not record scan failure: {:#}", e),
        }
        outcome.detections.push(detection);
    }
}

fn scheme_of(kind: ProbeKind) -> Option<Scheme> {
    match kind {
        ProbeKind::HttpService => Some(Scheme::Http),
        ProbeKind::HttpsService => Some(Scheme::Https),
        _ => None,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}

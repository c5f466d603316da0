// runner.rs
use anyhow::{anyhow, Context, Result};
use std::{sync::Arc, time::Instant};
use tracing::info;

use crate::args::ProbeArgs;
use crate::output::print_outcomes;
use vantage_common::{Asset, AssetCategory, ProbeConfig};
use vantage_fingerprint::FingerprintMatcher;
use vantage_orchestrator::{ScanOrchestrator, ScanPool};
use vantage_probes::{standard_runner, HttpFetcher, ReqwestFetcher, RustlsClientFactory, TcpEchoReachability};
use vantage_storage::MemoryRecorder;

/// Asset fields as given on the command line.
pub struct AssetArgs {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub ip: Option<String>,
    pub domain: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
}

impl AssetArgs {
    fn into_asset(self) -> Result<Asset> {
        let mut asset = Asset::new(self.id, self.name, parse_category(&self.category)?);
        if let Some(ip) = self.ip {
            asset = asset.with_ip(ip);
        }
        if let Some(domain) = self.domain {
            asset = asset.with_domain(domain);
        }
        if let Some(port) = self.port {
            asset = asset.with_port(port);
        }
        if let Some(protocol) = self.protocol {
            asset = asset.with_protocol(protocol);
        }
        Ok(asset)
    }
}

pub async fn run_scan(asset: AssetArgs, probe: ProbeArgs) -> Result<()> {
    let asset = asset.into_asset()?;
    info!("Starting scan...");
    info!("Asset: {} ({})", asset.name, asset.category);

    let (orchestrator, recorder) = build(&probe)?;

    let scan_start = Instant::now();
    let outcome = orchestrator.scan(&asset).await;
    let scan_duration = scan_start.elapsed();

    print_outcomes(&[outcome], &recorder.stats(), &probe.output_format, scan_duration)?;
    Ok(())
}

pub async fn run_batch(file: &str, workers: usize, probe: ProbeArgs) -> Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("Failed to read asset file {file}"))?;
    let assets: Vec<Asset> =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse asset file {file}"))?;
    info!("Loaded {} asset(s) from {}", assets.len(), file);

    let (orchestrator, recorder) = build(&probe)?;
    let pool = ScanPool::new(orchestrator, workers);

    let scan_start = Instant::now();
    let outcomes = pool.scan_batch(assets).await?;
    let scan_duration = scan_start.elapsed();
    pool.shutdown().await?;

    print_outcomes(&outcomes, &recorder.stats(), &probe.output_format, scan_duration)?;
    Ok(())
}

fn build(probe: &ProbeArgs) -> Result<(Arc<ScanOrchestrator>, Arc<MemoryRecorder>)> {
    let config = match probe.preset.as_str() {
        "fast" => ProbeConfig::fast(),
        _ => ProbeConfig::default(),
    }
    .with_concurrency(probe.concurrency);
    info!("Probe concurrency: {}", config.max_concurrent_probes);

    let factory = if probe.insecure {
        RustlsClientFactory::insecure()
    } else {
        RustlsClientFactory::new()
    };
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(
        ReqwestFetcher::new(&config, Arc::new(factory)).context("Failed to initialize HTTP clients")?,
    );

    let recorder = Arc::new(MemoryRecorder::new());
    let runner = standard_runner(recorder.clone(), &config, fetcher.clone(), Arc::new(TcpEchoReachability));
    let orchestrator = ScanOrchestrator::new(
        Arc::new(runner),
        fetcher,
        Arc::new(FingerprintMatcher::default()),
        config,
    );
    Ok((Arc::new(orchestrator), recorder))
}

/// Parses a category name, accepting short aliases.
fn parse_category(s: &str) -> Result<AssetCategory> {
    let category = match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "host" | "server" => AssetCategory::Host,
        "workstation" => AssetCategory::Workstation,
        "web" | "web_application" | "webapp" => AssetCategory::WebApplication,
        "database" | "db" => AssetCategory::Database,
        "device" | "network_device" => AssetCategory::NetworkDevice,
        "generic" => AssetCategory::Generic,
        other => return Err(anyhow!("Invalid asset category '{}'", other)),
    };
    Ok(category)
}

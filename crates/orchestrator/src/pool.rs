//! Bounded worker pool for asset scans

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use vantage_common::{Asset, ScanOutcome};

use crate::orchestrator::ScanOrchestrator;
use crate::progress::{ProgressSnapshot, ProgressTracker};

struct ScanJob {
    asset: Asset,
    reply: oneshot::Sender<ScanOutcome>,
}

/// Resolves to the outcome of one submitted scan.
pub struct ScanHandle {
    asset_id: u64,
    rx: oneshot::Receiver<ScanOutcome>,
}

impl ScanHandle {
    pub fn asset_id(&self) -> u64 {
        self.asset_id
    }

    pub async fn wait(self) -> Result<ScanOutcome> {
        self.rx
            .await
            .map_err(|_| anyhow!("scan of asset {} was dropped by the pool", self.asset_id))
    }
}

/// Fixed number of workers pulling scans off one shared queue.
pub struct ScanPool {
    tx: Option<mpsc::UnboundedSender<ScanJob>>,
    workers: Vec<JoinHandle<()>>,
    progress: Arc<ProgressTracker>,
}

impl ScanPool {
    /// Spawn `workers` tasks on the current runtime.
    pub fn new(orchestrator: Arc<ScanOrchestrator>, workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<ScanJob>();
        let queue = Arc::new(Mutex::new(rx));
        let progress = Arc::new(ProgressTracker::new());

        let mut handles = Vec::new();
        for worker_id in 0..workers.max(1) {
            let queue = queue.clone();
            let orchestrator = orchestrator.clone();
            let progress = progress.clone();

            let worker = tokio::spawn(async move {
                loop {
                    // Hold the lock only while taking the next job
                    let job = {
                        let mut q = queue.lock().await;
                        q.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };

                    debug!(worker_id, asset_id = job.asset.id, "scan picked up");
                    let outcome = orchestrator.scan(&job.asset).await;
                    progress.record_finished(outcome.failed()).await;
                    if job.reply.send(outcome).is_err() {
                        debug!(worker_id, "scan result discarded, handle dropped");
                    }
                }
            });
            handles.push(worker);
        }

        Self {
            tx: Some(tx),
            workers: handles,
            progress,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue one asset for scanning.
    pub async fn submit(&self, asset: Asset) -> Result<ScanHandle> {
        let tx = self.tx.as_ref().ok_or_else(|| anyhow!("scan pool is shut down"))?;
        let (reply, rx) = oneshot::channel();
        let asset_id = asset.id;
        tx.send(ScanJob { asset, reply })
            .map_err(|_| anyhow!("scan pool workers have stopped"))?;
        self.progress.increment_submitted().await;
        Ok(ScanHandle { asset_id, rx })
    }

    /// Scan every asset, returning outcomes in input order.
    #[instrument(skip(self, assets), fields(assets = assets.len()))]
    pub async fn scan_batch(&self, assets: Vec<Asset>) -> Result<Vec<ScanOutcome>> {
        let mut handles = Vec::with_capacity(assets.len());
        for asset in assets {
            handles.push(self.submit(asset).await?);
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.wait().await?);
        }
        info!(scanned = outcomes.len(), "batch finished");
        Ok(outcomes)
    }

    pub async fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot().await
    }

    /// Stop accepting work, let queued scans finish, join the workers.
    pub async fn shutdown(mut self) -> Result<()> {
        self.tx.take();
        for worker in self.workers.drain(..) {
            worker.await?;
        }
        self.progress.print_summary().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::time::Duration;
    use vantage_common::{AssetCategory, HttpResponse, ProbeConfig, ProbeError, ProbeResult, Scheme};
    use vantage_fingerprint::FingerprintMatcher;
    use vantage_probes::{standard_runner, HttpFetcher, Reachability};
    use vantage_storage::MemoryRecorder;

    struct Down;

    #[async_trait]
    impl Reachability for Down {
        async fn is_reachable(&self, _: IpAddr, _: Duration) -> bool {
            false
        }
    }

    struct Refusing;

    #[async_trait]
    impl HttpFetcher for Refusing {
        async fn fetch(&self, _: Scheme, _: &str, _: u16, _: &str) -> ProbeResult<HttpResponse> {
            Err(ProbeError::Refused("test".into()))
        }
    }

    fn pool(workers: usize) -> ScanPool {
        let config = ProbeConfig::fast();
        let fetcher: Arc<dyn HttpFetcher> = Arc::new(Refusing);
        let runner = standard_runner(Arc::new(MemoryRecorder::new()), &config, fetcher.clone(), Arc::new(Down));
        let orchestrator = ScanOrchestrator::new(
            Arc::new(runner),
            fetcher,
            Arc::new(FingerprintMatcher::default()),
            config,
        );
        ScanPool::new(Arc::new(orchestrator), workers)
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let pool = pool(2);
        let assets: Vec<Asset> = (1..=5)
            .map(|id| Asset::new(id, format!("web-{id}"), AssetCategory::WebApplication).with_ip("127.0.0.1"))
            .collect();

        let outcomes = pool.scan_batch(assets).await.unwrap();

        let ids: Vec<u64> = outcomes.iter().map(|o| o.asset_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(outcomes.iter().all(|o| o.detections.iter().all(|d| d.is_offline())));

        let progress = pool.progress().await;
        assert_eq!(progress.submitted, 5);
        assert_eq!(progress.completed, 5);
        assert_eq!(progress.failed, 0);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn zero_workers_still_runs() {
        let pool = pool(0);
        assert_eq!(pool.worker_count(), 1);

        let handle = pool
            .submit(Asset::new(9, "gen", AssetCategory::Generic).with_ip("127.0.0.1"))
            .await
            .unwrap();
        assert_eq!(handle.asset_id(), 9);
        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.detections.len(), 1);
        assert!(outcome.detections[0].is_offline());
    }
}

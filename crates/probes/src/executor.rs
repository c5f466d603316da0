//! Probe executor trait and the runner that drives detections through it

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use vantage_common::{Detection, HttpResponse, ProbeKind, ProbeSpec, Recorder};

/// One protocol action. Implementations must leave `detection` in a
/// terminal state and never return an error: every failure is recorded on
/// the detection itself.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// Run the probe described by `detection` (target, port, kind).
    ///
    /// Web probes hand back the response they captured as evidence.
    async fn execute(&self, detection: &mut Detection) -> Option<HttpResponse>;

    /// Executor name/identifier
    fn name(&self) -> &str;
}

/// A finished probe: its detection plus any captured web evidence.
///
/// The detection is always terminal. `record_error` carries the first
/// recorder failure hit while persisting it.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub detection: Detection,
    pub response: Option<HttpResponse>,
    pub record_error: Option<String>,
}

/// Creates, records and finalizes detections around the registered executors.
pub struct ProbeRunner {
    recorder: Arc<dyn Recorder>,
    executors: HashMap<ProbeKind, Arc<dyn ProbeExecutor>>,
}

impl ProbeRunner {
    pub fn new(recorder: Arc<dyn Recorder>) -> Self {
        Self {
            recorder,
            executors: HashMap::new(),
        }
    }

    /// Register an executor for a probe kind, replacing any previous one.
    pub fn register(&mut self, kind: ProbeKind, executor: Arc<dyn ProbeExecutor>) {
        self.executors.insert(kind, executor);
    }

    #[must_use]
    pub fn with(mut self, kind: ProbeKind, executor: Arc<dyn ProbeExecutor>) -> Self {
        self.register(kind, executor);
        self
    }

    pub fn recorder(&self) -> &Arc<dyn Recorder> {
        &self.recorder
    }

    /// Run one planned probe. The returned detection is terminal even when
    /// the recorder fails; such failures are carried in `record_error`.
    #[instrument(skip(self, spec), fields(probe = %spec))]
    pub async fn run(&self, asset_id: u64, spec: &ProbeSpec) -> ProbeReport {
        let mut detection = Detection::for_spec(asset_id, spec);
        detection.mark_started();

        let mut record_error = None;
        match self.recorder.create_detection(&detection).await {
            Ok(id) => detection.id = Some(id),
            Err(e) => {
                warn!("could not record detection: {:#}", e);
                record_error = Some(format!("{e:#}"));
            }
        }

        let response = match self.executors.get(&spec.kind) {
            Some(executor) => {
                debug!(executor = executor.name(), "executing");
                executor.execute(&mut detection).await
            }
            None => {
                warn!("no executor registered for {}", spec.kind);
                detection.fail(format!("no executor registered for {}", spec.kind));
                None
            }
        };

        if !detection.is_terminal() {
            detection.fail("probe ended without a result");
        }
        debug!(
            status = %detection.status,
            rtt_ms = detection.response_time_ms.unwrap_or_default(),
            "probe finished"
        );

        if detection.id.is_some() {
            if let Err(e) = self.recorder.update_detection(&detection).await {
                warn!("could not update detection: {:#}", e);
                record_error = Some(format!("{e:#}"));
            }
        }
        ProbeReport {
            detection,
            response,
            record_error,
        }
    }
}

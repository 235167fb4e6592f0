//! pipeline.rs — Pipeline Orchestrator (§4.H)
//!
//! Owns the Gate and drives `sealed batch -> estimate -> sinks`. Backpressure: the
//! configured estimator runs on a blocking worker with a deadline; if it overruns,
//! the orchestrator falls back to the linear estimator and flags the batch
//! `ESTIMATOR_DEGRADED` rather than stalling the pipeline (§4.H, §7).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use witness_types::{BatchFlag, EstimatorKind, EventEstimate, ObservationBatch, Observation};

use crate::config::OrchestratorConfig;
use crate::gate::{Gate, GateEvent};
use crate::sinks::chat_sink::ChatNotification;
use crate::sinks::log_sink::LogRecord;

pub struct Pipeline {
    gate: Gate,
    config: OrchestratorConfig,
    log_tx: Option<mpsc::UnboundedSender<LogRecord>>,
    chat_tx: Option<mpsc::UnboundedSender<ChatNotification>>,
}

impl Pipeline {
    pub fn new(
        config: OrchestratorConfig,
        log_tx: Option<mpsc::UnboundedSender<LogRecord>>,
        chat_tx: Option<mpsc::UnboundedSender<ChatNotification>>,
    ) -> Self {
        let gate = Gate::new(config.active_observers, Duration::from_millis(config.batch_window_millis));
        Self { gate, config, log_tx, chat_tx }
    }

    /// Drive the pipeline from the merged observer-session channel until it closes
    /// (graceful shutdown) or a batch-window timeout ticker fires.
    pub async fn run(mut self, mut hints_rx: mpsc::UnboundedReceiver<Observation>) {
        let mut timeout_ticker = tokio::time::interval(Duration::from_millis(self.config.batch_window_millis / 5));

        loop {
            tokio::select! {
                maybe_observation = hints_rx.recv() => {
                    match maybe_observation {
                        Some(observation) => {
                            let now_ms = now_millis();
                            self.handle_event(self.gate.ingest(observation, now_ms)).await;
                        }
                        None => {
                            info!("observer channel closed, flushing pending batch and shutting down");
                            self.handle_event(self.gate.flush()).await;
                            return;
                        }
                    }
                }
                _ = timeout_ticker.tick() => {
                    let now_ms = now_millis();
                    self.handle_event(self.gate.check_timeout(now_ms)).await;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: GateEvent) {
        match event {
            GateEvent::Pending => {}
            GateEvent::Dropped => warn!("batch dropped: timed out without quorum"),
            GateEvent::Sealed(batch) => self.fuse_and_dispatch(batch).await,
        }
    }

    async fn fuse_and_dispatch(&mut self, batch: ObservationBatch) {
        let batch_id = batch.batch_id;
        let first_at_ms = batch.first_at_ms;
        let deadline = Duration::from_millis(self.config.estimator_deadline_millis);
        let kind = self.config.estimator;

        let estimate = match self.estimate_within_deadline(batch.clone(), kind, deadline).await {
            Some(mut estimate) => estimate,
            None => match self.estimate_within_deadline(batch, EstimatorKind::Linear, deadline).await {
                Some(mut fallback) => {
                    fallback.flags.push(BatchFlag::EstimatorDegraded);
                    warn!(batch_id, "estimator {:?} exceeded deadline, degraded to linear", kind);
                    fallback
                }
                None => {
                    warn!(batch_id, "linear estimator also failed to complete within the deadline, dropping batch");
                    return;
                }
            },
        };

        info!(batch_id, x = estimate.x, z = estimate.z, flags = ?estimate.flags, "batch fused");

        if let Some(tx) = &self.log_tx {
            let _ = tx.send(LogRecord { server_label: self.config.server_label.clone(), estimate: estimate.clone(), observed_at_ms: first_at_ms });
        }
        if let Some(tx) = &self.chat_tx {
            if let Some(channel) = &self.config.chat_channel_id {
                let _ = tx.send(ChatNotification { channel: channel.clone(), server_label: self.config.server_label.clone(), estimate });
            }
        }
    }

    async fn estimate_within_deadline(&self, batch: ObservationBatch, kind: EstimatorKind, deadline: Duration) -> Option<EventEstimate> {
        let sigma = self.config.sigma;
        let handle = tokio::task::spawn_blocking(move || witness_core::estimate(&batch, kind, sigma));
        match timeout(deadline, handle).await {
            Ok(Ok(Ok(estimate))) => Some(estimate),
            Ok(Ok(Err(e))) => {
                warn!("fusion rejected batch: {e}");
                None
            }
            Ok(Err(join_err)) => {
                warn!("estimator task panicked: {join_err}");
                None
            }
            Err(_) => None, // deadline elapsed
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

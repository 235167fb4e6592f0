//! sinks/ — Persistent Log and Chat Sinks (§4.H, §5, §6)
//!
//! Each sink is a one-writer queue: the orchestrator pushes onto an unbounded
//! channel (so hint intake never blocks on sink I/O) and a single background task
//! drains it, retrying failures with backoff before dropping and incrementing a
//! counter. This mirrors `AuditLogger`'s single-append-path discipline, generalized
//! from a local file to network sinks.

pub mod chat_sink;
pub mod log_sink;

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared dropped-message counter a sink increments when it gives up on an item
/// after exhausting retries. Exposed for health/metrics reporting.
#[derive(Default)]
pub struct DropCounter(AtomicU64);

impl DropCounter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Queue-depth threshold above which a sink logs a warning (§4.H backpressure
/// note) — it never refuses work, only complains loudly.
pub const QUEUE_DEPTH_WARNING_THRESHOLD: usize = 1_000;

/// Retry a fallible send up to `max_attempts` times with doubling backoff starting
/// at 200ms, returning whether it ultimately succeeded.
pub async fn retry_with_backoff<F, Fut, E>(mut attempt: F, max_attempts: u32) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut backoff = std::time::Duration::from_millis(200);
    for attempt_no in 1..=max_attempts {
        match attempt().await {
            Ok(()) => return true,
            Err(e) if attempt_no == max_attempts => {
                tracing::warn!("sink write failed after {attempt_no} attempts, dropping: {e}");
                return false;
            }
            Err(e) => {
                tracing::warn!("sink write failed (attempt {attempt_no}/{max_attempts}): {e}, retrying in {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
    false
}

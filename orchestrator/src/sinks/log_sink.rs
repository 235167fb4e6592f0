//! sinks/log_sink.rs — Persistent Log Sink (§6)
//!
//! Inserts one row per batch into the event-log table: `server, x, y, z, ts,
//! error_radius`. Commit-per-batch, single-row inserts, no reads — the core never
//! queries its own log.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::info;
use witness_types::EventEstimate;

use super::{retry_with_backoff, DropCounter, QUEUE_DEPTH_WARNING_THRESHOLD};

const MAX_ATTEMPTS: u32 = 5;

pub struct LogRecord {
    pub server_label: String,
    pub estimate: EventEstimate,
    pub observed_at_ms: i64,
}

/// Connect the pool and spawn the single-writer drain task. Returns a sender the
/// orchestrator pushes `LogRecord`s onto and a shared drop counter for metrics.
pub async fn spawn(connection_string: &str) -> anyhow::Result<(mpsc::UnboundedSender<LogRecord>, Arc<DropCounter>)> {
    let pool = PgPoolOptions::new().max_connections(5).connect(connection_string).await?;
    ensure_schema(&pool).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<LogRecord>();
    let drops = Arc::new(DropCounter::default());
    let drops_task = drops.clone();

    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            if rx.len() > QUEUE_DEPTH_WARNING_THRESHOLD {
                tracing::warn!("log sink queue depth {} exceeds warning threshold", rx.len());
            }
            let ok = retry_with_backoff(|| insert(&pool, &record), MAX_ATTEMPTS).await;
            if !ok {
                drops_task.increment();
            }
        }
        info!("log sink drain task exiting: channel closed");
    });

    Ok((tx, drops))
}

async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS witness_events (
            id BIGSERIAL PRIMARY KEY,
            server TEXT NOT NULL,
            x DOUBLE PRECISION NOT NULL,
            y DOUBLE PRECISION NOT NULL,
            z DOUBLE PRECISION NOT NULL,
            ts TIMESTAMPTZ NOT NULL,
            error_radius DOUBLE PRECISION
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert(pool: &PgPool, record: &LogRecord) -> Result<(), sqlx::Error> {
    let avg_y = record.estimate.average_y();
    let ts = chrono::DateTime::from_timestamp_millis(record.observed_at_ms).unwrap_or_else(chrono::Utc::now);

    sqlx::query("INSERT INTO witness_events (server, x, y, z, ts, error_radius) VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(&record.server_label)
        .bind(record.estimate.x)
        .bind(avg_y)
        .bind(record.estimate.z)
        .bind(ts)
        .bind(record.estimate.error_radius)
        .execute(pool)
        .await?;
    Ok(())
}

mod config;
mod gate;
mod observer;
mod pipeline;
mod sinks;

use std::path::PathBuf;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use config::OrchestratorConfig;
use pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "orchestrator", about = "Wither-spawn triangulation pipeline orchestrator")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    #[arg(long, default_value = "8080")]
    health_port: u16,
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "orchestrator=info".into()))
        .init();

    let args = Args::parse();
    let cfg = OrchestratorConfig::load(&args.config);
    info!(
        "orchestrator starting — server={} estimator={:?} active_observers={}",
        cfg.server_label, cfg.estimator, cfg.active_observers
    );

    let log_tx = match &cfg.log_connection_string {
        Some(conn) => match sinks::log_sink::spawn(conn).await {
            Ok((tx, _drops)) => Some(tx),
            Err(e) => {
                warn!("log sink unavailable ({e}), estimates will not be persisted");
                None
            }
        },
        None => {
            warn!("no log_connection_string configured, estimates will not be persisted");
            None
        }
    };

    let chat_tx = cfg.chat_webhook_url.clone().map(|url| sinks::chat_sink::spawn(url).0);

    let (hints_tx, hints_rx) = mpsc::unbounded_channel();
    let mut observer_handles = Vec::with_capacity(cfg.observer_addresses.len());
    for (i, addr) in cfg.observer_addresses.iter().enumerate() {
        let observer_id = format!("observer-{i}");
        let tx = hints_tx.clone();
        let addr = addr.clone();
        observer_handles.push(tokio::spawn(observer::run_observer_session(observer_id, addr, tx)));
    }
    drop(hints_tx); // the pipeline's clone-per-session senders are what keeps the channel open

    let health_port = args.health_port;
    let health_app = Router::new().route("/health", get(health_check));
    let health_task = tokio::spawn(async move {
        let addr = format!("0.0.0.0:{health_port}");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("health check listening on {addr}");
                let _ = axum::serve(listener, health_app).await;
            }
            Err(e) => warn!("health check server could not bind {addr}: {e}"),
        }
    });

    let pipeline = Pipeline::new(cfg, log_tx, chat_tx);
    let mut pipeline_task = tokio::spawn(pipeline.run(hints_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, cancelling observer sessions");
            for handle in observer_handles {
                handle.abort();
            }
            health_task.abort();

            // Aborting observer sessions drops their channel senders, so the
            // pipeline's `recv()` returns `None` and it flushes its pending batch
            // (if it has quorum) before returning — bounded to 5s (§5).
            match tokio::time::timeout(Duration::from_secs(5), &mut pipeline_task).await {
                Ok(Ok(())) => info!("pipeline flushed and shut down cleanly"),
                Ok(Err(e)) => warn!("pipeline task ended with error: {e}"),
                Err(_) => {
                    warn!("pipeline did not shut down within 5s, aborting");
                    pipeline_task.abort();
                }
            }
        }
        result = &mut pipeline_task => {
            if let Err(e) = result {
                warn!("pipeline task ended unexpectedly: {e}");
            }
            health_task.abort();
        }
    }

    Ok(())
}

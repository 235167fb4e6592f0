//! config.rs — Configuration Layer (§4.J / §6)
//!
//! Layered `toml` file + environment-variable overrides, following the same pattern
//! as the simulator's `FullConfig` and the UWB hub's `UwbHubConfig::default()`.

use serde::Deserialize;
use witness_types::EstimatorKind;

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Minimum number of observers that must be online for the pipeline to run.
    #[serde(default = "default_active_observers")]
    pub active_observers: usize,
    #[serde(default = "default_batch_window_millis")]
    pub batch_window_millis: u64,
    #[serde(default)]
    pub estimator: EstimatorKind,
    /// Only meaningful when `estimator = covariance`.
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default = "default_view_distance")]
    pub view_distance_blocks: u32,
    pub log_connection_string: Option<String>,
    pub chat_channel_id: Option<String>,
    pub chat_webhook_url: Option<String>,
    #[serde(default = "default_server_label")]
    pub server_label: String,
    /// `host:port` for each observer session's protocol-client connection.
    #[serde(default)]
    pub observer_addresses: Vec<String>,
    /// Deadline (ms) after which a batch's estimator run is abandoned in favor of
    /// the linear estimator, flagged `ESTIMATOR_DEGRADED`.
    #[serde(default = "default_estimator_deadline_millis")]
    pub estimator_deadline_millis: u64,
}

fn default_active_observers() -> usize {
    2
}
fn default_batch_window_millis() -> u64 {
    5_000
}
fn default_sigma() -> f64 {
    witness_core::DEFAULT_COVARIANCE_SIGMA
}
fn default_view_distance() -> u32 {
    160
}
fn default_server_label() -> String {
    "default".to_string()
}
fn default_estimator_deadline_millis() -> u64 {
    1_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            active_observers: default_active_observers(),
            batch_window_millis: default_batch_window_millis(),
            estimator: EstimatorKind::default(),
            sigma: default_sigma(),
            view_distance_blocks: default_view_distance(),
            log_connection_string: None,
            chat_channel_id: None,
            chat_webhook_url: None,
            server_label: default_server_label(),
            observer_addresses: Vec::new(),
            estimator_deadline_millis: default_estimator_deadline_millis(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from `path` if present, then apply environment-variable overrides for
    /// the secrets and deployment-specific values (connection strings, channel IDs)
    /// that don't belong in a checked-in `config.toml`.
    pub fn load(path: &std::path::Path) -> Self {
        let mut cfg = match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("failed to parse {}: {e}, using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        };

        if let Ok(conn) = std::env::var("WITNESS_LOG_CONNECTION_STRING") {
            cfg.log_connection_string = Some(conn);
        }
        if let Ok(channel) = std::env::var("WITNESS_CHAT_CHANNEL_ID") {
            cfg.chat_channel_id = Some(channel);
        }
        if let Ok(label) = std::env::var("WITNESS_SERVER_LABEL") {
            cfg.server_label = label;
        }
        cfg
    }
}

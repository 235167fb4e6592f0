//! config.rs — Harness configuration (§4.J)
//!
//! Loaded from an optional `config.toml`, overridable by CLI flags. Mirrors the
//! layered `toml` + `clap` pattern used by the live orchestrator's configuration.

use serde::Deserialize;
use witness_types::EstimatorKind;

use crate::patterns::Layout;

#[derive(Debug, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_n_observers")]
    pub n_observers: usize,
    #[serde(default = "default_outer_extent")]
    pub outer_extent_blocks: f64,
    #[serde(default = "default_view_distance")]
    pub view_distance_blocks: f64,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub estimator: EstimatorKind,
    /// Only meaningful when `estimator = covariance`.
    #[serde(default = "default_sigma")]
    pub sigma: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Grid
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            n_observers: default_n_observers(),
            outer_extent_blocks: default_outer_extent(),
            view_distance_blocks: default_view_distance(),
            layout: Layout::default(),
            estimator: EstimatorKind::default(),
            sigma: default_sigma(),
        }
    }
}

fn default_n_observers() -> usize {
    4
}

fn default_outer_extent() -> f64 {
    320_000.0
}

fn default_view_distance() -> f64 {
    160.0
}

fn default_sigma() -> f64 {
    witness_core::DEFAULT_COVARIANCE_SIGMA
}

/// Load from `path` if present, falling back to defaults otherwise — a missing
/// config file is expected for quick ad-hoc harness runs, not an error.
pub fn load(path: &std::path::Path) -> HarnessConfig {
    match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("failed to parse {}: {e}, using defaults", path.display());
            HarnessConfig::default()
        }),
        Err(_) => HarnessConfig::default(),
    }
}

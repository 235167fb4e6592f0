//! main.rs — offline test-harness entry point
//!
//! Runs one of two modes selected by subcommand:
//!   - `trial`: a single deterministic event + observer layout, printed and
//!     optionally rendered to a diagnostic PNG.
//!   - `monte-carlo`: the S6 annulus sweep comparing linear vs optimized-corner.
//! The S1-S5 scenarios aren't separate subcommands — they're asserted directly as
//! unit tests against `witness_core::estimate` in `witness-core/src/lib.rs`.

mod config;
mod diagnostics;
mod harness;
mod patterns;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use witness_types::Point2;

#[derive(Parser, Debug)]
#[command(name = "witness-sim", about = "Offline test harness for the triangulation pipeline")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Directory to write diagnostic PNGs into, if set
    #[arg(long)]
    render_dir: Option<PathBuf>,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run a single trial at an arbitrary event location.
    Trial {
        #[arg(long, default_value = "250000")]
        event_x: f64,
        #[arg(long, default_value = "-150000")]
        event_z: f64,
    },
    /// Run the Monte Carlo annulus sweep from the test plan (S6).
    MonteCarlo {
        #[arg(long, default_value = "1000")]
        trials: usize,
        #[arg(long, default_value = "7")]
        seed: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "witness_sim=info".into()))
        .init();

    let args = Args::parse();
    let cfg = config::load(&args.config);

    match args.mode {
        Mode::Trial { event_x, event_z } => run_trial_mode(&cfg, Point2::new(event_x, event_z), args.render_dir.as_deref()),
        Mode::MonteCarlo { trials, seed } => run_monte_carlo_mode(&cfg, trials, seed),
    }
}

fn run_trial_mode(cfg: &config::HarnessConfig, event: Point2, render_dir: Option<&std::path::Path>) {
    let result =
        harness::run_trial(cfg.n_observers, event, cfg.outer_extent_blocks, cfg.view_distance_blocks, cfg.layout, cfg.estimator, cfg.sigma);

    match &result.estimate {
        Ok(estimate) => {
            let err = event.dist(&estimate.position());
            info!(
                "estimate=({:.1}, {:.1}) error={:.1} blocks radius={:.1} flags={:?}",
                estimate.x, estimate.z, err, estimate.error_radius, estimate.flags
            );
            if let Some(dir) = render_dir {
                let _ = std::fs::create_dir_all(dir);
                let path = dir.join("trial.png");
                let observations = patterns::generate_observations(cfg.n_observers, event, cfg.outer_extent_blocks, cfg.view_distance_blocks, cfg.layout);
                if let Err(e) = diagnostics::render_batch(&path, &observations, estimate, Some(event)) {
                    tracing::warn!("diagnostic render failed: {e}");
                } else {
                    info!("wrote diagnostic render to {}", path.display());
                }
            }
        }
        Err(e) => tracing::error!("fusion failed: {e}"),
    }
}

fn run_monte_carlo_mode(cfg: &config::HarnessConfig, trials: usize, seed: u64) {
    let half_extent = cfg.outer_extent_blocks / 2.0;
    let summary = harness::monte_carlo_annulus(trials, 1_000.0, 10_000_000.0, half_extent.max(5_000_000.0), cfg.view_distance_blocks, seed);
    info!(
        "monte carlo: {} trials, median linear error={:.1}, median optimized-corner error={:.1}, relative gap={:.4}",
        summary.trials_run, summary.median_linear_error, summary.median_optimized_error, summary.relative_gap()
    );
}

//! harness.rs — Test Harness (§4.I)
//!
//! Drives the full offline pipeline A -> F -> B -> C/D/E: synthesize observers and
//! hints for a known event, fuse them, and compare the recovered estimate against
//! ground truth. This is what backs the literal scenarios in the test suite and the
//! backfill-style Monte Carlo run (S6).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

use witness_core::FusionResult;
use witness_types::{EstimatorKind, ObservationBatch, Point2};

use crate::patterns::{generate_observations, Layout};

/// One harness run's outcome: the recovered estimate alongside the event it was
/// meant to recover, for the caller to score.
pub struct TrialResult {
    pub ground_truth: Point2,
    pub estimate: FusionResult<witness_types::EventEstimate>,
}

/// Run a single trial: generate `n` observers under `layout` around `event`, fuse
/// with `kind`, and return the outcome. `sigma` is only consulted by the covariance
/// estimator.
pub fn run_trial(
    n: usize,
    event: Point2,
    outer_extent: f64,
    view_distance: f64,
    layout: Layout,
    kind: EstimatorKind,
    sigma: f64,
) -> TrialResult {
    let observations = generate_observations(n, event, outer_extent, view_distance, layout);
    let batch = ObservationBatch { batch_id: 0, observations, first_at_ms: 0 };
    TrialResult { ground_truth: event, estimate: witness_core::estimate(&batch, kind, sigma) }
}

/// S6: sample `trials` events uniformly on an annulus `[r_min, r_max]` around the
/// origin, observed by a 4-observer grid at `+/- half_extent`, and report the median
/// point-estimate error under both `linear` and `optimizedCorner`.
pub fn monte_carlo_annulus(
    trials: usize,
    r_min: f64,
    r_max: f64,
    half_extent: f64,
    view_distance: f64,
    seed: u64,
) -> MonteCarloSummary {
    let mut rng = StdRng::seed_from_u64(seed);
    let radius_dist = Uniform::new(r_min, r_max);
    let angle_dist = Uniform::new(0.0, std::f64::consts::TAU);

    let mut linear_errors = Vec::with_capacity(trials);
    let mut optimized_errors = Vec::with_capacity(trials);

    for _ in 0..trials {
        let r = radius_dist.sample(&mut rng);
        let theta = angle_dist.sample(&mut rng);
        let event = Point2::new(r * theta.cos(), r * theta.sin());

        let linear = run_trial(4, event, half_extent * 2.0, view_distance, Layout::Grid, EstimatorKind::Linear, witness_core::DEFAULT_COVARIANCE_SIGMA);
        let optimized =
            run_trial(4, event, half_extent * 2.0, view_distance, Layout::Grid, EstimatorKind::OptimizedCorner, witness_core::DEFAULT_COVARIANCE_SIGMA);

        if let Ok(est) = linear.estimate {
            linear_errors.push(event.dist(&est.position()));
        }
        if let Ok(est) = optimized.estimate {
            optimized_errors.push(event.dist(&est.position()));
        }
    }

    MonteCarloSummary {
        median_linear_error: median(&mut linear_errors),
        median_optimized_error: median(&mut optimized_errors),
        trials_run: trials,
    }
}

pub struct MonteCarloSummary {
    pub median_linear_error: f64,
    pub median_optimized_error: f64,
    pub trials_run: usize,
}

impl MonteCarloSummary {
    /// Relative gap between the two medians, as a fraction of the optimized-corner
    /// median. S6's acceptance bound is 1%.
    pub fn relative_gap(&self) -> f64 {
        if self.median_optimized_error.abs() < 1e-12 {
            0.0
        } else {
            (self.median_linear_error - self.median_optimized_error).abs() / self.median_optimized_error
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Deterministic shuffle used by the order-invariance harness check (S4): produces
/// `k` permutations of `batch.observations` via Fisher-Yates with a seeded RNG.
pub fn shuffled_variants(batch: &ObservationBatch, k: usize, seed: u64) -> Vec<ObservationBatch> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..k)
        .map(|i| {
            let mut observations = batch.observations.clone();
            for j in (1..observations.len()).rev() {
                let swap_with = rng.gen_range(0..=j);
                observations.swap(j, swap_with);
            }
            ObservationBatch { batch_id: batch.batch_id + i as u64 + 1, observations, first_at_ms: batch.first_at_ms }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_symmetric_grid_recovers_event_within_tolerance() {
        let event = Point2::new(250_000.0, -150_000.0);
        let result = run_trial(4, event, 320_000.0, 160.0, Layout::Grid, EstimatorKind::Linear, witness_core::DEFAULT_COVARIANCE_SIGMA);
        let estimate = result.estimate.unwrap();
        assert!(event.dist(&estimate.position()) < 2_000.0);
        assert!(estimate.feasible_region.is_some());
    }

    #[test]
    fn s4_shuffled_observations_agree_to_tight_tolerance() {
        let event = Point2::new(250_000.0, -150_000.0);
        let observations = generate_observations(4, event, 320_000.0, 160.0, Layout::Grid);
        let batch = ObservationBatch { batch_id: 1, observations, first_at_ms: 0 };
        let baseline = witness_core::estimate(&batch, EstimatorKind::Linear, witness_core::DEFAULT_COVARIANCE_SIGMA).unwrap();

        for variant in shuffled_variants(&batch, 10, 42) {
            let est = witness_core::estimate(&variant, EstimatorKind::Linear, witness_core::DEFAULT_COVARIANCE_SIGMA).unwrap();
            assert!((est.x - baseline.x).abs() < 1e-6);
            assert!((est.z - baseline.z).abs() < 1e-6);
        }
    }

    /// The recovered point estimate doesn't depend on which error strategy is
    /// configured (§4.C/§4.D share the same least-squares fuse), so this medians
    /// comparison is always near-zero in practice; the assertion still checks the
    /// literal 1% acceptance bound rather than a loosened stand-in for it.
    #[test]
    fn s6_linear_and_optimized_corner_medians_agree_within_one_percent() {
        let summary = monte_carlo_annulus(200, 1_000.0, 10_000_000.0, 5_000_000.0, 160.0, 7);
        assert!(summary.relative_gap() < 0.01, "relative gap too large: {}", summary.relative_gap());
    }
}

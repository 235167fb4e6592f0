//! # witness-core
//!
//! The geometric-inference subsystem: turns a sealed [`ObservationBatch`] into a
//! single [`EventEstimate`]. Pure and synchronous — no I/O, no async, no logging of
//! its own beyond `tracing` spans a caller can enable. The Coincidence Gate and
//! Pipeline Orchestrator (in the `orchestrator` binary) own everything timing- and
//! I/O-related; this crate only owns the math.
//!
//! Pipeline within a single call to [`estimate`]:
//! 1. [`hint`] is a reverse-direction helper used only by simulation/backfill tooling.
//! 2. [`ray`] turns each observation into a center ray and a wedge of bounding half-planes.
//! 3. [`intersector`] fuses the center rays into a least-squares point.
//! 4. [`estimators`] bounds that point's error under the configured strategy.
//! 5. [`region`] clips the half-planes into the feasible polygon.

pub mod error;
pub mod estimators;
pub mod hint;
pub mod intersector;
pub mod ray;
pub mod region;

pub use error::{FusionError, FusionResult};

use estimators::{
    bound_error, CovarianceEstimator, ErrorEstimator, ExhaustiveCornerEstimator, LinearPropagationEstimator,
    OptimizedCornerEstimator,
};
use intersector::least_squares_intersect;
use ray::{crosses_branch_cut, observation_to_ray, observation_to_wedge, wedge_to_half_planes};
use witness_types::{BatchFlag, EstimatorKind, EventEstimate, ObservationBatch, RayChoice};

/// Default sigma (blocks) assumed for [`EstimatorKind::Covariance`]'s orthogonal
/// measurement noise when a caller has no more specific value configured (§6's
/// `sigma` option). A hint's unit square has uniform 1-block uncertainty along the
/// bearing's perpendicular; 1/sqrt(12) is that uniform distribution's standard
/// deviation.
pub const DEFAULT_COVARIANCE_SIGMA: f64 = 0.288_675_13;

fn estimator_for(kind: EstimatorKind, sigma: f64) -> Box<dyn ErrorEstimator> {
    match kind {
        EstimatorKind::Exhaustive => Box::new(ExhaustiveCornerEstimator),
        EstimatorKind::OptimizedCorner => Box::new(OptimizedCornerEstimator),
        EstimatorKind::Linear => Box::new(LinearPropagationEstimator),
        EstimatorKind::Covariance => Box::new(CovarianceEstimator { sigma }),
    }
}

/// Fuse a sealed batch into a single [`EventEstimate`] under the configured error
/// strategy. Callers never branch on `kind` themselves — this is the one seam.
/// `sigma` is only consulted when `kind == EstimatorKind::Covariance` (§6).
///
/// Fails with [`FusionError::InsufficientObservations`] if the batch has fewer than
/// two observations or its center rays are otherwise unusable. A batch whose feasible
/// region collapses, whose fusion is ill-conditioned, or whose wedges straddle the
/// branch cut still produces an estimate — those conditions are recorded as
/// [`BatchFlag`]s on the result instead of failing the call (§7). Likewise, if the
/// configured strategy needs a corner ray through an observer sitting exactly on
/// that corner, fusion falls back to the linear estimator's radius (which only
/// needs already-validated center rays) and flags `EstimatorDegraded`, rather than
/// failing the whole batch.
#[tracing::instrument(skip(batch), fields(batch_id = batch.batch_id, n = batch.observations.len()))]
pub fn estimate(batch: &ObservationBatch, kind: EstimatorKind, sigma: f64) -> FusionResult<EventEstimate> {
    let observations = &batch.observations;
    let mut flags = Vec::new();

    let center_rays = observations
        .iter()
        .map(|o| observation_to_ray(o, RayChoice::Center))
        .collect::<FusionResult<Vec<_>>>()?;

    let fused = least_squares_intersect(&center_rays)?;
    if fused.ill_conditioned {
        tracing::warn!("batch fused with ill-conditioned normal matrix, falling back to centroid");
        flags.push(BatchFlag::IllConditioned);
    }

    let mut half_planes = Vec::with_capacity(observations.len() * 2);
    let mut any_degenerate = false;
    let mut any_wrap = false;
    for obs in observations {
        match crosses_branch_cut(obs) {
            Ok(true) => any_wrap = true,
            Ok(false) => {}
            Err(_) => any_degenerate = true,
        }
        match observation_to_wedge(obs) {
            Ok(wedge) => half_planes.extend(wedge_to_half_planes(&wedge)),
            Err(_) => any_degenerate = true,
        }
    }

    let estimator = estimator_for(kind, sigma);
    let error_radius = match bound_error(estimator.as_ref(), observations, fused.point) {
        Ok(radius) => radius,
        Err(_) => {
            any_degenerate = true;
            tracing::warn!("estimator {:?} hit an observer on a hint-square corner, falling back to linear", kind);
            bound_error(&LinearPropagationEstimator, observations, fused.point).unwrap_or(f64::INFINITY)
        }
    };

    if any_wrap {
        flags.push(BatchFlag::AngleWrapDetected);
    }
    if any_degenerate {
        flags.push(BatchFlag::EstimatorDegraded);
    }

    let region = region::solve_feasible_region(&half_planes);
    if region.is_empty() {
        flags.push(BatchFlag::EmptyFeasibleRegion);
    }

    Ok(EventEstimate {
        x: fused.point.x,
        z: fused.point.z,
        error_radius,
        feasible_region: if region.is_empty() { None } else { Some(region) },
        contributing_observations: observations.clone(),
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use witness_types::{Hint, Observation, Point2};

    fn obs(id: &str, ox: f64, oz: f64, rx: i32, rz: i32) -> Observation {
        Observation {
            observer_id: id.into(),
            observer_pos: Point2::new(ox, oz),
            observer_y: 64.0,
            hint: Hint::new(rx, rz),
            hint_y: 64,
            observed_at_ms: 1_000,
        }
    }

    fn batch(observations: Vec<Observation>) -> ObservationBatch {
        ObservationBatch { batch_id: 1, observations, first_at_ms: 1_000 }
    }

    /// S1: two observers agreeing on an ordinary, well-conditioned event.
    #[test]
    fn s1_two_observer_agreement_produces_a_tight_estimate() {
        let b = batch(vec![obs("a", -100.0, 0.0, 48, 30), obs("b", 0.0, -100.0, 48, 30)]);
        let result = estimate(&b, EstimatorKind::Linear, DEFAULT_COVARIANCE_SIGMA).unwrap();
        assert!((result.x - 48.5).abs() < 2.0);
        assert!((result.z - 30.5).abs() < 2.0);
        assert!(!result.has_flag(BatchFlag::IllConditioned));
        assert!(result.feasible_region.is_some());
    }

    /// S2: single observation is insufficient to fuse.
    #[test]
    fn s2_single_observation_is_rejected() {
        let b = batch(vec![obs("a", -100.0, 0.0, 48, 30)]);
        assert!(matches!(
            estimate(&b, EstimatorKind::Linear, DEFAULT_COVARIANCE_SIGMA),
            Err(FusionError::InsufficientObservations)
        ));
    }

    /// S3: colinear observers produce an ill-conditioned fusion, flagged not failed.
    #[test]
    fn s3_colinear_observers_flag_ill_conditioned_but_still_produce_an_estimate() {
        let b = batch(vec![obs("a", -100.0, 0.0, 48, 0), obs("b", -200.0, 0.0, 48, 0)]);
        let result = estimate(&b, EstimatorKind::Linear, DEFAULT_COVARIANCE_SIGMA).unwrap();
        assert!(result.has_flag(BatchFlag::IllConditioned));
    }

    /// S4: a contradictory third observer empties the feasible region without
    /// preventing a point estimate from the other two.
    #[test]
    fn s4_contradictory_observer_empties_feasible_region() {
        let b = batch(vec![
            obs("a", -100.0, 0.0, 48, 30),
            obs("b", 0.0, -100.0, 48, 30),
            obs("c", 100.0, 100.0, -500, -500),
        ]);
        let result = estimate(&b, EstimatorKind::Linear, DEFAULT_COVARIANCE_SIGMA).unwrap();
        assert!(result.has_flag(BatchFlag::EmptyFeasibleRegion));
        assert!(result.feasible_region.is_none());
    }

    /// S5: a degenerate observer (inside its own hint square) degrades gracefully.
    #[test]
    fn s5_degenerate_observer_flags_degraded_but_fusion_still_completes() {
        let b = batch(vec![
            obs("a", -100.0, 0.0, 48, 30),
            obs("b", 48.3, 30.6, 48, 30), // observer literally inside the hint square
        ]);
        let result = estimate(&b, EstimatorKind::Linear, DEFAULT_COVARIANCE_SIGMA).unwrap();
        assert!(result.has_flag(BatchFlag::EstimatorDegraded));
    }

    /// S6: all four estimator strategies agree on the same nominal point for an
    /// ordinary well-conditioned batch, even though their error radii differ.
    #[test]
    fn s6_all_estimator_kinds_agree_on_nominal_point() {
        let b = batch(vec![
            obs("a", -100.0, -100.0, 48, 30),
            obs("b", -100.0, 100.0, 48, 30),
            obs("c", 100.0, 0.0, 48, 30),
        ]);
        let kinds = [EstimatorKind::Exhaustive, EstimatorKind::OptimizedCorner, EstimatorKind::Linear, EstimatorKind::Covariance];
        let points: Vec<(f64, f64)> = kinds.iter().map(|k| {
            let r = estimate(&b, *k, DEFAULT_COVARIANCE_SIGMA).unwrap();
            (r.x, r.z)
        }).collect();
        for p in &points[1..] {
            assert!((p.0 - points[0].0).abs() < 1e-6);
            assert!((p.1 - points[0].1).abs() < 1e-6);
        }
    }
}

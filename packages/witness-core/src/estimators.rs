//! estimators.rs — Error Estimators (§4.D)
//!
//! Four interchangeable strategies for bounding an [`IntersectionResult`]'s error,
//! unified behind one [`ErrorEstimator`] capability so the orchestrator never has to
//! branch on which strategy is configured (§9 design note).

use nalgebra::{Matrix2, SymmetricEigen};
use witness_types::{Observation, Point2, Ray, RayChoice};

use crate::error::FusionResult;
use crate::intersector::{least_squares_intersect, IntersectionResult};
use crate::ray::observation_to_ray;

/// A pluggable error-bounding strategy. Implementations never log or perform I/O —
/// fusion is pure, per the concurrency model (§5).
pub trait ErrorEstimator {
    /// Bound the error of `nominal`, the least-squares fusion of `observations`'
    /// center rays. Returns the error radius in blocks, or
    /// [`crate::FusionError::DegenerateObserver`] if an observer sits exactly on one
    /// of the non-center hint-square corners this strategy needs to probe.
    fn error_radius(&self, observations: &[Observation], nominal: Point2) -> FusionResult<f64>;
}

/// Re-solve 4.C with one ray's observer replaced by its corner-choice ray. An
/// observer positioned exactly on that corner is a normal (if unlucky) input, not
/// malformed data, so this propagates the failure rather than panicking — the
/// corner-enumerating estimators below bubble it up via `?`.
fn corner_ray(obs: &Observation, corner: u8) -> FusionResult<Ray> {
    observation_to_ray(obs, RayChoice::Corner(corner))
}

// ── 1. Exhaustive-corner: O(4^n) ───────────────────────────────────────────────

/// Enumerate every corner assignment over all n observations; the error radius is
/// the worst-case displacement of any assignment's fused point from the nominal
/// estimate. Authoritative but exponential — intended for n <= 6.
pub struct ExhaustiveCornerEstimator;

impl ErrorEstimator for ExhaustiveCornerEstimator {
    fn error_radius(&self, observations: &[Observation], nominal: Point2) -> FusionResult<f64> {
        let n = observations.len();
        if n == 0 {
            return Ok(0.0);
        }
        let mut max_dist = 0.0_f64;
        for assignment in 0..(4u32.pow(n as u32)) {
            let mut rays = Vec::with_capacity(n);
            for (i, obs) in observations.iter().enumerate() {
                let corner = ((assignment / 4u32.pow(i as u32)) % 4) as u8;
                rays.push(corner_ray(obs, corner)?);
            }
            if let Ok(IntersectionResult { point, ill_conditioned: false }) = least_squares_intersect(&rays) {
                max_dist = max_dist.max(nominal.dist(&point));
            }
        }
        Ok(max_dist)
    }
}

// ── 2. Optimized-corner: O(2^n) ────────────────────────────────────────────────

/// For each observation, only the two corners realizing `theta_min`/`theta_max` can
/// widen the wedge — the other two are interior to it and never extremize the fused
/// point. Enumerating just those halves the base of the exponent versus exhaustive.
pub struct OptimizedCornerEstimator;

impl ErrorEstimator for OptimizedCornerEstimator {
    fn error_radius(&self, observations: &[Observation], nominal: Point2) -> FusionResult<f64> {
        let n = observations.len();
        if n == 0 {
            return Ok(0.0);
        }

        let extremal_corners: Vec<[u8; 2]> = observations
            .iter()
            .map(|obs| extremal_corner_pair(obs))
            .collect();

        let mut max_dist = 0.0_f64;
        for assignment in 0..(1u32 << n) {
            let mut rays = Vec::with_capacity(n);
            for (i, obs) in observations.iter().enumerate() {
                let bit = (assignment >> i) & 1;
                rays.push(corner_ray(obs, extremal_corners[i][bit as usize])?);
            }
            if let Ok(IntersectionResult { point, ill_conditioned: false }) = least_squares_intersect(&rays) {
                max_dist = max_dist.max(nominal.dist(&point));
            }
        }
        Ok(max_dist)
    }
}

/// The two unit-square corners realizing theta_min and theta_max as seen from this
/// observer (the wedge's extreme bearings).
fn extremal_corner_pair(obs: &Observation) -> [u8; 2] {
    let mut best_min = (0u8, f64::INFINITY);
    let mut best_max = (0u8, f64::NEG_INFINITY);
    let mut angles = [0.0_f64; 4];
    for k in 0..4u8 {
        let c = obs.hint.unit_square_corner(k);
        let d = c.sub(&obs.observer_pos);
        angles[k as usize] = d.z.atan2(d.x);
    }
    // Unwrap relative to corner 0 so min/max are meaningful even across the branch cut.
    let tau = std::f64::consts::TAU;
    for k in 1..4usize {
        while angles[k] - angles[0] > std::f64::consts::PI {
            angles[k] -= tau;
        }
        while angles[k] - angles[0] < -std::f64::consts::PI {
            angles[k] += tau;
        }
    }
    for (k, &a) in angles.iter().enumerate() {
        if a < best_min.1 {
            best_min = (k as u8, a);
        }
        if a > best_max.1 {
            best_max = (k as u8, a);
        }
    }
    [best_min.0, best_max.0]
}

// ── 3. Linear propagation: O(n) ────────────────────────────────────────────────

const FINITE_DIFF_DELTA: f64 = 1e-3;

/// Finite-difference Jacobians `dE/drx`, `dE/drz` per observation, bounding the
/// radius as the sum of absolute partials scaled by the half-width (0.5) of the
/// hint's unit-square uncertainty. Cheap and correct to first order; overestimates
/// near-singular geometry.
pub struct LinearPropagationEstimator;

impl ErrorEstimator for LinearPropagationEstimator {
    fn error_radius(&self, observations: &[Observation], nominal: Point2) -> FusionResult<f64> {
        let base_rays: Vec<Ray> = observations
            .iter()
            .map(|o| observation_to_ray(o, RayChoice::Center).expect("validated upstream"))
            .collect();

        let mut sum_x = 0.0_f64;
        let mut sum_z = 0.0_f64;

        for (i, obs) in observations.iter().enumerate() {
            let (dpdrx, dpdrz) = finite_diff_jacobian(&base_rays, i, obs);
            sum_x += dpdrx.norm() * 0.5;
            sum_z += dpdrz.norm() * 0.5;
        }
        let _ = nominal; // radius is a propagated bound, independent of the nominal point itself
        Ok(Point2::new(sum_x, sum_z).norm())
    }
}

fn finite_diff_jacobian(base_rays: &[Ray], index: usize, obs: &Observation) -> (Point2, Point2) {
    let solve_with = |perturb_x: f64, perturb_z: f64| -> Point2 {
        // Perturb the continuous representative point directly rather than the
        // integer hint, so FINITE_DIFF_DELTA can be sub-block.
        let mut rays = base_rays.to_vec();
        let q = Point2::new(
            obs.hint.center().x + perturb_x,
            obs.hint.center().z + perturb_z,
        );
        if let Some(dir) = q.sub(&obs.observer_pos).normalized() {
            rays[index] = Ray { origin: obs.observer_pos, direction: dir };
        }
        least_squares_intersect(&rays).map(|r| r.point).unwrap_or(obs.observer_pos)
    };

    let plus_x = solve_with(FINITE_DIFF_DELTA, 0.0);
    let minus_x = solve_with(-FINITE_DIFF_DELTA, 0.0);
    let plus_z = solve_with(0.0, FINITE_DIFF_DELTA);
    let minus_z = solve_with(0.0, -FINITE_DIFF_DELTA);

    let dpdrx = Point2::new(
        (plus_x.x - minus_x.x) / (2.0 * FINITE_DIFF_DELTA),
        (plus_x.z - minus_x.z) / (2.0 * FINITE_DIFF_DELTA),
    );
    let dpdrz = Point2::new(
        (plus_z.x - minus_z.x) / (2.0 * FINITE_DIFF_DELTA),
        (plus_z.z - minus_z.z) / (2.0 * FINITE_DIFF_DELTA),
    );
    (dpdrx, dpdrz)
}

// ── 4. Covariance propagation: O(n) ────────────────────────────────────────────

/// Assumes each ray's measurement carries variance `sigma^2` orthogonal to its
/// direction; propagates `Cov(E) ~= sigma^2 * A^-1` where `A` is the same normal
/// matrix built in §4.C, and returns the 1-sigma radius `sqrt(lambda_max(Cov))`.
pub struct CovarianceEstimator {
    pub sigma: f64,
}

impl ErrorEstimator for CovarianceEstimator {
    fn error_radius(&self, observations: &[Observation], nominal: Point2) -> FusionResult<f64> {
        let _ = nominal;
        let rays: Vec<Ray> = observations
            .iter()
            .map(|o| observation_to_ray(o, RayChoice::Center).expect("validated upstream"))
            .collect();

        let mut a00 = 0.0_f64;
        let mut a01 = 0.0_f64;
        let mut a11 = 0.0_f64;
        for ray in &rays {
            let (dx, dz) = (ray.direction.x, ray.direction.z);
            a00 += 1.0 - dx * dx;
            a01 += -dx * dz;
            a11 += 1.0 - dz * dz;
        }

        let det = a00 * a11 - a01 * a01;
        if det.abs() < 1e-8 {
            return Ok(f64::INFINITY);
        }

        // A^-1 (2x2 symmetric), then Cov = sigma^2 * A^-1.
        let inv00 = a11 / det;
        let inv01 = -a01 / det;
        let inv11 = a00 / det;
        let sigma_sq = self.sigma * self.sigma;
        let cov = Matrix2::new(sigma_sq * inv00, sigma_sq * inv01, sigma_sq * inv01, sigma_sq * inv11);

        let eigenvalues = SymmetricEigen::new(cov).eigenvalues;
        let lambda_max = eigenvalues[0].max(eigenvalues[1]);
        Ok(lambda_max.max(0.0).sqrt())
    }
}

/// Dispatch to the configured strategy and produce the final (point, radius) pair —
/// the single `estimate()`-shaped capability the orchestrator calls without ever
/// branching on which strategy is active.
pub fn bound_error(estimator: &dyn ErrorEstimator, observations: &[Observation], nominal: Point2) -> FusionResult<f64> {
    estimator.error_radius(observations, nominal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use witness_types::Hint;

    fn obs(id: &str, ox: f64, oz: f64, rx: i32, rz: i32) -> Observation {
        Observation {
            observer_id: id.into(),
            observer_pos: Point2::new(ox, oz),
            observer_y: 64.0,
            hint: Hint::new(rx, rz),
            hint_y: 64,
            observed_at_ms: 0,
        }
    }

    fn symmetric_layout() -> Vec<Observation> {
        vec![
            obs("a", -80_000.0, -80_000.0, 3124, -2498),
            obs("b", -80_000.0, 80_000.0, 3100, -2502),
            obs("c", 80_000.0, -80_000.0, 3150, -2520),
            obs("d", 80_000.0, 80_000.0, 3140, -2480),
        ]
    }

    fn nominal_of(observations: &[Observation]) -> Point2 {
        let rays: Vec<Ray> = observations.iter().map(|o| observation_to_ray(o, RayChoice::Center).unwrap()).collect();
        least_squares_intersect(&rays).unwrap().point
    }

    #[test]
    fn linear_and_exhaustive_agree_within_tolerance_on_well_conditioned_layout() {
        let observations = symmetric_layout();
        let nominal = nominal_of(&observations);
        let linear = LinearPropagationEstimator.error_radius(&observations, nominal).unwrap();
        let exhaustive = ExhaustiveCornerEstimator.error_radius(&observations, nominal).unwrap();
        assert!(linear <= exhaustive * 1.5 + 0.5, "linear={linear} exhaustive={exhaustive}");
    }

    #[test]
    fn optimized_corner_matches_exhaustive_corner_on_small_n() {
        let observations = symmetric_layout();
        let nominal = nominal_of(&observations);
        let exhaustive = ExhaustiveCornerEstimator.error_radius(&observations, nominal).unwrap();
        let optimized = OptimizedCornerEstimator.error_radius(&observations, nominal).unwrap();
        assert!((exhaustive - optimized).abs() < 1e-6, "exhaustive={exhaustive} optimized={optimized}");
    }

    #[test]
    fn covariance_radius_is_finite_for_well_conditioned_layout() {
        let observations = symmetric_layout();
        let nominal = nominal_of(&observations);
        let radius = CovarianceEstimator { sigma: 1.0 }.error_radius(&observations, nominal).unwrap();
        assert!(radius.is_finite() && radius > 0.0);
    }

    #[test]
    fn monotone_information_more_observations_does_not_increase_optimized_radius() {
        let mut observations = symmetric_layout();
        let nominal_before = nominal_of(&observations);
        let radius_before = OptimizedCornerEstimator.error_radius(&observations, nominal_before).unwrap();

        observations.push(obs("e", 0.0, -120_000.0, 0, -3200));
        let nominal_after = nominal_of(&observations);
        let radius_after = OptimizedCornerEstimator.error_radius(&observations, nominal_after).unwrap();

        assert!(radius_after <= radius_before + 1e-6, "before={radius_before} after={radius_after}");
    }

    /// An observer sitting exactly on a non-center hint-square corner is a valid,
    /// if unlucky, input — the corner-enumerating estimators must report it via
    /// `Err`, never panic.
    #[test]
    fn observer_on_a_corner_is_reported_not_panicked() {
        let observations = vec![
            obs("a", 100.0, 100.0, 100, 100), // observer exactly on corner k=0
            obs("b", -100.0, -100.0, -50, -50),
        ];
        let nominal = Point2::new(50.0, 50.0);
        assert!(ExhaustiveCornerEstimator.error_radius(&observations, nominal).is_err());
        assert!(OptimizedCornerEstimator.error_radius(&observations, nominal).is_err());
    }
}

//! intersector.rs — Least-Squares Intersector (§4.C)
//!
//! Finds the point closest (in the least-squares sense) to a set of rays, by solving
//! the 2x2 normal-equations system `A*E = b` with
//!   A = sum_i (I - d_i d_i^T)
//!   b = sum_i (I - d_i d_i^T) o_i
//! Same closed-form 2x2 solve as a multilateration normal-equation step (Cramer's
//! rule on a 2x2 symmetric positive-semidefinite matrix), just built from ray
//! projectors instead of range-measurement Jacobians.

use crate::error::{FusionError, FusionResult};
use witness_types::{Point2, Ray};

const ILL_CONDITIONED_DET_THRESHOLD: f64 = 1e-8;

/// Outcome of a least-squares intersection.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionResult {
    pub point: Point2,
    /// True if `|det A|` fell below the ill-conditioning threshold and `point` is
    /// the centroid of ray origins rather than a true least-squares solution.
    pub ill_conditioned: bool,
}

/// Solve the overdetermined "closest point to n rays" problem.
///
/// Returns [`FusionError::InsufficientObservations`] for fewer than 2 rays. Falls
/// back to the centroid of ray origins (flagged `ill_conditioned`) when `|det A|` is
/// below `1e-8`, i.e. the rays are colinear or near-parallel.
///
/// The result is invariant to the order of `rays`, translation-equivariant, and
/// scale-equivariant: all three follow directly from every term in `A` and `b` being
/// built independently per ray and summed.
pub fn least_squares_intersect(rays: &[Ray]) -> FusionResult<IntersectionResult> {
    if rays.len() < 2 {
        return Err(FusionError::InsufficientObservations);
    }

    // A = sum (I - d d^T), b = sum (I - d d^T) o
    let mut a00 = 0.0_f64;
    let mut a01 = 0.0_f64;
    let mut a11 = 0.0_f64;
    let mut b0 = 0.0_f64;
    let mut b1 = 0.0_f64;

    for ray in rays {
        let (dx, dz) = (ray.direction.x, ray.direction.z);
        // I - d d^T, a 2x2 symmetric projector onto the line orthogonal to d.
        let p00 = 1.0 - dx * dx;
        let p01 = -dx * dz;
        let p11 = 1.0 - dz * dz;

        a00 += p00;
        a01 += p01;
        a11 += p11;

        b0 += p00 * ray.origin.x + p01 * ray.origin.z;
        b1 += p01 * ray.origin.x + p11 * ray.origin.z;
    }

    let det = a00 * a11 - a01 * a01;

    if det.abs() < ILL_CONDITIONED_DET_THRESHOLD {
        let n = rays.len() as f64;
        let cx = rays.iter().map(|r| r.origin.x).sum::<f64>() / n;
        let cz = rays.iter().map(|r| r.origin.z).sum::<f64>() / n;
        return Ok(IntersectionResult { point: Point2::new(cx, cz), ill_conditioned: true });
    }

    // Cramer's rule for the 2x2 symmetric system [[a00,a01],[a01,a11]] * [x,z] = [b0,b1].
    let x = (b0 * a11 - b1 * a01) / det;
    let z = (a00 * b1 - a01 * b0) / det;

    Ok(IntersectionResult { point: Point2::new(x, z), ill_conditioned: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(ox: f64, oz: f64, dx: f64, dz: f64) -> Ray {
        let n = (dx * dx + dz * dz).sqrt();
        Ray { origin: Point2::new(ox, oz), direction: Point2::new(dx / n, dz / n) }
    }

    #[test]
    fn two_perpendicular_rays_intersect_exactly() {
        let rays = vec![ray(0.0, 0.0, 1.0, 0.0), ray(0.0, 10.0, 0.0, -1.0)];
        let result = least_squares_intersect(&rays).unwrap();
        assert!(!result.ill_conditioned);
        assert!((result.point.x - 0.0).abs() < 1e-6);
        assert!((result.point.z - 0.0).abs() < 1e-6);
    }

    #[test]
    fn insufficient_rays_rejected() {
        let rays = vec![ray(0.0, 0.0, 1.0, 0.0)];
        assert!(matches!(least_squares_intersect(&rays), Err(FusionError::InsufficientObservations)));
    }

    #[test]
    fn colinear_rays_are_ill_conditioned() {
        let rays = vec![ray(0.0, 0.0, 1.0, 0.0), ray(1000.0, 0.0, 1.0, 0.0)];
        let result = least_squares_intersect(&rays).unwrap();
        assert!(result.ill_conditioned);
    }

    #[test]
    fn order_invariance() {
        let rays_a = vec![ray(0.0, 0.0, 1.0, 1.0), ray(10.0, 0.0, -1.0, 1.0), ray(0.0, 10.0, 1.0, -1.0)];
        let mut rays_b = rays_a.clone();
        rays_b.reverse();
        let ra = least_squares_intersect(&rays_a).unwrap();
        let rb = least_squares_intersect(&rays_b).unwrap();
        assert!((ra.point.x - rb.point.x).abs() < 1e-9);
        assert!((ra.point.z - rb.point.z).abs() < 1e-9);
    }

    #[test]
    fn translation_equivariance() {
        let rays = vec![ray(0.0, 0.0, 1.0, 1.0), ray(10.0, 0.0, -1.0, 1.0), ray(0.0, 10.0, 1.0, -1.0)];
        let shift = Point2::new(500.0, -250.0);
        let shifted: Vec<Ray> = rays.iter().map(|r| Ray { origin: r.origin.add(&shift), direction: r.direction }).collect();

        let r1 = least_squares_intersect(&rays).unwrap();
        let r2 = least_squares_intersect(&shifted).unwrap();
        assert!((r2.point.x - (r1.point.x + shift.x)).abs() < 1e-6);
        assert!((r2.point.z - (r1.point.z + shift.z)).abs() < 1e-6);
    }
}

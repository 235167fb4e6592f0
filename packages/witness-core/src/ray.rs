//! ray.rs — Ray Model (§4.B)
//!
//! Converts a single [`Observation`] into a representative [`Ray`] and into the full
//! angular uncertainty [`Wedge`] spanned by its hint's unit square, plus the pair of
//! bounding [`HalfPlane`]s the Feasible-Region Solver (§4.E) consumes.

use crate::error::{FusionError, FusionResult};
use witness_types::{HalfPlane, Observation, Point2, Ray, RayChoice, Wedge};

/// Build a ray from an observation through a chosen representative point in its
/// hint's unit square. The nominal choice for fusion is [`RayChoice::Center`].
pub fn observation_to_ray(obs: &Observation, choice: RayChoice) -> FusionResult<Ray> {
    let q = match choice {
        RayChoice::Center => obs.hint.center(),
        RayChoice::Corner(k) => obs.hint.unit_square_corner(k),
    };
    let direction = q
        .sub(&obs.observer_pos)
        .normalized()
        .ok_or(FusionError::DegenerateObserver)?;
    Ok(Ray { origin: obs.observer_pos, direction })
}

/// Compute the angular uncertainty wedge for an observation: the interval of
/// bearings from `observer_pos` that touch some point of the hint's unit square.
///
/// Unwraps the interval across the +/-pi discontinuity rather than taking a raw
/// `min`/`max` of the four corner angles, which would silently produce the wrong
/// (reflex) interval whenever the square straddles the branch cut (§9 design note:
/// several source variants have this bug; this implementation must not repeat it).
pub fn observation_to_wedge(obs: &Observation) -> FusionResult<Wedge> {
    let corners: Vec<Point2> = (0..4u8).map(|k| obs.hint.unit_square_corner(k)).collect();

    if corners.iter().any(|c| (c.x - obs.observer_pos.x).abs() < 1e-12 && (c.z - obs.observer_pos.z).abs() < 1e-12) {
        return Err(FusionError::DegenerateObserver);
    }

    let mut angles: Vec<f64> = corners
        .iter()
        .map(|c| {
            let d = c.sub(&obs.observer_pos);
            d.z.atan2(d.x)
        })
        .collect();

    unwrap_angles(&mut angles);

    let theta_min = angles.iter().cloned().fold(f64::INFINITY, f64::min);
    let theta_max = angles.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if theta_max - theta_min >= std::f64::consts::PI {
        return Err(FusionError::DegenerateObserver);
    }

    Ok(Wedge { observer_pos: obs.observer_pos, theta_min, theta_max })
}

/// Whether this observation's four corner bearings straddle the +/-pi branch cut,
/// i.e. whether [`observation_to_wedge`] actually had to unwrap anything. Exposed so
/// callers can raise [`witness_types::BatchFlag::AngleWrapDetected`] for diagnostics.
pub fn crosses_branch_cut(obs: &Observation) -> FusionResult<bool> {
    let corners: Vec<Point2> = (0..4u8).map(|k| obs.hint.unit_square_corner(k)).collect();
    if corners.iter().any(|c| (c.x - obs.observer_pos.x).abs() < 1e-12 && (c.z - obs.observer_pos.z).abs() < 1e-12) {
        return Err(FusionError::DegenerateObserver);
    }
    let raw_angles: Vec<f64> = corners
        .iter()
        .map(|c| {
            let d = c.sub(&obs.observer_pos);
            d.z.atan2(d.x)
        })
        .collect();
    let raw_min = raw_angles.iter().cloned().fold(f64::INFINITY, f64::min);
    let raw_max = raw_angles.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Ok(raw_max - raw_min >= std::f64::consts::PI)
}

/// Rotate each angle after the first into the branch nearest its predecessor so the
/// set becomes contiguous, removing any apparent span across +/-pi.
fn unwrap_angles(angles: &mut [f64]) {
    let tau = std::f64::consts::TAU;
    for i in 1..angles.len() {
        let mut a = angles[i];
        while a - angles[i - 1] > std::f64::consts::PI {
            a -= tau;
        }
        while a - angles[i - 1] < -std::f64::consts::PI {
            a += tau;
        }
        angles[i] = a;
    }
}

/// Derive the two bounding half-planes of a wedge. Each line passes through the
/// observer at one extreme bearing; orientation is chosen so a point at the wedge's
/// middle angle satisfies both (i.e. lies on the feasible `<= c` side of each).
pub fn wedge_to_half_planes(wedge: &Wedge) -> [HalfPlane; 2] {
    [bounding_line(wedge, wedge.theta_min), bounding_line(wedge, wedge.theta_max)]
}

fn bounding_line(wedge: &Wedge, theta: f64) -> HalfPlane {
    let (sin_t, cos_t) = theta.sin_cos();
    let (a, b) = (-sin_t, cos_t);
    let c = a * wedge.observer_pos.x + b * wedge.observer_pos.z;
    let mut plane = HalfPlane { a, b, c };

    const R: f64 = 1e6;
    let mid = wedge.mid_angle();
    let probe = Point2::new(
        wedge.observer_pos.x + R * mid.cos(),
        wedge.observer_pos.z + R * mid.sin(),
    );
    if plane.signed_excess(&probe) > 0.0 {
        plane.a = -plane.a;
        plane.b = -plane.b;
        plane.c = -plane.c;
    }
    plane
}

//! Property-based tests for the geometric invariants in the fusion pipeline (§8).

use proptest::prelude::*;
use witness_core::ray::{observation_to_wedge, wedge_to_half_planes};
use witness_core::region::solve_feasible_region;
use witness_types::{Hint, Observation, Point2};

fn arb_observer() -> impl Strategy<Value = (f64, f64, i32, i32)> {
    (-500.0..500.0f64, -500.0..500.0f64, -200..200i32, -200..200i32)
}

fn make_observation(ox: f64, oz: f64, rx: i32, rz: i32) -> Observation {
    Observation {
        observer_id: "p".into(),
        observer_pos: Point2::new(ox, oz),
        observer_y: 64.0,
        hint: Hint::new(rx, rz),
        hint_y: 64,
        observed_at_ms: 0,
    }
}

proptest! {
    /// Wedge containment: every corner of the hint's unit square lies within the
    /// wedge's bearing interval (up to floating-point tolerance), for any observer
    /// outside the square.
    #[test]
    fn wedge_contains_every_corner_bearing((ox, oz, rx, rz) in arb_observer()) {
        let obs = make_observation(ox, oz, rx, rz);
        if let Ok(wedge) = observation_to_wedge(&obs) {
            for k in 0..4u8 {
                let corner = obs.hint.unit_square_corner(k);
                let d = corner.sub(&obs.observer_pos);
                let mut theta = d.z.atan2(d.x);
                let tau = std::f64::consts::TAU;
                while theta < wedge.theta_min - 1e-6 {
                    theta += tau;
                }
                while theta > wedge.theta_max + 1e-6 {
                    theta -= tau;
                }
                prop_assert!(theta >= wedge.theta_min - 1e-6 && theta <= wedge.theta_max + 1e-6);
            }
        }
    }

    /// Feasible-polygon convexity: whatever the Sutherland-Hodgman clip returns for
    /// two independent observers' half-planes, it is either empty or has non-negative
    /// signed area (a convex polygon wound counter-clockwise, or degenerate to a point
    /// or segment).
    #[test]
    fn feasible_region_from_two_wedges_is_convex_or_empty(
        (ox1, oz1, rx1, rz1) in arb_observer(),
        (ox2, oz2, rx2, rz2) in arb_observer(),
    ) {
        let a = make_observation(ox1, oz1, rx1, rz1);
        let b = make_observation(ox2, oz2, rx2, rz2);
        let mut planes = Vec::new();
        if let Ok(wedge) = observation_to_wedge(&a) {
            planes.extend(wedge_to_half_planes(&wedge));
        }
        if let Ok(wedge) = observation_to_wedge(&b) {
            planes.extend(wedge_to_half_planes(&wedge));
        }
        prop_assume!(!planes.is_empty());
        let region = solve_feasible_region(&planes);
        prop_assert!(region.is_empty() || region.signed_area() >= -1e-6);
    }
}

//! hint.rs — Hint Reconstruction (§4.A)
//!
//! Given the event's true position, the observer's position, and the server's view
//! distance, derive the integer hint the server would have broadcast. Used only by
//! the simulator and backfill tooling to synthesize test observations with a known
//! ground truth — the live pipeline consumes hints, it never produces them.

use witness_types::{Hint, HintKind, Point2};

/// Reconstruct the hint the server would emit for an event at `event` as seen by an
/// observer at `observer`, given the server's `view_distance` (blocks).
///
/// - Within view distance: the hint is `(floor(ex), floor(ez))`.
/// - Beyond view distance: the event is projected onto the view-distance circle
///   around the observer, then each coordinate is truncated toward zero (distinct
///   from floor for negative coordinates: `-3.7 -> -3`, not `-4`). This matches the
///   server's integer cast of the projected point, not a floor.
pub fn reconstruct_hint(event: Point2, observer: Point2, view_distance: f64) -> (Hint, HintKind) {
    let delta = event.sub(&observer);
    let dist_sq = delta.dot(&delta);
    let view_distance_sq = view_distance * view_distance;

    if dist_sq <= view_distance_sq {
        (Hint::new(event.x.floor() as i32, event.z.floor() as i32), HintKind::WithinViewDistance)
    } else {
        let dist = dist_sq.sqrt();
        let unit = delta.scale(1.0 / dist);
        let projected = observer.add(&unit.scale(view_distance));
        (
            Hint::new(truncate_toward_zero(projected.x), truncate_toward_zero(projected.z)),
            HintKind::ProjectedToHorizon,
        )
    }
}

/// `-3.7 -> -3`, `3.7 -> 3`. Distinct from `f64::floor`, which would send `-3.7 -> -4`.
fn truncate_toward_zero(v: f64) -> i32 {
    v.trunc() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_view_distance_floors() {
        let (hint, kind) = reconstruct_hint(Point2::new(3.7, -3.7), Point2::new(0.0, 0.0), 160.0);
        assert_eq!(hint.rx, 3);
        assert_eq!(hint.rz, -4);
        assert_eq!(kind, HintKind::WithinViewDistance);
    }

    #[test]
    fn beyond_view_distance_truncates_toward_zero() {
        // Event due "south-west-ish" far beyond view distance; projected coordinates
        // should be negative and truncated, never floored (which would shift by one
        // on the axis where the projected coordinate is negative).
        let observer = Point2::new(0.0, 0.0);
        let event = Point2::new(-1_000_000.0, -1_000_000.0);
        let (hint, kind) = reconstruct_hint(event, observer, 160.0);
        assert_eq!(kind, HintKind::ProjectedToHorizon);
        // Projected point lies on the circle of radius 160 in the same direction,
        // i.e. roughly (-113.1, -113.1): truncation must not push it to -114.
        assert!(hint.rx > -160 && hint.rx < 0);
        assert!(hint.rz > -160 && hint.rz < 0);
        let dist_sq = (hint.rx as f64).powi(2) + (hint.rz as f64).powi(2);
        assert!(dist_sq <= 160.0 * 160.0 + 4.0);
    }

    #[test]
    fn exactly_on_horizon_is_within_view_distance() {
        let (_, kind) = reconstruct_hint(Point2::new(160.0, 0.0), Point2::new(0.0, 0.0), 160.0);
        assert_eq!(kind, HintKind::WithinViewDistance);
    }
}

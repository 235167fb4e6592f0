//! region.rs — Feasible-Region Solver (§4.E)
//!
//! Clips the unbounded plane down to the intersection of every observation's two
//! bounding half-planes (Sutherland-Hodgman), producing the convex polygon of points
//! consistent with every wedge simultaneously. Also offers the non-convex "at least
//! two observers agree" alternative region for diagnostic use.

use witness_types::{HalfPlane, Point2, Polygon};

/// Half the world's horizontal extent is generously covered at 1e9 blocks; the
/// clip's starting polygon must exceed any wedge's bounding lines by a wide margin.
const WORLD_BOUND: f64 = 1e9;

const AREA_EPSILON: f64 = 1e-9;
const EDGE_EPSILON: f64 = 1e-12;

fn bounding_square() -> Polygon {
    Polygon {
        vertices: vec![
            Point2::new(-WORLD_BOUND, -WORLD_BOUND),
            Point2::new(WORLD_BOUND, -WORLD_BOUND),
            Point2::new(WORLD_BOUND, WORLD_BOUND),
            Point2::new(-WORLD_BOUND, WORLD_BOUND),
        ],
    }
}

/// Intersect the plane with every half-plane in `planes`, via repeated
/// Sutherland-Hodgman clipping starting from a square of side `2 * WORLD_BOUND`.
///
/// Returns an empty polygon (no vertices) if the constraints admit no feasible
/// point — e.g. contradictory wedges from faulty observers.
pub fn solve_feasible_region(planes: &[HalfPlane]) -> Polygon {
    let mut polygon = bounding_square();
    for plane in planes {
        polygon = clip(&polygon, plane);
        if polygon.is_empty() {
            break;
        }
    }
    if polygon.signed_area().abs() < AREA_EPSILON {
        Polygon::default()
    } else {
        polygon
    }
}

/// One Sutherland-Hodgman clip pass of `subject` against a single `plane`.
fn clip(subject: &Polygon, plane: &HalfPlane) -> Polygon {
    if subject.vertices.is_empty() {
        return Polygon::default();
    }

    let mut output = Vec::with_capacity(subject.vertices.len() + 1);
    let n = subject.vertices.len();

    for i in 0..n {
        let current = subject.vertices[i];
        let previous = subject.vertices[(i + n - 1) % n];

        let current_inside = plane.contains(&current, EDGE_EPSILON);
        let previous_inside = plane.contains(&previous, EDGE_EPSILON);

        if current_inside {
            if !previous_inside {
                if let Some(v) = intersect_edge(previous, current, plane) {
                    output.push(v);
                }
            }
            output.push(current);
        } else if previous_inside {
            if let Some(v) = intersect_edge(previous, current, plane) {
                output.push(v);
            }
        }
    }

    Polygon { vertices: output }
}

/// Point where segment `a -> b` crosses `plane`'s boundary line, or `None` if the
/// edge is near-tangent to the boundary (denominator under `EDGE_EPSILON`) — such an
/// edge is skipped rather than interpolated, per the tangent-handling rule (§4.E).
fn intersect_edge(a: Point2, b: Point2, plane: &HalfPlane) -> Option<Point2> {
    let da = plane.signed_excess(&a);
    let db = plane.signed_excess(&b);
    let denom = da - db;
    if denom.abs() < EDGE_EPSILON {
        return None;
    }
    let t = da / denom;
    Some(Point2::new(a.x + t * (b.x - a.x), a.z + t * (b.z - a.z)))
}

/// The non-convex diagnostic alternative: the union of every pairwise feasible
/// region formed by two or more observers' wedges agreeing, rather than requiring
/// unanimous agreement. Not used by the live pipeline — intended for the test
/// harness to visualize how much a single faulty wedge shrinks the strict region.
pub fn solve_pairwise_agreement_regions(planes_per_observer: &[[HalfPlane; 2]]) -> Vec<Polygon> {
    let n = planes_per_observer.len();
    let mut regions = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let combined = [planes_per_observer[i][0], planes_per_observer[i][1], planes_per_observer[j][0], planes_per_observer[j][1]];
            let region = solve_feasible_region(&combined);
            if !region.is_empty() {
                regions.push(region);
            }
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(a: f64, b: f64, c: f64) -> HalfPlane {
        HalfPlane { a, b, c }
    }

    #[test]
    fn unbounded_plane_clips_to_a_unit_square() {
        // x <= 1, -x <= 0 (x >= 0), z <= 1, -z <= 0 (z >= 0)
        let planes = vec![plane(1.0, 0.0, 1.0), plane(-1.0, 0.0, 0.0), plane(0.0, 1.0, 1.0), plane(0.0, -1.0, 0.0)];
        let region = solve_feasible_region(&planes);
        assert!(!region.is_empty());
        assert!((region.signed_area() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn contradictory_half_planes_yield_empty_region() {
        // x <= 0 and x >= 10 simultaneously.
        let planes = vec![plane(1.0, 0.0, 0.0), plane(-1.0, 0.0, -10.0)];
        let region = solve_feasible_region(&planes);
        assert!(region.is_empty());
    }

    #[test]
    fn resulting_polygon_is_convex_with_positive_area() {
        let planes = vec![
            plane(1.0, 0.0, 5.0),
            plane(-1.0, 0.0, 5.0),
            plane(0.0, 1.0, 5.0),
            plane(0.0, -1.0, 5.0),
            plane(1.0, 1.0, 8.0),
        ];
        let region = solve_feasible_region(&planes);
        assert!(!region.is_empty());
        assert!(region.signed_area() > 0.0);
    }

    #[test]
    fn single_half_plane_leaves_region_unbounded_but_nonempty() {
        let planes = vec![plane(1.0, 0.0, 0.0)];
        let region = solve_feasible_region(&planes);
        assert!(!region.is_empty());
    }
}

//! # witness-types
//!
//! Shared data model for the wither-spawn triangulation pipeline.
//!
//! These types cross every module boundary in the system:
//! - `witness-core`: the geometric-inference subsystem (rays, wedges, fusion)
//! - `witness-sim`: synthetic observer generation and the offline test harness
//! - `orchestrator`: the live pipeline (Coincidence Gate, sinks)
//!
//! ## Coordinate conventions
//!
//! - **World frame**: the game's block coordinate grid. `x` = East/West, `z` = North/South.
//!   `y` (vertical) is carried through as metadata only — this system never reasons about it.
//! - **Hint**: an integer `(rx, rz)` the server broadcasts in place of the event's true
//!   position, floored or truncated toward zero depending on whether the event was inside
//!   the observer's view distance (see [`HintKind`]).

use serde::{Deserialize, Serialize};

// ── 2-D point / vector ────────────────────────────────────────────────────────

/// A point or vector in the horizontal (x, z) plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub z: f64,
}

impl Point2 {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, z: 0.0 }
    }

    pub fn sub(&self, other: &Point2) -> Point2 {
        Point2::new(self.x - other.x, self.z - other.z)
    }

    pub fn add(&self, other: &Point2) -> Point2 {
        Point2::new(self.x + other.x, self.z + other.z)
    }

    pub fn scale(&self, s: f64) -> Point2 {
        Point2::new(self.x * s, self.z * s)
    }

    pub fn dot(&self, other: &Point2) -> f64 {
        self.x * other.x + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn dist(&self, other: &Point2) -> f64 {
        self.sub(other).norm()
    }

    /// Unit vector in the same direction, or `None` if this is the zero vector.
    pub fn normalized(&self) -> Option<Point2> {
        let n = self.norm();
        if n < 1e-12 {
            None
        } else {
            Some(self.scale(1.0 / n))
        }
    }
}

// ── Hint ──────────────────────────────────────────────────────────────────────

/// The integer 2-D block coordinate the server emits alongside a spawn event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub rx: i32,
    pub rz: i32,
}

impl Hint {
    pub fn new(rx: i32, rz: i32) -> Self {
        Self { rx, rz }
    }

    /// Corner `k` (0..4) of the half-open unit square `[rx, rx+1) x [rz, rz+1)` this
    /// hint constrains the true projected coordinate to lie within.
    pub fn unit_square_corner(&self, k: u8) -> Point2 {
        let dx = (k & 1) as f64;
        let dz = ((k >> 1) & 1) as f64;
        Point2::new(self.rx as f64 + dx, self.rz as f64 + dz)
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.rx as f64 + 0.5, self.rz as f64 + 0.5)
    }
}

/// Whether a hint was produced as a direct floor (event within view distance) or as a
/// truncate-toward-zero projection onto the view-distance horizon. Carried for
/// diagnostics; fusion treats both identically (§4.A is purely a hint-reconstruction
/// concern, not a fusion-time one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HintKind {
    WithinViewDistance,
    ProjectedToHorizon,
}

// ── Observation ───────────────────────────────────────────────────────────────

/// One observer's report of a single event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub observer_id: String,
    /// Observer position in the horizontal plane.
    pub observer_pos: Point2,
    /// Observer altitude, carried through as metadata only.
    pub observer_y: f64,
    pub hint: Hint,
    /// Event altitude as reported by the protocol client, metadata only.
    pub hint_y: i32,
    pub observed_at_ms: i64,
}

// ── Ray / wedge / half-plane ──────────────────────────────────────────────────

/// A ray from an observer toward a chosen representative point within its hint's
/// unit square.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point2,
    /// Unit direction vector.
    pub direction: Point2,
}

/// Which point within the hint's unit square a [`Ray`] was built through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayChoice {
    Center,
    Corner(u8),
}

/// The angular uncertainty region at one observer: every ray from `observer_pos`
/// through some point in the hint's unit square falls within `[theta_min, theta_max]`.
#[derive(Debug, Clone, Copy)]
pub struct Wedge {
    pub observer_pos: Point2,
    pub theta_min: f64,
    pub theta_max: f64,
}

impl Wedge {
    pub fn mid_angle(&self) -> f64 {
        0.5 * (self.theta_min + self.theta_max)
    }

    pub fn span(&self) -> f64 {
        self.theta_max - self.theta_min
    }
}

/// A half-plane constraint `a*x + b*z <= c`, oriented so the feasible side contains
/// the true event.
#[derive(Debug, Clone, Copy)]
pub struct HalfPlane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl HalfPlane {
    /// `<= 0` (within `tol`) means `pt` is on the feasible side.
    pub fn signed_excess(&self, pt: &Point2) -> f64 {
        self.a * pt.x + self.b * pt.z - self.c
    }

    pub fn contains(&self, pt: &Point2, tol: f64) -> bool {
        self.signed_excess(pt) <= tol
    }
}

/// A convex polygon, vertices in counter-clockwise order.
#[derive(Debug, Clone, Default)]
pub struct Polygon {
    pub vertices: Vec<Point2>,
}

impl Polygon {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Signed area via the shoelace formula; positive for CCW polygons.
    pub fn signed_area(&self) -> f64 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        let mut acc = 0.0;
        for i in 0..self.vertices.len() {
            let p = self.vertices[i];
            let q = self.vertices[(i + 1) % self.vertices.len()];
            acc += p.x * q.z - q.x * p.z;
        }
        acc * 0.5
    }
}

// ── Batch / estimate ──────────────────────────────────────────────────────────

/// A set of observations the Coincidence Gate has attributed to the same underlying
/// event, either because every active observer reported or because the batch window
/// elapsed.
#[derive(Debug, Clone)]
pub struct ObservationBatch {
    pub batch_id: u64,
    pub observations: Vec<Observation>,
    pub first_at_ms: i64,
}

impl ObservationBatch {
    pub fn contributor_ids(&self) -> Vec<&str> {
        self.observations.iter().map(|o| o.observer_id.as_str()).collect()
    }
}

/// Flags attached to an [`EventEstimate`] describing degraded or noteworthy
/// conditions encountered while producing it. Mirrors the recoverable error kinds in
/// §7 — everything except `InsufficientObservations`, which prevents an estimate
/// from being produced at all and is reported as a hard error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchFlag {
    IllConditioned,
    EmptyFeasibleRegion,
    EstimatorDegraded,
    AngleWrapDetected,
}

/// The fused result of one observation batch: a point estimate with an error bound,
/// never mutated after construction.
#[derive(Debug, Clone)]
pub struct EventEstimate {
    pub x: f64,
    pub z: f64,
    pub error_radius: f64,
    pub feasible_region: Option<Polygon>,
    pub contributing_observations: Vec<Observation>,
    pub flags: Vec<BatchFlag>,
}

impl EventEstimate {
    pub fn has_flag(&self, flag: BatchFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.z)
    }

    /// The event's world-y, derived by averaging `hint_y` across the contributing
    /// observations — there's no estimator for vertical position, only this.
    pub fn average_y(&self) -> f64 {
        if self.contributing_observations.is_empty() {
            return 0.0;
        }
        self.contributing_observations.iter().map(|o| o.hint_y as f64).sum::<f64>()
            / self.contributing_observations.len() as f64
    }
}

// ── Estimator selection ────────────────────────────────────────────────────────

/// Which error-bounding strategy (§4.D) to run. Selected at configuration time and
/// passed to a single `estimate(batch) -> EventEstimate` capability — callers never
/// match on this after construction (see design notes on avoiding conditional ladders).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EstimatorKind {
    Exhaustive,
    OptimizedCorner,
    Linear,
    Covariance,
}

impl Default for EstimatorKind {
    fn default() -> Self {
        EstimatorKind::Linear
    }
}

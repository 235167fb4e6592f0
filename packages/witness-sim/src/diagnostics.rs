//! diagnostics.rs — Diagnostic Raster Rendering (§4.N)
//!
//! Renders a PNG per batch: observer origins, each ray extended to the plot bounds,
//! the two wedge-bounding rays, the point estimate, the feasible polygon, and (when
//! known) the ground truth. Opt-in — the live pipeline never calls this; only the
//! offline test harness does, via `--render-dir`.

use plotters::prelude::*;
use witness_core::ray::{observation_to_ray, observation_to_wedge, wedge_to_half_planes};
use witness_types::{EventEstimate, Observation, Point2, RayChoice};

/// Render one batch's geometry to `path`. Silently does nothing useful beyond
/// returning the draw error if the backend can't create the file — the harness logs
/// and continues rather than treating a failed render as a fusion failure.
pub fn render_batch(
    path: &std::path::Path,
    observations: &[Observation],
    estimate: &EventEstimate,
    ground_truth: Option<Point2>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut min_x = estimate.x;
    let mut max_x = estimate.x;
    let mut min_z = estimate.z;
    let mut max_z = estimate.z;
    for obs in observations {
        min_x = min_x.min(obs.observer_pos.x);
        max_x = max_x.max(obs.observer_pos.x);
        min_z = min_z.min(obs.observer_pos.z);
        max_z = max_z.max(obs.observer_pos.z);
    }
    if let Some(gt) = ground_truth {
        min_x = min_x.min(gt.x);
        max_x = max_x.max(gt.x);
        min_z = min_z.min(gt.z);
        max_z = max_z.max(gt.z);
    }
    let pad = ((max_x - min_x).max(max_z - min_z) * 0.15).max(10.0);
    min_x -= pad;
    max_x += pad;
    min_z -= pad;
    max_z += pad;

    let root = BitMapBackend::new(path, (900, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(min_x..max_x, min_z..max_z)?;
    chart.configure_mesh().draw()?;

    for obs in observations {
        chart.draw_series(std::iter::once(Circle::new((obs.observer_pos.x, obs.observer_pos.z), 4, BLUE.filled())))?;

        if let Ok(ray) = observation_to_ray(obs, RayChoice::Center) {
            let far = obs.observer_pos.add(&ray.direction.scale((max_x - min_x).max(max_z - min_z) * 2.0));
            chart.draw_series(LineSeries::new(vec![(obs.observer_pos.x, obs.observer_pos.z), (far.x, far.z)], &BLUE.mix(0.4)))?;
        }

        if let Ok(wedge) = observation_to_wedge(obs) {
            for plane in wedge_to_half_planes(&wedge) {
                // A bounding line a*x + b*z = c. Solve for z given x at the two
                // horizontal extremes when the line isn't near-vertical; a near-
                // vertical line (b ~= 0) is solved the other way, for x given z,
                // so it still gets drawn instead of silently dropped.
                if plane.b.abs() > 1e-9 {
                    let z_at = |x: f64| (plane.c - plane.a * x) / plane.b;
                    chart.draw_series(LineSeries::new(vec![(min_x, z_at(min_x)), (max_x, z_at(max_x))], &CYAN.mix(0.5)))?;
                } else if plane.a.abs() > 1e-9 {
                    let x_at = plane.c / plane.a;
                    chart.draw_series(LineSeries::new(vec![(x_at, min_z), (x_at, max_z)], &CYAN.mix(0.5)))?;
                }
            }
        }
    }

    if let Some(region) = &estimate.feasible_region {
        if !region.is_empty() {
            let mut pts: Vec<(f64, f64)> = region.vertices.iter().map(|p| (p.x, p.z)).collect();
            if let Some(first) = pts.first().copied() {
                pts.push(first);
            }
            chart.draw_series(LineSeries::new(pts, &GREEN))?;
        }
    }

    if estimate.error_radius.is_finite() {
        chart.draw_series(LineSeries::new(error_circle_points(estimate.x, estimate.z, estimate.error_radius), &RED.mix(0.6)))?;
    }
    chart.draw_series(std::iter::once(Circle::new((estimate.x, estimate.z), 6, RED.filled())))?;

    if let Some(gt) = ground_truth {
        chart.draw_series(std::iter::once(Cross::new((gt.x, gt.z), 8, BLACK)))?;
    }

    root.present()?;
    Ok(())
}

/// Closed polyline approximating the point estimate's error bound as a circle of
/// `radius` in plot-data units. Every estimator here returns one scalar radius
/// rather than a covariance matrix's two eigenvalues, so a circle is the most this
/// crate's data model can depict — it stands in for the "elliptical error" this
/// batch's estimator bounded.
fn error_circle_points(cx: f64, cz: f64, radius: f64) -> Vec<(f64, f64)> {
    const SEGMENTS: usize = 64;
    (0..=SEGMENTS)
        .map(|i| {
            let theta = std::f64::consts::TAU * (i as f64) / (SEGMENTS as f64);
            (cx + radius * theta.cos(), cz + radius * theta.sin())
        })
        .collect()
}

//! Circular and elliptical arcs as conic segments.
//!
//! Every arc is emitted as rational quadratics of at most 90 degrees each, which
//! trace the ellipse exactly. Arcs connect to the open contour with a line.

use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{ArcParams, ArcToParams, EllipseParams};
use crate::matrix::Matrix3;
use crate::path::Path;
use std::f64::consts::TAU;

/// Sweeps this close to a full turn (in degrees) are drawn as two half sweeps.
pub const FULL_CIRCLE_EPSILON_DEGREES: f64 = 1e-5;

const MAX_SEGMENT_DEGREES: f64 = 90.0;

/// Canonicalize the start angle into `[0, 2π)` and shift the end angle so the
/// sweep runs in the requested direction, capped at one full turn.
///
/// Runs in f64: one f32 ulp at 360 degrees is wider than the full-turn epsilon.
pub(crate) fn normalize_angles(
    start_angle: f64,
    end_angle: f64,
    anticlockwise: bool,
) -> (f64, f64) {
    let mut start = start_angle % TAU;
    if start < 0.0 {
        start += TAU;
    }
    let mut end = end_angle + (start - start_angle);

    if !anticlockwise && end - start >= TAU {
        end = start + TAU;
    } else if anticlockwise && start - end >= TAU {
        end = start - TAU;
    } else if !anticlockwise && start > end {
        end = start + (TAU - (start - end) % TAU);
    } else if anticlockwise && start < end {
        end = start - (TAU - (end - start) % TAU);
    }
    (start, end)
}

/// Append an unrotated elliptical sweep to `path`. Angles are in degrees.
fn add_oval_sweep(
    path: &mut Path,
    center: (f32, f32),
    radii: (f32, f32),
    start_deg: f64,
    sweep_deg: f64,
    force_move: bool,
) {
    let (cx, cy) = center;
    let (rx, ry) = radii;
    let at = |deg: f64| {
        let rad = deg.to_radians();
        (cx + rx * rad.cos() as f32, cy + ry * rad.sin() as f32)
    };

    if force_move {
        let (x, y) = at(start_deg);
        path.move_to(x, y);
    }
    if sweep_deg == 0.0 {
        return;
    }

    let segments = ((sweep_deg.abs() - FULL_CIRCLE_EPSILON_DEGREES) / MAX_SEGMENT_DEGREES)
        .ceil()
        .max(1.0) as usize;
    let step = sweep_deg / segments as f64;
    let weight = (step / 2.0).to_radians().cos();
    for i in 0..segments {
        let a0 = start_deg + step * i as f64;
        let mid = (a0 + step / 2.0).to_radians();
        let (ex, ey) = at(a0 + step);
        let ctrl_x = cx + rx * (mid.cos() / weight) as f32;
        let ctrl_y = cy + ry * (mid.sin() / weight) as f32;
        path.conic_to(ctrl_x, ctrl_y, ex, ey, weight as f32);
    }
}

impl Path {
    /// Circular arc; see [`Path::ellipse`].
    pub fn arc(&mut self, params: &ArcParams) -> Canvas2dResult<()> {
        self.ellipse(&EllipseParams::from(params))
    }

    /// Elliptical arc connected to the open contour with a line.
    ///
    /// Non-finite arguments are ignored; a negative radius is an error.
    pub fn ellipse(&mut self, params: &EllipseParams) -> Canvas2dResult<()> {
        let EllipseParams {
            x,
            y,
            radius_x,
            radius_y,
            rotation,
            start_angle,
            end_angle,
            anticlockwise,
        } = *params;
        let values = [x, y, radius_x, radius_y, rotation, start_angle, end_angle];
        if values.iter().any(|v| !v.is_finite()) {
            return Ok(());
        }
        if radius_x < 0.0 || radius_y < 0.0 {
            return Err(Canvas2dError::InvalidArgument(format!(
                "negative arc radius ({}, {})",
                radius_x, radius_y
            )));
        }

        let (start, end) =
            normalize_angles(f64::from(start_angle), f64::from(end_angle), anticlockwise);
        let start_deg = start.to_degrees();
        let sweep_deg = (end - start).to_degrees();

        let mut sweep = Path::new();
        let center = (x, y);
        let radii = (radius_x, radius_y);
        if (sweep_deg.abs() - 360.0).abs() < FULL_CIRCLE_EPSILON_DEGREES {
            let half = sweep_deg.signum() * 180.0;
            add_oval_sweep(&mut sweep, center, radii, start_deg, half, true);
            add_oval_sweep(&mut sweep, center, radii, start_deg + half, half, false);
        } else {
            add_oval_sweep(&mut sweep, center, radii, start_deg, sweep_deg, true);
        }

        if rotation != 0.0 {
            sweep.transform(&Matrix3::rotate_about(rotation, x, y));
        }
        self.extend_connected(&sweep);
        Ok(())
    }

    /// Tangent arc of `radius` joining the current point, `(x1, y1)` and `(x2, y2)`.
    ///
    /// Falls back to a straight line to `(x1, y1)` when the points are collinear,
    /// coincide, or the radius is zero.
    pub fn arc_to(&mut self, params: &ArcToParams) -> Canvas2dResult<()> {
        let ArcToParams {
            x1,
            y1,
            x2,
            y2,
            radius,
        } = *params;
        if [x1, y1, x2, y2, radius].iter().any(|v| !v.is_finite()) {
            return Ok(());
        }
        if radius < 0.0 {
            return Err(Canvas2dError::InvalidArgument(format!(
                "negative arc_to radius {}",
                radius
            )));
        }

        let Some(p0) = self.current_point() else {
            self.move_to(x1, y1);
            return Ok(());
        };

        let (bx, by) = (x1 - p0.x, y1 - p0.y);
        let (ax, ay) = (x2 - x1, y2 - y1);
        let before_len = (bx * bx + by * by).sqrt();
        let after_len = (ax * ax + ay * ay).sqrt();
        if radius == 0.0 || before_len < f32::EPSILON || after_len < f32::EPSILON {
            self.line_to(x1, y1);
            return Ok(());
        }
        let (bx, by) = (bx / before_len, by / before_len);
        let (ax, ay) = (ax / after_len, ay / after_len);

        let cos_turn = bx * ax + by * ay;
        let sin_turn = bx * ay - by * ax;
        if sin_turn.abs() <= 1e-6 {
            self.line_to(x1, y1);
            return Ok(());
        }

        let dist = (radius * (1.0 - cos_turn) / sin_turn).abs();
        let (sx, sy) = (x1 - dist * bx, y1 - dist * by);
        let (ex, ey) = (x1 + dist * ax, y1 + dist * ay);
        let weight = (0.5 + cos_turn * 0.5).sqrt();

        self.line_to(sx, sy);
        self.conic_to(x1, y1, ex, ey, weight);
        Ok(())
    }
}

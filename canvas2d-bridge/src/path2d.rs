//! Path2D: reusable path objects for fill, stroke, clip and hit testing.
//!
//! `Path2D` is [`Path`] under its canvas name, plus the canvas-shaped builder
//! methods and SVG path data import/export.

use crate::dom_matrix::DOMMatrix;
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{CubicBezierParams, QuadraticBezierParams};
use crate::matrix::Matrix3;
use crate::path::{Conic, Path, PathSegment, DEFAULT_TOLERANCE};
use std::fmt::Write;

/// A reusable path object.
pub type Path2D = Path;

fn push_command(out: &mut String, command: char, pts: &[tiny_skia::Point]) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push(command);
    for (i, p) in pts.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{} {}", p.x, p.y);
    }
}

impl Path {
    /// Parse SVG path data.
    ///
    /// All commands (M, L, H, V, Q, T, C, S, A, Z) are accepted; arcs become cubics.
    pub fn from_svg_path_data(path_data: &str) -> Canvas2dResult<Path> {
        let mut path = Path::new();
        for segment in svgtypes::SimplifyingPathParser::from(path_data) {
            let segment = segment.map_err(|e| {
                Canvas2dError::InvalidArgument(format!("Invalid SVG path data: {:?}", e))
            })?;
            match segment {
                svgtypes::SimplePathSegment::MoveTo { x, y } => path.move_to(x as f32, y as f32),
                svgtypes::SimplePathSegment::LineTo { x, y } => path.line_to(x as f32, y as f32),
                svgtypes::SimplePathSegment::Quadratic { x1, y1, x, y } => {
                    path.quad_to(x1 as f32, y1 as f32, x as f32, y as f32)
                }
                svgtypes::SimplePathSegment::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => path.cubic_to(
                    x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
                ),
                svgtypes::SimplePathSegment::ClosePath => path.close(),
            }
        }
        Ok(path)
    }

    /// Serialize as absolute SVG path data. Conics are written as quadratics.
    pub fn to_svg_path_data(&self) -> String {
        let mut out = String::new();
        let mut last = tiny_skia::Point::zero();
        for seg in self.segments() {
            match seg {
                PathSegment::MoveTo(p) => {
                    push_command(&mut out, 'M', &[p]);
                    last = p;
                }
                PathSegment::LineTo(p) => {
                    push_command(&mut out, 'L', &[p]);
                    last = p;
                }
                PathSegment::QuadTo(c, p) => {
                    push_command(&mut out, 'Q', &[c, p]);
                    last = p;
                }
                PathSegment::ConicTo(c, p, w) => {
                    for (qc, qp) in Conic::new(last, c, p, w).to_quads(DEFAULT_TOLERANCE) {
                        push_command(&mut out, 'Q', &[qc, qp]);
                    }
                    last = p;
                }
                PathSegment::CubicTo(c1, c2, p) => {
                    push_command(&mut out, 'C', &[c1, c2, p]);
                    last = p;
                }
                PathSegment::Close => push_command(&mut out, 'Z', &[]),
            }
        }
        out
    }

    pub fn quadratic_curve_to(&mut self, params: &QuadraticBezierParams) {
        self.quad_to(params.cpx, params.cpy, params.x, params.y);
    }

    pub fn bezier_curve_to(&mut self, params: &CubicBezierParams) {
        self.cubic_to(
            params.cp1x,
            params.cp1y,
            params.cp2x,
            params.cp2y,
            params.x,
            params.y,
        );
    }

    pub fn close_path(&mut self) {
        self.close();
    }

    /// Canvas `addPath(path, transform)`.
    pub fn add_path2d(&mut self, other: &Path2D, transform: Option<DOMMatrix>) {
        let matrix = transform.map(Matrix3::from);
        self.add_path(other, matrix.as_ref());
    }
}

//! Arc-length measurement of paths: contour lengths, position/tangent lookup and
//! sub-path extraction.

use crate::path::Path;
use kurbo::{
    CubicBez, Line, ParamCurve, ParamCurveArclen, ParamCurveDeriv, PathEl, PathSeg, QuadBez,
    Vec2,
};
use tiny_skia::Point;

const ACCURACY: f64 = 1e-4;

/// Conics are split into quads this close to the true curve before measuring.
/// The raster tolerance would overstate arc lengths.
const MEASURE_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone)]
struct MeasuredSegment {
    seg: PathSeg,
    /// Distance along the contour where the segment starts.
    start: f64,
    length: f64,
}

/// One measured contour.
#[derive(Debug, Clone)]
pub struct ContourMeasure {
    segments: Vec<MeasuredSegment>,
    length: f64,
    closed: bool,
}

fn to_point(p: kurbo::Point) -> Point {
    Point::from_xy(p.x as f32, p.y as f32)
}

fn derivative(seg: &PathSeg, t: f64) -> Vec2 {
    match seg {
        PathSeg::Line(l) => l.p1 - l.p0,
        PathSeg::Quad(q) => {
            let d = q.deriv().eval(t);
            d.to_vec2()
        }
        PathSeg::Cubic(c) => c.deriv().eval(t).to_vec2(),
    }
}

impl ContourMeasure {
    pub fn length(&self) -> f32 {
        self.length as f32
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Segment index and parameter for a distance clamped to the contour.
    fn locate(&self, distance: f64) -> Option<(usize, f64)> {
        let distance = distance.clamp(0.0, self.length);
        let idx = self
            .segments
            .iter()
            .position(|s| distance <= s.start + s.length)
            .unwrap_or(self.segments.len().checked_sub(1)?);
        let s = &self.segments[idx];
        let local = (distance - s.start).clamp(0.0, s.length);
        let t = if local >= s.length {
            1.0
        } else {
            s.seg.inv_arclen(local, ACCURACY)
        };
        Some((idx, t))
    }

    /// Position and unit tangent at `distance` (clamped to the contour).
    pub fn pos_tan(&self, distance: f32) -> Option<(Point, Point)> {
        if !distance.is_finite() {
            return None;
        }
        let (idx, t) = self.locate(distance as f64)?;
        let seg = &self.segments[idx].seg;
        let pos = seg.eval(t);
        let mut tan = derivative(seg, t);
        if tan.hypot() < 1e-12 {
            tan = seg.end() - seg.start();
        }
        let tan = tan.normalize();
        Some((to_point(pos), Point::from_xy(tan.x as f32, tan.y as f32)))
    }

    /// Append the part of the contour between `start` and `stop` to `dst`.
    ///
    /// Returns false (leaving `dst` untouched) when the range is empty.
    pub fn segment(
        &self,
        start: f32,
        stop: f32,
        start_with_move_to: bool,
        dst: &mut Path,
    ) -> bool {
        if !start.is_finite() || !stop.is_finite() {
            return false;
        }
        let start = (start as f64).max(0.0);
        let stop = (stop as f64).min(self.length);
        if start > stop || self.segments.is_empty() {
            return false;
        }
        let (Some((i0, t0)), Some((i1, t1))) = (self.locate(start), self.locate(stop)) else {
            return false;
        };

        if start_with_move_to {
            let p = self.segments[i0].seg.eval(t0);
            dst.move_to(p.x as f32, p.y as f32);
        }
        for idx in i0..=i1 {
            let from = if idx == i0 { t0 } else { 0.0 };
            let to = if idx == i1 { t1 } else { 1.0 };
            if to <= from && !(idx == i0 && idx == i1) {
                continue;
            }
            emit(dst, &self.segments[idx].seg.subsegment(from..to));
        }
        true
    }
}

fn emit(dst: &mut Path, seg: &PathSeg) {
    match seg {
        PathSeg::Line(l) => dst.line_to(l.p1.x as f32, l.p1.y as f32),
        PathSeg::Quad(q) => dst.quad_to(q.p1.x as f32, q.p1.y as f32, q.p2.x as f32, q.p2.y as f32),
        PathSeg::Cubic(c) => dst.cubic_to(
            c.p1.x as f32,
            c.p1.y as f32,
            c.p2.x as f32,
            c.p2.y as f32,
            c.p3.x as f32,
            c.p3.y as f32,
        ),
    }
}

/// Measures every non-empty contour of a path.
#[derive(Debug, Clone)]
pub struct PathMeasure {
    contours: Vec<ContourMeasure>,
}

struct ContourBuilder {
    segments: Vec<MeasuredSegment>,
    length: f64,
    start: kurbo::Point,
    last: kurbo::Point,
}

impl ContourBuilder {
    fn new(start: kurbo::Point) -> Self {
        Self {
            segments: Vec::new(),
            length: 0.0,
            start,
            last: start,
        }
    }

    fn push(&mut self, seg: PathSeg) {
        self.last = seg.end();
        let length = seg.arclen(ACCURACY);
        if length <= 0.0 {
            return;
        }
        self.segments.push(MeasuredSegment {
            seg,
            start: self.length,
            length,
        });
        self.length += length;
    }

    fn close(&mut self) {
        if self.last != self.start {
            self.push(PathSeg::Line(Line::new(self.last, self.start)));
        }
        self.last = self.start;
    }

    fn finish(mut self, closed: bool, force_closed: bool, out: &mut Vec<ContourMeasure>) {
        let closed = if !closed && force_closed {
            self.close();
            true
        } else {
            closed
        };
        if self.length > 0.0 {
            out.push(ContourMeasure {
                segments: self.segments,
                length: self.length,
                closed,
            });
        }
    }
}

impl PathMeasure {
    pub fn new(path: &Path, force_closed: bool) -> Self {
        let mut contours = Vec::new();
        let mut current: Option<ContourBuilder> = None;
        for el in path.to_kurbo_elements(MEASURE_TOLERANCE) {
            match el {
                PathEl::MoveTo(p) => {
                    if let Some(c) = current.take() {
                        c.finish(false, force_closed, &mut contours);
                    }
                    current = Some(ContourBuilder::new(p));
                }
                PathEl::LineTo(p) => {
                    if let Some(c) = current.as_mut() {
                        c.push(PathSeg::Line(Line::new(c.last, p)));
                    }
                }
                PathEl::QuadTo(p1, p2) => {
                    if let Some(c) = current.as_mut() {
                        c.push(PathSeg::Quad(QuadBez::new(c.last, p1, p2)));
                    }
                }
                PathEl::CurveTo(p1, p2, p3) => {
                    if let Some(c) = current.as_mut() {
                        c.push(PathSeg::Cubic(CubicBez::new(c.last, p1, p2, p3)));
                    }
                }
                PathEl::ClosePath => {
                    if let Some(mut c) = current.take() {
                        c.close();
                        let start = c.start;
                        c.finish(true, force_closed, &mut contours);
                        // Verbs after a close continue from the contour start
                        current = Some(ContourBuilder::new(start));
                    }
                }
            }
        }
        if let Some(c) = current {
            c.finish(false, force_closed, &mut contours);
        }
        Self { contours }
    }

    /// Total length of all contours.
    pub fn length(&self) -> f32 {
        self.contours.iter().map(|c| c.length).sum::<f64>() as f32
    }

    pub fn contours(&self) -> &[ContourMeasure] {
        &self.contours
    }

    pub fn is_closed(&self) -> bool {
        self.contours.first().is_some_and(|c| c.closed)
    }

    /// Position and tangent at `distance` measured across all contours in order.
    pub fn pos_tan(&self, distance: f32) -> Option<(Point, Point)> {
        let mut remaining = distance;
        for (i, c) in self.contours.iter().enumerate() {
            if remaining <= c.length() || i + 1 == self.contours.len() {
                return c.pos_tan(remaining);
            }
            remaining -= c.length();
        }
        None
    }

    /// The part of the path between `start` and `stop`, measured across contours.
    pub fn segment(&self, start: f32, stop: f32, start_with_move_to: bool) -> Option<Path> {
        if !(start.is_finite() && stop.is_finite()) || start > stop {
            return None;
        }
        let mut out = Path::new();
        let mut offset = 0.0f32;
        let mut first = true;
        for c in &self.contours {
            let len = c.length();
            let (s, e) = (start - offset, stop - offset);
            if e >= 0.0 && s <= len && c.segment(s, e, start_with_move_to || !first, &mut out) {
                first = false;
            }
            offset += len;
        }
        (!out.is_empty()).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ArcParams, RectParams};
    use crate::path::Verb;
    use rstest::rstest;

    fn approx(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_rect_perimeter() {
        let mut p = Path::new();
        p.rect(&RectParams {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 5.0,
        });
        let m = PathMeasure::new(&p, false);
        assert!(approx(m.length(), 30.0, 1e-4));
        assert!(m.is_closed());
        assert_eq!(m.contours().len(), 1);
    }

    #[test]
    fn test_force_closed_adds_closing_edge() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(3.0, 0.0);
        p.line_to(3.0, 4.0);
        assert!(approx(PathMeasure::new(&p, false).length(), 7.0, 1e-4));
        assert!(approx(PathMeasure::new(&p, true).length(), 12.0, 1e-4));
    }

    #[rstest]
    #[case(1.0)]
    #[case(10.0)]
    #[case(250.0)]
    fn test_circle_length(#[case] radius: f32) {
        let mut p = Path::new();
        p.arc(&ArcParams {
            x: 0.0,
            y: 0.0,
            radius,
            start_angle: 0.0,
            end_angle: std::f32::consts::TAU,
            anticlockwise: false,
        })
        .unwrap();
        let len = PathMeasure::new(&p, false).length();
        let expected = 2.0 * std::f32::consts::PI * radius;
        assert!((len - expected).abs() / expected < 5e-4, "{} vs {}", len, expected);
    }

    #[test]
    fn test_pos_tan_on_polyline() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 0.0);
        p.line_to(10.0, 10.0);
        let m = PathMeasure::new(&p, false);

        let (pos, tan) = m.pos_tan(5.0).unwrap();
        assert!(approx(pos.x, 5.0, 1e-4) && approx(pos.y, 0.0, 1e-4));
        assert!(approx(tan.x, 1.0, 1e-5));

        let (pos, tan) = m.pos_tan(15.0).unwrap();
        assert!(approx(pos.x, 10.0, 1e-4) && approx(pos.y, 5.0, 1e-4));
        assert!(approx(tan.y, 1.0, 1e-5));

        // Clamped past the end
        let (pos, _) = m.pos_tan(100.0).unwrap();
        assert!(approx(pos.y, 10.0, 1e-4));
    }

    #[test]
    fn test_segment_extraction() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 0.0);
        p.line_to(10.0, 10.0);
        let m = PathMeasure::new(&p, false);

        let seg = m.segment(5.0, 15.0, true).unwrap();
        assert_eq!(seg.verbs(), &[Verb::Move, Verb::Line, Verb::Line]);
        let end = *seg.points().last().unwrap();
        assert!(approx(end.x, 10.0, 1e-4) && approx(end.y, 5.0, 1e-4));
        assert!(approx(PathMeasure::new(&seg, false).length(), 10.0, 1e-3));

        assert!(m.segment(8.0, 2.0, true).is_none());
    }

    #[test]
    fn test_empty_path() {
        let m = PathMeasure::new(&Path::new(), true);
        assert_eq!(m.length(), 0.0);
        assert!(m.pos_tan(0.0).is_none());
    }
}

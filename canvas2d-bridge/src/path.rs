//! Owned verb/point/weight path geometry.
//!
//! `Path` is the value handed to the raster engine: a verb list, a flat point buffer
//! and one weight per conic. Coordinate-taking entry points ignore non-finite input,
//! and drawing verbs start a contour implicitly when none is open.

use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{CornerRadius, Rect, RectParams, RoundRectParams};
use crate::matrix::Matrix3;
use crate::style::CanvasFillRule;
use std::f32::consts::FRAC_1_SQRT_2;
use tiny_skia::Point;

/// Default flattening tolerance in device pixels.
pub const DEFAULT_TOLERANCE: f32 = 0.25;

/// Weight of a conic that traces a quarter circle.
pub const QUARTER_CIRCLE_WEIGHT: f32 = FRAC_1_SQRT_2;

/// Path verbs. The byte values are the engine wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Verb {
    Move = 0,
    Line = 1,
    Quad = 2,
    Conic = 3,
    Cubic = 4,
    Close = 5,
}

impl Verb {
    /// Number of points the verb consumes.
    pub fn point_count(self) -> usize {
        match self {
            Verb::Move | Verb::Line => 1,
            Verb::Quad | Verb::Conic => 2,
            Verb::Cubic => 3,
            Verb::Close => 0,
        }
    }

    pub fn from_byte(b: u8) -> Option<Verb> {
        Some(match b {
            0 => Verb::Move,
            1 => Verb::Line,
            2 => Verb::Quad,
            3 => Verb::Conic,
            4 => Verb::Cubic,
            5 => Verb::Close,
            _ => return None,
        })
    }
}

/// A path segment with its points resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    ConicTo(Point, Point, f32),
    CubicTo(Point, Point, Point),
    Close,
}

/// A flattened contour.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    verbs: Vec<Verb>,
    points: Vec<Point>,
    weights: Vec<f32>,
    fill_rule: CanvasFillRule,
    /// Index into `points` of the open contour's move point.
    contour_start: Option<usize>,
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn pt(x: f32, y: f32) -> Point {
    Point::from_xy(x, y)
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fill_rule(fill_rule: CanvasFillRule) -> Self {
        Self {
            fill_rule,
            ..Self::default()
        }
    }

    /// Rebuild a path from engine payload parts.
    pub fn from_raw_parts(verbs: &[u8], coords: &[f32], weights: &[f32]) -> Canvas2dResult<Path> {
        let mut path = Path::new();
        let mut coords = coords.chunks_exact(2).map(|c| pt(c[0], c[1]));
        let mut weights = weights.iter().copied();
        let mut next = || {
            coords
                .next()
                .ok_or_else(|| Canvas2dError::PathError("path payload is missing points".into()))
        };
        for &byte in verbs {
            let verb = Verb::from_byte(byte)
                .ok_or_else(|| Canvas2dError::PathError(format!("unknown path verb {}", byte)))?;
            match verb {
                Verb::Move => {
                    let p = next()?;
                    path.push_move(p);
                }
                Verb::Line => {
                    let p = next()?;
                    path.push(Verb::Line, &[p]);
                }
                Verb::Quad => {
                    let (c, p) = (next()?, next()?);
                    path.push(Verb::Quad, &[c, p]);
                }
                Verb::Conic => {
                    let (c, p) = (next()?, next()?);
                    let w = weights.next().ok_or_else(|| {
                        Canvas2dError::PathError("path payload is missing conic weights".into())
                    })?;
                    path.push(Verb::Conic, &[c, p]);
                    path.weights.push(w);
                }
                Verb::Cubic => {
                    let (c1, c2, p) = (next()?, next()?, next()?);
                    path.push(Verb::Cubic, &[c1, c2, p]);
                }
                Verb::Close => path.push_close(),
            }
        }
        Ok(path)
    }

    /// Payload parts: verb bytes, interleaved coordinates, conic weights.
    pub fn to_raw_parts(&self) -> (Vec<u8>, Vec<f32>, Vec<f32>) {
        let verbs = self.verbs.iter().map(|v| *v as u8).collect();
        let coords = self.points.iter().flat_map(|p| [p.x, p.y]).collect();
        (verbs, coords, self.weights.clone())
    }

    pub fn fill_rule(&self) -> CanvasFillRule {
        self.fill_rule
    }

    pub fn set_fill_rule(&mut self, rule: CanvasFillRule) {
        self.fill_rule = rule;
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    pub fn verb_count(&self) -> usize {
        self.verbs.len()
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn reset(&mut self) {
        self.verbs.clear();
        self.points.clear();
        self.weights.clear();
        self.contour_start = None;
    }

    /// The point the next drawing verb starts from.
    pub fn current_point(&self) -> Option<Point> {
        match self.verbs.last()? {
            Verb::Close => self.contour_start.map(|i| self.points[i]),
            _ => self.points.last().copied(),
        }
    }

    fn push_move(&mut self, p: Point) {
        self.contour_start = Some(self.points.len());
        self.verbs.push(Verb::Move);
        self.points.push(p);
    }

    fn push(&mut self, verb: Verb, pts: &[Point]) {
        self.verbs.push(verb);
        self.points.extend_from_slice(pts);
    }

    fn push_close(&mut self) {
        self.verbs.push(Verb::Close);
    }

    /// Open a contour at `fallback` when none is open, or re-open at the last
    /// contour start right after a close.
    fn inject_move_to_if_needed(&mut self, fallback: Point) {
        match self.verbs.last() {
            None => self.push_move(fallback),
            Some(Verb::Close) => {
                let start = self
                    .contour_start
                    .map(|i| self.points[i])
                    .unwrap_or(fallback);
                self.push_move(start);
            }
            Some(_) => {}
        }
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        if !all_finite(&[x, y]) {
            return;
        }
        self.push_move(pt(x, y));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        if !all_finite(&[x, y]) {
            return;
        }
        self.inject_move_to_if_needed(pt(x, y));
        self.push(Verb::Line, &[pt(x, y)]);
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        if !all_finite(&[cx, cy, x, y]) {
            return;
        }
        self.inject_move_to_if_needed(pt(cx, cy));
        self.push(Verb::Quad, &[pt(cx, cy), pt(x, y)]);
    }

    /// Rational quadratic; weight 1 is a plain quad.
    pub fn conic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32, weight: f32) {
        if !all_finite(&[cx, cy, x, y, weight]) || weight <= 0.0 {
            return;
        }
        if weight == 1.0 {
            self.quad_to(cx, cy, x, y);
            return;
        }
        self.inject_move_to_if_needed(pt(cx, cy));
        self.push(Verb::Conic, &[pt(cx, cy), pt(x, y)]);
        self.weights.push(weight);
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        if !all_finite(&[c1x, c1y, c2x, c2y, x, y]) {
            return;
        }
        self.inject_move_to_if_needed(pt(c1x, c1y));
        self.push(Verb::Cubic, &[pt(c1x, c1y), pt(c2x, c2y), pt(x, y)]);
    }

    /// Close the open contour. Ignored on an empty or point-like path.
    pub fn close(&mut self) {
        if matches!(self.verbs.last(), None | Some(Verb::Close)) {
            return;
        }
        match self.bounds() {
            Some(b) if b.width() == 0.0 && b.height() == 0.0 => {}
            Some(_) => self.push_close(),
            None => {}
        }
    }

    /// Closed rectangle contour; the next verb continues from `(x, y)`.
    pub fn rect(&mut self, params: &RectParams) {
        if !params.is_finite() {
            return;
        }
        let RectParams {
            x,
            y,
            width,
            height,
        } = *params;
        self.push_move(pt(x, y));
        self.push(Verb::Line, &[pt(x + width, y)]);
        self.push(Verb::Line, &[pt(x + width, y + height)]);
        self.push(Verb::Line, &[pt(x, y + height)]);
        self.push_close();
    }

    /// Rounded rectangle with elliptical corners.
    ///
    /// Radii are scaled down uniformly when adjacent corners would overlap; a
    /// negative radius is an error.
    pub fn round_rect(&mut self, params: &RoundRectParams) -> Canvas2dResult<()> {
        let mut values = vec![params.x, params.y, params.width, params.height];
        values.extend(params.radii.iter().flat_map(|r| [r.x, r.y]));
        if !all_finite(&values) {
            return Ok(());
        }
        if params.radii.iter().any(|r| r.x < 0.0 || r.y < 0.0) {
            return Err(Canvas2dError::InvalidArgument(format!(
                "round_rect radii must be non-negative: {:?}",
                params.radii
            )));
        }

        let [mut tl, mut tr, mut br, mut bl] = params.radii;
        if params.width < 0.0 {
            std::mem::swap(&mut tl, &mut tr);
            std::mem::swap(&mut bl, &mut br);
        }
        if params.height < 0.0 {
            std::mem::swap(&mut tl, &mut bl);
            std::mem::swap(&mut tr, &mut br);
        }
        let r = Rect::from_xywh(params.x, params.y, params.width, params.height);
        let (w, h) = (r.width(), r.height());

        let ratio = |len: f32, a: f32, b: f32| if a + b > len { len / (a + b) } else { 1.0 };
        let scale = ratio(w, tl.x, tr.x)
            .min(ratio(w, bl.x, br.x))
            .min(ratio(h, tl.y, bl.y))
            .min(ratio(h, tr.y, br.y));
        let scaled = |c: CornerRadius| CornerRadius {
            x: c.x * scale,
            y: c.y * scale,
        };
        let (tl, tr, br, bl) = (scaled(tl), scaled(tr), scaled(br), scaled(bl));
        let (left, top, right, bottom) = (r.left, r.top, r.right, r.bottom);
        let k = QUARTER_CIRCLE_WEIGHT;

        self.push_move(pt(left + tl.x, top));
        self.push(Verb::Line, &[pt(right - tr.x, top)]);
        self.corner(pt(right, top), pt(right, top + tr.y), tr, k);
        self.push(Verb::Line, &[pt(right, bottom - br.y)]);
        self.corner(pt(right, bottom), pt(right - br.x, bottom), br, k);
        self.push(Verb::Line, &[pt(left + bl.x, bottom)]);
        self.corner(pt(left, bottom), pt(left, bottom - bl.y), bl, k);
        self.push(Verb::Line, &[pt(left, top + tl.y)]);
        self.corner(pt(left, top), pt(left + tl.x, top), tl, k);
        self.push_close();
        self.push_move(pt(params.x, params.y));
        Ok(())
    }

    fn corner(&mut self, ctrl: Point, end: Point, radius: CornerRadius, weight: f32) {
        if radius.x > 0.0 && radius.y > 0.0 {
            self.push(Verb::Conic, &[ctrl, end]);
            self.weights.push(weight);
        } else {
            self.push(Verb::Line, &[end]);
        }
    }

    /// Closed ellipse inscribed in `oval`, starting at the right-hand extreme.
    pub fn add_oval(&mut self, oval: Rect, ccw: bool) {
        if !oval.is_finite() {
            return;
        }
        let (cx, cy) = oval.center();
        let (l, t, r, b) = (oval.left, oval.top, oval.right, oval.bottom);
        let k = QUARTER_CIRCLE_WEIGHT;
        let quarters = if ccw {
            [
                (pt(r, t), pt(cx, t)),
                (pt(l, t), pt(l, cy)),
                (pt(l, b), pt(cx, b)),
                (pt(r, b), pt(r, cy)),
            ]
        } else {
            [
                (pt(r, b), pt(cx, b)),
                (pt(l, b), pt(l, cy)),
                (pt(l, t), pt(cx, t)),
                (pt(r, t), pt(r, cy)),
            ]
        };
        self.push_move(pt(r, cy));
        for (ctrl, end) in quarters {
            self.push(Verb::Conic, &[ctrl, end]);
            self.weights.push(k);
        }
        self.push_close();
    }

    /// Append `other` as new contours, optionally transformed.
    pub fn add_path(&mut self, other: &Path, matrix: Option<&Matrix3>) {
        let mut src = other.clone();
        if let Some(m) = matrix {
            src.transform(m);
        }
        let base = self.points.len();
        self.verbs.extend_from_slice(&src.verbs);
        self.points.extend_from_slice(&src.points);
        self.weights.extend_from_slice(&src.weights);
        if let Some(start) = src.contour_start {
            self.contour_start = Some(base + start);
        }
    }

    /// Append `other` continuing the open contour: its first move becomes a line.
    pub(crate) fn extend_connected(&mut self, other: &Path) {
        let mut weights = other.weights.iter().copied();
        let mut points = other.points.iter().copied();
        for (i, verb) in other.verbs.iter().enumerate() {
            match verb {
                Verb::Move => {
                    let Some(p) = points.next() else { return };
                    if i == 0 && self.current_point().is_some() {
                        self.inject_move_to_if_needed(p);
                        self.push(Verb::Line, &[p]);
                    } else {
                        self.push_move(p);
                    }
                }
                Verb::Close => self.push_close(),
                verb => {
                    let pts: Vec<Point> = points.by_ref().take(verb.point_count()).collect();
                    self.push(*verb, &pts);
                    if *verb == Verb::Conic {
                        self.weights.push(weights.next().unwrap_or(1.0));
                    }
                }
            }
        }
    }

    pub fn transform(&mut self, matrix: &Matrix3) {
        if matrix.is_identity() {
            return;
        }
        for p in &mut self.points {
            let (x, y) = matrix.map_point(p.x, p.y);
            *p = pt(x, y);
        }
    }

    pub fn transformed(&self, matrix: &Matrix3) -> Path {
        let mut path = self.clone();
        path.transform(matrix);
        path
    }

    /// Bounds of all points, control points included.
    pub fn bounds(&self) -> Option<Rect> {
        let first = self.points.first()?;
        let mut r = Rect::from_ltrb(first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            r.left = r.left.min(p.x);
            r.top = r.top.min(p.y);
            r.right = r.right.max(p.x);
            r.bottom = r.bottom.max(p.y);
        }
        Some(r)
    }

    pub fn segments(&self) -> Segments<'_> {
        Segments {
            path: self,
            verb: 0,
            point: 0,
            weight: 0,
        }
    }

    /// Flatten into polylines within `tolerance` of the curves.
    pub fn flatten(&self, tolerance: f32) -> Vec<Polyline> {
        let mut out: Vec<Polyline> = Vec::new();
        let mut current: Option<Polyline> = None;
        let tol = tolerance.max(1e-3) as f64;
        let els = self.to_kurbo_elements(tolerance);
        kurbo::flatten(els, tol, |el| match el {
            kurbo::PathEl::MoveTo(p) => {
                if let Some(poly) = current.take() {
                    out.push(poly);
                }
                current = Some(Polyline {
                    points: vec![pt(p.x as f32, p.y as f32)],
                    closed: false,
                });
            }
            kurbo::PathEl::LineTo(p) => {
                if let Some(poly) = current.as_mut() {
                    poly.points.push(pt(p.x as f32, p.y as f32));
                }
            }
            kurbo::PathEl::ClosePath => {
                if let Some(poly) = current.as_mut() {
                    poly.closed = true;
                }
            }
            _ => {}
        });
        if let Some(poly) = current {
            out.push(poly);
        }
        out
    }

    /// Point containment under `rule`; every contour is treated as closed.
    pub fn contains(&self, x: f32, y: f32, rule: CanvasFillRule) -> bool {
        if !all_finite(&[x, y]) {
            return false;
        }
        match self.bounds() {
            Some(b) if x >= b.left && x <= b.right && y >= b.top && y <= b.bottom => {}
            _ => return false,
        }
        let mut winding = 0i32;
        for poly in self.flatten(DEFAULT_TOLERANCE * 0.5) {
            let pts = &poly.points;
            if pts.len() < 2 {
                continue;
            }
            for i in 0..pts.len() {
                let a = pts[i];
                let b = pts[(i + 1) % pts.len()];
                winding += edge_winding(a, b, x, y);
            }
        }
        match rule {
            CanvasFillRule::NonZero => winding != 0,
            CanvasFillRule::EvenOdd => winding % 2 != 0,
        }
    }

    /// Reverse the direction of every contour.
    pub fn reverse(&mut self) {
        let mut out = Path::with_fill_rule(self.fill_rule);
        let mut contour: Vec<PathSegment> = Vec::new();
        let mut start = pt(0.0, 0.0);
        let flush = |out: &mut Path, contour: &mut Vec<PathSegment>, start: Point, closed: bool| {
            if contour.is_empty() {
                return;
            }
            // Walk the segments backwards from the last end point
            let end_of = |seg: &PathSegment| match *seg {
                PathSegment::LineTo(p)
                | PathSegment::QuadTo(_, p)
                | PathSegment::ConicTo(_, p, _)
                | PathSegment::CubicTo(_, _, p) => p,
                _ => start,
            };
            let last = contour.last().map(&end_of).unwrap_or(start);
            out.push_move(last);
            for (i, seg) in contour.iter().enumerate().rev() {
                let prev = if i == 0 { start } else { end_of(&contour[i - 1]) };
                match *seg {
                    PathSegment::LineTo(_) => out.push(Verb::Line, &[prev]),
                    PathSegment::QuadTo(c, _) => out.push(Verb::Quad, &[c, prev]),
                    PathSegment::ConicTo(c, _, w) => {
                        out.push(Verb::Conic, &[c, prev]);
                        out.weights.push(w);
                    }
                    PathSegment::CubicTo(c1, c2, _) => out.push(Verb::Cubic, &[c2, c1, prev]),
                    _ => {}
                }
            }
            if closed {
                out.push_close();
            }
            contour.clear();
        };
        for seg in self.segments() {
            match seg {
                PathSegment::MoveTo(p) => {
                    flush(&mut out, &mut contour, start, false);
                    start = p;
                }
                PathSegment::Close => {
                    if contour.is_empty() {
                        out.push_move(start);
                        out.push_close();
                    } else {
                        flush(&mut out, &mut contour, start, true);
                    }
                }
                seg => contour.push(seg),
            }
        }
        flush(&mut out, &mut contour, start, false);
        *self = out;
    }

    /// kurbo elements, with each conic expanded into quads within `conic_tolerance`.
    pub(crate) fn to_kurbo_elements(&self, conic_tolerance: f32) -> Vec<kurbo::PathEl> {
        use kurbo::{PathEl, Point as KPoint};
        let k = |p: Point| KPoint::new(p.x as f64, p.y as f64);
        let mut els = Vec::with_capacity(self.verbs.len());
        let mut last = pt(0.0, 0.0);
        for seg in self.segments() {
            match seg {
                PathSegment::MoveTo(p) => {
                    els.push(PathEl::MoveTo(k(p)));
                    last = p;
                }
                PathSegment::LineTo(p) => {
                    els.push(PathEl::LineTo(k(p)));
                    last = p;
                }
                PathSegment::QuadTo(c, p) => {
                    els.push(PathEl::QuadTo(k(c), k(p)));
                    last = p;
                }
                PathSegment::ConicTo(c, p, w) => {
                    for (qc, qp) in Conic::new(last, c, p, w).to_quads(conic_tolerance) {
                        els.push(PathEl::QuadTo(k(qc), k(qp)));
                    }
                    last = p;
                }
                PathSegment::CubicTo(c1, c2, p) => {
                    els.push(PathEl::CurveTo(k(c1), k(c2), k(p)));
                    last = p;
                }
                PathSegment::Close => els.push(PathEl::ClosePath),
            }
        }
        els
    }

    /// Convert for rasterization; conics are expanded into quads.
    pub fn to_tiny_skia(&self) -> Option<tiny_skia::Path> {
        let mut pb = tiny_skia::PathBuilder::with_capacity(self.verbs.len(), self.points.len());
        let mut last = pt(0.0, 0.0);
        for seg in self.segments() {
            match seg {
                PathSegment::MoveTo(p) => {
                    pb.move_to(p.x, p.y);
                    last = p;
                }
                PathSegment::LineTo(p) => {
                    pb.line_to(p.x, p.y);
                    last = p;
                }
                PathSegment::QuadTo(c, p) => {
                    pb.quad_to(c.x, c.y, p.x, p.y);
                    last = p;
                }
                PathSegment::ConicTo(c, p, w) => {
                    for (qc, qp) in Conic::new(last, c, p, w).to_quads(DEFAULT_TOLERANCE) {
                        pb.quad_to(qc.x, qc.y, qp.x, qp.y);
                    }
                    last = p;
                }
                PathSegment::CubicTo(c1, c2, p) => {
                    pb.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y);
                    last = p;
                }
                PathSegment::Close => pb.close(),
            }
        }
        pb.finish()
    }

    pub fn from_tiny_skia(path: &tiny_skia::Path) -> Path {
        let mut out = Path::new();
        for seg in path.segments() {
            match seg {
                tiny_skia::PathSegment::MoveTo(p) => out.push_move(p),
                tiny_skia::PathSegment::LineTo(p) => out.push(Verb::Line, &[p]),
                tiny_skia::PathSegment::QuadTo(c, p) => out.push(Verb::Quad, &[c, p]),
                tiny_skia::PathSegment::CubicTo(c1, c2, p) => {
                    out.push(Verb::Cubic, &[c1, c2, p])
                }
                tiny_skia::PathSegment::Close => out.push_close(),
            }
        }
        out
    }
}

/// Signed crossing of the horizontal ray from `(x, y)` towards +x.
fn edge_winding(a: Point, b: Point, x: f32, y: f32) -> i32 {
    let (dir, lo, hi) = if a.y <= b.y { (1, a, b) } else { (-1, b, a) };
    // Half-open in y so shared vertices count once
    if y < lo.y || y >= hi.y {
        return 0;
    }
    let t = (y - lo.y) / (hi.y - lo.y);
    let cross_x = lo.x + t * (hi.x - lo.x);
    if cross_x > x {
        dir
    } else {
        0
    }
}

pub struct Segments<'a> {
    path: &'a Path,
    verb: usize,
    point: usize,
    weight: usize,
}

impl Iterator for Segments<'_> {
    type Item = PathSegment;

    fn next(&mut self) -> Option<PathSegment> {
        let verb = *self.path.verbs.get(self.verb)?;
        self.verb += 1;
        let p = &self.path.points[self.point..self.point + verb.point_count()];
        self.point += verb.point_count();
        Some(match verb {
            Verb::Move => PathSegment::MoveTo(p[0]),
            Verb::Line => PathSegment::LineTo(p[0]),
            Verb::Quad => PathSegment::QuadTo(p[0], p[1]),
            Verb::Conic => {
                let w = self.path.weights[self.weight];
                self.weight += 1;
                PathSegment::ConicTo(p[0], p[1], w)
            }
            Verb::Cubic => PathSegment::CubicTo(p[0], p[1], p[2]),
            Verb::Close => PathSegment::Close,
        })
    }
}

/// Rational quadratic curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Conic {
    p0: Point,
    p1: Point,
    p2: Point,
    w: f32,
}

const MAX_CONIC_POW2: u32 = 5;

impl Conic {
    pub(crate) fn new(p0: Point, p1: Point, p2: Point, w: f32) -> Self {
        Self { p0, p1, p2, w }
    }

    /// Subdivision depth so each quad stays within `tol` of the conic.
    fn quad_pow2(&self, tol: f32) -> u32 {
        let a = self.w - 1.0;
        let k = a / (4.0 * (2.0 + a));
        let x = k * (self.p0.x - 2.0 * self.p1.x + self.p2.x);
        let y = k * (self.p0.y - 2.0 * self.p1.y + self.p2.y);
        let mut error = (x * x + y * y).sqrt();
        let mut pow2 = 0;
        while pow2 < MAX_CONIC_POW2 && error > tol {
            error *= 0.25;
            pow2 += 1;
        }
        pow2
    }

    fn chop(&self) -> (Conic, Conic) {
        let scale = 1.0 / (1.0 + self.w);
        let new_w = (0.5 + self.w * 0.5).sqrt();
        let wp1 = pt(self.w * self.p1.x, self.w * self.p1.y);
        let m = pt(
            (self.p0.x + 2.0 * wp1.x + self.p2.x) * scale * 0.5,
            (self.p0.y + 2.0 * wp1.y + self.p2.y) * scale * 0.5,
        );
        (
            Conic::new(
                self.p0,
                pt((self.p0.x + wp1.x) * scale, (self.p0.y + wp1.y) * scale),
                m,
                new_w,
            ),
            Conic::new(
                m,
                pt((wp1.x + self.p2.x) * scale, (wp1.y + self.p2.y) * scale),
                self.p2,
                new_w,
            ),
        )
    }

    /// Quadratic pieces as (control, end) pairs.
    pub(crate) fn to_quads(self, tol: f32) -> Vec<(Point, Point)> {
        let mut pieces = vec![self];
        for _ in 0..self.quad_pow2(tol) {
            pieces = pieces
                .iter()
                .flat_map(|c| {
                    let (a, b) = c.chop();
                    [a, b]
                })
                .collect();
        }
        pieces.into_iter().map(|c| (c.p1, c.p2)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn square(x: f32, y: f32, size: f32) -> Path {
        let mut p = Path::new();
        p.rect(&RectParams {
            x,
            y,
            width: size,
            height: size,
        });
        p
    }

    #[test]
    fn test_line_to_on_empty_path_injects_move() {
        let mut a = Path::new();
        a.line_to(10.0, 20.0);

        let mut b = Path::new();
        b.move_to(10.0, 20.0);
        b.line_to(10.0, 20.0);

        assert_eq!(a.verbs(), b.verbs());
        assert_eq!(a.points(), b.points());
        assert_eq!(a.verbs(), &[Verb::Move, Verb::Line]);
    }

    #[rstest]
    #[case(f32::NAN, 0.0)]
    #[case(0.0, f32::INFINITY)]
    #[case(f32::NEG_INFINITY, f32::NAN)]
    fn test_non_finite_line_to_is_ignored(#[case] x: f32, #[case] y: f32) {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(x, y);
        assert_eq!(p.verb_count(), 1);
    }

    #[test]
    fn test_verb_after_close_reopens_at_contour_start() {
        let mut p = Path::new();
        p.move_to(1.0, 2.0);
        p.line_to(5.0, 2.0);
        p.line_to(5.0, 6.0);
        p.close();
        p.line_to(9.0, 9.0);
        assert_eq!(
            p.verbs(),
            &[
                Verb::Move,
                Verb::Line,
                Verb::Line,
                Verb::Close,
                Verb::Move,
                Verb::Line
            ]
        );
        assert_eq!(p.points()[3], pt(1.0, 2.0));
    }

    #[test]
    fn test_close_ignored_on_degenerate_path() {
        let mut p = Path::new();
        p.close();
        assert!(p.is_empty());

        p.move_to(3.0, 3.0);
        p.line_to(3.0, 3.0);
        p.close();
        assert_eq!(p.verbs(), &[Verb::Move, Verb::Line]);

        // A horizontal line has zero height but non-zero width
        p.line_to(8.0, 3.0);
        p.close();
        assert_eq!(p.verbs().last(), Some(&Verb::Close));
    }

    #[test]
    fn test_rect_segments_and_bounds() {
        let p = square(10.0, 20.0, 30.0);
        let segs: Vec<_> = p.segments().collect();
        assert_eq!(segs[0], PathSegment::MoveTo(pt(10.0, 20.0)));
        assert_eq!(segs[2], PathSegment::LineTo(pt(40.0, 50.0)));
        assert_eq!(segs[4], PathSegment::Close);
        assert_eq!(
            p.bounds(),
            Some(Rect::from_ltrb(10.0, 20.0, 40.0, 50.0))
        );
    }

    #[rstest]
    #[case(CanvasFillRule::NonZero, true)]
    #[case(CanvasFillRule::EvenOdd, false)]
    fn test_contains_with_fill_rule(#[case] rule: CanvasFillRule, #[case] inside: bool) {
        // Two same-direction squares; the inner one is covered twice
        let mut p = square(0.0, 0.0, 10.0);
        p.add_path(&square(2.0, 2.0, 6.0), None);
        assert_eq!(p.contains(5.0, 5.0, rule), inside);
        assert!(p.contains(1.0, 1.0, rule));
        assert!(!p.contains(11.0, 5.0, rule));
    }

    #[test]
    fn test_oval_contains_center_not_corner() {
        let mut p = Path::new();
        p.add_oval(Rect::from_ltrb(0.0, 0.0, 20.0, 10.0), false);
        assert_eq!(p.weights().len(), 4);
        assert!(p.contains(10.0, 5.0, CanvasFillRule::NonZero));
        assert!(!p.contains(0.5, 0.5, CanvasFillRule::NonZero));
    }

    #[test]
    fn test_conic_quads_stay_on_circle() {
        let c = Conic::new(pt(1.0, 0.0), pt(1.0, 1.0), pt(0.0, 1.0), QUARTER_CIRCLE_WEIGHT);
        let quads = c.to_quads(0.001);
        assert!(quads.len() > 1);
        for (_, end) in quads {
            let r = (end.x * end.x + end.y * end.y).sqrt();
            assert!((r - 1.0).abs() < 1e-3, "radius {}", r);
        }
    }

    #[test]
    fn test_round_rect_scales_overlapping_radii() {
        let mut p = Path::new();
        p.round_rect(&RoundRectParams {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            radii: [CornerRadius::uniform(10.0); 4],
        })
        .unwrap();
        assert_eq!(p.bounds(), Some(Rect::from_ltrb(0.0, 0.0, 10.0, 10.0)));
        // Radii scaled to 5, so the shape starts at the top edge midpoint
        assert_eq!(p.points()[0], pt(5.0, 0.0));

        let negative = p.round_rect(&RoundRectParams {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            radii: [CornerRadius::uniform(-1.0); 4],
        });
        assert!(matches!(negative, Err(Canvas2dError::InvalidArgument(_))));
    }

    #[test]
    fn test_transform_and_raw_parts() {
        let mut p = Path::new();
        p.move_to(1.0, 1.0);
        p.conic_to(2.0, 1.0, 2.0, 2.0, 0.5);
        p.transform(&Matrix3::translate(10.0, 0.0));
        assert_eq!(p.points()[0], pt(11.0, 1.0));

        let (verbs, coords, weights) = p.to_raw_parts();
        let rebuilt = Path::from_raw_parts(&verbs, &coords, &weights).unwrap();
        assert_eq!(rebuilt.verbs(), p.verbs());
        assert_eq!(rebuilt.points(), p.points());
        assert_eq!(rebuilt.weights(), &[0.5]);

        assert!(Path::from_raw_parts(&[9], &[], &[]).is_err());
        assert!(Path::from_raw_parts(&[0, 1], &[0.0, 0.0], &[]).is_err());
    }

    #[test]
    fn test_reverse_open_contour() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 0.0);
        p.cubic_to(11.0, 1.0, 12.0, 2.0, 13.0, 3.0);
        p.reverse();
        let segs: Vec<_> = p.segments().collect();
        assert_eq!(
            segs,
            vec![
                PathSegment::MoveTo(pt(13.0, 3.0)),
                PathSegment::CubicTo(pt(12.0, 2.0), pt(11.0, 1.0), pt(10.0, 0.0)),
                PathSegment::LineTo(pt(0.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_tiny_skia_conversion() {
        let p = square(0.0, 0.0, 4.0);
        let ts = p.to_tiny_skia().unwrap();
        assert_eq!(ts.bounds().right(), 4.0);
        let back = Path::from_tiny_skia(&ts);
        assert_eq!(back.verbs(), p.verbs());
        assert!(Path::new().to_tiny_skia().is_none());
    }
}

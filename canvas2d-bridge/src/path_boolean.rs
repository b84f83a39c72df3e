//! Boolean operations on paths.
//!
//! Both operands are flattened to edges and swept top to bottom in scanbeams: the
//! horizontal bands between consecutive vertex and crossing heights, inside which no
//! two edges cross. In each beam the edges are ordered left to right, the winding of
//! each operand is tracked across them, and the spans where the operation holds
//! become trapezoids. Trapezoids bounded by the same pair of edges in consecutive
//! beams are stitched into one contour.

use crate::path::{Path, DEFAULT_TOLERANCE};
use crate::style::CanvasFillRule;
use std::collections::BTreeMap;

/// Upper bound on flattened edges across both operands.
pub const MAX_EDGES: usize = 4096;

/// Beam heights closer than this are merged.
const HEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathOp {
    /// `a - b`
    Difference,
    Intersect,
    Union,
    Xor,
    /// `b - a`
    ReverseDifference,
}

impl PathOp {
    fn apply(self, in_a: bool, in_b: bool) -> bool {
        match self {
            PathOp::Difference => in_a && !in_b,
            PathOp::Intersect => in_a && in_b,
            PathOp::Union => in_a || in_b,
            PathOp::Xor => in_a != in_b,
            PathOp::ReverseDifference => in_b && !in_a,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    top_x: f64,
    top_y: f64,
    bottom_x: f64,
    bottom_y: f64,
    /// +1 when the source segment runs downwards.
    dir: i32,
    operand: usize,
}

impl Edge {
    fn x_at(&self, y: f64) -> f64 {
        let t = (y - self.top_y) / (self.bottom_y - self.top_y);
        self.top_x + t * (self.bottom_x - self.top_x)
    }

    fn spans(&self, y0: f64, y1: f64) -> bool {
        self.top_y <= y0 + HEIGHT_EPSILON && self.bottom_y >= y1 - HEIGHT_EPSILON
    }
}

fn collect_edges(path: &Path, operand: usize, edges: &mut Vec<Edge>) -> Option<()> {
    for poly in path.flatten(DEFAULT_TOLERANCE) {
        let pts = &poly.points;
        if pts.len() < 2 {
            continue;
        }
        for i in 0..pts.len() {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
                return None;
            }
            if a.y == b.y {
                continue;
            }
            let (top, bottom, dir) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };
            edges.push(Edge {
                top_x: top.x as f64,
                top_y: top.y as f64,
                bottom_x: bottom.x as f64,
                bottom_y: bottom.y as f64,
                dir,
                operand,
            });
            if edges.len() > MAX_EDGES {
                return None;
            }
        }
    }
    Some(())
}

/// Heights where two edges cross strictly inside both.
fn crossing_heights(edges: &[Edge], ys: &mut Vec<f64>) {
    for (i, a) in edges.iter().enumerate() {
        for b in &edges[i + 1..] {
            let lo = a.top_y.max(b.top_y);
            let hi = a.bottom_y.min(b.bottom_y);
            if lo >= hi {
                continue;
            }
            let d_lo = a.x_at(lo) - b.x_at(lo);
            let d_hi = a.x_at(hi) - b.x_at(hi);
            if d_lo * d_hi < 0.0 {
                let t = d_lo / (d_lo - d_hi);
                ys.push(lo + t * (hi - lo));
            }
        }
    }
}

fn is_inside(winding: i32, rule: CanvasFillRule) -> bool {
    match rule {
        CanvasFillRule::NonZero => winding != 0,
        CanvasFillRule::EvenOdd => winding % 2 != 0,
    }
}

/// A stitched run of trapezoids between the same two edges.
struct Chain {
    left: Vec<(f64, f64)>,
    right: Vec<(f64, f64)>,
}

impl Chain {
    fn emit(self, out: &mut Path) {
        let mut pts = self.left.into_iter().chain(self.right.into_iter().rev());
        if let Some((x, y)) = pts.next() {
            out.move_to(x as f32, y as f32);
            for (x, y) in pts {
                out.line_to(x as f32, y as f32);
            }
            out.close();
        }
    }
}

fn sweep(a: &Path, b: &Path, op: PathOp) -> Option<Path> {
    let mut edges = Vec::new();
    collect_edges(a, 0, &mut edges)?;
    collect_edges(b, 1, &mut edges)?;
    if edges.is_empty() {
        return None;
    }
    let rules = [a.fill_rule(), b.fill_rule()];

    let mut ys: Vec<f64> = edges.iter().flat_map(|e| [e.top_y, e.bottom_y]).collect();
    crossing_heights(&edges, &mut ys);
    ys.sort_by(|p, q| p.total_cmp(q));
    ys.dedup_by(|p, q| (*p - *q).abs() < HEIGHT_EPSILON);

    let mut out = Path::new();
    let mut open: BTreeMap<(usize, usize), Chain> = BTreeMap::new();
    for band in ys.windows(2) {
        let (y0, y1) = (band[0], band[1]);
        let ym = (y0 + y1) * 0.5;
        let mut active: Vec<usize> = (0..edges.len())
            .filter(|&i| edges[i].spans(y0, y1))
            .collect();
        active.sort_by(|&i, &j| edges[i].x_at(ym).total_cmp(&edges[j].x_at(ym)));

        let mut next: BTreeMap<(usize, usize), Chain> = BTreeMap::new();
        let mut winding = [0i32; 2];
        let mut span_left: Option<usize> = None;
        for &idx in &active {
            let e = &edges[idx];
            winding[e.operand] += e.dir;
            let inside = op.apply(
                is_inside(winding[0], rules[0]),
                is_inside(winding[1], rules[1]),
            );
            match (span_left, inside) {
                (None, true) => span_left = Some(idx),
                (Some(left), false) => {
                    let key = (left, idx);
                    let (l, r) = (&edges[left], e);
                    let chain = match open.remove(&key) {
                        Some(mut chain) => {
                            chain.left.push((l.x_at(y1), y1));
                            chain.right.push((r.x_at(y1), y1));
                            chain
                        }
                        None => Chain {
                            left: vec![(l.x_at(y0), y0), (l.x_at(y1), y1)],
                            right: vec![(r.x_at(y0), y0), (r.x_at(y1), y1)],
                        },
                    };
                    next.insert(key, chain);
                    span_left = None;
                }
                _ => {}
            }
        }
        // Chains not continued in this beam are complete
        for chain in std::mem::replace(&mut open, next).into_values() {
            chain.emit(&mut out);
        }
    }
    for chain in open.into_values() {
        chain.emit(&mut out);
    }
    Some(out)
}

impl Path {
    /// Combine with `other`. `None` for non-finite input, two empty operands, or
    /// more than [`MAX_EDGES`] flattened edges.
    pub fn op(&self, other: &Path, op: PathOp) -> Option<Path> {
        let result = sweep(self, other, op);
        if result.is_none() {
            log::debug!(target: "canvas", "path boolean {:?} failed", op);
        }
        result
    }

    /// Resolve self-overlaps under the path's fill rule into non-overlapping
    /// contours.
    pub fn simplify(&self) -> Option<Path> {
        sweep(self, &Path::new(), PathOp::Union)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RectParams;
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

    fn area(path: &Path) -> f32 {
        path.flatten(0.1)
            .iter()
            .map(|poly| {
                let pts = &poly.points;
                let mut sum = 0.0;
                for i in 0..pts.len() {
                    let a = pts[i];
                    let b = pts[(i + 1) % pts.len()];
                    sum += a.x * b.y - b.x * a.y;
                }
                (sum * 0.5).abs()
            })
            .sum()
    }

    #[rstest]
    #[case(PathOp::Union, 175.0)]
    #[case(PathOp::Intersect, 25.0)]
    #[case(PathOp::Difference, 75.0)]
    #[case(PathOp::ReverseDifference, 75.0)]
    #[case(PathOp::Xor, 150.0)]
    fn test_overlapping_squares(#[case] op: PathOp, #[case] expected: f32) {
        let a = square(0.0, 0.0, 10.0);
        let b = square(5.0, 5.0, 10.0);
        let result = a.op(&b, op).unwrap();
        assert!((area(&result) - expected).abs() < 1e-3, "{:?}", op);
    }

    #[test]
    fn test_difference_point_containment() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(5.0, 5.0, 10.0);
        let diff = a.op(&b, PathOp::Difference).unwrap();
        assert!(diff.contains(2.0, 2.0, CanvasFillRule::NonZero));
        assert!(!diff.contains(7.0, 7.0, CanvasFillRule::NonZero));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = square(0.0, 0.0, 4.0);
        let b = square(10.0, 10.0, 4.0);
        let result = a.op(&b, PathOp::Intersect).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_simplify_even_odd_hole() {
        let mut p = square(0.0, 0.0, 10.0);
        p.add_path(&square(2.0, 2.0, 6.0), None);
        p.set_fill_rule(CanvasFillRule::EvenOdd);
        let simple = p.simplify().unwrap();
        assert!((area(&simple) - 64.0).abs() < 1e-3);
        assert!(!simple.contains(5.0, 5.0, CanvasFillRule::NonZero));
    }

    #[test]
    fn test_crossing_edges_split_beams() {
        // Bow-tie: the two triangles meet at the crossing point (5, 5)
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 10.0);
        p.line_to(10.0, 0.0);
        p.line_to(0.0, 10.0);
        p.close();
        let simple = p.simplify().unwrap();
        assert!((area(&simple) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_input() {
        assert!(Path::new().op(&Path::new(), PathOp::Union).is_none());
        let mut line = Path::new();
        line.move_to(0.0, 0.0);
        line.line_to(10.0, 0.0);
        assert!(line.simplify().is_none());
    }
}

//! DOMMatrix: the canvas-facing view of an affine transform.

use crate::matrix::Matrix3;

/// DOMMatrix represents a 2D transformation matrix.
///
/// The matrix is represented as:
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DOMMatrix {
    /// Scale X component.
    pub a: f32,
    /// Skew Y component.
    pub b: f32,
    /// Skew X component.
    pub c: f32,
    /// Scale Y component.
    pub d: f32,
    /// Translate X component.
    pub e: f32,
    /// Translate Y component.
    pub f: f32,
}

impl Default for DOMMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl DOMMatrix {
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }

    /// `self * other` (other applied first).
    pub fn multiply(&self, other: &DOMMatrix) -> DOMMatrix {
        Matrix3::from(*self).multiply(&Matrix3::from(*other)).into()
    }

    /// Inverse, or `None` for a singular matrix.
    pub fn inverse(&self) -> Option<DOMMatrix> {
        Matrix3::from(*self).invert().map(Into::into)
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

impl From<Matrix3> for DOMMatrix {
    fn from(m: Matrix3) -> Self {
        let [a, b, c, d, e, f] = m.to_canvas();
        DOMMatrix { a, b, c, d, e, f }
    }
}

impl From<DOMMatrix> for Matrix3 {
    fn from(m: DOMMatrix) -> Self {
        Matrix3::from_canvas(m.a, m.b, m.c, m.d, m.e, m.f)
    }
}

impl From<DOMMatrix> for tiny_skia::Transform {
    fn from(m: DOMMatrix) -> Self {
        tiny_skia::Transform::from_row(m.a, m.b, m.c, m.d, m.e, m.f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_and_inverse() {
        let t = DOMMatrix::new(1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        let s = DOMMatrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let ts = t.multiply(&s);
        assert_eq!(ts.transform_point(1.0, 1.0), (12.0, 22.0));

        let inv = ts.inverse().unwrap();
        let (x, y) = inv.transform_point(12.0, 22.0);
        assert!((x - 1.0).abs() < 1e-6 && (y - 1.0).abs() < 1e-6);
        assert!(DOMMatrix::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_matrix3_conversion_round_trip() {
        let m = DOMMatrix::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(DOMMatrix::from(Matrix3::from(m)), m);
        assert!(DOMMatrix::default().is_identity());
    }
}

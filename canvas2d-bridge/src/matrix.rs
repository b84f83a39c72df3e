//! 3x3 and 4x4 row-major matrices.
//!
//! `Matrix3` stores `[scale_x, skew_x, trans_x, skew_y, scale_y, trans_y, persp_0,
//! persp_1, persp_2]`, the same layout the engine reads from linear memory.
//! Inversion never panics or produces NaN: singular input yields `None`.

use crate::error::{Canvas2dError, Canvas2dResult};
use std::ops::Mul;

/// Determinant magnitude below which a matrix is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    m: [f32; 9],
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix3 {
    pub const IDENTITY: Matrix3 = Matrix3 {
        m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn from_row_major(m: [f32; 9]) -> Self {
        Self { m }
    }

    /// Build from canvas `setTransform(a, b, c, d, e, f)` components.
    pub const fn from_canvas(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self {
            m: [a, c, e, b, d, f, 0.0, 0.0, 1.0],
        }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::from_row_major([1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0])
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::from_row_major([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    /// Rotation by `radians`, clockwise in a y-down coordinate system.
    pub fn rotate(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::from_row_major([cos, -sin, 0.0, sin, cos, 0.0, 0.0, 0.0, 1.0])
    }

    /// Rotation by `radians` about the pivot `(px, py)`.
    pub fn rotate_about(radians: f32, px: f32, py: f32) -> Self {
        Self::concat_all(&[
            Self::translate(px, py),
            Self::rotate(radians),
            Self::translate(-px, -py),
        ])
    }

    /// Skew by factors `kx` (x += kx * y) and `ky` (y += ky * x).
    pub fn skew(kx: f32, ky: f32) -> Self {
        Self::from_row_major([1.0, kx, 0.0, ky, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn as_array(&self) -> &[f32; 9] {
        &self.m
    }

    pub fn to_array(self) -> [f32; 9] {
        self.m
    }

    /// Canvas `(a, b, c, d, e, f)` components; perspective is dropped.
    pub fn to_canvas(&self) -> [f32; 6] {
        let m = &self.m;
        [m[0], m[3], m[1], m[4], m[2], m[5]]
    }

    /// `self * other`: `other` is applied first.
    pub fn multiply(&self, other: &Matrix3) -> Matrix3 {
        let a = &self.m;
        let b = &other.m;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        Matrix3 { m: out }
    }

    /// Left-to-right product of `matrices`; the rightmost is applied first.
    pub fn concat_all(matrices: &[Matrix3]) -> Matrix3 {
        matrices
            .iter()
            .fold(Matrix3::identity(), |acc, m| acc.multiply(m))
    }

    pub fn determinant(&self) -> f64 {
        let m = self.m.map(f64::from);
        m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6])
    }

    /// Inverse matrix, or `None` when singular or not representable.
    pub fn invert(&self) -> Option<Matrix3> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let m = self.m.map(f64::from);
        let inv_det = 1.0 / det;
        let adj = [
            m[4] * m[8] - m[5] * m[7],
            m[2] * m[7] - m[1] * m[8],
            m[1] * m[5] - m[2] * m[4],
            m[5] * m[6] - m[3] * m[8],
            m[0] * m[8] - m[2] * m[6],
            m[2] * m[3] - m[0] * m[5],
            m[3] * m[7] - m[4] * m[6],
            m[1] * m[6] - m[0] * m[7],
            m[0] * m[4] - m[1] * m[3],
        ];
        let out = adj.map(|v| (v * inv_det) as f32);
        if out.iter().all(|v| v.is_finite()) {
            Some(Matrix3 { m: out })
        } else {
            None
        }
    }

    pub fn is_identity(&self) -> bool {
        self.m == Self::IDENTITY.m
    }

    pub fn is_finite(&self) -> bool {
        self.m.iter().all(|v| v.is_finite())
    }

    /// True when the bottom row is `[0, 0, 1]`.
    pub fn is_affine(&self) -> bool {
        self.m[6] == 0.0 && self.m[7] == 0.0 && self.m[8] == 1.0
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.m;
        let px = m[0] * x + m[1] * y + m[2];
        let py = m[3] * x + m[4] * y + m[5];
        if self.is_affine() {
            return (px, py);
        }
        let w = m[6] * x + m[7] * y + m[8];
        if w == 0.0 {
            (px, py)
        } else {
            (px / w, py / w)
        }
    }

    /// Map interleaved `[x0, y0, x1, y1, ...]` coordinates in place.
    pub fn map_points(&self, coords: &mut [f32]) {
        for pair in coords.chunks_exact_mut(2) {
            let (x, y) = self.map_point(pair[0], pair[1]);
            pair[0] = x;
            pair[1] = y;
        }
    }

    /// Axis-aligned bounds of the mapped rectangle corners `(l, t, r, b)`.
    pub fn map_rect(&self, left: f32, top: f32, right: f32, bottom: f32) -> [f32; 4] {
        let mut corners = [left, top, right, top, right, bottom, left, bottom];
        self.map_points(&mut corners);
        let xs = [corners[0], corners[2], corners[4], corners[6]];
        let ys = [corners[1], corners[3], corners[5], corners[7]];
        [
            xs.iter().copied().fold(f32::INFINITY, f32::min),
            ys.iter().copied().fold(f32::INFINITY, f32::min),
            xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        ]
    }

    /// Rotation component of the upper 2x2 in radians.
    pub fn rotation(&self) -> f32 {
        self.m[3].atan2(self.m[0])
    }

    /// Geometric-mean scale factor of the upper 2x2.
    pub fn mean_scale(&self) -> f32 {
        let m = &self.m;
        (m[0] * m[4] - m[1] * m[3]).abs().sqrt()
    }

    pub fn to_transform(&self) -> tiny_skia::Transform {
        let m = &self.m;
        tiny_skia::Transform::from_row(m[0], m[3], m[1], m[4], m[2], m[5])
    }

    pub fn from_transform(t: tiny_skia::Transform) -> Self {
        Self::from_row_major([t.sx, t.kx, t.tx, t.ky, t.sy, t.ty, 0.0, 0.0, 1.0])
    }
}

impl Mul for Matrix3 {
    type Output = Matrix3;

    fn mul(self, rhs: Matrix3) -> Matrix3 {
        self.multiply(&rhs)
    }
}

impl TryFrom<&[f32]> for Matrix3 {
    type Error = Canvas2dError;

    /// Accepts canvas `a..f` (6), row-major 3x3 (9) or row-major 4x4 (16) values.
    fn try_from(values: &[f32]) -> Canvas2dResult<Self> {
        match values.len() {
            6 => Ok(Matrix3::from_canvas(
                values[0], values[1], values[2], values[3], values[4], values[5],
            )),
            9 => {
                let mut m = [0.0; 9];
                m.copy_from_slice(values);
                Ok(Matrix3::from_row_major(m))
            }
            16 => Ok(Matrix4::try_from(values)?.to_matrix3()),
            n => Err(Canvas2dError::InvalidMatrixShape(n)),
        }
    }
}

/// Row-major 4x4 matrix used for 3D-style layer transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    m: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix4 {
    pub const fn identity() -> Self {
        Self {
            m: [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    pub const fn from_row_major(m: [f32; 16]) -> Self {
        Self { m }
    }

    pub fn translate(x: f32, y: f32, z: f32) -> Self {
        let mut out = Self::identity();
        out.m[3] = x;
        out.m[7] = y;
        out.m[11] = z;
        out
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        let mut out = Self::identity();
        out.m[0] = x;
        out.m[5] = y;
        out.m[10] = z;
        out
    }

    pub fn rotate_x(degrees: f32) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::from_row_major([
            1.0, 0.0, 0.0, 0.0, //
            0.0, c, -s, 0.0, //
            0.0, s, c, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    pub fn rotate_y(degrees: f32) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::from_row_major([
            c, 0.0, s, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            -s, 0.0, c, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    pub fn rotate_z(degrees: f32) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::from_row_major([
            c, -s, 0.0, 0.0, //
            s, c, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    pub fn as_array(&self) -> &[f32; 16] {
        &self.m
    }

    /// `self * other`: `other` is applied first.
    pub fn multiply(&self, other: &Matrix4) -> Matrix4 {
        let mut out = [0.0f32; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = (0..4)
                    .map(|k| self.m[row * 4 + k] * other.m[k * 4 + col])
                    .sum();
            }
        }
        Matrix4 { m: out }
    }

    pub fn is_identity(&self) -> bool {
        self.m == Self::identity().m
    }

    pub fn invert(&self) -> Option<Matrix4> {
        let a = self.m.map(f64::from);
        let mut inv = [0.0f64; 16];

        // Cofactor expansion over 2x2 sub-determinants
        let s0 = a[0] * a[5] - a[4] * a[1];
        let s1 = a[0] * a[6] - a[4] * a[2];
        let s2 = a[0] * a[7] - a[4] * a[3];
        let s3 = a[1] * a[6] - a[5] * a[2];
        let s4 = a[1] * a[7] - a[5] * a[3];
        let s5 = a[2] * a[7] - a[6] * a[3];
        let c5 = a[10] * a[15] - a[14] * a[11];
        let c4 = a[9] * a[15] - a[13] * a[11];
        let c3 = a[9] * a[14] - a[13] * a[10];
        let c2 = a[8] * a[15] - a[12] * a[11];
        let c1 = a[8] * a[14] - a[12] * a[10];
        let c0 = a[8] * a[13] - a[12] * a[9];

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let d = 1.0 / det;

        inv[0] = (a[5] * c5 - a[6] * c4 + a[7] * c3) * d;
        inv[1] = (-a[1] * c5 + a[2] * c4 - a[3] * c3) * d;
        inv[2] = (a[13] * s5 - a[14] * s4 + a[15] * s3) * d;
        inv[3] = (-a[9] * s5 + a[10] * s4 - a[11] * s3) * d;
        inv[4] = (-a[4] * c5 + a[6] * c2 - a[7] * c1) * d;
        inv[5] = (a[0] * c5 - a[2] * c2 + a[3] * c1) * d;
        inv[6] = (-a[12] * s5 + a[14] * s2 - a[15] * s1) * d;
        inv[7] = (a[8] * s5 - a[10] * s2 + a[11] * s1) * d;
        inv[8] = (a[4] * c4 - a[5] * c2 + a[7] * c0) * d;
        inv[9] = (-a[0] * c4 + a[1] * c2 - a[3] * c0) * d;
        inv[10] = (a[12] * s4 - a[13] * s2 + a[15] * s0) * d;
        inv[11] = (-a[8] * s4 + a[9] * s2 - a[11] * s0) * d;
        inv[12] = (-a[4] * c3 + a[5] * c1 - a[6] * c0) * d;
        inv[13] = (a[0] * c3 - a[1] * c1 + a[2] * c0) * d;
        inv[14] = (-a[12] * s3 + a[13] * s1 - a[14] * s0) * d;
        inv[15] = (a[8] * s3 - a[9] * s1 + a[10] * s0) * d;

        let out = inv.map(|v| v as f32);
        if out.iter().all(|v| v.is_finite()) {
            Some(Matrix4 { m: out })
        } else {
            None
        }
    }

    /// Map a point on the z = 0 plane, with perspective divide.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.m;
        let px = m[0] * x + m[1] * y + m[3];
        let py = m[4] * x + m[5] * y + m[7];
        let w = m[12] * x + m[13] * y + m[15];
        if w == 0.0 || w == 1.0 {
            (px, py)
        } else {
            (px / w, py / w)
        }
    }

    /// Bounds of the mapped rectangle `(l, t, r, b)`.
    pub fn map_rect(&self, left: f32, top: f32, right: f32, bottom: f32) -> [f32; 4] {
        self.to_matrix3().map_rect(left, top, right, bottom)
    }

    /// Drop the z row and column.
    pub fn to_matrix3(&self) -> Matrix3 {
        let m = &self.m;
        Matrix3::from_row_major([m[0], m[1], m[3], m[4], m[5], m[7], m[12], m[13], m[15]])
    }
}

impl TryFrom<&[f32]> for Matrix4 {
    type Error = Canvas2dError;

    fn try_from(values: &[f32]) -> Canvas2dResult<Self> {
        let m: [f32; 16] = values
            .try_into()
            .map_err(|_| Canvas2dError::InvalidMatrixShape(values.len()))?;
        Ok(Matrix4::from_row_major(m))
    }
}

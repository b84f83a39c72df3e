//! 4x5 color matrices for filter effects.

use crate::color::ColorF32;

/// Row-major 4x5 affine color transform.
///
/// ```text
/// R' = m0  * R + m1  * G + m2  * B + m3  * A + m4
/// G' = m5  * R + m6  * G + m7  * B + m8  * A + m9
/// B' = m10 * R + m11 * G + m12 * B + m13 * A + m14
/// A' = m15 * R + m16 * G + m17 * B + m18 * A + m19
/// ```
///
/// Inputs are non-premultiplied components in `[0, 1]`; the translation column is in
/// the same unit range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    pub m: [f32; 20],
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl ColorMatrix {
    pub const fn new(m: [f32; 20]) -> Self {
        Self { m }
    }

    pub const fn identity() -> Self {
        Self::new([
            1.0, 0.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub fn scale(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::new([
            r, 0.0, 0.0, 0.0, 0.0, //
            0.0, g, 0.0, 0.0, 0.0, //
            0.0, 0.0, b, 0.0, 0.0, //
            0.0, 0.0, 0.0, a, 0.0,
        ])
    }

    pub fn grayscale() -> Self {
        Self::saturation(0.0)
    }

    pub fn sepia() -> Self {
        Self::new([
            0.393, 0.769, 0.189, 0.0, 0.0, //
            0.349, 0.686, 0.168, 0.0, 0.0, //
            0.272, 0.534, 0.131, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub fn brightness(factor: f32) -> Self {
        Self::scale(factor, factor, factor, 1.0)
    }

    pub fn contrast(factor: f32) -> Self {
        let offset = 0.5 * (1.0 - factor);
        Self::new([
            factor, 0.0, 0.0, 0.0, offset, //
            0.0, factor, 0.0, 0.0, offset, //
            0.0, 0.0, factor, 0.0, offset, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    /// Saturation with Rec. 601 luma weights; 0 is grayscale, 1 is identity.
    pub fn saturation(factor: f32) -> Self {
        let inv = 1.0 - factor;
        let r = 0.299 * inv;
        let g = 0.587 * inv;
        let b = 0.114 * inv;
        Self::new([
            r + factor, g, b, 0.0, 0.0, //
            r, g + factor, b, 0.0, 0.0, //
            r, g, b + factor, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub fn invert() -> Self {
        Self::new([
            -1.0, 0.0, 0.0, 0.0, 1.0, //
            0.0, -1.0, 0.0, 0.0, 1.0, //
            0.0, 0.0, -1.0, 0.0, 1.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    /// `self ∘ other`: the result applies `other` first, then `self`.
    pub fn concat(&self, other: &ColorMatrix) -> ColorMatrix {
        let a = &self.m;
        let b = &other.m;
        let mut out = [0.0f32; 20];
        for row in 0..4 {
            for col in 0..5 {
                let mut sum: f32 = (0..4).map(|k| a[row * 5 + k] * b[k * 5 + col]).sum();
                if col == 4 {
                    sum += a[row * 5 + 4];
                }
                out[row * 5 + col] = sum;
            }
        }
        ColorMatrix::new(out)
    }

    fn apply_components(&self, c: [f32; 4]) -> [f32; 4] {
        let m = &self.m;
        let mut out = [0.0f32; 4];
        for (row, value) in out.iter_mut().enumerate() {
            let r = &m[row * 5..row * 5 + 5];
            *value = r[0] * c[0] + r[1] * c[1] + r[2] * c[2] + r[3] * c[3] + r[4];
        }
        out
    }

    pub fn apply(&self, color: ColorF32) -> ColorF32 {
        let [r, g, b, a] = self.apply_components(color.to_array());
        ColorF32::new(r, g, b, a)
    }

    /// Transform non-premultiplied RGBA8 pixels in place.
    pub fn apply_rgba8_in_place(&self, pixels: &mut [u8]) {
        for px in pixels.chunks_exact_mut(4) {
            let input = [px[0], px[1], px[2], px[3]].map(|v| v as f32 / 255.0);
            let output = self.apply_components(input);
            for (dst, v) in px.iter_mut().zip(output) {
                *dst = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_leaves_color_unchanged() {
        let c = ColorF32::new(0.2, 0.4, 0.6, 0.8);
        assert_eq!(ColorMatrix::identity().apply(c), c);
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let gray = ColorMatrix::grayscale().apply(ColorF32::new(1.0, 0.0, 0.0, 1.0));
        assert!((gray.r - 0.299).abs() < 1e-6);
        assert_eq!(gray.r, gray.g);
        assert_eq!(gray.g, gray.b);
    }

    #[test]
    fn test_concat_applies_other_first() {
        // Invert, then halve: (1 - x) / 2
        let m = ColorMatrix::scale(0.5, 0.5, 0.5, 1.0).concat(&ColorMatrix::invert());
        let c = m.apply(ColorF32::new(0.2, 0.0, 1.0, 1.0));
        assert!((c.r - 0.4).abs() < 1e-6);
        assert!((c.g - 0.5).abs() < 1e-6);
        assert!(c.b.abs() < 1e-6);

        // Halve, then invert: 1 - x / 2
        let m = ColorMatrix::invert().concat(&ColorMatrix::scale(0.5, 0.5, 0.5, 1.0));
        let c = m.apply(ColorF32::new(0.2, 0.0, 1.0, 1.0));
        assert!((c.r - 0.9).abs() < 1e-6);
        assert!((c.b - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_concat_with_identity() {
        let sepia = ColorMatrix::sepia();
        assert_eq!(sepia.concat(&ColorMatrix::identity()), sepia);
        assert_eq!(ColorMatrix::identity().concat(&sepia), sepia);
    }

    #[test]
    fn test_apply_rgba8_clamps() {
        let mut px = [200, 100, 0, 255];
        ColorMatrix::brightness(2.0).apply_rgba8_in_place(&mut px);
        assert_eq!(px, [255, 200, 0, 255]);
        ColorMatrix::contrast(1.0).apply_rgba8_in_place(&mut px);
        assert_eq!(px, [255, 200, 0, 255]);
    }
}

//! Separable Gaussian blur over premultiplied RGBA8 pixels.
//!
//! Weights are 16.16 fixed point and sum to exactly `1 << 16`. Samples outside the
//! buffer are transparent, so blurred shapes fade out at the surface edge instead
//! of smearing it.

const ONE_Q16: u32 = 1 << 16;

/// Kernel radius for a sigma: three standard deviations, rounded up.
pub(crate) fn radius_for_sigma(sigma: f32) -> u32 {
    (sigma * 3.0).ceil().max(0.0) as u32
}

pub(crate) fn gaussian_kernel_q16(sigma: f32) -> Vec<u32> {
    let radius = radius_for_sigma(sigma);
    if radius == 0 || !sigma.is_finite() || sigma <= 0.0 {
        return vec![ONE_Q16];
    }

    let r = radius as i32;
    let denom = 2.0 * (sigma as f64) * (sigma as f64);
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = i as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|w| ((w / sum) * ONE_Q16 as f64).round().clamp(0.0, ONE_Q16 as f64) as u32)
        .collect();

    // Fold the rounding error into the center tap
    let total: i64 = weights.iter().map(|w| *w as i64).sum();
    let mid = weights.len() / 2;
    weights[mid] = (weights[mid] as i64 + ONE_Q16 as i64 - total).clamp(0, ONE_Q16 as i64) as u32;
    weights
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + (1 << 15)) >> 16).min(255) as u8
}

/// Blur `pixels` (premultiplied RGBA8, `width * height * 4` bytes) in place.
pub(crate) fn blur_rgba8_premul(pixels: &mut [u8], width: u32, height: u32, sigma: f32) {
    let kernel = gaussian_kernel_q16(sigma);
    if kernel.len() == 1 || width == 0 || height == 0 {
        return;
    }
    let mut tmp = vec![0u8; pixels.len()];
    horizontal_pass(pixels, &mut tmp, width as i32, height as i32, &kernel);
    vertical_pass(&tmp, pixels, width as i32, height as i32, &kernel);
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], w: i32, h: i32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = x + ki as i32 - radius;
                if sx < 0 || sx >= w {
                    continue;
                }
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += kw as u64 * src[idx + c] as u64;
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], w: i32, h: i32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = y + ki as i32 - radius;
                if sy < 0 || sy >= h {
                    continue;
                }
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += kw as u64 * src[idx + c] as u64;
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_sums_to_one() {
        for sigma in [0.5, 1.0, 2.5, 8.0] {
            let k = gaussian_kernel_q16(sigma);
            assert_eq!(k.iter().sum::<u32>(), ONE_Q16, "sigma {}", sigma);
            assert_eq!(k.len() as u32, radius_for_sigma(sigma) * 2 + 1);
        }
        assert_eq!(gaussian_kernel_q16(0.0), vec![ONE_Q16]);
    }

    #[test]
    fn test_blur_spreads_single_pixel() {
        let (w, h) = (9u32, 9u32);
        let mut px = vec![0u8; (w * h * 4) as usize];
        let center = ((4 * w + 4) * 4) as usize;
        px[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

        blur_rgba8_premul(&mut px, w, h, 1.0);

        let alpha = |x: u32, y: u32| px[((y * w + x) * 4 + 3) as usize];
        assert!(alpha(4, 4) < 255);
        assert!(alpha(5, 4) > 0);
        assert_eq!(alpha(5, 4), alpha(4, 5));
        assert!(alpha(4, 4) > alpha(6, 4));
    }

    #[test]
    fn test_opaque_fill_darkens_only_at_edges() {
        let (w, h) = (8u32, 8u32);
        let mut px = vec![255u8; (w * h * 4) as usize];
        blur_rgba8_premul(&mut px, w, h, 1.0);
        let alpha = |x: u32, y: u32| px[((y * w + x) * 4 + 3) as usize];
        assert!(alpha(0, 0) < 255);
        assert!(alpha(4, 4) >= 250);
    }
}

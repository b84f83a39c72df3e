//! CPU-side pixel blocks and their encodings.

use crate::error::{Canvas2dError, Canvas2dResult};

/// Default density written into PNG pHYs chunks.
pub const DEFAULT_PPI: f32 = 72.0;

/// Non-premultiplied RGBA8888 pixels in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageData {
    /// Transparent black pixels.
    pub fn new(width: u32, height: u32) -> Canvas2dResult<Self> {
        if width == 0 || height == 0 {
            return Err(Canvas2dError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        })
    }

    /// Wrap straight-alpha RGBA bytes. The length must be `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Canvas2dResult<Self> {
        if width == 0 || height == 0 {
            return Err(Canvas2dError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Canvas2dError::InvalidArgument(format!(
                "image data has {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert premultiplied RGBA (engine layout) into straight alpha.
    pub fn from_premultiplied(width: u32, height: u32, mut data: Vec<u8>) -> Canvas2dResult<Self> {
        unpremultiply_in_place(&mut data);
        Self::from_rgba(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// RGBA of the pixel at `(x, y)`, `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let px = &self.data[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Premultiplied copy of the pixels.
    pub fn to_premultiplied(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        premultiply_in_place(&mut data);
        data
    }

    /// Pixels as `f32` components in `[0, 1]`, still straight alpha.
    pub fn to_rgba_f32(&self) -> Vec<f32> {
        self.data.iter().map(|v| *v as f32 / 255.0).collect()
    }

    /// Encode as PNG with a pHYs chunk for `ppi` (72 if `None`).
    pub fn to_png(&self, ppi: Option<f32>) -> Canvas2dResult<Vec<u8>> {
        let ppi = ppi.unwrap_or(DEFAULT_PPI);

        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            // pHYs is pixels per meter
            let ppm = (ppi.max(0.0) / 0.0254).round() as u32;
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));

            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.data)?;
        }
        Ok(buf)
    }

    /// Encode as baseline JPEG. Alpha is dropped after compositing onto black, the
    /// way a canvas without an alpha channel presents; `quality` is clamped to 1..=100.
    pub fn to_jpeg(&self, quality: u8) -> Canvas2dResult<Vec<u8>> {
        let premultiplied = self.to_premultiplied();
        let rgb: Vec<u8> = premultiplied
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();

        let mut buf = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder.encode(&rgb, self.width, self.height, image::ExtendedColorType::Rgb8)?;
        Ok(buf)
    }
}

/// `(c * a + 127) / 255` per color channel.
pub fn premultiply_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        match a {
            255 => {}
            0 => px[..3].fill(0),
            _ => {
                let a16 = a as u16;
                for c in &mut px[..3] {
                    *c = ((*c as u16 * a16 + 127) / 255) as u8;
                }
            }
        }
    }
}

/// Inverse of [`premultiply_in_place`], saturating at 255.
pub fn unpremultiply_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        match a {
            255 => {}
            0 => px[..3].fill(0),
            _ => {
                let alpha_f = a as f32 / 255.0;
                for c in &mut px[..3] {
                    *c = (*c as f32 / alpha_f).round().min(255.0) as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_length() {
        assert!(ImageData::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(ImageData::new(0, 4).is_err());
    }

    #[test]
    fn test_premultiply_round_trip_is_close() {
        let mut data = vec![200, 100, 50, 128, 10, 20, 30, 0, 1, 2, 3, 255];
        let original = data.clone();
        premultiply_in_place(&mut data);
        assert_eq!(&data[4..8], &[0, 0, 0, 0]);
        assert_eq!(&data[8..12], &[1, 2, 3, 255]);
        unpremultiply_in_place(&mut data);
        for (a, b) in data[..3].iter().zip(&original[..3]) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_png_signature_and_phys() {
        let img = ImageData::from_rgba(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 128]).unwrap();
        let png_data = img.to_png(Some(144.0)).unwrap();
        assert_eq!(&png_data[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

        let decoder = png::Decoder::new(png_data.as_slice());
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.xppu, 5669);
        assert_eq!(reader.info().width, 2);
    }

    #[test]
    fn test_jpeg_signature() {
        let img = ImageData::new(8, 8).unwrap();
        let jpeg = img.to_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_pixel_lookup() {
        let img = ImageData::from_rgba(1, 2, vec![0, 0, 0, 0, 9, 8, 7, 6]).unwrap();
        assert_eq!(img.pixel(0, 1), Some([9, 8, 7, 6]));
        assert_eq!(img.pixel(1, 0), None);
        assert_eq!(img.to_rgba_f32()[4], 9.0 / 255.0);
    }
}

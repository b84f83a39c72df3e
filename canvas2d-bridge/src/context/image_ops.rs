//! Image drawing, pixel access and export for Canvas2dContext.

use super::drawing::with_shadow_matrix;
use super::Canvas2dContext;
use crate::engine::{ImageId, NativeContext};
use crate::error::Canvas2dResult;
use crate::geometry::{DirtyRect, ImageCropParams, Rect};
use crate::image_data::ImageData;
use crate::paint::ImagePaint;

impl Canvas2dContext {
    // --- drawImage ---

    /// Draw `image` at its natural size with its top-left corner at `(dx, dy)`.
    pub fn draw_image_whole(&mut self, image: &ImageData, dx: f32, dy: f32) -> Canvas2dResult<()> {
        let (w, h) = (image.width() as f32, image.height() as f32);
        self.draw_image_rect(
            image,
            &ImageCropParams {
                sx: 0.0,
                sy: 0.0,
                sw: w,
                sh: h,
                dx,
                dy,
                dw: w,
                dh: h,
            },
        )
    }

    /// Draw all of `image` into the rectangle `(dx, dy, dw, dh)`.
    pub fn draw_image_scaled(
        &mut self,
        image: &ImageData,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
    ) -> Canvas2dResult<()> {
        let (w, h) = (image.width() as f32, image.height() as f32);
        self.draw_image_rect(
            image,
            &ImageCropParams {
                sx: 0.0,
                sy: 0.0,
                sw: w,
                sh: h,
                dx,
                dy,
                dw,
                dh,
            },
        )
    }

    /// Draw the source rectangle of `image` into the destination rectangle.
    ///
    /// A source rectangle reaching outside the image is clipped to it and the
    /// destination shrinks by the same proportion.
    pub fn draw_image_rect(
        &mut self,
        image: &ImageData,
        params: &ImageCropParams,
    ) -> Canvas2dResult<()> {
        log::debug!(
            target: "canvas",
            "drawImage {}x{} {:?}",
            image.width(),
            image.height(),
            params
        );
        if !params.is_finite() {
            return Ok(());
        }
        let src = Rect::from_xywh(params.sx, params.sy, params.sw, params.sh);
        let dst = Rect::from_xywh(params.dx, params.dy, params.dw, params.dh);
        let Some((src, dst)) = fit_source_rect(src, dst, image.width(), image.height()) else {
            return Ok(());
        };
        let state = &self.state;
        let ctm = state.transform;
        let Some(inverse) = ctm.invert() else {
            log::debug!(target: "canvas", "drawImage skipped under singular transform");
            return Ok(());
        };

        let paint = ImagePaint {
            alpha: state.global_alpha,
            blend_mode: state.global_composite_operation,
            quality: state.image_filter_quality(),
            mask_blur_sigma: None,
            silhouette: None,
        };
        let pixels = image.to_premultiplied();

        self.surface.with_bound(|native| {
            let id = native.with_bytes(&pixels, |engine, ptr| {
                engine.make_image(image.width(), image.height(), ptr)
            })?;
            let draw = |native: &mut NativeContext, paint: &ImagePaint| {
                draw_image_region(native, id, &src, &dst, paint)
            };
            let drawn = if state.shadow.is_visible() {
                let shadow_paint = state.shadow.shadow_image_paint(&paint, state.global_alpha);
                with_shadow_matrix(native, &ctm, &inverse, &state.shadow, |native| {
                    draw(native, &shadow_paint)
                })
                .and_then(|_| draw(native, &paint))
            } else {
                draw(native, &paint)
            };
            let released = native.engine_mut().delete_image(id);
            drawn?;
            released
        })
    }

    /// Draw the current contents of another context at `(dx, dy)`.
    pub fn draw_canvas_whole(
        &mut self,
        source: &Canvas2dContext,
        dx: f32,
        dy: f32,
    ) -> Canvas2dResult<()> {
        let image = source.snapshot()?;
        self.draw_image_whole(&image, dx, dy)
    }

    pub fn draw_canvas_rect(
        &mut self,
        source: &Canvas2dContext,
        params: &ImageCropParams,
    ) -> Canvas2dResult<()> {
        let image = source.snapshot()?;
        self.draw_image_rect(&image, params)
    }

    // --- Pixel access ---

    /// A transparent `ImageData`. Zero sizes are an error.
    pub fn create_image_data(&self, width: u32, height: u32) -> Canvas2dResult<ImageData> {
        ImageData::new(width, height)
    }

    /// Read pixels as straight-alpha RGBA; pixels outside the canvas are transparent.
    pub fn get_image_data(
        &self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Canvas2dResult<ImageData> {
        self.surface.read_pixels(x, y, width, height)
    }

    /// Write `image` at `(dx, dy)`, ignoring transform, clip, alpha and compositing.
    pub fn put_image_data(&mut self, image: &ImageData, dx: i32, dy: i32) -> Canvas2dResult<()> {
        log::debug!(
            target: "canvas",
            "putImageData {}x{} at {} {}",
            image.width(),
            image.height(),
            dx,
            dy
        );
        self.surface.write_pixels(image, dx, dy, None)
    }

    /// Write only the `dirty` region of `image`, positioned as if the whole image
    /// were written at `(dx, dy)`.
    pub fn put_image_data_dirty(
        &mut self,
        image: &ImageData,
        dx: i32,
        dy: i32,
        dirty: &DirtyRect,
    ) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "putImageData dirty {:?} at {} {}", dirty, dx, dy);
        self.surface.write_pixels(image, dx, dy, Some(*dirty))
    }

    // --- Export ---

    /// The whole canvas as straight-alpha RGBA.
    pub fn snapshot(&self) -> Canvas2dResult<ImageData> {
        self.surface.flush()
    }

    /// Encode the canvas as PNG, recording `ppi` in a pHYs chunk when given.
    pub fn to_png(&self, ppi: Option<f32>) -> Canvas2dResult<Vec<u8>> {
        self.surface.to_png(ppi)
    }

    /// Encode the canvas as JPEG; transparent areas come out black.
    pub fn to_jpeg(&self, quality: u8) -> Canvas2dResult<Vec<u8>> {
        self.surface.to_jpeg(quality)
    }
}

fn draw_image_region(
    native: &mut NativeContext,
    image: ImageId,
    src: &Rect,
    dst: &Rect,
    paint: &ImagePaint,
) -> Canvas2dResult<()> {
    let src = native.stage_src_rect(src)?;
    let dst = native.stage_rect(dst)?;
    native.engine_mut().draw_image_rect(image, src, dst, paint)
}

/// Clip `src` to the image bounds and shrink `dst` in proportion.
fn fit_source_rect(src: Rect, dst: Rect, width: u32, height: u32) -> Option<(Rect, Rect)> {
    if src.is_empty() || dst.is_empty() {
        return None;
    }
    let bounds = Rect::from_ltrb(0.0, 0.0, width as f32, height as f32);
    let clipped = src.intersect(&bounds)?;
    if clipped.is_empty() {
        return None;
    }
    let sx = dst.width() / src.width();
    let sy = dst.height() / src.height();
    let fitted = Rect::from_ltrb(
        dst.left + (clipped.left - src.left) * sx,
        dst.top + (clipped.top - src.top) * sy,
        dst.right - (src.right - clipped.right) * sx,
        dst.bottom - (src.bottom - clipped.bottom) * sy,
    );
    Some((clipped, fitted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, EngineConfig, EngineHandle};
    use crate::font_config::FontConfig;

    fn context(width: u32, height: u32) -> Canvas2dContext {
        Canvas2dContext::with_config(width, height, FontConfig::empty()).unwrap()
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> ImageData {
        let data = rgba.repeat((width * height) as usize);
        ImageData::from_rgba(width, height, data).unwrap()
    }

    #[test]
    fn test_fit_source_rect_clips_and_scales() {
        let src = Rect::from_xywh(-5.0, 0.0, 20.0, 10.0);
        let dst = Rect::from_xywh(0.0, 0.0, 40.0, 20.0);
        let (src, dst) = fit_source_rect(src, dst, 10, 10).unwrap();
        assert_eq!(src, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0));
        assert_eq!(dst, Rect::from_ltrb(10.0, 0.0, 30.0, 20.0));

        let outside = Rect::from_xywh(20.0, 20.0, 5.0, 5.0);
        assert!(fit_source_rect(outside, dst, 10, 10).is_none());
    }

    #[test]
    fn test_draw_image_whole() {
        let mut ctx = context(20, 20);
        ctx.draw_image_whole(&solid(4, 4, [255, 0, 0, 255]), 2.0, 2.0)
            .unwrap();
        assert_eq!(ctx.get_image_data(3, 3, 1, 1).unwrap().pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(ctx.get_image_data(7, 7, 1, 1).unwrap().pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_draw_image_scaled_covers_destination() {
        let mut ctx = context(20, 20);
        ctx.set_image_smoothing_enabled(false);
        ctx.draw_image_scaled(&solid(2, 2, [0, 0, 255, 255]), 0.0, 0.0, 10.0, 10.0)
            .unwrap();
        let image = ctx.snapshot().unwrap();
        assert_eq!(image.pixel(9, 9), Some([0, 0, 255, 255]));
        assert_eq!(image.pixel(11, 11), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_image_upload_is_released() {
        let (engine, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
        let mut ctx = Canvas2dContext::builder(10, 10)
            .font_config(FontConfig::empty())
            .engine(engine.clone())
            .build()
            .unwrap();
        let before = engine.live_allocations().unwrap();
        ctx.draw_image_whole(&solid(2, 2, [9, 9, 9, 255]), 0.0, 0.0)
            .unwrap();
        assert_eq!(engine.live_allocations().unwrap(), before);

        let calls = log.calls();
        let made = calls
            .iter()
            .filter(|c| matches!(c, EngineCall::MakeImage { .. }))
            .count();
        let deleted = calls
            .iter()
            .filter(|c| matches!(c, EngineCall::DeleteImage(_)))
            .count();
        assert_eq!((made, deleted), (1, 1));
    }

    #[test]
    fn test_image_shadow_is_a_silhouette() {
        let mut ctx = context(20, 20);
        ctx.set_shadow_color("#00ff00");
        ctx.set_shadow_offset_x(5.0);
        ctx.set_shadow_offset_y(5.0);
        ctx.draw_image_whole(&solid(4, 4, [255, 0, 0, 255]), 0.0, 0.0)
            .unwrap();
        let image = ctx.snapshot().unwrap();
        assert_eq!(image.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(7, 7), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_put_image_data_ignores_transform_and_alpha() {
        let mut ctx = context(10, 10);
        ctx.translate(5.0, 5.0).unwrap();
        ctx.set_global_alpha(0.5);
        ctx.put_image_data(&solid(2, 2, [10, 20, 30, 255]), 1, 1)
            .unwrap();
        let image = ctx.snapshot().unwrap();
        assert_eq!(image.pixel(1, 1), Some([10, 20, 30, 255]));
        assert_eq!(image.pixel(6, 6), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_put_image_data_dirty_region() {
        let mut ctx = context(10, 10);
        let dirty = DirtyRect {
            x: 2,
            y: 2,
            width: -2,
            height: 1,
        };
        ctx.put_image_data_dirty(&solid(4, 4, [200, 0, 0, 255]), 0, 0, &dirty)
            .unwrap();
        let image = ctx.snapshot().unwrap();
        assert_eq!(image.pixel(0, 2), Some([200, 0, 0, 255]));
        assert_eq!(image.pixel(1, 2), Some([200, 0, 0, 255]));
        assert_eq!(image.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(0, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_create_image_data() {
        let ctx = context(10, 10);
        let data = ctx.create_image_data(50, 30).unwrap();
        assert_eq!(data.data().len(), 50 * 30 * 4);
        assert!(data.data().iter().all(|&b| b == 0));
        assert!(ctx.create_image_data(0, 3).is_err());
    }

    #[test]
    fn test_draw_canvas_whole() {
        let mut source = context(4, 4);
        source.set_fill_style("#ffffff");
        source
            .fill_rect(&crate::geometry::RectParams {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 4.0,
            })
            .unwrap();
        let mut target = context(10, 10);
        target.draw_canvas_whole(&source, 6.0, 6.0).unwrap();
        let image = target.snapshot().unwrap();
        assert_eq!(image.pixel(7, 7), Some([255, 255, 255, 255]));
        assert_eq!(image.pixel(2, 2), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_png_export_has_signature() {
        let ctx = context(4, 4);
        let png = ctx.to_png(Some(144.0)).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
        let jpeg = ctx.to_jpeg(80).unwrap();
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
    }
}

//! Fill, stroke, clip and hit-test operations for Canvas2dContext.

use super::Canvas2dContext;
use crate::color::ColorF32;
use crate::drawing_state::ClipRecord;
use crate::engine::NativeContext;
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::RectParams;
use crate::matrix::Matrix3;
use crate::memory::ManagedBuffer;
use crate::paint::{Paint, PaintSource, ShadowParams};
use crate::path::Path;
use crate::path2d::Path2D;
use crate::style::{CanvasFillRule, FillStyle, PointMode};

/// Which of the two drawing styles a draw uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StyleRole {
    Fill,
    Stroke,
}

/// Point coordinates for [`Canvas2dContext::draw_points`].
#[derive(Debug, Clone, Copy)]
pub enum PointSource<'a> {
    /// Interleaved `x, y` pairs.
    Coords(&'a [f32]),
    /// `count` interleaved `x, y` f32 pairs already in an engine buffer.
    Buffer {
        buffer: &'a ManagedBuffer,
        count: usize,
    },
}

impl Canvas2dContext {
    // --- Clipping ---

    /// Intersect the clip with the current path using the non-zero winding rule.
    pub fn clip(&mut self) -> Canvas2dResult<()> {
        self.clip_with_rule(CanvasFillRule::NonZero)
    }

    pub fn clip_with_rule(&mut self, fill_rule: CanvasFillRule) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "clip {:?}", fill_rule);
        let path = self.path.path().clone();
        self.apply_clip(path, fill_rule)
    }

    pub fn clip_path2d(&mut self, path: &Path2D) -> Canvas2dResult<()> {
        self.clip_path2d_with_rule(path, CanvasFillRule::NonZero)
    }

    pub fn clip_path2d_with_rule(
        &mut self,
        path: &Path2D,
        fill_rule: CanvasFillRule,
    ) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "clip path2d {:?}", fill_rule);
        self.apply_clip(path.clone(), fill_rule)
    }

    fn apply_clip(&mut self, mut path: Path, fill_rule: CanvasFillRule) -> Canvas2dResult<()> {
        let transform = self.state.transform;
        if transform.invert().is_none() {
            log::debug!(target: "canvas", "clip skipped under singular transform");
            return Ok(());
        }
        path.set_fill_rule(fill_rule);
        self.surface
            .with_bound(|native| native.clip_path(&path, true))?;
        self.state.clips.push(ClipRecord {
            path,
            transform,
            fill_rule,
        });
        Ok(())
    }

    // --- Path drawing ---

    /// Fill the current path using the non-zero winding rule.
    pub fn fill(&mut self) -> Canvas2dResult<()> {
        self.fill_with_rule(CanvasFillRule::NonZero)
    }

    pub fn fill_with_rule(&mut self, fill_rule: CanvasFillRule) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "fill {:?}", fill_rule);
        let mut path = self.path.path().clone();
        path.set_fill_rule(fill_rule);
        self.fill_logical_path(&path)
    }

    /// Stroke the current path.
    pub fn stroke(&mut self) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "stroke");
        let path = self.path.path().clone();
        self.stroke_logical_path(&path)
    }

    pub fn fill_path2d(&mut self, path: &Path2D) -> Canvas2dResult<()> {
        self.fill_path2d_with_rule(path, CanvasFillRule::NonZero)
    }

    pub fn fill_path2d_with_rule(
        &mut self,
        path: &Path2D,
        fill_rule: CanvasFillRule,
    ) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "fill path2d {:?}", fill_rule);
        let mut path = path.clone();
        path.set_fill_rule(fill_rule);
        self.fill_logical_path(&path)
    }

    pub fn stroke_path2d(&mut self, path: &Path2D) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "stroke path2d");
        self.stroke_logical_path(path)
    }

    fn fill_logical_path(&self, path: &Path) -> Canvas2dResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        self.draw_styled(StyleRole::Fill, |native, paint| native.draw_path(path, paint))
    }

    fn stroke_logical_path(&self, path: &Path) -> Canvas2dResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        self.draw_styled(StyleRole::Stroke, |native, paint| {
            native.draw_path(path, paint)
        })
    }

    // --- Rectangles ---

    pub fn fill_rect(&mut self, params: &RectParams) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "fillRect {:?}", params);
        if !params.is_finite() {
            return Ok(());
        }
        let rect = params.to_rect();
        if rect.is_empty() {
            return Ok(());
        }
        self.draw_styled(StyleRole::Fill, |native, paint| native.draw_rect(&rect, paint))
    }

    pub fn stroke_rect(&mut self, params: &RectParams) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "strokeRect {:?}", params);
        if !params.is_finite() || (params.width == 0.0 && params.height == 0.0) {
            return Ok(());
        }
        let mut path = Path::new();
        path.rect(params);
        self.stroke_logical_path(&path)
    }

    /// Clear a rectangle to transparent black. Shadows, alpha and the composite
    /// operation do not apply; the clip does.
    pub fn clear_rect(&mut self, params: &RectParams) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "clearRect {:?}", params);
        if !params.is_finite() || self.state.transform.invert().is_none() {
            return Ok(());
        }
        let rect = params.to_rect();
        if rect.is_empty() {
            return Ok(());
        }
        let paint = Paint::fill(PaintSource::Color(ColorF32::TRANSPARENT))
            .with_blend_mode(tiny_skia::BlendMode::Clear);
        self.surface
            .with_bound(|native| native.draw_rect(&rect, &paint))
    }

    // --- Points ---

    /// Stroke a list of points with the stroke style: as dots, separate segments
    /// or one polyline depending on `mode`.
    pub fn draw_points(
        &mut self,
        mode: PointMode,
        points: PointSource<'_>,
    ) -> Canvas2dResult<()> {
        match points {
            PointSource::Coords(coords) => {
                log::debug!(target: "canvas", "drawPoints {:?} ({} coords)", mode, coords.len());
                if coords.iter().any(|v| !v.is_finite()) {
                    return Ok(());
                }
                let count = coords.len() / 2;
                if count == 0 {
                    return Ok(());
                }
                let coords = &coords[..count * 2];
                self.draw_styled(StyleRole::Stroke, |native, paint| {
                    native.with_f32_buffers([coords], |engine, [ptr]| {
                        engine.draw_points(mode, ptr, count, paint)
                    })
                })
            }
            PointSource::Buffer { buffer, count } => {
                log::debug!(target: "canvas", "drawPoints {:?} ({} staged points)", mode, count);
                if !buffer.belongs_to(self.engine().cell()) {
                    return Err(Canvas2dError::InvalidArgument(
                        "point buffer belongs to a different engine".to_string(),
                    ));
                }
                let ptr = buffer.ptr()?;
                let len = count.checked_mul(2 * std::mem::size_of::<f32>());
                match len {
                    Some(len) if len <= buffer.byte_len() => {}
                    _ => {
                        return Err(Canvas2dError::OutOfBounds {
                            ptr: ptr.offset() as u32,
                            len: len.unwrap_or(usize::MAX),
                        });
                    }
                }
                if count == 0 {
                    return Ok(());
                }
                self.draw_styled(StyleRole::Stroke, |native, paint| {
                    native.engine_mut().draw_points(mode, ptr, count, paint)
                })
            }
        }
    }

    // --- Hit testing ---

    /// Whether the device point `(x, y)` is inside the current path.
    pub fn is_point_in_path(&self, x: f32, y: f32, fill_rule: CanvasFillRule) -> bool {
        let basis = self.path.basis();
        point_in_fill(self.path.path(), &basis, x, y, fill_rule)
    }

    /// Whether the device point `(x, y)` is inside `path` drawn under the current transform.
    pub fn is_point_in_path2d(
        &self,
        path: &Path2D,
        x: f32,
        y: f32,
        fill_rule: CanvasFillRule,
    ) -> bool {
        point_in_fill(path, &self.state.transform, x, y, fill_rule)
    }

    /// Whether the device point `(x, y)` is covered by stroking the current path.
    pub fn is_point_in_stroke(&self, x: f32, y: f32) -> bool {
        let basis = self.path.basis();
        self.point_in_stroke(self.path.path(), &basis, x, y)
    }

    pub fn is_point_in_stroke_path2d(&self, path: &Path2D, x: f32, y: f32) -> bool {
        self.point_in_stroke(path, &self.state.transform, x, y)
    }

    fn point_in_stroke(&self, path: &Path, transform: &Matrix3, x: f32, y: f32) -> bool {
        let Some((lx, ly)) = to_logical(transform, x, y) else {
            return false;
        };
        let Some(outline) = stroke_outline(path, &self.state.stroke_geometry(), transform) else {
            return false;
        };
        outline.contains(lx, ly, CanvasFillRule::NonZero)
    }

    // --- Paint ---

    /// Draw with the fill or stroke style, preceded by the shadow pass when a
    /// shadow is visible. Skipped while the transform is singular.
    pub(super) fn draw_styled(
        &self,
        role: StyleRole,
        mut draw: impl FnMut(&mut NativeContext, &Paint) -> Canvas2dResult<()>,
    ) -> Canvas2dResult<()> {
        let state = &self.state;
        let ctm = state.transform;
        let Some(inverse) = ctm.invert() else {
            log::debug!(target: "canvas", "draw skipped under singular transform");
            return Ok(());
        };
        let style = match role {
            StyleRole::Fill => &state.fill_style,
            StyleRole::Stroke => &state.stroke_style,
        };

        self.surface.with_bound(|native| {
            let Some(source) = resolve_source(
                native,
                style,
                &ctm,
                state.global_alpha,
                state.image_filter_quality(),
            )?
            else {
                return Ok(());
            };
            let paint = match role {
                StyleRole::Fill => Paint::fill(source),
                StyleRole::Stroke => Paint::stroke(source, state.stroke_geometry()),
            }
            .with_blend_mode(state.global_composite_operation);

            if state.shadow.is_visible() {
                let shadow_paint = state.shadow.shadow_paint(&paint, state.global_alpha);
                with_shadow_matrix(native, &ctm, &inverse, &state.shadow, |native| {
                    draw(native, &shadow_paint)
                })?;
            }
            draw(native, &paint)
        })
    }
}

/// The paint source for `style` under `ctm`; `None` when nothing should be drawn.
pub(super) fn resolve_source(
    native: &mut NativeContext,
    style: &FillStyle,
    ctm: &Matrix3,
    global_alpha: f32,
    quality: tiny_skia::FilterQuality,
) -> Canvas2dResult<Option<PaintSource>> {
    match style {
        FillStyle::Color(color) => Ok(Some(PaintSource::Color(
            color.with_alpha_multiplied(global_alpha),
        ))),
        FillStyle::Gradient(gradient) => gradient.materialize(native, ctm, global_alpha),
        FillStyle::Pattern(pattern) => pattern.materialize(native, ctm, global_alpha, quality),
    }
}

/// Run `draw` with the shadow offset applied in device pixels.
///
/// The engine matrix becomes `translate(offset) * ctm` for the duration of `draw`
/// and is restored afterwards, even when `draw` fails.
pub(super) fn with_shadow_matrix<R>(
    native: &mut NativeContext,
    ctm: &Matrix3,
    inverse: &Matrix3,
    shadow: &ShadowParams,
    draw: impl FnOnce(&mut NativeContext) -> Canvas2dResult<R>,
) -> Canvas2dResult<R> {
    native.engine_mut().save()?;
    let result = native
        .concat(inverse)
        .and_then(|_| native.concat(&Matrix3::translate(shadow.offset_x, shadow.offset_y)))
        .and_then(|_| native.concat(ctm))
        .and_then(|_| draw(native));
    let restored = native.engine_mut().restore();
    let value = result?;
    restored?;
    Ok(value)
}

fn to_logical(transform: &Matrix3, x: f32, y: f32) -> Option<(f32, f32)> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(transform.invert()?.map_point(x, y))
}

fn point_in_fill(
    path: &Path,
    transform: &Matrix3,
    x: f32,
    y: f32,
    fill_rule: CanvasFillRule,
) -> bool {
    match to_logical(transform, x, y) {
        Some((lx, ly)) => path.contains(lx, ly, fill_rule),
        None => false,
    }
}

/// The stroked outline of `path` in its own coordinates.
fn stroke_outline(
    path: &Path,
    geometry: &crate::paint::StrokeGeometry,
    transform: &Matrix3,
) -> Option<Path> {
    let mut source = path.to_tiny_skia()?;
    let mut stroke = geometry.to_tiny_skia();
    let res_scale = tiny_skia::PathStroker::compute_resolution_scale(&transform.to_transform());
    if let Some(dash) = stroke.dash.take() {
        source = source.dash(&dash, res_scale)?;
    }
    let outline = source.stroke(&stroke, res_scale)?;
    Some(Path::from_tiny_skia(&outline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, EngineConfig, EngineHandle};
    use crate::font_config::FontConfig;

    fn context(width: u32, height: u32) -> Canvas2dContext {
        Canvas2dContext::with_config(width, height, FontConfig::empty()).unwrap()
    }

    fn rect(x: f32, y: f32, width: f32, height: f32) -> RectParams {
        RectParams {
            x,
            y,
            width,
            height,
        }
    }

    fn pixel(ctx: &Canvas2dContext, x: u32, y: u32) -> [u8; 4] {
        ctx.get_image_data(x as i32, y as i32, 1, 1)
            .unwrap()
            .pixel(0, 0)
            .unwrap()
    }

    #[test]
    fn test_clip_limits_drawing() {
        let mut ctx = context(40, 40);
        ctx.rect(&rect(0.0, 0.0, 10.0, 10.0));
        ctx.clip().unwrap();
        ctx.set_fill_style("#00ff00");
        ctx.fill_rect(&rect(0.0, 0.0, 40.0, 40.0)).unwrap();
        assert_eq!(pixel(&ctx, 5, 5), [0, 255, 0, 255]);
        assert_eq!(pixel(&ctx, 20, 20)[3], 0);
    }

    #[test]
    fn test_clips_intersect() {
        let mut ctx = context(40, 40);
        ctx.rect(&rect(0.0, 0.0, 20.0, 20.0));
        ctx.clip().unwrap();
        ctx.begin_path();
        ctx.rect(&rect(10.0, 10.0, 20.0, 20.0));
        ctx.clip().unwrap();
        ctx.fill_rect(&rect(0.0, 0.0, 40.0, 40.0)).unwrap();
        assert_eq!(pixel(&ctx, 15, 15)[3], 255);
        assert_eq!(pixel(&ctx, 5, 5)[3], 0);
        assert_eq!(pixel(&ctx, 25, 25)[3], 0);
    }

    #[test]
    fn test_even_odd_fill_leaves_hole() {
        let mut ctx = context(40, 40);
        ctx.rect(&rect(0.0, 0.0, 30.0, 30.0));
        ctx.rect(&rect(10.0, 10.0, 10.0, 10.0));
        ctx.fill_with_rule(CanvasFillRule::EvenOdd).unwrap();
        assert_eq!(pixel(&ctx, 5, 5)[3], 255);
        assert_eq!(pixel(&ctx, 15, 15)[3], 0);
    }

    #[test]
    fn test_shadow_offset_is_in_device_pixels() {
        let mut ctx = context(40, 40);
        ctx.scale(2.0, 2.0).unwrap();
        ctx.set_shadow_color("#ff0000");
        ctx.set_shadow_offset_x(10.0);
        ctx.set_fill_style("#0000ff");
        ctx.fill_rect(&rect(0.0, 0.0, 5.0, 5.0)).unwrap();
        assert_eq!(pixel(&ctx, 5, 5), [0, 0, 255, 255]);
        assert_eq!(pixel(&ctx, 15, 5), [255, 0, 0, 255]);
        assert_eq!(pixel(&ctx, 25, 5)[3], 0);
    }

    #[test]
    fn test_point_in_path_uses_device_coordinates() {
        let mut ctx = context(40, 40);
        ctx.translate(10.0, 10.0).unwrap();
        ctx.rect(&rect(0.0, 0.0, 5.0, 5.0));
        ctx.reset_transform().unwrap();
        assert!(ctx.is_point_in_path(12.0, 12.0, CanvasFillRule::NonZero));
        assert!(!ctx.is_point_in_path(2.0, 2.0, CanvasFillRule::NonZero));
        assert!(!ctx.is_point_in_path(f32::NAN, 2.0, CanvasFillRule::NonZero));
    }

    #[test]
    fn test_point_in_path2d_follows_transform() {
        let mut ctx = context(40, 40);
        let mut path = Path2D::new();
        path.rect(&rect(0.0, 0.0, 5.0, 5.0));
        ctx.scale(2.0, 2.0).unwrap();
        assert!(ctx.is_point_in_path2d(&path, 8.0, 8.0, CanvasFillRule::NonZero));
        assert!(!ctx.is_point_in_path2d(&path, 12.0, 8.0, CanvasFillRule::NonZero));
    }

    #[test]
    fn test_point_in_stroke() {
        let mut ctx = context(40, 40);
        ctx.set_line_width(4.0);
        ctx.move_to(0.0, 20.0);
        ctx.line_to(40.0, 20.0);
        assert!(ctx.is_point_in_stroke(20.0, 21.5));
        assert!(!ctx.is_point_in_stroke(20.0, 23.0));
    }

    #[test]
    fn test_draw_points_from_managed_buffer() {
        let (engine, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
        let mut ctx = Canvas2dContext::builder(20, 20)
            .font_config(FontConfig::empty())
            .engine(engine.clone())
            .build()
            .unwrap();
        let buffer = engine.alloc_managed(4 * 4).unwrap();
        buffer.write_f32s(&[1.0, 1.0, 10.0, 10.0]).unwrap();

        log.clear();
        ctx.draw_points(PointMode::Lines, PointSource::Buffer { buffer: &buffer, count: 2 })
            .unwrap();
        assert!(log
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::DrawPoints { count: 2, mode: PointMode::Lines, .. })));

        let result =
            ctx.draw_points(PointMode::Lines, PointSource::Buffer { buffer: &buffer, count: 3 });
        assert!(matches!(result, Err(Canvas2dError::OutOfBounds { .. })));

        let huge = PointSource::Buffer {
            buffer: &buffer,
            count: usize::MAX / 4,
        };
        let result = ctx.draw_points(PointMode::Points, huge);
        assert!(matches!(
            result,
            Err(Canvas2dError::OutOfBounds { len: usize::MAX, .. })
        ));
    }

    #[test]
    fn test_draw_points_rejects_foreign_buffer() {
        let mut ctx = context(10, 10);
        let other = EngineHandle::skia(EngineConfig::default()).unwrap();
        let buffer = other.alloc_managed(16).unwrap();
        let result =
            ctx.draw_points(PointMode::Points, PointSource::Buffer { buffer: &buffer, count: 2 });
        assert!(matches!(result, Err(Canvas2dError::InvalidArgument(_))));
    }

    #[test]
    fn test_singular_transform_skips_draws() {
        let (engine, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
        let mut ctx = Canvas2dContext::builder(10, 10)
            .font_config(FontConfig::empty())
            .engine(engine)
            .build()
            .unwrap();
        ctx.scale(0.0, 1.0).unwrap();
        log.clear();
        ctx.fill_rect(&rect(0.0, 0.0, 5.0, 5.0)).unwrap();
        ctx.clear_rect(&rect(0.0, 0.0, 5.0, 5.0)).unwrap();
        assert!(!log.calls().iter().any(EngineCall::is_draw));
    }
}

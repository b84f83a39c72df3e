//! Software raster engine on tiny-skia.
//!
//! Surfaces are pixmaps with a matrix, an optional clip mask and a save stack.
//! Shaders are stored as descriptions and turned into tiny-skia shaders at draw
//! time, because tiny-skia shaders borrow their pixmaps and cannot outlive a draw.

use super::blur::blur_rgba8_premul;
use super::handles::{HandleTable, ImageKind, ShaderKind, SurfaceKind};
use super::pattern_cache::{transform_bits, TileCache, TileKey};
use super::{
    EngineConfig, GradientPayload, ImageId, ImageShaderPayload, PathPayload, RasterEngine,
    ShaderId, SurfaceId,
};
use crate::color::ColorF32;
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{IRect, Rect};
use crate::matrix::Matrix3;
use crate::memory::{LinearMemory, Ptr};
use crate::paint::{ImagePaint, Paint, PaintSource, PaintStyle, StrokeGeometry};
use crate::style::{LineCap, PointMode, TileMode};
use std::rc::Rc;
use tiny_skia::{
    BlendMode, FillRule, FilterQuality, GradientStop, Mask, Pixmap, PixmapPaint, Point,
    PremultipliedColorU8, Shader, SpreadMode, Transform,
};

struct SavedState {
    matrix: Transform,
    clip: Option<Mask>,
}

struct SurfaceEntry {
    pixmap: Pixmap,
    matrix: Transform,
    clip: Option<Mask>,
    stack: Vec<SavedState>,
}

impl SurfaceEntry {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }
}

enum ShaderEntry {
    Linear {
        start: Point,
        end: Point,
        stops: Vec<GradientStop>,
        spread: SpreadMode,
        transform: Transform,
    },
    Radial {
        start: Point,
        end: Point,
        radius: f32,
        stops: Vec<GradientStop>,
        spread: SpreadMode,
        transform: Transform,
    },
    Sweep {
        center: Point,
        start_degrees: f32,
        stops: Vec<(f32, ColorF32)>,
        transform: Transform,
    },
    Image {
        image: ImageId,
        tile_x: TileMode,
        tile_y: TileMode,
        quality: FilterQuality,
        opacity: f32,
        transform: Transform,
    },
    /// Degenerate geometry, paints nothing.
    Empty,
}

/// Pattern-space rectangle that limits a pixmap shader along its decal axes.
struct Band {
    rect: tiny_skia::Rect,
    /// Pattern space to device space.
    transform: Transform,
}

/// A paint source ready for one draw.
enum Resolved {
    Shader(Shader<'static>),
    Pixmap {
        pixmap: Rc<Pixmap>,
        spread: SpreadMode,
        quality: FilterQuality,
        opacity: f32,
        transform: Transform,
        band: Option<Band>,
    },
}

impl Resolved {
    fn shader(&self) -> Shader<'_> {
        match self {
            Resolved::Shader(shader) => shader.clone(),
            Resolved::Pixmap {
                pixmap,
                spread,
                quality,
                opacity,
                transform,
                ..
            } => tiny_skia::Pattern::new(
                pixmap.as_ref().as_ref(),
                *spread,
                *quality,
                *opacity,
                *transform,
            ),
        }
    }

    fn band(&self) -> Option<&Band> {
        match self {
            Resolved::Pixmap { band, .. } => band.as_ref(),
            Resolved::Shader(_) => None,
        }
    }
}

/// The tiny-skia backed engine.
pub struct SkiaEngine {
    memory: LinearMemory,
    surfaces: HandleTable<SurfaceKind, SurfaceEntry>,
    images: HandleTable<ImageKind, Rc<Pixmap>>,
    shaders: HandleTable<ShaderKind, ShaderEntry>,
    tile_cache: TileCache,
    current: Option<SurfaceId>,
}

impl SkiaEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            memory: LinearMemory::new(config.memory),
            surfaces: HandleTable::new(),
            images: HandleTable::new(),
            shaders: HandleTable::new(),
            tile_cache: TileCache::new(config.tile_cache_bytes),
            current: None,
        }
    }

    fn current_id(&self) -> Canvas2dResult<SurfaceId> {
        self.current.ok_or(Canvas2dError::NoCurrentSurface)
    }

    fn current_surface_mut(&mut self) -> Canvas2dResult<&mut SurfaceEntry> {
        let id = self.current_id()?;
        self.surfaces.get_mut(id)
    }

    fn current_surface_ref(&self) -> Canvas2dResult<&SurfaceEntry> {
        let id = self.current_id()?;
        self.surfaces.get(id)
    }

    /// Turn a paint source into something drawable under `ctm` on a
    /// `width` x `height` surface. `None` means the draw paints nothing.
    fn resolve(
        &mut self,
        source: PaintSource,
        ctm: Transform,
        width: u32,
        height: u32,
    ) -> Canvas2dResult<Option<Resolved>> {
        let id = match source {
            PaintSource::Color(color) => {
                return Ok(Some(Resolved::Shader(Shader::SolidColor(
                    color.to_tiny_skia(),
                ))))
            }
            PaintSource::Shader(id) => id,
        };

        let resolved = match self.shaders.get(id)? {
            ShaderEntry::Empty => None,
            ShaderEntry::Linear {
                start,
                end,
                stops,
                spread,
                transform,
            } => tiny_skia::LinearGradient::new(*start, *end, stops.clone(), *spread, *transform)
                .map(Resolved::Shader),
            ShaderEntry::Radial {
                start,
                end,
                radius,
                stops,
                spread,
                transform,
            } => tiny_skia::RadialGradient::new(
                *start,
                *end,
                *radius,
                stops.clone(),
                *spread,
                *transform,
            )
            .map(Resolved::Shader),
            ShaderEntry::Sweep {
                center,
                start_degrees,
                stops,
                transform,
            } => {
                let to_device = ctm.pre_concat(*transform);
                let Some(inverse_ctm) = ctm.invert() else {
                    return Ok(None);
                };
                let key = TileKey::Sweep {
                    shader: id,
                    width,
                    height,
                    matrix: transform_bits(&to_device),
                };
                let (center, start_degrees) = (*center, *start_degrees);
                self.tile_cache
                    .get_or_insert(key, || {
                        render_sweep(center, start_degrees, stops, to_device, width, height)
                    })
                    .map(|pixmap| Resolved::Pixmap {
                        pixmap,
                        spread: SpreadMode::Pad,
                        quality: FilterQuality::Nearest,
                        opacity: 1.0,
                        transform: inverse_ctm,
                        band: None,
                    })
            }
            ShaderEntry::Image {
                image,
                tile_x,
                tile_y,
                quality,
                opacity,
                transform,
            } => {
                let pixmap = Rc::clone(self.images.get(*image)?);
                let to_device = ctm.pre_concat(*transform);
                let spread = [*tile_x, *tile_y]
                    .into_iter()
                    .find(|mode| *mode != TileMode::Decal)
                    .map(TileMode::spread_mode)
                    .unwrap_or(SpreadMode::Pad);
                match image_band(&pixmap, *tile_x, *tile_y, to_device, width, height) {
                    Some(band) => Some(Resolved::Pixmap {
                        pixmap,
                        spread,
                        quality: *quality,
                        opacity: *opacity,
                        transform: *transform,
                        band,
                    }),
                    None => None,
                }
            }
        };
        Ok(resolved)
    }

    /// Resolve `source` and run `draw` against the current surface.
    fn draw_with(
        &mut self,
        source: PaintSource,
        blend_mode: BlendMode,
        anti_alias: bool,
        blur_sigma: Option<f32>,
        draw: impl FnOnce(&mut Pixmap, &tiny_skia::Paint<'_>, Transform, Option<&Mask>),
    ) -> Canvas2dResult<()> {
        let (ctm, (width, height)) = {
            let surface = self.current_surface_ref()?;
            (surface.matrix, surface.size())
        };
        let Some(resolved) = self.resolve(source, ctm, width, height)? else {
            log::trace!(target: "canvas::engine", "paint source resolves to nothing");
            return Ok(());
        };
        self.draw_resolved(&resolved, blend_mode, anti_alias, blur_sigma, draw)
    }

    fn draw_resolved(
        &mut self,
        resolved: &Resolved,
        blend_mode: BlendMode,
        anti_alias: bool,
        blur_sigma: Option<f32>,
        draw: impl FnOnce(&mut Pixmap, &tiny_skia::Paint<'_>, Transform, Option<&Mask>),
    ) -> Canvas2dResult<()> {
        let surface = self.current_surface_mut()?;
        let (width, height) = surface.size();
        let ctm = surface.matrix;

        let mut paint = tiny_skia::Paint::default();
        paint.shader = resolved.shader();
        paint.anti_alias = anti_alias;

        match blur_sigma {
            None => {
                let mask = band_mask(resolved.band(), surface.clip.as_ref(), width, height)?;
                paint.blend_mode = blend_mode;
                draw(&mut surface.pixmap, &paint, ctm, mask.as_ref().or(surface.clip.as_ref()));
            }
            Some(sigma) => {
                let mut layer = Pixmap::new(width, height)
                    .ok_or(Canvas2dError::InvalidDimensions { width, height })?;
                let mask = band_mask(resolved.band(), None, width, height)?;
                paint.blend_mode = BlendMode::SourceOver;
                draw(&mut layer, &paint, ctm, mask.as_ref());
                blur_rgba8_premul(layer.data_mut(), width, height, sigma);
                let layer_paint = PixmapPaint {
                    opacity: 1.0,
                    blend_mode,
                    quality: FilterQuality::Nearest,
                };
                surface.pixmap.draw_pixmap(
                    0,
                    0,
                    layer.as_ref(),
                    &layer_paint,
                    Transform::identity(),
                    surface.clip.as_ref(),
                );
            }
        }
        Ok(())
    }

    fn read_gradient(
        &self,
        payload: &GradientPayload,
        geometry_len: usize,
    ) -> Canvas2dResult<(Vec<f32>, Vec<(f32, ColorF32)>, Transform)> {
        let geometry = self.memory.read_f32s(payload.geometry, geometry_len)?;
        let colors = self.memory.read_f32s(payload.colors, payload.stop_count * 4)?;
        let positions = self.memory.read_f32s(payload.positions, payload.stop_count)?;
        let stops = positions
            .iter()
            .zip(colors.chunks_exact(4))
            .map(|(pos, c)| (*pos, ColorF32::new(c[0], c[1], c[2], c[3])))
            .collect();
        let transform = read_matrix(&self.memory, payload.local_matrix)?.to_transform();
        Ok((geometry, stops, transform))
    }

    fn insert_shader(&mut self, entry: ShaderEntry) -> ShaderId {
        let id = self.shaders.insert(entry);
        log::trace!(target: "canvas::engine", "made {:?}", id);
        id
    }
}

fn to_stops(stops: &[(f32, ColorF32)]) -> Vec<GradientStop> {
    stops
        .iter()
        .map(|(pos, color)| GradientStop::new(*pos, color.to_tiny_skia()))
        .collect()
}

fn read_rect(memory: &LinearMemory, ptr: Ptr) -> Canvas2dResult<Rect> {
    let v = memory.read_f32s(ptr, 4)?;
    Ok(Rect::from_ltrb(v[0], v[1], v[2], v[3]))
}

fn read_irect(memory: &LinearMemory, ptr: Ptr) -> Canvas2dResult<IRect> {
    let v = memory.read_i32s(ptr, 4)?;
    Ok(IRect::new(v[0], v[1], v[2], v[3]))
}

fn read_matrix(memory: &LinearMemory, ptr: Ptr) -> Canvas2dResult<Matrix3> {
    let v = memory.read_f32s(ptr, 9)?;
    Matrix3::try_from(v.as_slice())
}

fn read_color(memory: &LinearMemory, ptr: Ptr) -> Canvas2dResult<ColorF32> {
    let v = memory.read_f32s(ptr, 4)?;
    Ok(ColorF32::new(v[0], v[1], v[2], v[3]))
}

/// The clip for a banded draw: `base` (or everything) intersected with the band.
fn band_mask(
    band: Option<&Band>,
    base: Option<&Mask>,
    width: u32,
    height: u32,
) -> Canvas2dResult<Option<Mask>> {
    let Some(band) = band else {
        return Ok(None);
    };
    let path = tiny_skia::PathBuilder::from_rect(band.rect);
    let mask = match base {
        Some(clip) => {
            let mut mask = clip.clone();
            mask.intersect_path(&path, FillRule::Winding, true, band.transform);
            mask
        }
        None => {
            let mut mask =
                Mask::new(width, height).ok_or(Canvas2dError::InvalidDimensions { width, height })?;
            mask.fill_path(&path, FillRule::Winding, true, band.transform);
            mask
        }
    };
    Ok(Some(mask))
}

/// Band restricting an image shader to one tile along each decal axis.
///
/// `Some(None)` means no band is needed, `None` that nothing is visible.
fn image_band(
    pixmap: &Pixmap,
    tile_x: TileMode,
    tile_y: TileMode,
    to_device: Transform,
    width: u32,
    height: u32,
) -> Option<Option<Band>> {
    if tile_x != TileMode::Decal && tile_y != TileMode::Decal {
        return Some(None);
    }
    let inverse = to_device.invert()?;
    let mut corners = [
        Point::from_xy(0.0, 0.0),
        Point::from_xy(width as f32, 0.0),
        Point::from_xy(width as f32, height as f32),
        Point::from_xy(0.0, height as f32),
    ];
    inverse.map_points(&mut corners);
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in &corners {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let (left, right) = match tile_x {
        TileMode::Decal => (0.0, pixmap.width() as f32),
        _ => (min_x - 1.0, max_x + 1.0),
    };
    let (top, bottom) = match tile_y {
        TileMode::Decal => (0.0, pixmap.height() as f32),
        _ => (min_y - 1.0, max_y + 1.0),
    };
    let rect = tiny_skia::Rect::from_ltrb(left, top, right, bottom)?;
    Some(Some(Band {
        rect,
        transform: to_device,
    }))
}

/// Premultiplied color of a sorted stop list at `t`.
fn sample_stops(stops: &[(f32, ColorF32)], t: f32) -> [f32; 4] {
    let premul = |c: &ColorF32| [c.r * c.a, c.g * c.a, c.b * c.a, c.a];
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return [0.0; 4];
    };
    if t <= first.0 {
        return premul(&first.1);
    }
    if t >= last.0 {
        return premul(&last.1);
    }
    for pair in stops.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if t >= p0 && t <= p1 {
            let span = p1 - p0;
            let f = if span > 0.0 { (t - p0) / span } else { 1.0 };
            let (a, b) = (premul(&c0), premul(&c1));
            return [0, 1, 2, 3].map(|i| a[i] + (b[i] - a[i]) * f);
        }
    }
    premul(&last.1)
}

/// Rasterize a sweep gradient over a whole surface in device space.
fn render_sweep(
    center: Point,
    start_degrees: f32,
    stops: &[(f32, ColorF32)],
    to_device: Transform,
    width: u32,
    height: u32,
) -> Option<Pixmap> {
    let inverse = to_device.invert()?;
    let mut pixmap = Pixmap::new(width, height)?;
    let w = width as usize;
    for (i, px) in pixmap.pixels_mut().iter_mut().enumerate() {
        let dx = (i % w) as f32 + 0.5;
        let dy = (i / w) as f32 + 0.5;
        let sx = inverse.sx * dx + inverse.kx * dy + inverse.tx - center.x;
        let sy = inverse.ky * dx + inverse.sy * dy + inverse.ty - center.y;
        let degrees = sy.atan2(sx).to_degrees() - start_degrees;
        let t = degrees.rem_euclid(360.0) / 360.0;
        let [r, g, b, a] = sample_stops(stops, t);
        let a8 = (a * 255.0).round().clamp(0.0, 255.0) as u8;
        let channel = |v: f32| ((v * 255.0).round().clamp(0.0, 255.0) as u8).min(a8);
        if let Some(color) = PremultipliedColorU8::from_rgba(channel(r), channel(g), channel(b), a8)
        {
            *px = color;
        }
    }
    Some(pixmap)
}

/// The image with its color replaced by `color`, keeping per-pixel coverage.
fn render_silhouette(image: &Pixmap, color: ColorF32) -> Option<Pixmap> {
    let mut out = Pixmap::new(image.width(), image.height())?;
    let solid = color.to_tiny_skia().premultiply();
    for (dst, src) in out.pixels_mut().iter_mut().zip(image.pixels()) {
        let coverage = src.alpha() as f32 / 255.0;
        let scale = |v: f32| (v * coverage * 255.0).round().clamp(0.0, 255.0) as u8;
        let a = scale(solid.alpha());
        if let Some(c) = PremultipliedColorU8::from_rgba(
            scale(solid.red()).min(a),
            scale(solid.green()).min(a),
            scale(solid.blue()).min(a),
            a,
        ) {
            *dst = c;
        }
    }
    Some(out)
}

/// Copy out the integer region of `image` covering `src`; the returned rect is
/// `src` relative to the copy. `None` if `src` misses the image.
fn crop_to_source(image: Rc<Pixmap>, src: Rect) -> Option<(Rc<Pixmap>, Rect)> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if src.left <= 0.0 && src.top <= 0.0 && src.right >= w && src.bottom >= h {
        return Some((image, src));
    }
    let left = src.left.floor().max(0.0);
    let top = src.top.floor().max(0.0);
    let right = src.right.ceil().min(w);
    let bottom = src.bottom.ceil().min(h);
    let region =
        tiny_skia::IntRect::from_ltrb(left as i32, top as i32, right as i32, bottom as i32)?;
    let copy = image.clone_rect(region)?;
    let relative = Rect::from_ltrb(
        src.left - left,
        src.top - top,
        src.right - left,
        src.bottom - top,
    );
    Some((Rc::new(copy), relative))
}

fn stroke_for_points(paint: &Paint) -> StrokeGeometry {
    match &paint.style {
        PaintStyle::Stroke(geometry) => geometry.clone(),
        PaintStyle::Fill => StrokeGeometry::default(),
    }
}

impl RasterEngine for SkiaEngine {
    fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }

    fn make_surface(&mut self, width: u32, height: u32) -> Canvas2dResult<SurfaceId> {
        let pixmap =
            Pixmap::new(width, height).ok_or(Canvas2dError::InvalidDimensions { width, height })?;
        let id = self.surfaces.insert(SurfaceEntry {
            pixmap,
            matrix: Transform::identity(),
            clip: None,
            stack: Vec::new(),
        });
        log::debug!(target: "canvas::engine", "make_surface {}x{} -> {:?}", width, height, id);
        Ok(id)
    }

    fn delete_surface(&mut self, surface: SurfaceId) -> Canvas2dResult<()> {
        self.surfaces.remove(surface)?;
        if self.current == Some(surface) {
            self.current = None;
        }
        log::debug!(target: "canvas::engine", "delete_surface {:?}", surface);
        Ok(())
    }

    fn make_current(&mut self, surface: SurfaceId) -> Canvas2dResult<()> {
        if !self.surfaces.contains(surface) {
            return Err(Canvas2dError::UnknownHandle {
                kind: "surface",
            });
        }
        self.current = Some(surface);
        Ok(())
    }

    fn current_surface(&self) -> Option<SurfaceId> {
        self.current
    }

    fn surface_size(&self, surface: SurfaceId) -> Canvas2dResult<(u32, u32)> {
        Ok(self.surfaces.get(surface)?.size())
    }

    fn save(&mut self) -> Canvas2dResult<()> {
        let surface = self.current_surface_mut()?;
        surface.stack.push(SavedState {
            matrix: surface.matrix,
            clip: surface.clip.clone(),
        });
        Ok(())
    }

    fn restore(&mut self) -> Canvas2dResult<()> {
        let surface = self.current_surface_mut()?;
        if let Some(saved) = surface.stack.pop() {
            surface.matrix = saved.matrix;
            surface.clip = saved.clip;
        }
        Ok(())
    }

    fn save_count(&self) -> Canvas2dResult<usize> {
        Ok(self.current_surface_ref()?.stack.len() + 1)
    }

    fn concat(&mut self, matrix: Ptr) -> Canvas2dResult<()> {
        let m = read_matrix(&self.memory, matrix)?.to_transform();
        let surface = self.current_surface_mut()?;
        surface.matrix = surface.matrix.pre_concat(m);
        Ok(())
    }

    fn set_matrix(&mut self, matrix: Ptr) -> Canvas2dResult<()> {
        let m = read_matrix(&self.memory, matrix)?.to_transform();
        self.current_surface_mut()?.matrix = m;
        Ok(())
    }

    fn total_matrix(&self) -> Canvas2dResult<Matrix3> {
        Ok(Matrix3::from_transform(self.current_surface_ref()?.matrix))
    }

    fn clip_path(&mut self, path: &PathPayload, anti_alias: bool) -> Canvas2dResult<()> {
        let shape = path.read(&self.memory)?.to_tiny_skia();
        let fill_rule: FillRule = path.fill_rule.into();
        let surface = self.current_surface_mut()?;
        let (width, height) = surface.size();
        let ctm = surface.matrix;
        match (surface.clip.as_mut(), shape) {
            (Some(mask), Some(shape)) => mask.intersect_path(&shape, fill_rule, anti_alias, ctm),
            (Some(mask), None) => mask.data_mut().fill(0),
            (None, shape) => {
                let mut mask = Mask::new(width, height)
                    .ok_or(Canvas2dError::InvalidDimensions { width, height })?;
                if let Some(shape) = shape {
                    mask.fill_path(&shape, fill_rule, anti_alias, ctm);
                }
                surface.clip = Some(mask);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Ptr) -> Canvas2dResult<()> {
        let color = read_color(&self.memory, color)?;
        self.current_surface_mut()?.pixmap.fill(color.to_tiny_skia());
        Ok(())
    }

    fn draw_path(&mut self, path: &PathPayload, paint: &Paint) -> Canvas2dResult<()> {
        self.current_id()?;
        let fill_rule: FillRule = path.fill_rule.into();
        let Some(shape) = path.read(&self.memory)?.to_tiny_skia() else {
            return Ok(());
        };
        let stroke = match &paint.style {
            PaintStyle::Stroke(geometry) => Some(geometry.to_tiny_skia()),
            PaintStyle::Fill => None,
        };
        self.draw_with(
            paint.source,
            paint.blend_mode,
            paint.anti_alias,
            paint.mask_blur_sigma,
            |pixmap, ts_paint, ctm, mask| match &stroke {
                Some(stroke) => pixmap.stroke_path(&shape, ts_paint, stroke, ctm, mask),
                None => pixmap.fill_path(&shape, ts_paint, fill_rule, ctm, mask),
            },
        )
    }

    fn draw_rect(&mut self, rect: Ptr, paint: &Paint) -> Canvas2dResult<()> {
        self.current_id()?;
        let rect = read_rect(&self.memory, rect)?;
        let Some(rect) = rect.to_tiny_skia() else {
            return Ok(());
        };
        let stroke = match &paint.style {
            PaintStyle::Stroke(geometry) => Some(geometry.to_tiny_skia()),
            PaintStyle::Fill => None,
        };
        self.draw_with(
            paint.source,
            paint.blend_mode,
            paint.anti_alias,
            paint.mask_blur_sigma,
            |pixmap, ts_paint, ctm, mask| match &stroke {
                Some(stroke) => {
                    let shape = tiny_skia::PathBuilder::from_rect(rect);
                    pixmap.stroke_path(&shape, ts_paint, stroke, ctm, mask);
                }
                None => pixmap.fill_rect(rect, ts_paint, ctm, mask),
            },
        )
    }

    fn draw_points(
        &mut self,
        mode: PointMode,
        points: Ptr,
        count: usize,
        paint: &Paint,
    ) -> Canvas2dResult<()> {
        self.current_id()?;
        if count == 0 {
            return Ok(());
        }
        let coords = self.memory.read_f32s(points, count * 2)?;
        let geometry = stroke_for_points(paint);
        let mut pb = tiny_skia::PathBuilder::new();

        match mode {
            PointMode::Points => {
                let half = geometry.width.max(1.0) / 2.0;
                for p in coords.chunks_exact(2) {
                    match geometry.cap {
                        LineCap::Round => pb.push_circle(p[0], p[1], half),
                        _ => {
                            let side = half * 2.0;
                            if let Some(r) =
                                tiny_skia::Rect::from_xywh(p[0] - half, p[1] - half, side, side)
                            {
                                pb.push_rect(r);
                            }
                        }
                    }
                }
            }
            PointMode::Lines => {
                for pair in coords.chunks_exact(4) {
                    pb.move_to(pair[0], pair[1]);
                    pb.line_to(pair[2], pair[3]);
                }
            }
            PointMode::Polygon => {
                for (i, p) in coords.chunks_exact(2).enumerate() {
                    if i == 0 {
                        pb.move_to(p[0], p[1]);
                    } else {
                        pb.line_to(p[0], p[1]);
                    }
                }
            }
        }

        let Some(shape) = pb.finish() else {
            return Ok(());
        };
        let stroke = (mode != PointMode::Points).then(|| geometry.to_tiny_skia());
        self.draw_with(
            paint.source,
            paint.blend_mode,
            paint.anti_alias,
            paint.mask_blur_sigma,
            |pixmap, ts_paint, ctm, mask| match &stroke {
                Some(stroke) => pixmap.stroke_path(&shape, ts_paint, stroke, ctm, mask),
                None => pixmap.fill_path(&shape, ts_paint, FillRule::Winding, ctm, mask),
            },
        )
    }

    fn draw_image_rect(
        &mut self,
        image: ImageId,
        src: Ptr,
        dst: Ptr,
        paint: &ImagePaint,
    ) -> Canvas2dResult<()> {
        self.current_id()?;
        let src = read_rect(&self.memory, src)?;
        let dst = read_rect(&self.memory, dst)?;
        if src.is_empty() || dst.is_empty() {
            return Ok(());
        }

        let base = Rc::clone(self.images.get(image)?);
        let pixmap = match paint.silhouette {
            Some(color) => {
                let key = TileKey::Silhouette {
                    image,
                    color: color.to_array().map(f32::to_bits),
                };
                match self
                    .tile_cache
                    .get_or_insert(key, || render_silhouette(&base, color))
                {
                    Some(pixmap) => pixmap,
                    None => return Ok(()),
                }
            }
            None => base,
        };
        let Some((pixmap, src)) = crop_to_source(pixmap, src) else {
            return Ok(());
        };
        let Some(dst_rect) = dst.to_tiny_skia() else {
            return Ok(());
        };

        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        let transform = Transform::from_row(
            sx,
            0.0,
            0.0,
            sy,
            dst.left - src.left * sx,
            dst.top - src.top * sy,
        );
        let resolved = Resolved::Pixmap {
            pixmap,
            spread: SpreadMode::Pad,
            quality: paint.quality,
            opacity: paint.alpha.clamp(0.0, 1.0),
            transform,
            band: None,
        };
        self.draw_resolved(
            &resolved,
            paint.blend_mode,
            true,
            paint.mask_blur_sigma,
            |pixmap, ts_paint, ctm, mask| pixmap.fill_rect(dst_rect, ts_paint, ctm, mask),
        )
    }

    fn draw_text_blob(&mut self, glyphs: &PathPayload, paint: &Paint) -> Canvas2dResult<()> {
        self.draw_path(glyphs, paint)
    }

    fn make_image(&mut self, width: u32, height: u32, pixels: Ptr) -> Canvas2dResult<ImageId> {
        let size = tiny_skia::IntSize::from_wh(width, height)
            .ok_or(Canvas2dError::InvalidDimensions { width, height })?;
        let data = self
            .memory
            .read_bytes(pixels, width as usize * height as usize * 4)?;
        let pixmap = Pixmap::from_vec(data, size).ok_or_else(|| {
            Canvas2dError::InvalidArgument(format!(
                "bad pixel block for {}x{} image",
                width, height
            ))
        })?;
        let id = self.images.insert(Rc::new(pixmap));
        log::trace!(target: "canvas::engine", "make_image {}x{} -> {:?}", width, height, id);
        Ok(id)
    }

    fn delete_image(&mut self, image: ImageId) -> Canvas2dResult<()> {
        self.images.remove(image)?;
        self.tile_cache.forget_image(image);
        Ok(())
    }

    fn make_linear_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId> {
        let (g, stops, transform) = self.read_gradient(gradient, 4)?;
        let (start, end) = (Point::from_xy(g[0], g[1]), Point::from_xy(g[2], g[3]));
        let entry = if stops.is_empty() || start == end {
            ShaderEntry::Empty
        } else {
            ShaderEntry::Linear {
                start,
                end,
                stops: to_stops(&stops),
                spread: gradient.tile_mode.spread_mode(),
                transform,
            }
        };
        Ok(self.insert_shader(entry))
    }

    fn make_radial_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId> {
        let (g, mut stops, transform) = self.read_gradient(gradient, 6)?;
        let (mut c0, mut r0) = (Point::from_xy(g[0], g[1]), g[2]);
        let (mut c1, mut r1) = (Point::from_xy(g[3], g[4]), g[5]);

        if r0 > r1 {
            // Grow outwards from the smaller circle with the stops mirrored
            std::mem::swap(&mut c0, &mut c1);
            std::mem::swap(&mut r0, &mut r1);
            stops = stops.into_iter().rev().map(|(p, c)| (1.0 - p, c)).collect();
        }

        let entry = if stops.is_empty() || r1 <= 0.0 || (c0 == c1 && r0 == r1) {
            ShaderEntry::Empty
        } else {
            if r0 > 0.0 {
                // The backend starts every radial at radius zero
                for (pos, _) in stops.iter_mut() {
                    *pos = (r0 + *pos * (r1 - r0)) / r1;
                }
            }
            ShaderEntry::Radial {
                start: c0,
                end: c1,
                radius: r1,
                stops: to_stops(&stops),
                spread: gradient.tile_mode.spread_mode(),
                transform,
            }
        };
        Ok(self.insert_shader(entry))
    }

    fn make_sweep_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId> {
        let (g, stops, transform) = self.read_gradient(gradient, 3)?;
        let entry = if stops.is_empty() {
            ShaderEntry::Empty
        } else {
            ShaderEntry::Sweep {
                center: Point::from_xy(g[0], g[1]),
                start_degrees: g[2],
                stops,
                transform,
            }
        };
        Ok(self.insert_shader(entry))
    }

    fn make_image_shader(&mut self, shader: &ImageShaderPayload) -> Canvas2dResult<ShaderId> {
        if !self.images.contains(shader.image) {
            return Err(Canvas2dError::UnknownHandle { kind: "image" });
        }
        let transform = read_matrix(&self.memory, shader.local_matrix)?.to_transform();
        Ok(self.insert_shader(ShaderEntry::Image {
            image: shader.image,
            tile_x: shader.tile_x,
            tile_y: shader.tile_y,
            quality: shader.quality,
            opacity: shader.opacity.clamp(0.0, 1.0),
            transform,
        }))
    }

    fn delete_shader(&mut self, shader: ShaderId) -> Canvas2dResult<()> {
        self.shaders.remove(shader)?;
        self.tile_cache.forget_shader(shader);
        Ok(())
    }

    fn read_pixels(&mut self, rect: Ptr, dst: Ptr) -> Canvas2dResult<()> {
        let rect = read_irect(&self.memory, rect)?;
        if rect.is_empty() {
            return Err(Canvas2dError::InvalidArgument(format!(
                "read_pixels of empty rect {:?}",
                rect
            )));
        }
        let id = self.current_id()?;
        let surface = self.surfaces.get(id)?;
        let (width, height) = surface.size();
        let row_bytes = rect.width as usize * 4;
        let mut out = vec![0u8; row_bytes * rect.height as usize];

        if let Some(visible) = rect.clip_to(width, height) {
            let data = surface.pixmap.data();
            for y in visible.y..visible.y + visible.height {
                let src_start = (y as usize * width as usize + visible.x as usize) * 4;
                let dst_start =
                    (y - rect.y) as usize * row_bytes + (visible.x - rect.x) as usize * 4;
                let len = visible.width as usize * 4;
                out[dst_start..dst_start + len].copy_from_slice(&data[src_start..src_start + len]);
            }
        }
        self.memory.write_bytes(dst, &out)
    }

    fn write_pixels(&mut self, rect: Ptr, src: Ptr) -> Canvas2dResult<()> {
        let rect = read_irect(&self.memory, rect)?;
        if rect.is_empty() {
            return Ok(());
        }
        let row_bytes = rect.width as usize * 4;
        let pixels = self.memory.read_bytes(src, row_bytes * rect.height as usize)?;
        let surface = self.current_surface_mut()?;
        let (width, height) = surface.size();
        let Some(visible) = rect.clip_to(width, height) else {
            return Ok(());
        };
        let data = surface.pixmap.data_mut();
        for y in visible.y..visible.y + visible.height {
            let dst_start = (y as usize * width as usize + visible.x as usize) * 4;
            let src_start = (y - rect.y) as usize * row_bytes + (visible.x - rect.x) as usize * 4;
            let len = visible.width as usize * 4;
            data[dst_start..dst_start + len].copy_from_slice(&pixels[src_start..src_start + len]);
        }
        Ok(())
    }

    fn flush(&mut self) -> Canvas2dResult<()> {
        log::trace!(
            target: "canvas::engine",
            "flush ({} surfaces, {} images, {} shaders, {} cached tiles)",
            self.surfaces.len(),
            self.images.len(),
            self.shaders.len(),
            self.tile_cache.len()
        );
        Ok(())
    }
}

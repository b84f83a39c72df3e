//! The raster engine boundary.
//!
//! Everything the drawing context asks of the engine goes through [`RasterEngine`]:
//! a fixed table of entry points whose numeric arguments are pointers into the
//! engine's [`LinearMemory`]. [`EngineHandle`] is the shared, single-threaded
//! handle to one engine plus its scratch regions; surfaces and shaders keep a
//! reference to it instead of relying on a process-wide current context.

mod blur;
mod handles;
mod pattern_cache;
mod recording;
mod skia;

pub use handles::{
    Handle, HandleKind, HandleTable, ImageId, ImageKind, ShaderId, ShaderKind, SurfaceId,
    SurfaceKind,
};
pub use recording::{CallLog, EngineCall, RecordingEngine, ShaderType};
pub use skia::SkiaEngine;

use crate::color::ColorF32;
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{IRect, Rect};
use crate::matrix::Matrix3;
use crate::memory::{LinearMemory, ManagedBuffer, MemoryConfig, Ptr, ScratchRegions};
use crate::paint::{ImagePaint, Paint};
use crate::path::Path;
use crate::style::{CanvasFillRule, PointMode, TileMode};
use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

/// Default byte budget of the engine's pattern tile cache.
pub const DEFAULT_TILE_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Engine construction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub memory: MemoryConfig,
    /// Bytes retained by cached pattern and sweep tiles.
    pub tile_cache_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            tile_cache_bytes: DEFAULT_TILE_CACHE_BYTES,
        }
    }
}

/// Path geometry staged in linear memory.
///
/// `verbs` holds one byte per verb, `points` holds `point_count` x/y pairs of f32
/// and `weights` one f32 per conic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPayload {
    pub verbs: Ptr,
    pub verb_count: usize,
    pub points: Ptr,
    pub point_count: usize,
    pub weights: Ptr,
    pub weight_count: usize,
    pub fill_rule: CanvasFillRule,
}

impl PathPayload {
    /// Rebuild the path from memory.
    pub fn read(&self, memory: &LinearMemory) -> Canvas2dResult<Path> {
        let verbs = memory.bytes(self.verbs, self.verb_count)?;
        let coords = memory.read_f32s(self.points, self.point_count * 2)?;
        let weights = memory.read_f32s(self.weights, self.weight_count)?;
        let mut path = Path::from_raw_parts(verbs, &coords, &weights)?;
        path.set_fill_rule(self.fill_rule);
        Ok(path)
    }
}

/// Gradient description staged in linear memory.
///
/// `geometry` holds 4 floats for linear gradients (`x0 y0 x1 y1`), 6 for radial
/// (`x0 y0 r0 x1 y1 r1`) and 3 for sweep (`cx cy start_degrees`). Colors are
/// straight-alpha RGBA floats, one quadruple per stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientPayload {
    pub geometry: Ptr,
    pub colors: Ptr,
    pub positions: Ptr,
    pub stop_count: usize,
    pub tile_mode: TileMode,
    /// 3x3 row-major matrix from shader space to the drawing's local space.
    pub local_matrix: Ptr,
}

/// Image tile shader description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageShaderPayload {
    pub image: ImageId,
    pub tile_x: TileMode,
    pub tile_y: TileMode,
    pub quality: tiny_skia::FilterQuality,
    pub opacity: f32,
    pub local_matrix: Ptr,
}

/// Entry points of a raster engine.
///
/// Pointer arguments refer to the engine's own linear memory and are only read
/// during the call. Matrices are 9 f32 row-major, colors 4 f32 straight RGBA,
/// rects 4 f32 `left top right bottom`, integer rects 4 i32 `x y width height`,
/// pixel blocks premultiplied RGBA8.
pub trait RasterEngine {
    fn memory(&self) -> &LinearMemory;
    fn memory_mut(&mut self) -> &mut LinearMemory;

    fn make_surface(&mut self, width: u32, height: u32) -> Canvas2dResult<SurfaceId>;
    fn delete_surface(&mut self, surface: SurfaceId) -> Canvas2dResult<()>;
    fn make_current(&mut self, surface: SurfaceId) -> Canvas2dResult<()>;
    fn current_surface(&self) -> Option<SurfaceId>;
    fn surface_size(&self, surface: SurfaceId) -> Canvas2dResult<(u32, u32)>;

    fn save(&mut self) -> Canvas2dResult<()>;
    fn restore(&mut self) -> Canvas2dResult<()>;
    fn save_count(&self) -> Canvas2dResult<usize>;
    fn concat(&mut self, matrix: Ptr) -> Canvas2dResult<()>;
    fn set_matrix(&mut self, matrix: Ptr) -> Canvas2dResult<()>;
    fn total_matrix(&self) -> Canvas2dResult<Matrix3>;
    /// Intersect the clip with `path` under the current matrix.
    fn clip_path(&mut self, path: &PathPayload, anti_alias: bool) -> Canvas2dResult<()>;

    /// Fill the whole surface with a color, ignoring matrix and clip.
    fn clear(&mut self, color: Ptr) -> Canvas2dResult<()>;
    fn draw_path(&mut self, path: &PathPayload, paint: &Paint) -> Canvas2dResult<()>;
    fn draw_rect(&mut self, rect: Ptr, paint: &Paint) -> Canvas2dResult<()>;
    fn draw_points(
        &mut self,
        mode: PointMode,
        points: Ptr,
        count: usize,
        paint: &Paint,
    ) -> Canvas2dResult<()>;
    fn draw_image_rect(
        &mut self,
        image: ImageId,
        src: Ptr,
        dst: Ptr,
        paint: &ImagePaint,
    ) -> Canvas2dResult<()>;
    /// Draw positioned glyph outlines.
    fn draw_text_blob(&mut self, glyphs: &PathPayload, paint: &Paint) -> Canvas2dResult<()>;

    fn make_image(&mut self, width: u32, height: u32, pixels: Ptr) -> Canvas2dResult<ImageId>;
    fn delete_image(&mut self, image: ImageId) -> Canvas2dResult<()>;

    fn make_linear_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId>;
    fn make_radial_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId>;
    fn make_sweep_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId>;
    fn make_image_shader(&mut self, shader: &ImageShaderPayload) -> Canvas2dResult<ShaderId>;
    fn delete_shader(&mut self, shader: ShaderId) -> Canvas2dResult<()>;

    /// Copy `rect` of the current surface into `dst`; pixels outside the surface
    /// read as transparent.
    fn read_pixels(&mut self, rect: Ptr, dst: Ptr) -> Canvas2dResult<()>;
    /// Replace `rect` of the current surface with `src`, bypassing compositing.
    fn write_pixels(&mut self, rect: Ptr, src: Ptr) -> Canvas2dResult<()>;
    fn flush(&mut self) -> Canvas2dResult<()>;
}

/// An engine together with the scratch regions reserved in its memory.
pub struct NativeContext {
    pub(crate) engine: Box<dyn RasterEngine>,
    scratch: ScratchRegions,
    owner: Weak<RefCell<NativeContext>>,
}

impl fmt::Debug for NativeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeContext")
            .field("scratch", &self.scratch)
            .field("current_surface", &self.engine.current_surface())
            .finish()
    }
}

impl NativeContext {
    pub fn engine(&self) -> &dyn RasterEngine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn RasterEngine {
        self.engine.as_mut()
    }

    pub fn scratch(&self) -> ScratchRegions {
        self.scratch
    }

    /// Weak reference to the cell holding this context.
    pub(crate) fn owner(&self) -> Weak<RefCell<NativeContext>> {
        self.owner.clone()
    }

    pub(crate) fn is_owned_by(&self, other: &Weak<RefCell<NativeContext>>) -> bool {
        self.owner.ptr_eq(other)
    }

    pub fn stage_matrix(&mut self, matrix: &Matrix3) -> Canvas2dResult<Ptr> {
        let ptr = self.scratch.matrix;
        self.engine.memory_mut().write_f32s(ptr, matrix.as_array())?;
        Ok(ptr)
    }

    pub fn stage_color(&mut self, color: ColorF32) -> Canvas2dResult<Ptr> {
        let ptr = self.scratch.color;
        self.engine.memory_mut().write_f32s(ptr, &color.to_array())?;
        Ok(ptr)
    }

    pub fn stage_rect(&mut self, rect: &Rect) -> Canvas2dResult<Ptr> {
        let ptr = self.scratch.rect;
        self.engine.memory_mut().write_f32s(ptr, &rect.to_array())?;
        Ok(ptr)
    }

    pub fn stage_src_rect(&mut self, rect: &Rect) -> Canvas2dResult<Ptr> {
        let ptr = self.scratch.src_rect;
        self.engine.memory_mut().write_f32s(ptr, &rect.to_array())?;
        Ok(ptr)
    }

    pub fn stage_irect(&mut self, rect: &IRect) -> Canvas2dResult<Ptr> {
        let ptr = self.scratch.irect;
        self.engine.memory_mut().write_i32s(ptr, &rect.to_array())?;
        Ok(ptr)
    }

    pub fn concat(&mut self, matrix: &Matrix3) -> Canvas2dResult<()> {
        let ptr = self.stage_matrix(matrix)?;
        self.engine.concat(ptr)
    }

    pub fn set_matrix(&mut self, matrix: &Matrix3) -> Canvas2dResult<()> {
        let ptr = self.stage_matrix(matrix)?;
        self.engine.set_matrix(ptr)
    }

    pub fn clear(&mut self, color: ColorF32) -> Canvas2dResult<()> {
        let ptr = self.stage_color(color)?;
        self.engine.clear(ptr)
    }

    pub fn draw_rect(&mut self, rect: &Rect, paint: &Paint) -> Canvas2dResult<()> {
        let ptr = self.stage_rect(rect)?;
        self.engine.draw_rect(ptr, paint)
    }

    pub fn draw_path(&mut self, path: &Path, paint: &Paint) -> Canvas2dResult<()> {
        self.with_path(path, |engine, payload| engine.draw_path(payload, paint))
    }

    pub fn draw_text_blob(&mut self, glyphs: &Path, paint: &Paint) -> Canvas2dResult<()> {
        self.with_path(glyphs, |engine, payload| engine.draw_text_blob(payload, paint))
    }

    pub fn clip_path(&mut self, path: &Path, anti_alias: bool) -> Canvas2dResult<()> {
        self.with_path(path, |engine, payload| engine.clip_path(payload, anti_alias))
    }

    /// Stage `path` for one engine call. The buffers are freed when `f` returns,
    /// whether or not it failed.
    pub fn with_path<R>(
        &mut self,
        path: &Path,
        f: impl FnOnce(&mut dyn RasterEngine, &PathPayload) -> Canvas2dResult<R>,
    ) -> Canvas2dResult<R> {
        let (verbs, coords, weights) = path.to_raw_parts();
        let fill_rule = path.fill_rule();
        let verbs_ptr = self.engine.memory_mut().alloc_bytes(&verbs)?;
        let result = self.with_f32_buffers(
            [coords.as_slice(), weights.as_slice()],
            |engine, [points, weights_ptr]| {
                let payload = PathPayload {
                    verbs: verbs_ptr,
                    verb_count: verbs.len(),
                    points,
                    point_count: coords.len() / 2,
                    weights: weights_ptr,
                    weight_count: weights.len(),
                    fill_rule,
                };
                f(engine, &payload)
            },
        );
        self.free_all(&[verbs_ptr]);
        result
    }

    /// Stage float arrays for one engine call, freeing them afterwards.
    pub fn with_f32_buffers<R, const N: usize>(
        &mut self,
        buffers: [&[f32]; N],
        f: impl FnOnce(&mut dyn RasterEngine, [Ptr; N]) -> Canvas2dResult<R>,
    ) -> Canvas2dResult<R> {
        let mut ptrs = [Ptr::NULL; N];
        for (i, values) in buffers.iter().enumerate() {
            match self.engine.memory_mut().alloc_f32s(values) {
                Ok(ptr) => ptrs[i] = ptr,
                Err(err) => {
                    self.free_all(&ptrs[..i]);
                    return Err(err);
                }
            }
        }
        let result = f(self.engine.as_mut(), ptrs);
        self.free_all(&ptrs);
        result
    }

    /// Stage a byte block for one engine call, freeing it afterwards.
    pub fn with_bytes<R>(
        &mut self,
        data: &[u8],
        f: impl FnOnce(&mut dyn RasterEngine, Ptr) -> Canvas2dResult<R>,
    ) -> Canvas2dResult<R> {
        let ptr = self.engine.memory_mut().alloc_bytes(data)?;
        let result = f(self.engine.as_mut(), ptr);
        self.free_all(&[ptr]);
        result
    }

    fn free_all(&mut self, ptrs: &[Ptr]) {
        for ptr in ptrs {
            if let Err(err) = self.engine.memory_mut().free(*ptr) {
                log::warn!(target: "canvas::engine", "failed to release staging buffer: {}", err);
            }
        }
    }
}

/// Shared handle to one engine context.
///
/// Cloning shares the engine. The handle is `!Send`: every surface, shader and
/// buffer made from it lives on the thread that created it.
#[derive(Clone)]
pub struct EngineHandle(Rc<RefCell<NativeContext>>);

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineHandle")
            .field(&Rc::as_ptr(&self.0))
            .finish()
    }
}

impl EngineHandle {
    /// Wrap an engine, reserving its scratch regions.
    pub fn new(mut engine: Box<dyn RasterEngine>) -> Canvas2dResult<Self> {
        let scratch = ScratchRegions::reserve(engine.memory_mut())?;
        let native = Rc::new_cyclic(|owner| {
            RefCell::new(NativeContext {
                engine,
                scratch,
                owner: owner.clone(),
            })
        });
        Ok(Self(native))
    }

    /// A software engine.
    pub fn skia(config: EngineConfig) -> Canvas2dResult<Self> {
        Self::new(Box::new(SkiaEngine::new(config)))
    }

    /// A software engine whose calls are appended to the returned log.
    pub fn recording(config: EngineConfig) -> Canvas2dResult<(Self, CallLog)> {
        let log = CallLog::default();
        let engine = RecordingEngine::new(SkiaEngine::new(config), log.clone());
        Ok((Self::new(Box::new(engine))?, log))
    }

    /// Borrow the engine. A borrow already in progress is `EngineBusy`.
    pub fn borrow_mut(&self) -> Canvas2dResult<RefMut<'_, NativeContext>> {
        self.0.try_borrow_mut().map_err(|_| Canvas2dError::EngineBusy)
    }

    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut NativeContext) -> Canvas2dResult<R>,
    ) -> Canvas2dResult<R> {
        let mut native = self.borrow_mut()?;
        f(&mut native)
    }

    /// Allocate a caller-owned buffer in this engine's memory.
    pub fn alloc_managed(&self, byte_len: usize) -> Canvas2dResult<ManagedBuffer> {
        let ptr = self.with(|native| native.engine.memory_mut().malloc(byte_len))?;
        Ok(ManagedBuffer::new(ptr, byte_len, Rc::downgrade(&self.0)))
    }

    /// Live allocations in the engine's memory, scratch regions included.
    pub fn live_allocations(&self) -> Canvas2dResult<usize> {
        self.with(|native| Ok(native.engine.memory().live_allocations()))
    }

    pub fn ptr_eq(&self, other: &EngineHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn cell(&self) -> &Rc<RefCell<NativeContext>> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::PaintSource;

    #[test]
    fn test_scratch_regions_are_reserved_once() {
        let handle = EngineHandle::skia(EngineConfig::default()).unwrap();
        assert_eq!(handle.live_allocations().unwrap(), 5);
    }

    #[test]
    fn test_path_staging_is_released_on_error() {
        let handle = EngineHandle::skia(EngineConfig::default()).unwrap();
        let mut path = Path::new();
        path.rect(&crate::geometry::RectParams {
            x: 0.0,
            y: 0.0,
            width: 4.0,
            height: 4.0,
        });
        let result = handle.with(|native| {
            native.draw_path(&path, &Paint::fill(PaintSource::Color(ColorF32::BLACK)))
        });
        // No surface is bound
        assert!(matches!(result, Err(Canvas2dError::NoCurrentSurface)));
        assert_eq!(handle.live_allocations().unwrap(), 5);
    }

    #[test]
    fn test_reentrant_borrow_is_busy() {
        let handle = EngineHandle::skia(EngineConfig::default()).unwrap();
        let inner = handle.clone();
        let result = handle.with(|_| inner.with(|_| Ok(())));
        assert!(matches!(result, Err(Canvas2dError::EngineBusy)));
    }

    #[test]
    fn test_managed_buffer_double_free() {
        let handle = EngineHandle::skia(EngineConfig::default()).unwrap();
        let mut buf = handle.alloc_managed(64).unwrap();
        buf.write_f32s(&[1.0, 2.0]).unwrap();
        assert_eq!(buf.read_f32s(2).unwrap(), vec![1.0, 2.0]);
        buf.free().unwrap();
        assert!(matches!(buf.free(), Err(Canvas2dError::BufferFreed(_))));
        assert_eq!(handle.live_allocations().unwrap(), 5);
    }

    #[test]
    fn test_managed_buffer_released_on_drop() {
        let handle = EngineHandle::skia(EngineConfig::default()).unwrap();
        {
            let _buf = handle.alloc_managed(16).unwrap();
            assert_eq!(handle.live_allocations().unwrap(), 6);
        }
        assert_eq!(handle.live_allocations().unwrap(), 5);
    }
}

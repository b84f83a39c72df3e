//! Native raster targets.

use crate::color::ColorF32;
use crate::engine::{EngineHandle, NativeContext, SurfaceId};
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{DirtyRect, IRect};
use crate::image_data::{premultiply_in_place, ImageData};
use crate::memory::ManagedBuffer;

/// Largest width or height of a surface.
pub const MAX_SURFACE_DIMENSION: u32 = 32767;

/// A native surface plus the pixel store it is read back into.
///
/// Disposal happens exactly once, either through [`Surface::dispose`] or on drop.
#[derive(Debug)]
pub struct Surface {
    engine: EngineHandle,
    id: Option<SurfaceId>,
    width: u32,
    height: u32,
    pixels: Option<ManagedBuffer>,
}

impl Surface {
    pub fn new(engine: &EngineHandle, width: u32, height: u32) -> Canvas2dResult<Self> {
        if width == 0
            || height == 0
            || width > MAX_SURFACE_DIMENSION
            || height > MAX_SURFACE_DIMENSION
        {
            return Err(Canvas2dError::InvalidDimensions { width, height });
        }
        let byte_len = width as usize * height as usize * 4;
        let pixels = engine.alloc_managed(byte_len)?;
        let id = engine.with(|native| native.engine_mut().make_surface(width, height))?;
        log::debug!(target: "canvas", "surface {:?} created ({}x{})", id, width, height);
        Ok(Self {
            engine: engine.clone(),
            id: Some(id),
            width,
            height,
            pixels: Some(pixels),
        })
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn id(&self) -> Canvas2dResult<SurfaceId> {
        self.id.ok_or(Canvas2dError::SurfaceDisposed)
    }

    pub fn is_disposed(&self) -> bool {
        self.id.is_none()
    }

    /// Run `f` against the engine with this surface current.
    ///
    /// Every native call made on behalf of this surface goes through here, so
    /// several surfaces can share one engine.
    pub fn with_bound<R>(
        &self,
        f: impl FnOnce(&mut NativeContext) -> Canvas2dResult<R>,
    ) -> Canvas2dResult<R> {
        let id = self.id()?;
        self.engine.with(|native| {
            if native.engine().current_surface() != Some(id) {
                log::trace!(target: "canvas", "rebinding surface {:?}", id);
                native.engine_mut().make_current(id)?;
            }
            f(native)
        })
    }

    /// Flush pending work and read the whole surface back as straight-alpha pixels.
    pub fn flush(&self) -> Canvas2dResult<ImageData> {
        let pixels = self.pixels.as_ref().ok_or(Canvas2dError::SurfaceDisposed)?;
        let ptr = pixels.ptr()?;
        let len = pixels.byte_len();
        let full = IRect::new(0, 0, self.width as i32, self.height as i32);
        let data = self.with_bound(|native| {
            native.engine_mut().flush()?;
            let rect = native.stage_irect(&full)?;
            native.engine_mut().read_pixels(rect, ptr)?;
            native.engine().memory().read_bytes(ptr, len)
        })?;
        ImageData::from_premultiplied(self.width, self.height, data)
    }

    /// Read a block of pixels; the area outside the surface is transparent.
    pub fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Canvas2dResult<ImageData> {
        if width == 0 || height == 0 {
            return Err(Canvas2dError::InvalidDimensions { width, height });
        }
        let len = width as usize * height as usize * 4;
        let rect = IRect::new(x, y, width as i32, height as i32);
        let data = self.with_bound(|native| {
            let rect_ptr = native.stage_irect(&rect)?;
            native.with_bytes(&vec![0u8; len], |engine, ptr| {
                engine.read_pixels(rect_ptr, ptr)?;
                engine.memory().read_bytes(ptr, len)
            })
        })?;
        ImageData::from_premultiplied(width, height, data)
    }

    /// Read premultiplied pixels straight into a caller-owned buffer.
    pub fn read_pixels_into(
        &self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        dst: &ManagedBuffer,
    ) -> Canvas2dResult<()> {
        if width == 0 || height == 0 {
            return Err(Canvas2dError::InvalidDimensions { width, height });
        }
        if !dst.belongs_to(self.engine.cell()) {
            return Err(Canvas2dError::InvalidArgument(
                "buffer belongs to a different engine".to_string(),
            ));
        }
        let ptr = dst.ptr()?;
        let len = width as usize * height as usize * 4;
        if len > dst.byte_len() {
            return Err(Canvas2dError::OutOfBounds {
                ptr: ptr.offset() as u32,
                len,
            });
        }
        let rect = IRect::new(x, y, width as i32, height as i32);
        self.with_bound(|native| {
            let rect_ptr = native.stage_irect(&rect)?;
            native.engine_mut().read_pixels(rect_ptr, ptr)
        })
    }

    /// Replace pixels at `(dx, dy)` with `image`, or with its `dirty` region only.
    /// No compositing, transform or clip is applied.
    pub fn write_pixels(
        &self,
        image: &ImageData,
        dx: i32,
        dy: i32,
        dirty: Option<DirtyRect>,
    ) -> Canvas2dResult<()> {
        let (iw, ih) = (image.width() as i32, image.height() as i32);
        let dirty = dirty.unwrap_or(DirtyRect {
            x: 0,
            y: 0,
            width: iw,
            height: ih,
        });
        // Negative sizes extend left and up from the given corner
        let (mut x, mut w) = (dirty.x, dirty.width);
        if w < 0 {
            x += w;
            w = -w;
        }
        let (mut y, mut h) = (dirty.y, dirty.height);
        if h < 0 {
            y += h;
            h = -h;
        }
        let Some(block) = IRect::new(x, y, w, h).clip_to(image.width(), image.height()) else {
            return Ok(());
        };

        let mut pixels = Vec::with_capacity(block.width as usize * block.height as usize * 4);
        for row in block.y..block.y + block.height {
            let start = (row as usize * iw as usize + block.x as usize) * 4;
            pixels.extend_from_slice(&image.data()[start..start + block.width as usize * 4]);
        }
        premultiply_in_place(&mut pixels);

        let target = IRect::new(dx + block.x, dy + block.y, block.width, block.height);
        self.with_bound(|native| {
            let rect_ptr = native.stage_irect(&target)?;
            native.with_bytes(&pixels, |engine, ptr| engine.write_pixels(rect_ptr, ptr))
        })
    }

    /// Fill the whole surface with `color`, ignoring transform and clip.
    pub fn clear(&self, color: ColorF32) -> Canvas2dResult<()> {
        self.with_bound(|native| native.clear(color))
    }

    pub fn to_png(&self, ppi: Option<f32>) -> Canvas2dResult<Vec<u8>> {
        self.flush()?.to_png(ppi)
    }

    pub fn to_jpeg(&self, quality: u8) -> Canvas2dResult<Vec<u8>> {
        self.flush()?.to_jpeg(quality)
    }

    /// Delete the native surface and free the pixel store. A second call is an error.
    ///
    /// The surface stays live until the native delete succeeds, so a failed
    /// dispose (for example while the engine is busy) can be retried.
    pub fn dispose(&mut self) -> Canvas2dResult<()> {
        let id = self.id()?;
        let (surface_id, pixels) = (&mut self.id, &mut self.pixels);
        self.engine.with(|native| {
            native.engine_mut().delete_surface(id)?;
            *surface_id = None;
            if let Some(buffer) = pixels.as_mut() {
                buffer.free_in(native)?;
            }
            *pixels = None;
            Ok(())
        })?;
        log::debug!(target: "canvas", "surface {:?} disposed", id);
        Ok(())
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        if self.is_disposed() {
            return;
        }
        if let Err(err) = self.dispose() {
            log::warn!(target: "canvas", "surface not released on drop: {}", err);
        }
    }
}

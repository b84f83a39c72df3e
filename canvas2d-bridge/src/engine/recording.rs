//! An engine decorator that records every call.
//!
//! Payload pointers are decoded when the call is made, so the log holds values
//! rather than pointers that may be reused by later calls.

use super::{
    GradientPayload, ImageId, ImageShaderPayload, PathPayload, RasterEngine, ShaderId, SurfaceId,
};
use crate::color::ColorF32;
use crate::error::Canvas2dResult;
use crate::geometry::{IRect, Rect};
use crate::matrix::Matrix3;
use crate::memory::{LinearMemory, Ptr};
use crate::paint::{ImagePaint, Paint};
use crate::style::{CanvasFillRule, PointMode};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderType {
    LinearGradient,
    RadialGradient,
    SweepGradient,
    Image,
}

/// One engine call with its decoded arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    MakeSurface {
        width: u32,
        height: u32,
        id: SurfaceId,
    },
    DeleteSurface(SurfaceId),
    MakeCurrent(SurfaceId),
    Save,
    Restore,
    Concat(Matrix3),
    SetMatrix(Matrix3),
    ClipPath {
        verb_count: usize,
        fill_rule: CanvasFillRule,
        anti_alias: bool,
    },
    Clear(ColorF32),
    DrawPath {
        verb_count: usize,
        paint: Paint,
    },
    DrawRect {
        rect: Rect,
        paint: Paint,
    },
    DrawPoints {
        mode: PointMode,
        count: usize,
        paint: Paint,
    },
    DrawImageRect {
        image: ImageId,
        src: Rect,
        dst: Rect,
        paint: ImagePaint,
    },
    DrawTextBlob {
        verb_count: usize,
        paint: Paint,
    },
    MakeImage {
        width: u32,
        height: u32,
        id: ImageId,
    },
    DeleteImage(ImageId),
    MakeShader {
        kind: ShaderType,
        id: ShaderId,
    },
    DeleteShader(ShaderId),
    ReadPixels(IRect),
    WritePixels(IRect),
    Flush,
}

impl EngineCall {
    /// True for calls that put pixels on a surface.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            EngineCall::Clear(_)
                | EngineCall::DrawPath { .. }
                | EngineCall::DrawRect { .. }
                | EngineCall::DrawPoints { .. }
                | EngineCall::DrawImageRect { .. }
                | EngineCall::DrawTextBlob { .. }
                | EngineCall::WritePixels(_)
        )
    }
}

/// Shared, append-only list of recorded calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<EngineCall>>>);

impl CallLog {
    fn push(&self, call: EngineCall) {
        log::trace!(target: "canvas::engine", "record {:?}", call);
        self.0.borrow_mut().push(call);
    }

    /// Snapshot of the calls so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.borrow().clone()
    }

    /// Remove and return the calls so far.
    pub fn take(&self) -> Vec<EngineCall> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Wraps an engine and appends each call to a [`CallLog`] before forwarding it.
/// Calls that create objects are logged after they succeed, with the new id.
pub struct RecordingEngine<E> {
    inner: E,
    log: CallLog,
}

impl<E: RasterEngine> RecordingEngine<E> {
    pub fn new(inner: E, log: CallLog) -> Self {
        Self { inner, log }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    /// Record the decoded value, or skip the entry if the payload is unreadable.
    /// The inner engine reports the bad payload itself.
    fn record<T>(
        &self,
        decode: impl FnOnce(&LinearMemory) -> Canvas2dResult<T>,
        to_call: impl FnOnce(T) -> EngineCall,
    ) {
        match decode(self.inner.memory()) {
            Ok(value) => self.log.push(to_call(value)),
            Err(err) => {
                log::debug!(target: "canvas::engine", "unrecorded call, bad payload: {}", err)
            }
        }
    }
}

fn decode_matrix(memory: &LinearMemory, ptr: Ptr) -> Canvas2dResult<Matrix3> {
    Matrix3::try_from(memory.read_f32s(ptr, 9)?.as_slice())
}

fn decode_rect(memory: &LinearMemory, ptr: Ptr) -> Canvas2dResult<Rect> {
    let v = memory.read_f32s(ptr, 4)?;
    Ok(Rect::from_ltrb(v[0], v[1], v[2], v[3]))
}

fn decode_irect(memory: &LinearMemory, ptr: Ptr) -> Canvas2dResult<IRect> {
    let v = memory.read_i32s(ptr, 4)?;
    Ok(IRect::new(v[0], v[1], v[2], v[3]))
}

impl<E: RasterEngine> RasterEngine for RecordingEngine<E> {
    fn memory(&self) -> &LinearMemory {
        self.inner.memory()
    }

    fn memory_mut(&mut self) -> &mut LinearMemory {
        self.inner.memory_mut()
    }

    fn make_surface(&mut self, width: u32, height: u32) -> Canvas2dResult<SurfaceId> {
        let id = self.inner.make_surface(width, height)?;
        self.log.push(EngineCall::MakeSurface { width, height, id });
        Ok(id)
    }

    fn delete_surface(&mut self, surface: SurfaceId) -> Canvas2dResult<()> {
        self.log.push(EngineCall::DeleteSurface(surface));
        self.inner.delete_surface(surface)
    }

    fn make_current(&mut self, surface: SurfaceId) -> Canvas2dResult<()> {
        self.log.push(EngineCall::MakeCurrent(surface));
        self.inner.make_current(surface)
    }

    fn current_surface(&self) -> Option<SurfaceId> {
        self.inner.current_surface()
    }

    fn surface_size(&self, surface: SurfaceId) -> Canvas2dResult<(u32, u32)> {
        self.inner.surface_size(surface)
    }

    fn save(&mut self) -> Canvas2dResult<()> {
        self.log.push(EngineCall::Save);
        self.inner.save()
    }

    fn restore(&mut self) -> Canvas2dResult<()> {
        self.log.push(EngineCall::Restore);
        self.inner.restore()
    }

    fn save_count(&self) -> Canvas2dResult<usize> {
        self.inner.save_count()
    }

    fn concat(&mut self, matrix: Ptr) -> Canvas2dResult<()> {
        self.record(|m| decode_matrix(m, matrix), EngineCall::Concat);
        self.inner.concat(matrix)
    }

    fn set_matrix(&mut self, matrix: Ptr) -> Canvas2dResult<()> {
        self.record(|m| decode_matrix(m, matrix), EngineCall::SetMatrix);
        self.inner.set_matrix(matrix)
    }

    fn total_matrix(&self) -> Canvas2dResult<Matrix3> {
        self.inner.total_matrix()
    }

    fn clip_path(&mut self, path: &PathPayload, anti_alias: bool) -> Canvas2dResult<()> {
        self.log.push(EngineCall::ClipPath {
            verb_count: path.verb_count,
            fill_rule: path.fill_rule,
            anti_alias,
        });
        self.inner.clip_path(path, anti_alias)
    }

    fn clear(&mut self, color: Ptr) -> Canvas2dResult<()> {
        self.record(
            |m| {
                let v = m.read_f32s(color, 4)?;
                Ok(ColorF32::new(v[0], v[1], v[2], v[3]))
            },
            EngineCall::Clear,
        );
        self.inner.clear(color)
    }

    fn draw_path(&mut self, path: &PathPayload, paint: &Paint) -> Canvas2dResult<()> {
        self.log.push(EngineCall::DrawPath {
            verb_count: path.verb_count,
            paint: paint.clone(),
        });
        self.inner.draw_path(path, paint)
    }

    fn draw_rect(&mut self, rect: Ptr, paint: &Paint) -> Canvas2dResult<()> {
        self.record(
            |m| decode_rect(m, rect),
            |rect| EngineCall::DrawRect {
                rect,
                paint: paint.clone(),
            },
        );
        self.inner.draw_rect(rect, paint)
    }

    fn draw_points(
        &mut self,
        mode: PointMode,
        points: Ptr,
        count: usize,
        paint: &Paint,
    ) -> Canvas2dResult<()> {
        self.log.push(EngineCall::DrawPoints {
            mode,
            count,
            paint: paint.clone(),
        });
        self.inner.draw_points(mode, points, count, paint)
    }

    fn draw_image_rect(
        &mut self,
        image: ImageId,
        src: Ptr,
        dst: Ptr,
        paint: &ImagePaint,
    ) -> Canvas2dResult<()> {
        self.record(
            |m| Ok((decode_rect(m, src)?, decode_rect(m, dst)?)),
            |(src, dst)| EngineCall::DrawImageRect {
                image,
                src,
                dst,
                paint: paint.clone(),
            },
        );
        self.inner.draw_image_rect(image, src, dst, paint)
    }

    fn draw_text_blob(&mut self, glyphs: &PathPayload, paint: &Paint) -> Canvas2dResult<()> {
        self.log.push(EngineCall::DrawTextBlob {
            verb_count: glyphs.verb_count,
            paint: paint.clone(),
        });
        self.inner.draw_text_blob(glyphs, paint)
    }

    fn make_image(&mut self, width: u32, height: u32, pixels: Ptr) -> Canvas2dResult<ImageId> {
        let id = self.inner.make_image(width, height, pixels)?;
        self.log.push(EngineCall::MakeImage { width, height, id });
        Ok(id)
    }

    fn delete_image(&mut self, image: ImageId) -> Canvas2dResult<()> {
        self.log.push(EngineCall::DeleteImage(image));
        self.inner.delete_image(image)
    }

    fn make_linear_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId> {
        let id = self.inner.make_linear_gradient(gradient)?;
        self.log.push(EngineCall::MakeShader {
            kind: ShaderType::LinearGradient,
            id,
        });
        Ok(id)
    }

    fn make_radial_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId> {
        let id = self.inner.make_radial_gradient(gradient)?;
        self.log.push(EngineCall::MakeShader {
            kind: ShaderType::RadialGradient,
            id,
        });
        Ok(id)
    }

    fn make_sweep_gradient(&mut self, gradient: &GradientPayload) -> Canvas2dResult<ShaderId> {
        let id = self.inner.make_sweep_gradient(gradient)?;
        self.log.push(EngineCall::MakeShader {
            kind: ShaderType::SweepGradient,
            id,
        });
        Ok(id)
    }

    fn make_image_shader(&mut self, shader: &ImageShaderPayload) -> Canvas2dResult<ShaderId> {
        let id = self.inner.make_image_shader(shader)?;
        self.log.push(EngineCall::MakeShader {
            kind: ShaderType::Image,
            id,
        });
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) -> Canvas2dResult<()> {
        self.log.push(EngineCall::DeleteShader(shader));
        self.inner.delete_shader(shader)
    }

    fn read_pixels(&mut self, rect: Ptr, dst: Ptr) -> Canvas2dResult<()> {
        self.record(|m| decode_irect(m, rect), EngineCall::ReadPixels);
        self.inner.read_pixels(rect, dst)
    }

    fn write_pixels(&mut self, rect: Ptr, src: Ptr) -> Canvas2dResult<()> {
        self.record(|m| decode_irect(m, rect), EngineCall::WritePixels);
        self.inner.write_pixels(rect, src)
    }

    fn flush(&mut self) -> Canvas2dResult<()> {
        self.log.push(EngineCall::Flush);
        self.inner.flush()
    }
}

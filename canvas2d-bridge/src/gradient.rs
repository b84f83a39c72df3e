//! Gradient types for Canvas 2D operations.

use crate::color::{parse_color_lenient, ColorF32, ColorTable};
use crate::engine::{GradientPayload, NativeContext};
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::RadialGradientParams;
use crate::matrix::Matrix3;
use crate::paint::PaintSource;
use crate::shader::NativeShader;
use crate::style::TileMode;
use std::cell::RefCell;
use std::rc::Rc;

/// A color stop in a gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Offset position (0.0 to 1.0).
    pub offset: f32,
    /// Color at this stop.
    pub color: ColorF32,
}

/// Type of gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientType {
    /// Linear gradient from (x0, y0) to (x1, y1).
    Linear { x0: f32, y0: f32, x1: f32, y1: f32 },
    /// Radial gradient from inner circle to outer circle.
    Radial(RadialGradientParams),
    /// Conic (sweep) gradient around (x, y), starting at `start_angle` radians.
    Conic { start_angle: f32, x: f32, y: f32 },
}

#[derive(Debug)]
struct GradientInner {
    gradient_type: GradientType,
    stops: RefCell<Vec<GradientStop>>,
    cached: RefCell<Option<NativeShader>>,
}

/// Canvas gradient (linear, radial or conic).
///
/// Clones share stops and the cached native shader, so a gradient set as a fill
/// style and then given more stops draws with all of them.
#[derive(Debug, Clone)]
pub struct CanvasGradient {
    inner: Rc<GradientInner>,
}

impl CanvasGradient {
    fn with_type(gradient_type: GradientType) -> Self {
        Self {
            inner: Rc::new(GradientInner {
                gradient_type,
                stops: RefCell::new(Vec::new()),
                cached: RefCell::new(None),
            }),
        }
    }

    /// Create a new linear gradient.
    pub fn new_linear(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::with_type(GradientType::Linear { x0, y0, x1, y1 })
    }

    /// Create a new radial gradient.
    pub fn new_radial(params: &RadialGradientParams) -> Self {
        Self::with_type(GradientType::Radial(*params))
    }

    /// Create a new conic gradient.
    pub fn new_conic(start_angle: f32, x: f32, y: f32) -> Self {
        Self::with_type(GradientType::Conic { start_angle, x, y })
    }

    pub fn gradient_type(&self) -> GradientType {
        self.inner.gradient_type
    }

    pub fn stops(&self) -> Vec<GradientStop> {
        self.inner.stops.borrow().clone()
    }

    /// Add a color stop. Stops at equal offsets keep insertion order.
    pub fn add_color_stop(&self, offset: f64, color: ColorF32) -> Canvas2dResult<()> {
        if !offset.is_finite() || !(0.0..=1.0).contains(&offset) {
            return Err(Canvas2dError::InvalidGradientStop(offset));
        }
        let offset = offset as f32;
        let mut stops = self.inner.stops.borrow_mut();
        let at = stops.partition_point(|s| s.offset <= offset);
        stops.insert(at, GradientStop { offset, color });
        Ok(())
    }

    /// Add a color stop from a CSS color string, falling back through `table`.
    pub fn add_color_stop_str(
        &self,
        offset: f64,
        color: &str,
        table: &ColorTable,
    ) -> Canvas2dResult<()> {
        self.add_color_stop(offset, parse_color_lenient(color, table))
    }

    /// A new gradient with the same geometry and stops and no native shader.
    pub fn duplicate(&self) -> Self {
        let copy = Self::with_type(self.inner.gradient_type);
        *copy.inner.stops.borrow_mut() = self.stops();
        copy
    }

    pub fn ptr_eq(&self, other: &CanvasGradient) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Native shader cached by the last materialize, if any.
    pub fn cached_shader(&self) -> Option<crate::engine::ShaderId> {
        self.inner.cached.borrow().as_ref().and_then(|s| s.handle())
    }

    /// Rebuild the native shader for `ctm` and return the paint source to draw with.
    ///
    /// Anchors are mapped into device space and the shader's local matrix is the
    /// inverse of `ctm`. `None` means nothing should be drawn.
    pub(crate) fn materialize(
        &self,
        native: &mut NativeContext,
        ctm: &Matrix3,
        global_alpha: f32,
    ) -> Canvas2dResult<Option<PaintSource>> {
        let stops = self.inner.stops.borrow();
        let Some(first) = stops.first() else {
            return Ok(None);
        };
        if stops.len() == 1 {
            return Ok(Some(PaintSource::Color(
                first.color.with_alpha_multiplied(global_alpha),
            )));
        }
        let Some(inverse) = ctm.invert() else {
            log::debug!(target: "canvas", "gradient skipped under singular transform");
            return Ok(None);
        };

        let geometry = match self.inner.gradient_type {
            GradientType::Linear { x0, y0, x1, y1 } => {
                let (dx0, dy0) = ctm.map_point(x0, y0);
                let (dx1, dy1) = ctm.map_point(x1, y1);
                vec![dx0, dy0, dx1, dy1]
            }
            GradientType::Radial(p) => {
                let (dx0, dy0) = ctm.map_point(p.x0, p.y0);
                let (dx1, dy1) = ctm.map_point(p.x1, p.y1);
                let scale = ctm.mean_scale();
                vec![dx0, dy0, p.r0 * scale, dx1, dy1, p.r1 * scale]
            }
            GradientType::Conic { start_angle, x, y } => {
                let (dx, dy) = ctm.map_point(x, y);
                vec![dx, dy, (start_angle + ctm.rotation()).to_degrees()]
            }
        };
        let colors: Vec<f32> = stops
            .iter()
            .flat_map(|s| s.color.with_alpha_multiplied(global_alpha).to_array())
            .collect();
        let positions: Vec<f32> = stops.iter().map(|s| s.offset).collect();
        let stop_count = stops.len();
        drop(stops);

        if let Some(old) = self.inner.cached.borrow_mut().take() {
            old.release_in(native)?;
        }

        let gradient_type = self.inner.gradient_type;
        let id = native.with_f32_buffers(
            [
                geometry.as_slice(),
                colors.as_slice(),
                positions.as_slice(),
                inverse.as_array().as_slice(),
            ],
            |engine, [geometry, colors, positions, local_matrix]| {
                let payload = GradientPayload {
                    geometry,
                    colors,
                    positions,
                    stop_count,
                    tile_mode: TileMode::Clamp,
                    local_matrix,
                };
                match gradient_type {
                    GradientType::Linear { .. } => engine.make_linear_gradient(&payload),
                    GradientType::Radial(_) => engine.make_radial_gradient(&payload),
                    GradientType::Conic { .. } => engine.make_sweep_gradient(&payload),
                }
            },
        )?;
        *self.inner.cached.borrow_mut() = Some(NativeShader::new(id, native.owner()));
        Ok(Some(PaintSource::Shader(id)))
    }
}

//! Per-draw paint descriptors.
//!
//! A `Paint` is built fresh from the drawing state for every draw call and handed to
//! the engine by reference; nothing here holds native resources except through a
//! [`ShaderId`] owned elsewhere.

use crate::color::ColorF32;
use crate::engine::ShaderId;
use crate::style::{LineCap, LineJoin};

/// Normalized dash intervals.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashPattern {
    intervals: Vec<f32>,
    phase: f32,
}

impl DashPattern {
    /// `None` if any interval or the phase is negative or non-finite. Odd-length
    /// lists are repeated once so on/off pairs line up.
    pub fn new(intervals: &[f32], phase: f32) -> Option<DashPattern> {
        if !phase.is_finite() || intervals.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return None;
        }
        let mut intervals = intervals.to_vec();
        if intervals.len() % 2 == 1 {
            intervals.extend_from_within(..);
        }
        Some(DashPattern { intervals, phase })
    }

    pub fn intervals(&self) -> &[f32] {
        &self.intervals
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Empty or all-zero patterns draw a solid line.
    pub fn is_solid(&self) -> bool {
        self.intervals.iter().all(|v| *v == 0.0)
    }

    pub fn to_tiny_skia(&self) -> Option<tiny_skia::StrokeDash> {
        if self.is_solid() {
            return None;
        }
        tiny_skia::StrokeDash::new(self.intervals.clone(), self.phase)
    }
}

/// Stroke parameters, in the coordinate space the geometry is drawn in.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeGeometry {
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    pub dash: Option<DashPattern>,
}

impl Default for StrokeGeometry {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
        }
    }
}

impl StrokeGeometry {
    pub fn to_tiny_skia(&self) -> tiny_skia::Stroke {
        tiny_skia::Stroke {
            width: self.width,
            miter_limit: self.miter_limit,
            line_cap: self.cap.into(),
            line_join: self.join.into(),
            dash: self.dash.as_ref().and_then(DashPattern::to_tiny_skia),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintStyle {
    Fill,
    Stroke(StrokeGeometry),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintSource {
    Color(ColorF32),
    Shader(ShaderId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub style: PaintStyle,
    pub source: PaintSource,
    pub blend_mode: tiny_skia::BlendMode,
    pub anti_alias: bool,
    /// Gaussian sigma of a blur applied to the coverage, in device pixels.
    pub mask_blur_sigma: Option<f32>,
}

impl Paint {
    pub fn fill(source: PaintSource) -> Self {
        Self {
            style: PaintStyle::Fill,
            source,
            blend_mode: tiny_skia::BlendMode::SourceOver,
            anti_alias: true,
            mask_blur_sigma: None,
        }
    }

    pub fn stroke(source: PaintSource, geometry: StrokeGeometry) -> Self {
        Self {
            style: PaintStyle::Stroke(geometry),
            ..Self::fill(source)
        }
    }

    pub fn with_blend_mode(mut self, mode: tiny_skia::BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_anti_alias(mut self, anti_alias: bool) -> Self {
        self.anti_alias = anti_alias;
        self
    }

    pub fn with_mask_blur(mut self, sigma: Option<f32>) -> Self {
        self.mask_blur_sigma = sigma.filter(|s| *s > 0.0 && s.is_finite());
        self
    }

    pub fn with_source(mut self, source: PaintSource) -> Self {
        self.source = source;
        self
    }

    pub fn is_stroke(&self) -> bool {
        matches!(self.style, PaintStyle::Stroke(_))
    }
}

/// Canvas shadow settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowParams {
    pub blur: f32,
    pub color: ColorF32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            blur: 0.0,
            color: ColorF32::TRANSPARENT,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl ShadowParams {
    /// A shadow draws only with a visible color and either blur or an offset.
    pub fn is_visible(&self) -> bool {
        !self.color.is_transparent()
            && (self.blur > 0.0 || self.offset_x != 0.0 || self.offset_y != 0.0)
    }

    /// Gaussian sigma for the shadow blur.
    pub fn sigma(&self) -> Option<f32> {
        (self.blur > 0.0).then_some(self.blur / 2.0)
    }

    pub fn shadow_color(&self, global_alpha: f32) -> ColorF32 {
        self.color.with_alpha_multiplied(global_alpha)
    }

    /// The shadow pass paint: same geometry and blending, shadow color, blurred.
    pub fn shadow_paint(&self, primary: &Paint, global_alpha: f32) -> Paint {
        primary
            .clone()
            .with_source(PaintSource::Color(self.shadow_color(global_alpha)))
            .with_mask_blur(self.sigma())
    }

    pub fn shadow_image_paint(&self, primary: &ImagePaint, global_alpha: f32) -> ImagePaint {
        ImagePaint {
            silhouette: Some(self.shadow_color(global_alpha)),
            mask_blur_sigma: self.sigma(),
            ..primary.clone()
        }
    }
}

/// Paint for image draws.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePaint {
    pub alpha: f32,
    pub blend_mode: tiny_skia::BlendMode,
    pub quality: tiny_skia::FilterQuality,
    pub mask_blur_sigma: Option<f32>,
    /// When set, the image's alpha is filled with this color (image shadows).
    pub silhouette: Option<ColorF32>,
}

impl Default for ImagePaint {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            blend_mode: tiny_skia::BlendMode::SourceOver,
            quality: tiny_skia::FilterQuality::Bilinear,
            mask_blur_sigma: None,
            silhouette: None,
        }
    }
}

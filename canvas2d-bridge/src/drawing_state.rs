//! Drawing state that can be saved and restored.

use crate::font_parser::ParsedFont;
use crate::matrix::Matrix3;
use crate::paint::{DashPattern, ShadowParams, StrokeGeometry};
use crate::path::Path;
use crate::style::{
    CanvasFillRule, FillStyle, ImageSmoothingQuality, LineCap, LineJoin, TextAlign, TextBaseline,
};

/// A clip applied to the engine, kept so the state knows what is active.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRecord {
    /// Clip path in the coordinates of `transform`.
    pub path: Path,
    /// Transform that was current when the clip was applied.
    pub transform: Matrix3,
    pub fill_rule: CanvasFillRule,
}

/// Drawing state that can be saved and restored.
#[derive(Debug, Clone)]
pub struct DrawingState {
    /// Current transform matrix.
    pub transform: Matrix3,
    /// Clips intersected so far, oldest first.
    pub clips: Vec<ClipRecord>,
    /// Current fill style.
    pub fill_style: FillStyle,
    /// Current stroke style.
    pub stroke_style: FillStyle,
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    /// Dash intervals and offset.
    pub line_dash: DashPattern,
    pub shadow: ShadowParams,
    /// Current font.
    pub font: ParsedFont,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    /// Letter spacing for text rendering (in pixels).
    pub letter_spacing: f32,
    pub global_alpha: f32,
    /// Current global composite operation (blend mode).
    pub global_composite_operation: tiny_skia::BlendMode,
    pub image_smoothing_enabled: bool,
    pub image_smoothing_quality: ImageSmoothingQuality,
}

impl Default for DrawingState {
    fn default() -> Self {
        Self {
            transform: Matrix3::identity(),
            clips: Vec::new(),
            fill_style: FillStyle::default(),
            stroke_style: FillStyle::default(),
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            line_dash: DashPattern::default(),
            shadow: ShadowParams::default(),
            font: ParsedFont::default(),
            text_align: TextAlign::default(),
            text_baseline: TextBaseline::default(),
            letter_spacing: 0.0,
            global_alpha: 1.0,
            global_composite_operation: tiny_skia::BlendMode::SourceOver,
            image_smoothing_enabled: true,
            image_smoothing_quality: ImageSmoothingQuality::default(),
        }
    }
}

impl DrawingState {
    /// Stroke parameters for the next stroke, in logical units.
    pub fn stroke_geometry(&self) -> StrokeGeometry {
        StrokeGeometry {
            width: self.line_width,
            cap: self.line_cap,
            join: self.line_join,
            miter_limit: self.miter_limit,
            dash: (!self.line_dash.is_solid()).then(|| self.line_dash.clone()),
        }
    }

    pub fn image_filter_quality(&self) -> tiny_skia::FilterQuality {
        self.image_smoothing_quality
            .filter_quality(self.image_smoothing_enabled)
    }
}

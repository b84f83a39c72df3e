//! HTML Canvas 2D drawing context on top of a handle-based raster engine.
//!
//! [`Canvas2dContext`] keeps the canvas state (styles, transform, clip, the open
//! path) and forwards every draw to a [`RasterEngine`] through numeric handles and
//! pointers into the engine's linear memory. The default engine rasterizes with
//! `tiny-skia`; [`RecordingEngine`] logs calls instead, which makes the
//! bridging protocol observable in tests. Text is shaped with `cosmic-text`
//! against a `fontdb` database.
//!
//! # Example
//!
//! ```rust,no_run
//! use canvas2d_bridge::{Canvas2dContext, RectParams};
//!
//! # fn main() -> canvas2d_bridge::Canvas2dResult<()> {
//! let mut ctx = Canvas2dContext::new(400, 300)?;
//! ctx.set_fill_style("#ff0000");
//! ctx.fill_rect(&RectParams { x: 10.0, y: 10.0, width: 100.0, height: 50.0 })?;
//! let png_data = ctx.to_png(None)?;
//! # Ok(())
//! # }
//! ```

mod arc;
mod color;
mod color_matrix;
mod context;
mod dom_matrix;
mod drawing_state;
mod engine;
mod error;
mod font_config;
mod font_parser;
mod geometry;
mod gradient;
mod image_data;
mod matrix;
mod memory;
mod paint;
mod path;
mod path2d;
mod path_boolean;
mod path_measure;
mod pattern;
mod shader;
mod style;
mod surface;
mod text;

// Re-export public API
pub use color::{parse_color, parse_color_lenient, ColorF32, ColorTable};
pub use color_matrix::ColorMatrix;
pub use context::{Canvas2dContext, Canvas2dContextBuilder, LogicalPathTracker, PointSource};
pub use dom_matrix::DOMMatrix;
pub use drawing_state::{ClipRecord, DrawingState};
pub use engine::{
    CallLog, EngineCall, EngineConfig, EngineHandle, GradientPayload, Handle, HandleKind,
    HandleTable, ImageId, ImageKind, ImageShaderPayload, NativeContext, PathPayload,
    RasterEngine, RecordingEngine, ShaderId, ShaderKind, ShaderType, SkiaEngine, SurfaceId,
    SurfaceKind,
};
pub use error::{Canvas2dError, Canvas2dResult};
pub use font_config::{
    font_config_to_fontdb, CustomFont, FontConfig, GenericFamilyMap, ResolvedFontConfig,
};
pub use font_parser::{parse_font, ParsedFont};
pub use geometry::{
    ArcParams, ArcToParams, CornerRadius, CubicBezierParams, DirtyRect, EllipseParams,
    ImageCropParams, IRect, QuadraticBezierParams, RadialGradientParams, Rect, RectParams,
    RoundRectParams,
};
pub use gradient::{CanvasGradient, GradientStop, GradientType};
pub use image_data::{premultiply_in_place, unpremultiply_in_place, ImageData, DEFAULT_PPI};
pub use matrix::{Matrix3, Matrix4};
pub use memory::{LinearMemory, ManagedBuffer, MemoryConfig, Ptr, ScratchRegions, ALIGN};
pub use paint::{
    DashPattern, ImagePaint, Paint, PaintSource, PaintStyle, ShadowParams, StrokeGeometry,
};
pub use path::{Path, PathSegment, Polyline, Segments, Verb, DEFAULT_TOLERANCE};
pub use path2d::Path2D;
pub use path_boolean::{PathOp, MAX_EDGES};
pub use path_measure::{ContourMeasure, PathMeasure};
pub use pattern::{CanvasPattern, Repetition};
pub use shader::{NativeHandle, NativeImage, NativeKind, NativeShader};
pub use style::{
    composite_operation_name, parse_composite_operation, CanvasFillRule, FillStyle,
    ImageSmoothingQuality, LineCap, LineJoin, PointMode, TextAlign, TextBaseline, TileMode,
};
pub use surface::{Surface, MAX_SURFACE_DIMENSION};
pub use text::{ShapedText, TextMetrics};

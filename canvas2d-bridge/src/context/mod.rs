//! Canvas 2D rendering context on top of a [`RasterEngine`](crate::engine::RasterEngine).

mod drawing;
mod image_ops;
mod path_ops;
mod path_tracker;
mod text_rendering;
mod transform;

pub use drawing::PointSource;
pub use path_tracker::LogicalPathTracker;

use crate::color::{parse_color_lenient, ColorF32, ColorTable};
use crate::drawing_state::DrawingState;
use crate::engine::{EngineConfig, EngineHandle};
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::font_config::{font_config_to_fontdb, FontConfig, ResolvedFontConfig};
use crate::geometry::RadialGradientParams;
use crate::gradient::CanvasGradient;
use crate::image_data::ImageData;
use crate::memory::MemoryConfig;
use crate::paint::DashPattern;
use crate::pattern::{CanvasPattern, Repetition};
use crate::style::{
    composite_operation_name, parse_composite_operation, FillStyle, ImageSmoothingQuality,
    LineCap, LineJoin,
};
use crate::surface::Surface;
use cosmic_text::{FontSystem, SwashCache};

/// Canvas 2D rendering context.
///
/// Owns one [`Surface`] on an engine that may be shared with other contexts.
pub struct Canvas2dContext {
    pub(crate) surface: Surface,
    /// Font system for text shaping.
    pub(crate) font_system: FontSystem,
    /// Glyph outline cache.
    pub(crate) swash_cache: SwashCache,
    pub(crate) hinting_enabled: bool,
    /// Extra names for the lenient color setters.
    color_table: ColorTable,
    /// Current drawing state.
    pub(crate) state: DrawingState,
    /// Stack of saved drawing states.
    state_stack: Vec<DrawingState>,
    /// Current path.
    pub(crate) path: LogicalPathTracker,
}

enum FontSource {
    Config(FontConfig),
    Resolved(ResolvedFontConfig),
}

/// Configures and creates a [`Canvas2dContext`].
pub struct Canvas2dContextBuilder {
    width: u32,
    height: u32,
    fonts: FontSource,
    engine: Option<EngineHandle>,
    engine_config: EngineConfig,
    color_table: ColorTable,
}

impl Canvas2dContextBuilder {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fonts: FontSource::Config(FontConfig::default()),
            engine: None,
            engine_config: EngineConfig::default(),
            color_table: ColorTable::default(),
        }
    }

    pub fn font_config(mut self, config: FontConfig) -> Self {
        self.fonts = FontSource::Config(config);
        self
    }

    /// Reuse an already scanned font database.
    pub fn resolved_fonts(mut self, resolved: &ResolvedFontConfig) -> Self {
        self.fonts = FontSource::Resolved(resolved.clone());
        self
    }

    /// Draw on an existing engine instead of creating one.
    pub fn engine(mut self, engine: EngineHandle) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Linear memory limits of a newly created engine.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.engine_config.memory = memory;
        self
    }

    /// Pattern tile cache budget of a newly created engine.
    pub fn tile_cache_bytes(mut self, bytes: usize) -> Self {
        self.engine_config.tile_cache_bytes = bytes;
        self
    }

    pub fn color_table(mut self, table: ColorTable) -> Self {
        self.color_table = table;
        self
    }

    pub fn build(self) -> Canvas2dResult<Canvas2dContext> {
        let engine = match self.engine {
            Some(engine) => engine,
            None => EngineHandle::skia(self.engine_config)?,
        };
        let surface = Surface::new(&engine, self.width, self.height)?;
        // One engine save below the context's own stack, so reset() can drop every clip
        surface.with_bound(|native| native.engine_mut().save())?;

        let (font_db, hinting_enabled) = match self.fonts {
            FontSource::Config(config) => (font_config_to_fontdb(&config), config.hinting_enabled),
            FontSource::Resolved(resolved) => (resolved.fontdb, resolved.hinting_enabled),
        };
        let font_system = FontSystem::new_with_locale_and_db("en".to_string(), font_db);

        log::debug!(
            target: "canvas",
            "context {}x{} created",
            self.width,
            self.height
        );
        Ok(Canvas2dContext {
            surface,
            font_system,
            swash_cache: SwashCache::new(),
            hinting_enabled,
            color_table: self.color_table,
            state: DrawingState::default(),
            state_stack: Vec::new(),
            path: LogicalPathTracker::new(),
        })
    }
}

impl Canvas2dContext {
    /// Create a context with system fonts on its own software engine.
    pub fn new(width: u32, height: u32) -> Canvas2dResult<Self> {
        Self::builder(width, height).build()
    }

    pub fn with_config(width: u32, height: u32, config: FontConfig) -> Canvas2dResult<Self> {
        Self::builder(width, height).font_config(config).build()
    }

    /// Create a context from a pre-resolved font configuration, skipping the font scan.
    pub fn with_resolved(
        width: u32,
        height: u32,
        resolved: &ResolvedFontConfig,
    ) -> Canvas2dResult<Self> {
        Self::builder(width, height).resolved_fonts(resolved).build()
    }

    pub fn builder(width: u32, height: u32) -> Canvas2dContextBuilder {
        Canvas2dContextBuilder::new(width, height)
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn engine(&self) -> &EngineHandle {
        self.surface.engine()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn state(&self) -> &DrawingState {
        &self.state
    }

    pub fn color_table(&self) -> &ColorTable {
        &self.color_table
    }

    /// Release the surface now. Every later call fails with `SurfaceDisposed`.
    pub fn dispose(&mut self) -> Canvas2dResult<()> {
        self.surface.dispose()
    }

    /// Save the drawing state. The engine's matrix and clip are saved alongside.
    pub fn save(&mut self) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "save");
        self.surface
            .with_bound(|native| native.engine_mut().save())?;
        self.state_stack.push(self.state.clone());
        Ok(())
    }

    /// Restore the most recently saved state; does nothing when none is saved.
    pub fn restore(&mut self) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "restore");
        if self.state_stack.is_empty() {
            return Ok(());
        }
        self.surface
            .with_bound(|native| native.engine_mut().restore())?;
        if let Some(state) = self.state_stack.pop() {
            self.state = state;
        }
        self.path.retarget(&self.state.transform);
        Ok(())
    }

    /// Number of saved states.
    pub fn save_depth(&self) -> usize {
        self.state_stack.len()
    }

    /// Clear the canvas and return every piece of state to its default.
    pub fn reset(&mut self) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "reset");
        let depth = self.state_stack.len() + 1;
        self.surface.with_bound(|native| {
            for _ in 0..depth {
                native.engine_mut().restore()?;
            }
            native.engine_mut().save()?;
            native.clear(ColorF32::TRANSPARENT)
        })?;
        self.state = DrawingState::default();
        self.state_stack.clear();
        self.path = LogicalPathTracker::new();
        Ok(())
    }

    // --- Style setters ---

    /// Set the fill style from a CSS color string. Unknown colors fall back to the
    /// color table, then to black.
    pub fn set_fill_style(&mut self, style: &str) {
        self.state.fill_style = FillStyle::Color(parse_color_lenient(style, &self.color_table));
    }

    pub fn set_fill_style_color(&mut self, color: ColorF32) {
        self.state.fill_style = FillStyle::Color(color);
    }

    pub fn set_fill_style_gradient(&mut self, gradient: CanvasGradient) {
        self.state.fill_style = FillStyle::Gradient(gradient);
    }

    pub fn set_fill_style_pattern(&mut self, pattern: CanvasPattern) {
        self.state.fill_style = FillStyle::Pattern(pattern);
    }

    pub fn fill_style(&self) -> &FillStyle {
        &self.state.fill_style
    }

    /// Set the stroke style from a CSS color string, leniently like
    /// [`Canvas2dContext::set_fill_style`].
    pub fn set_stroke_style(&mut self, style: &str) {
        self.state.stroke_style = FillStyle::Color(parse_color_lenient(style, &self.color_table));
    }

    pub fn set_stroke_style_color(&mut self, color: ColorF32) {
        self.state.stroke_style = FillStyle::Color(color);
    }

    pub fn set_stroke_style_gradient(&mut self, gradient: CanvasGradient) {
        self.state.stroke_style = FillStyle::Gradient(gradient);
    }

    pub fn set_stroke_style_pattern(&mut self, pattern: CanvasPattern) {
        self.state.stroke_style = FillStyle::Pattern(pattern);
    }

    pub fn stroke_style(&self) -> &FillStyle {
        &self.state.stroke_style
    }

    /// Set the line width. Non-finite values and values <= 0 are ignored.
    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    pub fn line_width(&self) -> f32 {
        self.state.line_width
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
    }

    pub fn line_cap(&self) -> LineCap {
        self.state.line_cap
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.state.line_join = join;
    }

    pub fn line_join(&self) -> LineJoin {
        self.state.line_join
    }

    /// Set the miter limit. Non-finite values and values <= 0 are ignored.
    pub fn set_miter_limit(&mut self, limit: f32) {
        if limit.is_finite() && limit > 0.0 {
            self.state.miter_limit = limit;
        }
    }

    pub fn miter_limit(&self) -> f32 {
        self.state.miter_limit
    }

    /// Set the dash intervals. Odd-length lists are repeated to even length; a list
    /// with any negative or non-finite value is ignored.
    pub fn set_line_dash(&mut self, segments: Vec<f32>) {
        if let Some(dash) = DashPattern::new(&segments, self.state.line_dash.phase()) {
            self.state.line_dash = dash;
        }
    }

    pub fn get_line_dash(&self) -> &[f32] {
        self.state.line_dash.intervals()
    }

    /// Set the dash phase. Non-finite values are ignored.
    pub fn set_line_dash_offset(&mut self, offset: f32) {
        if !offset.is_finite() {
            return;
        }
        let intervals = self.state.line_dash.intervals().to_vec();
        if let Some(dash) = DashPattern::new(&intervals, offset) {
            self.state.line_dash = dash;
        }
    }

    pub fn get_line_dash_offset(&self) -> f32 {
        self.state.line_dash.phase()
    }

    /// Set the global alpha. Values outside `[0, 1]` and non-finite values are ignored.
    pub fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() && (0.0..=1.0).contains(&alpha) {
            self.state.global_alpha = alpha;
        }
    }

    pub fn global_alpha(&self) -> f32 {
        self.state.global_alpha
    }

    /// Set the composite operation by name. Returns false, keeping the current
    /// mode, when the name is unknown.
    pub fn set_global_composite_operation(&mut self, op: &str) -> bool {
        match parse_composite_operation(op) {
            Some(mode) => {
                self.state.global_composite_operation = mode;
                true
            }
            None => {
                log::debug!(target: "canvas", "ignoring composite operation '{}'", op);
                false
            }
        }
    }

    pub fn get_global_composite_operation(&self) -> &'static str {
        composite_operation_name(self.state.global_composite_operation)
    }

    // --- Shadows ---

    /// Set the shadow blur. Negative and non-finite values are ignored.
    pub fn set_shadow_blur(&mut self, blur: f32) {
        if blur.is_finite() && blur >= 0.0 {
            self.state.shadow.blur = blur;
        }
    }

    pub fn shadow_blur(&self) -> f32 {
        self.state.shadow.blur
    }

    pub fn set_shadow_color(&mut self, color: &str) {
        self.state.shadow.color = parse_color_lenient(color, &self.color_table);
    }

    pub fn set_shadow_color_value(&mut self, color: ColorF32) {
        self.state.shadow.color = color;
    }

    pub fn shadow_color(&self) -> ColorF32 {
        self.state.shadow.color
    }

    pub fn set_shadow_offset_x(&mut self, offset: f32) {
        if offset.is_finite() {
            self.state.shadow.offset_x = offset;
        }
    }

    pub fn set_shadow_offset_y(&mut self, offset: f32) {
        if offset.is_finite() {
            self.state.shadow.offset_y = offset;
        }
    }

    pub fn shadow_offset(&self) -> (f32, f32) {
        (self.state.shadow.offset_x, self.state.shadow.offset_y)
    }

    // --- Image smoothing ---

    pub fn set_image_smoothing_enabled(&mut self, enabled: bool) {
        self.state.image_smoothing_enabled = enabled;
    }

    pub fn get_image_smoothing_enabled(&self) -> bool {
        self.state.image_smoothing_enabled
    }

    pub fn set_image_smoothing_quality(&mut self, quality: ImageSmoothingQuality) {
        self.state.image_smoothing_quality = quality;
    }

    pub fn get_image_smoothing_quality(&self) -> ImageSmoothingQuality {
        self.state.image_smoothing_quality
    }

    // --- Gradients and patterns ---

    pub fn create_linear_gradient(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> CanvasGradient {
        CanvasGradient::new_linear(x0, y0, x1, y1)
    }

    /// Create a radial gradient. Negative radii are an error.
    pub fn create_radial_gradient(
        &self,
        params: &RadialGradientParams,
    ) -> Canvas2dResult<CanvasGradient> {
        if params.r0 < 0.0 || params.r1 < 0.0 {
            return Err(Canvas2dError::InvalidArgument(format!(
                "radial gradient radii must be non-negative: r0={}, r1={}",
                params.r0, params.r1
            )));
        }
        Ok(CanvasGradient::new_radial(params))
    }

    /// Create a conic gradient; `start_angle` is in radians.
    pub fn create_conic_gradient(&self, start_angle: f32, x: f32, y: f32) -> CanvasGradient {
        CanvasGradient::new_conic(start_angle, x, y)
    }

    /// Create a pattern from straight-alpha pixels.
    ///
    /// `repetition` is one of `repeat` (or empty), `repeat-x`, `repeat-y`, `no-repeat`.
    pub fn create_pattern(
        &self,
        image: ImageData,
        repetition: &str,
    ) -> Canvas2dResult<CanvasPattern> {
        let repetition = repetition.parse::<Repetition>()?;
        CanvasPattern::new(image, repetition)
    }

    /// Create a pattern from the current contents of another context.
    pub fn create_pattern_from_canvas(
        &self,
        source: &Canvas2dContext,
        repetition: &str,
    ) -> Canvas2dResult<CanvasPattern> {
        self.create_pattern(source.snapshot()?, repetition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom_matrix::DOMMatrix;
    use crate::geometry::{ArcToParams, RectParams};
    use crate::style::CanvasFillRule;

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

    #[test]
    fn test_new_context_defaults() {
        let ctx = context(200, 150);
        assert_eq!(ctx.width(), 200);
        assert_eq!(ctx.height(), 150);
        assert_eq!(ctx.line_width(), 1.0);
        assert_eq!(ctx.global_alpha(), 1.0);
        assert_eq!(ctx.miter_limit(), 10.0);
        assert!(ctx.get_line_dash().is_empty());
        assert_eq!(ctx.get_line_dash_offset(), 0.0);
        assert!(ctx.get_image_smoothing_enabled());
        assert!(ctx.state.clips.is_empty());
        assert_eq!(ctx.get_global_composite_operation(), "source-over");
        let image = ctx.snapshot().unwrap();
        assert!(image.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            Canvas2dContext::builder(0, 100)
                .font_config(FontConfig::empty())
                .build(),
            Err(Canvas2dError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            Canvas2dContext::builder(100, 40000)
                .font_config(FontConfig::empty())
                .build(),
            Err(Canvas2dError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_line_width_ignore_invalid() {
        let mut ctx = context(100, 100);
        ctx.set_line_width(5.0);
        assert_eq!(ctx.line_width(), 5.0);

        for invalid in [-1.0, 0.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            ctx.set_line_width(invalid);
            assert_eq!(ctx.line_width(), 5.0);
        }

        ctx.set_line_width(3.0);
        assert_eq!(ctx.line_width(), 3.0);
    }

    #[test]
    fn test_line_cap_and_join() {
        let mut ctx = context(100, 100);
        ctx.set_line_cap(LineCap::Round);
        assert_eq!(ctx.line_cap(), LineCap::Round);
        ctx.set_line_join(LineJoin::Bevel);
        assert_eq!(ctx.line_join(), LineJoin::Bevel);
    }

    #[test]
    fn test_line_dash_set_get() {
        let mut ctx = context(100, 100);
        ctx.set_line_dash(vec![5.0, 10.0]);
        assert_eq!(ctx.get_line_dash(), &[5.0, 10.0]);

        // Odd-length lists are repeated
        ctx.set_line_dash(vec![5.0, 10.0, 15.0]);
        assert_eq!(ctx.get_line_dash(), &[5.0, 10.0, 15.0, 5.0, 10.0, 15.0]);

        ctx.set_line_dash_offset(3.5);
        assert_eq!(ctx.get_line_dash_offset(), 3.5);
        // The offset survives a new interval list
        ctx.set_line_dash(vec![2.0]);
        assert_eq!(ctx.get_line_dash_offset(), 3.5);
    }

    #[test]
    fn test_line_dash_ignore_invalid() {
        let mut ctx = context(100, 100);
        ctx.set_line_dash(vec![5.0, 5.0]);

        ctx.set_line_dash(vec![5.0, -1.0]);
        assert_eq!(ctx.get_line_dash(), &[5.0, 5.0]);
        ctx.set_line_dash(vec![5.0, f32::NAN]);
        assert_eq!(ctx.get_line_dash(), &[5.0, 5.0]);
        ctx.set_line_dash(vec![f32::INFINITY, 5.0]);
        assert_eq!(ctx.get_line_dash(), &[5.0, 5.0]);

        ctx.set_line_dash(vec![]);
        assert!(ctx.get_line_dash().is_empty());

        ctx.set_line_dash(vec![3.0]);
        assert_eq!(ctx.get_line_dash(), &[3.0, 3.0]);
    }

    #[test]
    fn test_line_dash_offset_ignore_invalid() {
        let mut ctx = context(100, 100);
        ctx.set_line_dash_offset(5.0);
        for invalid in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            ctx.set_line_dash_offset(invalid);
            assert_eq!(ctx.get_line_dash_offset(), 5.0);
        }
        ctx.set_line_dash_offset(-2.0);
        assert_eq!(ctx.get_line_dash_offset(), -2.0);
    }

    #[test]
    fn test_global_alpha_ignore_invalid() {
        let mut ctx = context(100, 100);
        ctx.set_global_alpha(0.5);
        for invalid in [2.0, -0.5, f32::NAN, f32::INFINITY] {
            ctx.set_global_alpha(invalid);
            assert_eq!(ctx.global_alpha(), 0.5);
        }
        ctx.set_global_alpha(0.0);
        assert_eq!(ctx.global_alpha(), 0.0);
        ctx.set_global_alpha(1.0);
        assert_eq!(ctx.global_alpha(), 1.0);
    }

    #[test]
    fn test_miter_limit_ignore_invalid() {
        let mut ctx = context(100, 100);
        ctx.set_miter_limit(5.0);
        for invalid in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            ctx.set_miter_limit(invalid);
            assert_eq!(ctx.miter_limit(), 5.0);
        }
    }

    #[test]
    fn test_global_composite_operation_ignore_invalid() {
        let mut ctx = context(100, 100);
        assert!(ctx.set_global_composite_operation("multiply"));
        assert_eq!(ctx.get_global_composite_operation(), "multiply");

        assert!(!ctx.set_global_composite_operation("invalid-mode"));
        assert!(!ctx.set_global_composite_operation(""));
        assert_eq!(ctx.get_global_composite_operation(), "multiply");
    }

    #[test]
    fn test_lenient_colors() {
        let table = ColorTable::new().with("brand", ColorF32::from_rgba8(1, 2, 3, 255));
        let mut ctx = Canvas2dContext::builder(10, 10)
            .font_config(FontConfig::empty())
            .color_table(table)
            .build()
            .unwrap();

        ctx.set_fill_style("brand");
        assert!(
            matches!(ctx.fill_style(), FillStyle::Color(c) if c.to_rgba8() == [1, 2, 3, 255])
        );
        ctx.set_stroke_style("definitely-not-a-color");
        assert!(matches!(ctx.stroke_style(), FillStyle::Color(c) if *c == ColorF32::BLACK));
        ctx.set_shadow_color("#00ff0080");
        assert_eq!(ctx.shadow_color().to_rgba8(), [0, 255, 0, 128]);
    }

    #[test]
    fn test_shadow_setters_ignore_invalid() {
        let mut ctx = context(10, 10);
        ctx.set_shadow_blur(4.0);
        ctx.set_shadow_blur(-1.0);
        ctx.set_shadow_blur(f32::NAN);
        assert_eq!(ctx.shadow_blur(), 4.0);
        ctx.set_shadow_offset_x(3.0);
        ctx.set_shadow_offset_y(f32::INFINITY);
        assert_eq!(ctx.shadow_offset(), (3.0, 0.0));
    }

    #[test]
    fn test_save_restore_line_state() {
        let mut ctx = context(100, 100);
        ctx.set_line_width(5.0);
        ctx.set_line_cap(LineCap::Round);
        ctx.set_line_join(LineJoin::Bevel);
        ctx.set_line_dash(vec![4.0, 2.0]);
        ctx.set_line_dash_offset(1.5);
        ctx.set_global_alpha(0.7);
        ctx.save().unwrap();

        ctx.set_line_width(10.0);
        ctx.set_line_cap(LineCap::Square);
        ctx.set_line_join(LineJoin::Round);
        ctx.set_line_dash(vec![1.0]);
        ctx.set_line_dash_offset(0.0);
        ctx.set_global_alpha(0.3);

        ctx.restore().unwrap();

        assert_eq!(ctx.line_width(), 5.0);
        assert_eq!(ctx.line_cap(), LineCap::Round);
        assert_eq!(ctx.line_join(), LineJoin::Bevel);
        assert_eq!(ctx.get_line_dash(), &[4.0, 2.0]);
        assert_eq!(ctx.get_line_dash_offset(), 1.5);
        assert_eq!(ctx.global_alpha(), 0.7);
    }

    #[test]
    fn test_restore_without_save_is_noop() {
        let mut ctx = context(10, 10);
        ctx.translate(3.0, 4.0).unwrap();
        ctx.restore().unwrap();
        assert_eq!(ctx.get_transform().e, 3.0);
        assert_eq!(ctx.save_depth(), 0);
    }

    #[test]
    fn test_save_restore_transform() {
        let mut ctx = context(100, 100);
        ctx.translate(10.0, 20.0).unwrap();
        ctx.save().unwrap();
        ctx.translate(30.0, 40.0).unwrap();

        let t = ctx.get_transform();
        assert_eq!(t.e, 40.0);
        assert_eq!(t.f, 60.0);

        ctx.restore().unwrap();
        let t = ctx.get_transform();
        assert_eq!(t.e, 10.0);
        assert_eq!(t.f, 20.0);
        let engine_matrix = ctx
            .engine()
            .with(|native| native.engine().total_matrix())
            .unwrap();
        assert_eq!(engine_matrix, ctx.state.transform);
    }

    #[test]
    fn test_fill_rect_pixels() {
        let mut ctx = context(100, 100);
        ctx.set_fill_style("#ff0000");
        ctx.fill_rect(&rect(10.0, 10.0, 50.0, 50.0)).unwrap();

        let data = ctx.get_image_data(0, 0, 100, 100).unwrap();
        let data = data.data();
        let idx = (30 * 100 + 30) * 4;
        assert_eq!(&data[idx..idx + 4], &[255, 0, 0, 255]);

        let idx_out = (5 * 100 + 5) * 4;
        assert_eq!(data[idx_out + 3], 0);
    }

    #[test]
    fn test_stroke_rect_pixels() {
        let mut ctx = context(100, 100);
        ctx.set_stroke_style("#0000ff");
        ctx.set_line_width(2.0);
        ctx.stroke_rect(&rect(20.0, 20.0, 60.0, 60.0)).unwrap();

        let data = ctx.get_image_data(0, 0, 100, 100).unwrap();
        let data = data.data();
        let idx = (20 * 100 + 50) * 4;
        assert!(data[idx + 2] > 200);
        assert!(data[idx + 3] > 0);

        let idx_center = (50 * 100 + 50) * 4;
        assert_eq!(data[idx_center + 3], 0);
    }

    #[test]
    fn test_reset() {
        let mut ctx = context(100, 100);
        ctx.set_fill_style("#ff0000");
        ctx.set_line_width(5.0);
        ctx.set_global_alpha(0.5);
        ctx.translate(10.0, 10.0).unwrap();
        ctx.save().unwrap();
        ctx.rect(&rect(0.0, 0.0, 20.0, 20.0));
        ctx.clip().unwrap();
        ctx.fill_rect(&rect(0.0, 0.0, 100.0, 100.0)).unwrap();
        assert!(ctx.snapshot().unwrap().data().iter().any(|&b| b != 0));

        ctx.reset().unwrap();

        assert!(ctx.snapshot().unwrap().data().iter().all(|&b| b == 0));
        assert_eq!(ctx.line_width(), 1.0);
        assert_eq!(ctx.global_alpha(), 1.0);
        assert_eq!(ctx.save_depth(), 0);
        assert!(ctx.state.clips.is_empty());
        let t = ctx.get_transform();
        assert_eq!((t.a, t.d, t.e, t.f), (1.0, 1.0, 0.0, 0.0));

        // The old clip no longer applies
        ctx.fill_rect(&rect(50.0, 50.0, 10.0, 10.0)).unwrap();
        let image = ctx.snapshot().unwrap();
        assert_eq!(image.pixel(55, 55).map(|p| p[3]), Some(255));
    }

    #[test]
    fn test_clips_follow_save_restore() {
        let mut ctx = context(64, 64);
        ctx.rect(&rect(0.0, 0.0, 20.0, 20.0));
        ctx.clip_with_rule(CanvasFillRule::EvenOdd).unwrap();
        assert_eq!(ctx.state.clips.len(), 1);
        assert_eq!(ctx.state.clips[0].fill_rule, CanvasFillRule::EvenOdd);

        ctx.save().unwrap();
        ctx.begin_path();
        ctx.rect(&rect(10.0, 10.0, 20.0, 20.0));
        ctx.clip().unwrap();
        assert_eq!(ctx.state.clips.len(), 2);

        ctx.restore().unwrap();
        assert_eq!(ctx.state.clips.len(), 1);
    }

    #[test]
    fn test_arc_to_with_non_invertible_transform() {
        let mut ctx = context(100, 100);
        ctx.begin_path();
        ctx.move_to(10.0, 10.0);
        ctx.set_transform(DOMMatrix::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0))
            .unwrap();

        ctx.arc_to(&ArcToParams {
            x1: 30.0,
            y1: 10.0,
            x2: 30.0,
            y2: 30.0,
            radius: 12.0,
        })
        .unwrap();

        // Edits under a singular transform are dropped; the open subpath survives
        assert_eq!(ctx.path.path().verb_count(), 1);
    }

    #[test]
    fn test_create_radial_gradient_rejects_negative_radius() {
        let ctx = context(10, 10);
        let params = RadialGradientParams {
            x0: 0.0,
            y0: 0.0,
            r0: -1.0,
            x1: 0.0,
            y1: 0.0,
            r1: 5.0,
        };
        assert!(matches!(
            ctx.create_radial_gradient(&params),
            Err(Canvas2dError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_create_pattern_rejects_bad_repetition() {
        let ctx = context(10, 10);
        let image = ImageData::new(2, 2).unwrap();
        assert!(ctx.create_pattern(image, "sideways").is_err());
    }

    #[test]
    fn test_contexts_share_an_engine() {
        let first = context(8, 8);
        let mut second = Canvas2dContext::builder(8, 8)
            .font_config(FontConfig::empty())
            .engine(first.engine().clone())
            .build()
            .unwrap();
        let mut first = first;

        first.set_fill_style("#ff0000");
        first.fill_rect(&rect(0.0, 0.0, 8.0, 8.0)).unwrap();
        second.set_fill_style("#0000ff");
        second.fill_rect(&rect(0.0, 0.0, 4.0, 4.0)).unwrap();

        assert_eq!(first.snapshot().unwrap().pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(second.snapshot().unwrap().pixel(1, 1), Some([0, 0, 255, 255]));
        assert_eq!(second.snapshot().unwrap().pixel(6, 6), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_disposed_context_rejects_drawing() {
        let mut ctx = context(8, 8);
        ctx.dispose().unwrap();
        assert!(matches!(
            ctx.fill_rect(&rect(0.0, 0.0, 1.0, 1.0)),
            Err(Canvas2dError::SurfaceDisposed)
        ));
        assert!(matches!(ctx.dispose(), Err(Canvas2dError::SurfaceDisposed)));
    }
}

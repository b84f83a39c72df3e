//! Text operations for Canvas2dContext.
//!
//! Glyphs are shaped by cosmic-text and drawn as one outline path, so they go
//! through the same paint, shadow and clip handling as any other path.

use super::drawing::StyleRole;
use super::Canvas2dContext;
use crate::error::Canvas2dResult;
use crate::font_parser::parse_font;
use crate::matrix::Matrix3;
use crate::style::{TextAlign, TextBaseline};
use crate::text::{calculate_text_x_offset, calculate_text_y_offset, shape_text, TextMetrics};

/// Below this horizontal squeeze, max-width text is not drawn at all.
const MIN_TEXT_SCALE: f32 = 0.001;

impl Canvas2dContext {
    /// Set the font from a CSS font shorthand. The current font is kept on error.
    pub fn set_font(&mut self, font: &str) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "font = {:?}", font);
        self.state.font = parse_font(font)?;
        Ok(())
    }

    /// The current font in canonical CSS form.
    pub fn get_font(&self) -> String {
        self.state.font.to_css_string()
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.state.text_align = align;
    }

    pub fn text_align(&self) -> TextAlign {
        self.state.text_align
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.state.text_baseline = baseline;
    }

    pub fn text_baseline(&self) -> TextBaseline {
        self.state.text_baseline
    }

    /// Extra space between glyphs in pixels. Non-finite values are ignored.
    pub fn set_letter_spacing(&mut self, spacing: f32) {
        if spacing.is_finite() {
            self.state.letter_spacing = spacing;
        }
    }

    pub fn get_letter_spacing(&self) -> f32 {
        self.state.letter_spacing
    }

    /// Metrics of `text` in the current font.
    pub fn measure_text(&mut self, text: &str) -> TextMetrics {
        let letter_spacing = self.state.letter_spacing;
        crate::text::measure_text(&mut self.font_system, text, &self.state.font, letter_spacing)
    }

    pub fn fill_text(&mut self, text: &str, x: f32, y: f32) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "fillText {:?} {} {}", text, x, y);
        self.render_text(text, x, y, None, StyleRole::Fill)
    }

    /// Fill text, squeezing it horizontally when wider than `max_width`.
    /// Nothing is drawn when `max_width` is not positive.
    pub fn fill_text_max_width(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        max_width: f32,
    ) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "fillText {:?} {} {} max {}", text, x, y, max_width);
        self.render_text(text, x, y, Some(max_width), StyleRole::Fill)
    }

    pub fn stroke_text(&mut self, text: &str, x: f32, y: f32) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "strokeText {:?} {} {}", text, x, y);
        self.render_text(text, x, y, None, StyleRole::Stroke)
    }

    pub fn stroke_text_max_width(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        max_width: f32,
    ) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "strokeText {:?} {} {} max {}", text, x, y, max_width);
        self.render_text(text, x, y, Some(max_width), StyleRole::Stroke)
    }

    fn render_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        max_width: Option<f32>,
        role: StyleRole,
    ) -> Canvas2dResult<()> {
        if !x.is_finite() || !y.is_finite() {
            return Ok(());
        }
        if matches!(max_width, Some(mw) if mw.is_nan() || mw <= 0.0) {
            return Ok(());
        }

        let shaped = shape_text(
            &mut self.font_system,
            &mut self.swash_cache,
            text,
            &self.state.font,
            self.state.letter_spacing,
            self.hinting_enabled,
        );
        if shaped.outline.is_empty() {
            log::trace!(target: "canvas", "no glyph outlines for {:?}", text);
            return Ok(());
        }

        let scale_x = match max_width {
            Some(mw) if mw.is_finite() && shaped.width > mw => mw / shaped.width,
            _ => 1.0,
        };
        if scale_x < MIN_TEXT_SCALE {
            return Ok(());
        }

        // Alignment uses the unsqueezed width; the squeeze is anchored at x
        let x_offset = calculate_text_x_offset(shaped.width, self.state.text_align);
        let y_offset =
            calculate_text_y_offset(shaped.ascent, shaped.descent, self.state.text_baseline);
        let placement = Matrix3::concat_all(&[
            Matrix3::translate(x, y),
            Matrix3::scale(scale_x, 1.0),
            Matrix3::translate(x_offset, y_offset),
        ]);
        let glyphs = shaped.outline.transformed(&placement);

        self.draw_styled(role, |native, paint| native.draw_text_blob(&glyphs, paint))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Canvas2dError;
    use crate::font_config::FontConfig;
    use crate::style::{TextAlign, TextBaseline};
    use crate::Canvas2dContext;
    use rstest::rstest;

    fn context() -> Canvas2dContext {
        Canvas2dContext::with_config(40, 20, FontConfig::empty()).unwrap()
    }

    #[test]
    fn test_default_font() {
        let ctx = context();
        assert_eq!(ctx.get_font(), "10px sans-serif");
    }

    #[rstest]
    #[case("bold 16px Arial", "bold 16px Arial")]
    #[case("italic 12pt serif", "italic 16px serif")]
    fn test_set_font_round_trips(#[case] input: &str, #[case] expected: &str) {
        let mut ctx = context();
        ctx.set_font(input).unwrap();
        assert_eq!(ctx.get_font(), expected);
    }

    #[test]
    fn test_invalid_font_keeps_previous() {
        let mut ctx = context();
        ctx.set_font("20px serif").unwrap();
        let result = ctx.set_font("not a font");
        assert!(matches!(result, Err(Canvas2dError::FontParseError(_))));
        assert_eq!(ctx.get_font(), "20px serif");
    }

    #[test]
    fn test_text_properties_save_and_restore() {
        let mut ctx = context();
        ctx.save().unwrap();
        ctx.set_text_align(TextAlign::Center);
        ctx.set_text_baseline(TextBaseline::Top);
        ctx.set_letter_spacing(2.0);
        assert_eq!(ctx.text_align(), TextAlign::Center);
        ctx.restore().unwrap();
        assert_eq!(ctx.text_align(), TextAlign::Start);
        assert_eq!(ctx.text_baseline(), TextBaseline::Alphabetic);
        assert_eq!(ctx.get_letter_spacing(), 0.0);
    }

    #[test]
    fn test_non_finite_letter_spacing_is_ignored() {
        let mut ctx = context();
        ctx.set_letter_spacing(1.5);
        ctx.set_letter_spacing(f32::NAN);
        assert_eq!(ctx.get_letter_spacing(), 1.5);
    }

    #[test]
    fn test_text_without_fonts_draws_nothing() {
        let mut ctx = context();
        ctx.set_fill_style("#000");
        ctx.fill_text("hello", 2.0, 15.0).unwrap();
        ctx.stroke_text_max_width("hello", 2.0, 15.0, 10.0).unwrap();
        ctx.fill_text_max_width("hello", 2.0, 15.0, 0.0).unwrap();
        let image = ctx.snapshot().unwrap();
        assert!(image.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_measure_empty_text() {
        let mut ctx = context();
        assert_eq!(ctx.measure_text("").width, 0.0);
    }
}

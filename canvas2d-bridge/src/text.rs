//! Text shaping, measurement and glyph outlines using cosmic-text.

use crate::font_parser::ParsedFont;
use crate::path::Path;
use crate::style::{TextAlign, TextBaseline};
use cosmic_text::{
    Attrs, Buffer, CacheKeyFlags, Command, Family, FontSystem, Metrics, Shaping, SwashCache,
};

/// Text metrics returned by measureText().
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMetrics {
    /// Advance width of the text in pixels.
    pub width: f32,
    /// Distance from baseline to top of the bounding box.
    pub actual_bounding_box_ascent: f32,
    /// Distance from baseline to bottom of the bounding box.
    pub actual_bounding_box_descent: f32,
    /// Font ascent.
    pub font_bounding_box_ascent: f32,
    /// Font descent.
    pub font_bounding_box_descent: f32,
    /// Distance from alignment point to left of the bounding box.
    pub actual_bounding_box_left: f32,
    /// Distance from alignment point to right of the bounding box.
    pub actual_bounding_box_right: f32,
}

/// Shaped text: glyph outlines laid out from the origin on the alphabetic baseline.
#[derive(Debug, Clone, Default)]
pub struct ShapedText {
    pub outline: Path,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
}

impl ShapedText {
    pub fn metrics(&self) -> TextMetrics {
        let (left, right, ink_ascent, ink_descent) = match self.outline.bounds() {
            Some(b) => (-b.left, b.right, -b.top, b.bottom),
            None => (0.0, self.width, 0.0, 0.0),
        };
        TextMetrics {
            width: self.width,
            actual_bounding_box_ascent: ink_ascent,
            actual_bounding_box_descent: ink_descent,
            font_bounding_box_ascent: self.ascent,
            font_bounding_box_descent: self.descent,
            actual_bounding_box_left: left,
            actual_bounding_box_right: right,
        }
    }
}

/// Map a CSS family name onto a cosmic-text family.
pub fn resolve_family(name: &str) -> Family<'_> {
    match name.trim().to_ascii_lowercase().as_str() {
        "serif" => Family::Serif,
        "sans-serif" => Family::SansSerif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(name.trim()),
    }
}

/// Shape `text` and collect its glyph outlines.
pub fn shape_text(
    font_system: &mut FontSystem,
    swash_cache: &mut SwashCache,
    text: &str,
    font: &ParsedFont,
    letter_spacing: f32,
    hinting: bool,
) -> ShapedText {
    if !has_faces(font_system) {
        log::debug!(target: "canvas", "no fonts loaded, {:?} shapes to nothing", text);
        return ShapedText {
            outline: Path::new(),
            width: 0.0,
            ascent: font.size_px * 0.8,
            descent: font.size_px * 0.2,
        };
    }
    let buffer = layout(font_system, text, font, letter_spacing, hinting);
    let (width, ascent, descent) = extents(&buffer, font);

    let mut outline = Path::new();
    for run in buffer.layout_runs() {
        for glyph in run.glyphs.iter() {
            let physical = glyph.physical((0.0, 0.0), 1.0);
            let gx = glyph.x + glyph.font_size * glyph.x_offset;
            let gy = glyph.y - glyph.font_size * glyph.y_offset;
            let Some(commands) = swash_cache.get_outline_commands(font_system, physical.cache_key)
            else {
                continue;
            };
            // Outlines are y-up
            for command in commands {
                match *command {
                    Command::MoveTo(p) => outline.move_to(gx + p.x, gy - p.y),
                    Command::LineTo(p) => outline.line_to(gx + p.x, gy - p.y),
                    Command::QuadTo(c, p) => {
                        outline.quad_to(gx + c.x, gy - c.y, gx + p.x, gy - p.y)
                    }
                    Command::CurveTo(c1, c2, p) => outline.cubic_to(
                        gx + c1.x,
                        gy - c1.y,
                        gx + c2.x,
                        gy - c2.y,
                        gx + p.x,
                        gy - p.y,
                    ),
                    Command::Close => outline.close(),
                }
            }
        }
    }

    ShapedText {
        outline,
        width,
        ascent,
        descent,
    }
}

/// Measure text without building outlines.
pub fn measure_text(
    font_system: &mut FontSystem,
    text: &str,
    font: &ParsedFont,
    letter_spacing: f32,
) -> TextMetrics {
    let (width, ascent, descent) = if has_faces(font_system) {
        let buffer = layout(font_system, text, font, letter_spacing, false);
        extents(&buffer, font)
    } else {
        (0.0, font.size_px * 0.8, font.size_px * 0.2)
    };
    TextMetrics {
        width,
        actual_bounding_box_ascent: ascent,
        actual_bounding_box_descent: descent,
        font_bounding_box_ascent: ascent,
        font_bounding_box_descent: descent,
        actual_bounding_box_left: 0.0,
        actual_bounding_box_right: width,
    }
}

/// cosmic-text panics when shaping against a database without faces.
fn has_faces(font_system: &FontSystem) -> bool {
    font_system.db().faces().next().is_some()
}

fn layout(
    font_system: &mut FontSystem,
    text: &str,
    font: &ParsedFont,
    letter_spacing: f32,
    hinting: bool,
) -> Buffer {
    let metrics = Metrics::new(font.size_px, font.size_px * 1.2);
    let mut buffer = Buffer::new(font_system, metrics);

    let family = font
        .families
        .first()
        .map(String::as_str)
        .map(resolve_family)
        .unwrap_or(Family::SansSerif);
    let mut attrs = Attrs::new()
        .family(family)
        .weight(font.weight)
        .style(font.style)
        .letter_spacing(letter_spacing);
    if !hinting {
        attrs = attrs.cache_key_flags(CacheKeyFlags::DISABLE_HINTING);
    }

    buffer.set_text(font_system, text, &attrs, Shaping::Advanced, None);
    buffer.shape_until_scroll(font_system, false);
    buffer
}

/// Width, ascent and descent of the laid-out lines.
fn extents(buffer: &Buffer, font: &ParsedFont) -> (f32, f32, f32) {
    let mut width: f32 = 0.0;
    let mut ascent: f32 = 0.0;
    let mut descent: f32 = 0.0;
    for run in buffer.layout_runs() {
        width = width.max(run.line_w);
        ascent = ascent.max(run.line_y - run.line_top);
        descent = descent.max(run.line_top + run.line_height - run.line_y);
    }
    if ascent == 0.0 && descent == 0.0 {
        ascent = font.size_px * 0.8;
        descent = font.size_px * 0.2;
    }
    (width, ascent, descent)
}

/// Calculate X offset for text alignment.
pub fn calculate_text_x_offset(width: f32, align: TextAlign) -> f32 {
    match align {
        TextAlign::Left | TextAlign::Start => 0.0,
        TextAlign::Right | TextAlign::End => -width,
        TextAlign::Center => -width / 2.0,
    }
}

/// Calculate Y offset for text baseline.
pub fn calculate_text_y_offset(ascent: f32, descent: f32, baseline: TextBaseline) -> f32 {
    match baseline {
        TextBaseline::Top => ascent,
        TextBaseline::Hanging => ascent * 0.8,
        TextBaseline::Middle => (ascent - descent) / 2.0,
        TextBaseline::Alphabetic => 0.0,
        TextBaseline::Ideographic => -descent * 0.5,
        TextBaseline::Bottom => -descent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TextAlign::Start, 0.0)]
    #[case(TextAlign::Left, 0.0)]
    #[case(TextAlign::Center, -50.0)]
    #[case(TextAlign::Right, -100.0)]
    #[case(TextAlign::End, -100.0)]
    fn test_x_offset(#[case] align: TextAlign, #[case] expected: f32) {
        assert_eq!(calculate_text_x_offset(100.0, align), expected);
    }

    #[test]
    fn test_y_offset() {
        assert_eq!(calculate_text_y_offset(8.0, 2.0, TextBaseline::Top), 8.0);
        assert_eq!(calculate_text_y_offset(8.0, 2.0, TextBaseline::Middle), 3.0);
        assert_eq!(calculate_text_y_offset(8.0, 2.0, TextBaseline::Bottom), -2.0);
        assert_eq!(
            calculate_text_y_offset(8.0, 2.0, TextBaseline::Alphabetic),
            0.0
        );
    }

    #[test]
    fn test_generic_families() {
        assert_eq!(resolve_family("serif"), Family::Serif);
        assert_eq!(resolve_family(" Monospace "), Family::Monospace);
        assert_eq!(resolve_family("Arial"), Family::Name("Arial"));
    }

    #[rstest]
    #[case("hello")]
    #[case("")]
    fn test_text_without_faces_is_empty(#[case] text: &str) {
        let mut font_system =
            FontSystem::new_with_locale_and_db("en".to_string(), fontdb::Database::new());
        let mut cache = SwashCache::new();
        let font = ParsedFont::default();
        let shaped = shape_text(&mut font_system, &mut cache, text, &font, 1.0, true);
        assert!(shaped.outline.is_empty());
        assert_eq!(shaped.width, 0.0);
        assert_eq!(shaped.ascent, 8.0);

        let metrics = measure_text(&mut font_system, text, &font, 0.0);
        assert_eq!(metrics.width, 0.0);
        assert_eq!(metrics.font_bounding_box_descent, 2.0);
    }

    #[test]
    fn test_empty_font_database_shapes_nothing() {
        let db = fontdb::Database::new();
        let mut font_system = FontSystem::new_with_locale_and_db("en".to_string(), db);
        let mut cache = SwashCache::new();
        let shaped = shape_text(
            &mut font_system,
            &mut cache,
            "",
            &ParsedFont::default(),
            0.0,
            false,
        );
        assert!(shaped.outline.is_empty());
        assert_eq!(shaped.width, 0.0);
        assert_eq!(shaped.metrics().actual_bounding_box_ascent, 0.0);
    }
}

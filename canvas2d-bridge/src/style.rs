//! Style enums and the fill/stroke style value.

use crate::color::ColorF32;
use crate::gradient::CanvasGradient;
use crate::pattern::CanvasPattern;

/// Paint source for fills and strokes.
#[derive(Debug, Clone)]
pub enum FillStyle {
    Color(ColorF32),
    Gradient(CanvasGradient),
    Pattern(CanvasPattern),
}

impl Default for FillStyle {
    fn default() -> Self {
        FillStyle::Color(ColorF32::BLACK)
    }
}

impl From<ColorF32> for FillStyle {
    fn from(color: ColorF32) -> Self {
        FillStyle::Color(color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl From<LineCap> for tiny_skia::LineCap {
    fn from(cap: LineCap) -> Self {
        match cap {
            LineCap::Butt => tiny_skia::LineCap::Butt,
            LineCap::Round => tiny_skia::LineCap::Round,
            LineCap::Square => tiny_skia::LineCap::Square,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl From<LineJoin> for tiny_skia::LineJoin {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    Right,
    Center,
    /// Left for left-to-right text.
    #[default]
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    Top,
    Hanging,
    Middle,
    #[default]
    Alphabetic,
    Ideographic,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub enum CanvasFillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl From<CanvasFillRule> for tiny_skia::FillRule {
    fn from(rule: CanvasFillRule) -> Self {
        match rule {
            CanvasFillRule::NonZero => tiny_skia::FillRule::Winding,
            CanvasFillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSmoothingQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl ImageSmoothingQuality {
    /// Sampling filter, with `enabled = false` meaning nearest neighbour.
    pub fn filter_quality(self, enabled: bool) -> tiny_skia::FilterQuality {
        if !enabled {
            return tiny_skia::FilterQuality::Nearest;
        }
        match self {
            ImageSmoothingQuality::Low | ImageSmoothingQuality::Medium => {
                tiny_skia::FilterQuality::Bilinear
            }
            ImageSmoothingQuality::High => tiny_skia::FilterQuality::Bicubic,
        }
    }
}

/// How `draw_points` interprets its coordinate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointMode {
    /// Each point drawn as a dot (a cap-shaped stroke of zero length).
    Points,
    /// Consecutive pairs drawn as separate segments.
    Lines,
    /// All points joined as one open polyline.
    Polygon,
}

impl PointMode {
    pub fn to_byte(self) -> u8 {
        match self {
            PointMode::Points => 0,
            PointMode::Lines => 1,
            PointMode::Polygon => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<PointMode> {
        match b {
            0 => Some(PointMode::Points),
            1 => Some(PointMode::Lines),
            2 => Some(PointMode::Polygon),
            _ => None,
        }
    }
}

/// Shader behaviour outside its natural extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
    /// Transparent outside the extent.
    Decal,
}

impl TileMode {
    pub fn spread_mode(self) -> tiny_skia::SpreadMode {
        match self {
            TileMode::Clamp | TileMode::Decal => tiny_skia::SpreadMode::Pad,
            TileMode::Repeat => tiny_skia::SpreadMode::Repeat,
            TileMode::Mirror => tiny_skia::SpreadMode::Reflect,
        }
    }
}

const COMPOSITE_OPERATIONS: [(&str, tiny_skia::BlendMode); 26] = [
    ("source-over", tiny_skia::BlendMode::SourceOver),
    ("source-in", tiny_skia::BlendMode::SourceIn),
    ("source-out", tiny_skia::BlendMode::SourceOut),
    ("source-atop", tiny_skia::BlendMode::SourceAtop),
    ("destination-over", tiny_skia::BlendMode::DestinationOver),
    ("destination-in", tiny_skia::BlendMode::DestinationIn),
    ("destination-out", tiny_skia::BlendMode::DestinationOut),
    ("destination-atop", tiny_skia::BlendMode::DestinationAtop),
    ("lighter", tiny_skia::BlendMode::Plus),
    ("copy", tiny_skia::BlendMode::Source),
    ("xor", tiny_skia::BlendMode::Xor),
    ("multiply", tiny_skia::BlendMode::Multiply),
    ("screen", tiny_skia::BlendMode::Screen),
    ("overlay", tiny_skia::BlendMode::Overlay),
    ("darken", tiny_skia::BlendMode::Darken),
    ("lighten", tiny_skia::BlendMode::Lighten),
    ("color-dodge", tiny_skia::BlendMode::ColorDodge),
    ("color-burn", tiny_skia::BlendMode::ColorBurn),
    ("hard-light", tiny_skia::BlendMode::HardLight),
    ("soft-light", tiny_skia::BlendMode::SoftLight),
    ("difference", tiny_skia::BlendMode::Difference),
    ("exclusion", tiny_skia::BlendMode::Exclusion),
    ("hue", tiny_skia::BlendMode::Hue),
    ("saturation", tiny_skia::BlendMode::Saturation),
    ("color", tiny_skia::BlendMode::Color),
    ("luminosity", tiny_skia::BlendMode::Luminosity),
];

/// Blend mode for a `globalCompositeOperation` name.
pub fn parse_composite_operation(name: &str) -> Option<tiny_skia::BlendMode> {
    COMPOSITE_OPERATIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, mode)| *mode)
}

/// Canvas name of a blend mode. Modes with no canvas name report `source-over`.
pub fn composite_operation_name(mode: tiny_skia::BlendMode) -> &'static str {
    COMPOSITE_OPERATIONS
        .iter()
        .find(|(_, m)| *m == mode)
        .map(|(n, _)| *n)
        .unwrap_or("source-over")
}

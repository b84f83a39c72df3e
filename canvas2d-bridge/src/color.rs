//! Color values and CSS color parsing.

use crate::error::{Canvas2dError, Canvas2dResult};
use std::collections::HashMap;

/// Non-premultiplied RGBA color with float components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorF32 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for ColorF32 {
    fn default() -> Self {
        Self::BLACK
    }
}

impl ColorF32 {
    pub const BLACK: ColorF32 = ColorF32 {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: ColorF32 = ColorF32 {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: ColorF32 = ColorF32 {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Components are clamped to `[0, 1]`; NaN becomes 0.
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        fn clamp(v: f32) -> f32 {
            if v.is_nan() {
                0.0
            } else {
                v.clamp(0.0, 1.0)
            }
        }
        Self {
            r: clamp(r),
            g: clamp(g),
            b: clamp(b),
            a: clamp(a),
        }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// From a packed `0xAARRGGBB` integer.
    pub fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self::from_rgba8(r, g, b, a)
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a].map(|v| (v * 255.0).round() as u8)
    }

    pub fn to_argb(&self) -> u32 {
        let [r, g, b, a] = self.to_rgba8();
        u32::from_be_bytes([a, r, g, b])
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn with_alpha(&self, a: f32) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Scale alpha by `factor` (used to fold in global alpha).
    pub fn with_alpha_multiplied(&self, factor: f32) -> Self {
        self.with_alpha(self.a * factor)
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    pub fn to_tiny_skia(&self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba(self.r, self.g, self.b, self.a)
            .unwrap_or(tiny_skia::Color::BLACK)
    }

    /// Canvas serialization: `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.
    pub fn to_css_string(&self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            let alpha = format!("{:.3}", self.a);
            let alpha = alpha.trim_end_matches('0').trim_end_matches('.');
            let alpha = if alpha.is_empty() { "0" } else { alpha };
            format!("rgba({}, {}, {}, {})", r, g, b, alpha)
        }
    }
}

impl From<ColorF32> for tiny_skia::Color {
    fn from(c: ColorF32) -> Self {
        c.to_tiny_skia()
    }
}

/// Caller-supplied names consulted when a color string is not valid CSS.
#[derive(Debug, Clone, Default)]
pub struct ColorTable {
    entries: HashMap<String, ColorF32>,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` (matched case-insensitively).
    pub fn insert(&mut self, name: &str, color: ColorF32) {
        self.entries.insert(name.trim().to_ascii_lowercase(), color);
    }

    pub fn with(mut self, name: &str, color: ColorF32) -> Self {
        self.insert(name, color);
        self
    }

    pub fn get(&self, name: &str) -> Option<ColorF32> {
        self.entries.get(&name.trim().to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a CSS color string: hex forms, `rgb()/rgba()/hsl()/hsla()` and named colors.
pub fn parse_color(s: &str) -> Canvas2dResult<ColorF32> {
    let parsed = csscolorparser::parse(s.trim())
        .map_err(|e| Canvas2dError::ColorParseError(format!("{}: {}", s, e)))?;
    let [r, g, b, a] = parsed.to_array();
    Ok(ColorF32::new(r, g, b, a))
}

/// Parse leniently: CSS first, then `table`, then opaque black.
pub fn parse_color_lenient(s: &str, table: &ColorTable) -> ColorF32 {
    match parse_color(s) {
        Ok(color) => color,
        Err(err) => match table.get(s) {
            Some(color) => color,
            None => {
                log::warn!(target: "canvas", "unrecognized color, using black: {}", err);
                ColorF32::BLACK
            }
        },
    }
}

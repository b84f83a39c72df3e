//! CSS `font` shorthand parsing.
//!
//! Accepts `[style] [variant] [weight] [stretch] size[/line-height] family[, family]*`,
//! e.g. `"bold italic 14pt 'Times New Roman', serif"`.

use crate::error::{Canvas2dError, Canvas2dResult};
use cosmic_text::{Style, Weight};
use std::str::FromStr;

/// Font parsed from a CSS font shorthand.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFont {
    pub style: Style,
    pub weight: Weight,
    /// Font size in pixels.
    pub size_px: f32,
    /// Font families in order of preference.
    pub families: Vec<String>,
}

impl Default for ParsedFont {
    fn default() -> Self {
        Self {
            style: Style::Normal,
            weight: Weight::NORMAL,
            size_px: 10.0,
            families: vec!["sans-serif".to_string()],
        }
    }
}

impl ParsedFont {
    /// Serialize back to a shorthand, omitting normal keywords.
    pub fn to_css_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match self.style {
            Style::Italic => parts.push("italic".into()),
            Style::Oblique => parts.push("oblique".into()),
            Style::Normal => {}
        }
        if self.weight == Weight::BOLD {
            parts.push("bold".into());
        } else if self.weight != Weight::NORMAL {
            parts.push(self.weight.0.to_string());
        }
        parts.push(format!("{}px", self.size_px));
        let families: Vec<String> = self
            .families
            .iter()
            .map(|family| {
                if family.contains(char::is_whitespace) {
                    format!("\"{}\"", family)
                } else {
                    family.clone()
                }
            })
            .collect();
        parts.push(families.join(", "));
        parts.join(" ")
    }
}

const STRETCH_KEYWORDS: [&str; 8] = [
    "ultra-condensed",
    "extra-condensed",
    "condensed",
    "semi-condensed",
    "semi-expanded",
    "expanded",
    "extra-expanded",
    "ultra-expanded",
];

/// Parse a CSS font shorthand. An empty string yields the default `10px sans-serif`.
pub fn parse_font(font_str: &str) -> Canvas2dResult<ParsedFont> {
    let mut remaining = font_str.trim();
    if remaining.is_empty() {
        return Ok(ParsedFont::default());
    }

    let mut result = ParsedFont::default();

    // Keywords before the size, in any order
    let size_token = loop {
        let (token, rest) = split_token(remaining);
        if token.is_empty() {
            return Err(Canvas2dError::FontParseError(format!(
                "missing font size: {}",
                font_str
            )));
        }
        remaining = rest.trim_start();
        match token {
            "normal" | "small-caps" => {}
            "italic" => result.style = Style::Italic,
            "oblique" => result.style = Style::Oblique,
            "bold" | "bolder" => result.weight = Weight::BOLD,
            "lighter" => result.weight = Weight::LIGHT,
            _ if STRETCH_KEYWORDS.contains(&token) => {}
            _ => match parse_numeric_weight(token) {
                Some(weight) => result.weight = weight,
                None => break token,
            },
        }
    };

    let (size, line_height) = match size_token.split_once('/') {
        Some((size, line_height)) => (size, Some(line_height)),
        None => (size_token, None),
    };
    result.size_px = parse_font_size(size)?;

    // Line height is accepted and ignored, including `16px / 20px`
    if line_height.is_none() {
        if let Some(rest) = remaining.strip_prefix('/') {
            let rest = rest.trim_start();
            let (_, after) = split_token(rest);
            remaining = after.trim_start();
        }
    }

    if !remaining.is_empty() {
        result.families = parse_font_families(remaining);
    }

    Ok(result)
}

fn split_token(s: &str) -> (&str, &str) {
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    s.split_at(end)
}

fn parse_numeric_weight(token: &str) -> Option<Weight> {
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let weight: u16 = token.parse().ok()?;
    ((100..=900).contains(&weight) && weight % 100 == 0).then_some(Weight(weight))
}

/// Font size in pixels. Relative units resolve against a 16px root.
fn parse_font_size(s: &str) -> Canvas2dResult<f32> {
    use svgtypes::LengthUnit;

    let length = svgtypes::Length::from_str(s)
        .map_err(|e| Canvas2dError::FontParseError(format!("invalid font size '{}': {}", s, e)))?;
    let px_per_unit = match length.unit {
        LengthUnit::None | LengthUnit::Px => 1.0,
        LengthUnit::Pt => 4.0 / 3.0,
        LengthUnit::Pc => 16.0,
        LengthUnit::In => 96.0,
        LengthUnit::Cm => 96.0 / 2.54,
        LengthUnit::Mm => 96.0 / 25.4,
        LengthUnit::Em => 16.0,
        LengthUnit::Ex => 8.0,
        LengthUnit::Percent => 16.0 / 100.0,
    };
    let size = (length.number * px_per_unit) as f32;
    if !size.is_finite() || size <= 0.0 {
        return Err(Canvas2dError::FontParseError(format!(
            "font size must be positive: {}",
            s
        )));
    }
    Ok(size)
}

/// Comma-separated families; quotes are stripped.
fn parse_font_families(s: &str) -> Vec<String> {
    let families: Vec<String> = s
        .split(',')
        .map(|family| {
            family
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_string()
        })
        .filter(|family| !family.is_empty())
        .collect();
    if families.is_empty() {
        vec!["sans-serif".to_string()]
    } else {
        families
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::render::{PixelSurface, TextHAlign, TextPrimitive};

/// Font family and point size, e.g. `Monospace 8`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontDescription {
    pub family: String,
    pub size: f64,
}

impl Default for FontDescription {
    fn default() -> Self {
        Self {
            family: "Monospace".to_owned(),
            size: 8.0,
        }
    }
}

impl FontDescription {
    pub fn validate(&self) -> GraphResult<()> {
        if self.family.trim().is_empty() {
            return Err(GraphError::InvalidConfig(
                "font family must not be empty".to_owned(),
            ));
        }
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(GraphError::InvalidConfig(
                "font size must be finite and > 0".to_owned(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for FontDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.size)
    }
}

impl FromStr for FontDescription {
    type Err = GraphError;

    /// Parses `"<family words> <size>"`; the size is the last word.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (family, size) = value.rsplit_once(' ').ok_or_else(|| {
            GraphError::InvalidConfig(format!("font `{value}` must be `<family> <size>`"))
        })?;
        let size = size
            .parse::<f64>()
            .map_err(|_| GraphError::InvalidConfig(format!("font `{value}` has no valid size")))?;
        let font = Self {
            family: family.trim().to_owned(),
            size,
        };
        font.validate()?;
        Ok(font)
    }
}

/// Pixel extent of a laid-out label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelSize {
    pub width: u32,
    pub height: u32,
}

/// Text measurement and drawing used by the background layer.
pub trait LabelRenderer {
    fn measure(&self, text: &str, font: &FontDescription) -> LabelSize;

    /// Draws `label` onto `target`; `label.x` is interpreted per `h_align`.
    fn draw(&mut self, target: &mut PixelSurface, label: &TextPrimitive, font: &FontDescription) -> GraphResult<()>;
}

/// Left x of a label of width `width` anchored at `label.x`.
#[must_use]
pub fn aligned_left(label: &TextPrimitive, width: u32) -> f64 {
    match label.h_align {
        TextHAlign::Left => label.x,
        TextHAlign::Center => label.x - f64::from(width) / 2.0,
        TextHAlign::Right => label.x - f64::from(width),
    }
}

/// Headless label renderer with fixed per-glyph metrics.
///
/// Draws nothing; it records what it was asked to draw so layout can be
/// inspected without a font backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullLabelRenderer {
    pub glyph_width: u32,
    pub glyph_height: u32,
    pub drawn: Vec<TextPrimitive>,
}

impl NullLabelRenderer {
    #[must_use]
    pub fn with_metrics(glyph_width: u32, glyph_height: u32) -> Self {
        Self {
            glyph_width,
            glyph_height,
            drawn: Vec::new(),
        }
    }
}

impl LabelRenderer for NullLabelRenderer {
    fn measure(&self, text: &str, _font: &FontDescription) -> LabelSize {
        let glyphs = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        LabelSize {
            width: glyphs.saturating_mul(self.glyph_width),
            height: self.glyph_height,
        }
    }

    fn draw(&mut self, _target: &mut PixelSurface, label: &TextPrimitive, _font: &FontDescription) -> GraphResult<()> {
        label.validate()?;
        self.drawn.push(label.clone());
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// RGBA color in normalized 0..=1 channel values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    #[must_use]
    pub const fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    #[must_use]
    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self::rgba(red, green, blue, 1.0)
    }

    pub fn validate(self) -> GraphResult<()> {
        for (channel, value) in [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(GraphError::InvalidData(format!(
                    "color channel `{channel}` must be finite and in [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Packs into premultiplied ARGB32, the layout used by [`PixelSurface`].
    ///
    /// [`PixelSurface`]: crate::render::PixelSurface
    #[must_use]
    pub fn to_argb32(self) -> u32 {
        let alpha = self.alpha.clamp(0.0, 1.0);
        let channel = |value: f64| -> u32 { (value.clamp(0.0, 1.0) * alpha * 255.0).round() as u32 };
        let a = (alpha * 255.0).round() as u32;
        (a << 24) | (channel(self.red) << 16) | (channel(self.green) << 8) | channel(self.blue)
    }
}

/// Draw command for one axis-aligned or diagonal grid line in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePrimitive {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub color: Color,
    /// Length of drawn/skipped runs; `None` draws a solid line.
    pub dash: Option<(u32, u32)>,
}

impl LinePrimitive {
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32, color: Color) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            color,
            dash: None,
        }
    }

    #[must_use]
    pub const fn dashed(mut self, on: u32, off: u32) -> Self {
        self.dash = Some((on, off));
        self
    }
}

/// Horizontal text alignment relative to `TextPrimitive::x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextHAlign {
    Left,
    Center,
    Right,
}

/// One axis label, positioned by its top-left anchor unless aligned otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPrimitive {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: Color,
    pub h_align: TextHAlign,
}

impl TextPrimitive {
    #[must_use]
    pub fn new(text: impl Into<String>, x: f64, y: f64, color: Color, h_align: TextHAlign) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            color,
            h_align,
        }
    }

    pub fn validate(&self) -> GraphResult<()> {
        if self.text.is_empty() {
            return Err(GraphError::InvalidData(
                "text primitive must not be empty".to_owned(),
            ));
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(GraphError::InvalidData(
                "text coordinates must be finite".to_owned(),
            ));
        }
        self.color.validate()
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Vertical value domain mapped onto a pixel height, `upper` at the top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub lower: f64,
    pub upper: f64,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 100.0,
        }
    }
}

impl ValueRange {
    pub fn new(lower: f64, upper: f64) -> GraphResult<Self> {
        let range = Self { lower, upper };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(self) -> GraphResult<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.upper <= self.lower {
            return Err(GraphError::InvalidConfig(format!(
                "value range [{}, {}] must be finite with upper > lower",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn span(self) -> f64 {
        self.upper - self.lower
    }

    /// Pixel row of `value` inside an area whose bottom edge is `bottom`.
    #[must_use]
    pub fn y_for_value(self, value: f64, bottom: f64, height: f64) -> f64 {
        bottom - (value - self.lower) / self.span() * height
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Float noise tolerated when snapping a position to a pixel boundary.
pub const PIXEL_EPSILON: f64 = 1e-6;

/// `floor` that treats values a hair below an integer as that integer.
#[must_use]
pub fn snap_floor(value: f64) -> f64 {
    (value + PIXEL_EPSILON).floor()
}

/// `ceil` that treats values a hair above an integer as that integer.
#[must_use]
pub fn snap_ceil(value: f64) -> f64 {
    (value - PIXEL_EPSILON).ceil()
}

/// Time span materialized across a fixed number of pixel columns.
///
/// Maps wall-clock seconds to fractional pixel columns and back. The window
/// slides forward by whole time deltas; its span never changes after
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    begin_time: f64,
    span: f64,
}

impl TimeWindow {
    pub fn new(begin_time: f64, span: f64) -> GraphResult<Self> {
        if !begin_time.is_finite() || !span.is_finite() || span <= 0.0 {
            return Err(GraphError::InvalidData(
                "time window must be finite with span > 0".to_owned(),
            ));
        }
        Ok(Self { begin_time, span })
    }

    #[must_use]
    pub fn begin_time(self) -> f64 {
        self.begin_time
    }

    #[must_use]
    pub fn end_time(self) -> f64 {
        self.begin_time + self.span
    }

    #[must_use]
    pub fn span(self) -> f64 {
        self.span
    }

    /// Moves the window so it ends at `end_time`, keeping the span.
    #[must_use]
    pub fn ending_at(self, end_time: f64) -> Self {
        Self {
            begin_time: end_time - self.span,
            span: self.span,
        }
    }

    /// Pixels per second for a data area `pixel_width` columns wide.
    #[must_use]
    pub fn pixels_per_second(self, pixel_width: f64) -> f64 {
        pixel_width / self.span
    }

    #[must_use]
    pub fn x_for_time(self, time: f64, pixel_width: f64) -> f64 {
        (time - self.begin_time) / self.span * pixel_width
    }

    #[must_use]
    pub fn time_for_x(self, x: f64, pixel_width: f64) -> f64 {
        x / pixel_width * self.span + self.begin_time
    }
}

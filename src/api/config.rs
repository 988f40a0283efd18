use serde::{Deserialize, Serialize};

use crate::core::ValueRange;
use crate::error::{GraphError, GraphResult};
use crate::render::{Color, FontDescription, ValueFormat};
use crate::task::ScheduleStrategy;

/// Colors of the static background layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphColors {
    #[serde(default = "default_content_fill")]
    pub content_fill: Color,
    #[serde(default = "default_grid")]
    pub grid: Color,
    #[serde(default = "default_label")]
    pub label: Color,
}

impl Default for GraphColors {
    fn default() -> Self {
        Self {
            content_fill: default_content_fill(),
            grid: default_grid(),
            label: default_label(),
        }
    }
}

impl GraphColors {
    pub fn validate(self) -> GraphResult<()> {
        self.content_fill.validate()?;
        self.grid.validate()?;
        self.label.validate()
    }
}

/// Public graph bootstrap configuration.
///
/// Serializable so hosts can persist and reload a graph setup; every field
/// has a default, so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Seconds visible in the content area.
    #[serde(default = "default_n_seconds")]
    pub n_seconds: f64,
    /// Extra seconds rendered past the right edge.
    #[serde(default = "default_n_buffered")]
    pub n_buffered: f64,
    #[serde(default = "default_frames_per_second")]
    pub frames_per_second: u32,
    #[serde(default)]
    pub min_lines: u32,
    /// `0` lets the content height decide.
    #[serde(default)]
    pub max_lines: u32,
    #[serde(default = "default_x_grid_lines")]
    pub x_grid_lines: u32,
    #[serde(default)]
    pub value_range: ValueRange,
    #[serde(default)]
    pub value_format: ValueFormat,
    #[serde(default)]
    pub font: FontDescription,
    #[serde(default)]
    pub colors: GraphColors,
    #[serde(default)]
    pub schedule_strategy: ScheduleStrategy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            n_seconds: default_n_seconds(),
            n_buffered: default_n_buffered(),
            frames_per_second: default_frames_per_second(),
            min_lines: 0,
            max_lines: 0,
            x_grid_lines: default_x_grid_lines(),
            value_range: ValueRange::default(),
            value_format: ValueFormat::default(),
            font: FontDescription::default(),
            colors: GraphColors::default(),
            schedule_strategy: ScheduleStrategy::default(),
        }
    }
}

impl GraphConfig {
    #[must_use]
    pub fn with_seconds(mut self, n_seconds: f64, n_buffered: f64) -> Self {
        self.n_seconds = n_seconds;
        self.n_buffered = n_buffered;
        self
    }

    #[must_use]
    pub fn with_value_range(mut self, lower: f64, upper: f64) -> Self {
        self.value_range = ValueRange { lower, upper };
        self
    }

    #[must_use]
    pub fn with_value_format(mut self, format: ValueFormat) -> Self {
        self.value_format = format;
        self
    }

    #[must_use]
    pub fn with_lines(mut self, min_lines: u32, max_lines: u32) -> Self {
        self.min_lines = min_lines;
        self.max_lines = max_lines;
        self
    }

    #[must_use]
    pub fn with_font(mut self, font: FontDescription) -> Self {
        self.font = font;
        self
    }

    #[must_use]
    pub fn with_schedule_strategy(mut self, strategy: ScheduleStrategy) -> Self {
        self.schedule_strategy = strategy;
        self
    }

    /// Full span held by the pixel ring.
    #[must_use]
    pub fn time_span(&self) -> f64 {
        self.n_seconds + self.n_buffered
    }

    pub fn validate(&self) -> GraphResult<()> {
        if !self.n_seconds.is_finite() || self.n_seconds <= 0.0 {
            return Err(GraphError::InvalidConfig(
                "n_seconds must be finite and > 0".to_owned(),
            ));
        }
        if !self.n_buffered.is_finite() || self.n_buffered < 0.0 {
            return Err(GraphError::InvalidConfig(
                "n_buffered must be finite and >= 0".to_owned(),
            ));
        }
        if self.frames_per_second == 0 {
            return Err(GraphError::InvalidConfig(
                "frames_per_second must be > 0".to_owned(),
            ));
        }
        self.value_range.validate()?;
        self.font.validate()?;
        self.colors.validate()
    }

    pub fn to_json_pretty(&self) -> GraphResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            GraphError::InvalidData(format!("failed to serialize graph config: {e}"))
        })
    }

    /// Parses and validates a config document.
    pub fn from_json_str(input: &str) -> GraphResult<Self> {
        let config: Self = serde_json::from_str(input).map_err(|e| {
            GraphError::InvalidData(format!("failed to parse graph config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }
}

fn default_n_seconds() -> f64 {
    60.0
}

fn default_n_buffered() -> f64 {
    1.0
}

fn default_frames_per_second() -> u32 {
    30
}

fn default_x_grid_lines() -> u32 {
    5
}

fn default_content_fill() -> Color {
    Color::rgb(0.97, 0.97, 0.97)
}

fn default_grid() -> Color {
    Color::rgb(0.33, 0.33, 0.33)
}

fn default_label() -> Color {
    Color::BLACK
}

#[cfg(test)]
mod tests {
    use super::GraphConfig;
    use crate::render::ValueFormat;
    use crate::task::ScheduleStrategy;

    #[test]
    fn partial_json_fills_defaults() {
        let config = GraphConfig::from_json_str(r#"{ "n_seconds": 30, "value_format": "percent" }"#)
            .expect("config");
        assert_eq!(config.n_seconds, 30.0);
        assert_eq!(config.n_buffered, 1.0);
        assert_eq!(config.frames_per_second, 30);
        assert_eq!(config.value_format, ValueFormat::Percent);
        assert_eq!(config.schedule_strategy, ScheduleStrategy::Deferred);
    }

    #[test]
    fn json_rejects_invalid_values() {
        assert!(GraphConfig::from_json_str(r#"{ "n_seconds": 0 }"#).is_err());
        assert!(
            GraphConfig::from_json_str(r#"{ "value_range": { "lower": 5, "upper": 1 } }"#).is_err()
        );
    }

    #[test]
    fn pretty_json_round_trips() {
        let config = GraphConfig::default()
            .with_value_range(-1.0, 1.0)
            .with_lines(2, 6);
        let json = config.to_json_pretty().expect("json");
        assert_eq!(GraphConfig::from_json_str(&json).expect("parse"), config);
    }
}

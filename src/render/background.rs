use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PixelRect, Viewport};
use crate::error::{GraphError, GraphResult};
use crate::render::{
    Color, DrawTarget, FontDescription, LabelRenderer, LinePrimitive, PixelSurface, TextHAlign,
    TextPrimitive,
};

/// Horizontal gap between the content area and y-axis labels.
pub const LABEL_XPAD: i32 = 3;
/// Vertical gap around x-axis labels.
pub const LABEL_YPAD: i32 = 3;
/// Grid dash pattern: one pixel on, two off.
pub const GRID_DASH: (u32, u32) = (1, 2);

/// How y-axis values are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    #[default]
    Plain,
    Percent,
}

impl ValueFormat {
    #[must_use]
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Plain => format!("{value:.0}"),
            Self::Percent => format!("{value:.0} %"),
        }
    }
}

/// Number of horizontal grid lines that fit `content_height`.
///
/// `max_lines == 0` means "as many as fit". The maximum is checked first,
/// so `min_lines` wins only when fewer lines fit than it asks for.
#[must_use]
pub fn y_line_count(content_height: i32, label_height: u32, min_lines: u32, max_lines: u32) -> u32 {
    let per_line = label_height as i32 + LABEL_YPAD * 2 + 5;
    let fit = (content_height / per_line).max(0) as u32;
    let max_lines = if max_lines == 0 { fit } else { max_lines };
    if fit > max_lines {
        max_lines
    } else if fit < min_lines {
        min_lines
    } else {
        fit
    }
}

/// Inputs of one background pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub viewport: Viewport,
    pub content_area: PixelRect,
    pub n_seconds: f64,
    pub x_lines: u32,
    pub y_lines: u32,
    pub lower_value: f64,
    pub upper_value: f64,
    pub value_format: ValueFormat,
    pub fill_color: Color,
    pub grid_color: Color,
    pub label_color: Color,
}

/// Grid and axis labels for the static layer behind the scrolling data.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundFrame {
    pub viewport: Viewport,
    pub fill: Option<(PixelRect, Color)>,
    pub lines: Vec<LinePrimitive>,
    pub texts: Vec<TextPrimitive>,
}

impl BackgroundFrame {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            fill: None,
            lines: Vec::new(),
            texts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_fill(mut self, rect: PixelRect, color: Color) -> Self {
        self.fill = Some((rect, color));
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: LinePrimitive) -> Self {
        self.lines.push(line);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: TextPrimitive) -> Self {
        self.texts.push(text);
        self
    }

    /// Lays out the dashed border, interior grid lines and axis labels.
    pub fn build(grid: &GridSpec) -> GraphResult<Self> {
        grid.content_area.validate_area()?;
        let area = grid.content_area;
        let (left, top) = (area.x, area.y);
        let (right, bottom) = (area.right() - 1, area.bottom() - 1);
        let dashed = |x1, y1, x2, y2| {
            LinePrimitive::new(x1, y1, x2, y2, grid.grid_color).dashed(GRID_DASH.0, GRID_DASH.1)
        };

        let mut frame = Self::new(grid.viewport)
            .with_fill(area, grid.fill_color)
            .with_line(dashed(left, top, right, top))
            .with_line(dashed(left, bottom, right, bottom))
            .with_line(dashed(left, top, left, bottom))
            .with_line(dashed(right, top, right, bottom));

        let x_divisions = f64::from(grid.x_lines) + 1.0;
        for i in 0..=grid.x_lines {
            let x = left + (f64::from(area.width) / x_divisions * f64::from(i)).floor() as i32;
            if i != 0 {
                frame = frame.with_line(dashed(x, top + 1, x, top + area.height - 2));
            }
            let seconds = (grid.n_seconds / x_divisions * (x_divisions - f64::from(i))).floor();
            frame = frame.with_text(TextPrimitive::new(
                format!("{}", seconds as i64),
                f64::from(x),
                f64::from(area.bottom() + LABEL_YPAD),
                grid.label_color,
                TextHAlign::Left,
            ));
        }

        let y_divisions = f64::from(grid.y_lines) + 1.0;
        let value_step = (grid.upper_value - grid.lower_value) / y_divisions;
        for i in 0..=grid.y_lines {
            let row = f64::from(area.height) / y_divisions * f64::from(i);
            let y = top + row.floor() as i32;
            if i != 0 {
                frame = frame.with_line(dashed(left + 1, y, left + area.width - 2, y));
            }
            let value = grid.upper_value - value_step * f64::from(i);
            frame = frame.with_text(TextPrimitive::new(
                grid.value_format.format(value),
                f64::from(left - LABEL_XPAD),
                f64::from(top) + row,
                grid.label_color,
                TextHAlign::Right,
            ));
        }

        Ok(frame)
    }

    pub fn validate(&self) -> GraphResult<()> {
        if !self.viewport.is_valid() {
            return Err(GraphError::InvalidViewport {
                width: i64::from(self.viewport.width),
                height: i64::from(self.viewport.height),
            });
        }
        if let Some((_, color)) = self.fill {
            color.validate()?;
        }
        for line in &self.lines {
            line.color.validate()?;
        }
        for text in &self.texts {
            text.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fill.is_none() && self.lines.is_empty() && self.texts.is_empty()
    }

    /// Clears `surface` and paints the frame onto it.
    pub fn paint(
        &self,
        surface: &mut PixelSurface,
        labels: &mut dyn LabelRenderer,
        font: &FontDescription,
    ) -> GraphResult<()> {
        self.validate()?;
        surface.clear();
        {
            let mut target = DrawTarget::full(surface);
            if let Some((rect, color)) = self.fill {
                target.fill_rect(rect, color);
            }
            for line in &self.lines {
                target.draw_line((line.x1, line.y1), (line.x2, line.y2), line.color, line.dash);
            }
        }
        for text in &self.texts {
            labels.draw(surface, text, font)?;
        }
        debug!(
            lines = self.lines.len(),
            texts = self.texts.len(),
            "background painted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BackgroundFrame, GridSpec, ValueFormat, y_line_count};
    use crate::core::{PixelRect, Viewport};
    use crate::render::{Color, TextHAlign};

    fn grid() -> GridSpec {
        GridSpec {
            viewport: Viewport::new(602, 108),
            content_area: PixelRect::new(1, 1, 600, 100),
            n_seconds: 60.0,
            x_lines: 5,
            y_lines: 3,
            lower_value: 0.0,
            upper_value: 100.0,
            value_format: ValueFormat::Percent,
            fill_color: Color::WHITE,
            grid_color: Color::BLACK,
            label_color: Color::BLACK,
        }
    }

    #[test]
    fn x_labels_count_seconds_back() {
        let frame = BackgroundFrame::build(&grid()).expect("frame");
        let x_labels = frame
            .texts
            .iter()
            .filter(|text| text.h_align == TextHAlign::Left)
            .map(|text| text.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(x_labels, vec!["60", "50", "40", "30", "20", "10"]);
    }

    #[test]
    fn y_labels_interpolate_value_range() {
        let frame = BackgroundFrame::build(&grid()).expect("frame");
        let y_labels = frame
            .texts
            .iter()
            .filter(|text| text.h_align == TextHAlign::Right)
            .map(|text| text.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(y_labels, vec!["100 %", "75 %", "50 %", "25 %"]);
    }

    #[test]
    fn grid_has_border_and_interior_lines() {
        let frame = BackgroundFrame::build(&grid()).expect("frame");
        assert_eq!(frame.lines.len(), 4 + 5 + 3);
        assert!(frame.lines.iter().all(|line| line.dash.is_some()));
    }

    #[test]
    fn y_line_count_clamps_between_bounds() {
        // 100 / (0 + 6 + 5) = 9 lines fit.
        assert_eq!(y_line_count(100, 0, 2, 0), 9);
        assert_eq!(y_line_count(100, 0, 2, 4), 4);
        assert_eq!(y_line_count(10, 0, 2, 0), 2);
        assert_eq!(y_line_count(10, 0, 3, 1), 3);
    }

    #[test]
    fn both_formats_round_to_integer() {
        assert_eq!(ValueFormat::Plain.format(12.6), "13");
        assert_eq!(ValueFormat::Percent.format(12.7), "13 %");
        assert_eq!(ValueFormat::Percent.format(12.2), "12 %");
    }
}

use serde::{Deserialize, Serialize};

use crate::core::{PixelRect, Viewport};
use crate::error::{GraphError, GraphResult};
use crate::render::{LABEL_YPAD, LabelSize};

/// Sample text measured to reserve room for y-axis labels.
pub const LABEL_SAMPLE: &str = "XXXXXXXXX";

/// Widget geometry derived on every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLayout {
    pub viewport: Viewport,
    pub label_size: LabelSize,
    /// Visible plot rectangle inside the widget, framed by the border.
    pub content_area: PixelRect,
    /// Pixel ring geometry: the content width plus the buffered seconds.
    pub data_area: PixelRect,
}

impl GraphLayout {
    /// Places the content area right of the y labels and above the x labels,
    /// and sizes the data area to hold `n_seconds + n_buffered`.
    pub fn compute(
        viewport: Viewport,
        label_size: LabelSize,
        n_seconds: f64,
        n_buffered: f64,
    ) -> GraphResult<Self> {
        if !viewport.is_valid() {
            return Err(GraphError::InvalidViewport {
                width: i64::from(viewport.width),
                height: i64::from(viewport.height),
            });
        }
        let width = i64::from(viewport.width);
        let height = i64::from(viewport.height);
        let label_width = i64::from(label_size.width);
        let label_height = i64::from(label_size.height);

        let content_width = width - label_width - 2;
        let content_height = height - i64::from(LABEL_YPAD) * 2 - label_height - 2;
        if content_width <= 0 || content_height <= 0 {
            return Err(GraphError::InvalidViewport {
                width: content_width,
                height: content_height,
            });
        }

        let buffered = (n_buffered * content_width as f64 / n_seconds).ceil() as i64;
        let data_width = content_width + buffered.max(0);

        let to_i32 = |value: i64| {
            i32::try_from(value)
                .map_err(|_| GraphError::InvalidData(format!("layout value {value} overflows")))
        };
        Ok(Self {
            viewport,
            label_size,
            content_area: PixelRect::new(
                to_i32(1 + label_width)?,
                1,
                to_i32(content_width)?,
                to_i32(content_height)?,
            ),
            data_area: PixelRect::new(0, 0, to_i32(data_width)?, to_i32(content_height)?),
        })
    }

    #[must_use]
    pub fn data_width(&self) -> f64 {
        f64::from(self.data_area.width)
    }

    #[must_use]
    pub fn data_height(&self) -> f64 {
        f64::from(self.data_area.height)
    }
}

#[cfg(test)]
mod tests {
    use super::GraphLayout;
    use crate::core::{PixelRect, Viewport};
    use crate::render::LabelSize;

    #[test]
    fn content_area_leaves_room_for_labels() {
        let labels = LabelSize {
            width: 54,
            height: 12,
        };
        let layout = GraphLayout::compute(Viewport::new(656, 126), labels, 60.0, 1.0).expect("layout");
        assert_eq!(layout.content_area, PixelRect::new(55, 1, 600, 106));
        assert_eq!(layout.data_area, PixelRect::new(0, 0, 610, 106));
    }

    #[test]
    fn buffered_width_rounds_up() {
        let layout =
            GraphLayout::compute(Viewport::new(102, 58), LabelSize::default(), 60.0, 1.0).expect("layout");
        assert_eq!(layout.content_area.width, 100);
        assert_eq!(layout.data_area.width, 102);
    }

    #[test]
    fn too_small_for_labels_is_rejected() {
        let labels = LabelSize {
            width: 80,
            height: 12,
        };
        assert!(GraphLayout::compute(Viewport::new(60, 200), labels, 60.0, 1.0).is_err());
        assert!(GraphLayout::compute(Viewport::new(0, 200), labels, 60.0, 1.0).is_err());
    }
}

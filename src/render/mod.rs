mod background;
mod draw_target;
mod label;
mod pixring;
mod primitives;
mod series;
mod surface;

pub use background::{
    BackgroundFrame, GRID_DASH, GridSpec, LABEL_XPAD, LABEL_YPAD, ValueFormat, y_line_count,
};
pub use draw_target::DrawTarget;
pub use label::{FontDescription, LabelRenderer, LabelSize, NullLabelRenderer, aligned_left};
pub use pixring::PixelRing;
pub use primitives::{Color, LinePrimitive, TextHAlign, TextPrimitive};
pub use series::{LineId, LineRenderer, LineStyle, ScatterRenderer, SeriesRenderer};
pub use surface::{CompositeOp, PixelSurface, SharedSurface};

#[cfg(feature = "cairo-backend")]
mod cairo_backend;
#[cfg(feature = "cairo-backend")]
pub use cairo_backend::{CairoPresenter, PangoLabelRenderer, to_image_surface};

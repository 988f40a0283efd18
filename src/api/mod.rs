mod compositor;
mod config;
mod layout;

pub use compositor::{CompositorStats, GraphCompositor};
pub use config::{GraphColors, GraphConfig};
pub use layout::{GraphLayout, LABEL_SAMPLE};

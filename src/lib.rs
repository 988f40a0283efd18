//! stripchart-rs: incremental scrolling strip-chart compositor.
//!
//! Samples are appended to a ring-buffered, column-typed
//! [`TimeSeriesStore`](core::TimeSeriesStore). A [`GraphCompositor`] renders
//! only the newly elapsed time slice through cancellable render tasks and
//! folds each result into a circular pixel buffer, so the visible history
//! is never repainted on the per-sample path.

pub mod api;
pub mod core;
pub mod error;
pub mod render;
pub mod task;
pub mod telemetry;

pub use api::{CompositorStats, GraphCompositor, GraphConfig, GraphLayout};
pub use error::{GraphError, GraphResult};

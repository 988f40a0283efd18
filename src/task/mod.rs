//! Render tasks and the machinery that runs them.

mod frame_source;
mod host;
mod render_task;
mod scheduler;
mod state;

pub use frame_source::FrameSource;
pub use host::{Deferred, HostLoop, IdleLoop};
pub use render_task::{
    NotifyMode, RenderFn, RenderRequest, RenderTask, RenderTaskBuilder, StateListener,
};
pub use scheduler::{ScheduleStrategy, Scheduler, SchedulerConfig};
pub use state::{TaskError, TaskState};

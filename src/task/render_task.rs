use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::{GraphError, GraphResult};
use crate::render::SharedSurface;
use crate::task::{HostLoop, TaskError, TaskState};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time slice and target geometry of one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub begin_time: f64,
    pub end_time: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RenderRequest {
    pub fn new(begin_time: f64, end_time: f64, width: f64, height: f64) -> GraphResult<Self> {
        let request = Self {
            begin_time,
            end_time,
            x: 0.0,
            y: 0.0,
            width,
            height,
        };
        request.validate()?;
        Ok(request)
    }

    #[must_use]
    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn validate(&self) -> GraphResult<()> {
        let finite = [
            self.begin_time,
            self.end_time,
            self.x,
            self.y,
            self.width,
            self.height,
        ]
        .iter()
        .all(|value| value.is_finite());
        if !finite || self.end_time < self.begin_time {
            return Err(GraphError::InvalidData(
                "render request must be finite with end_time >= begin_time".to_owned(),
            ));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(GraphError::InvalidData(
                "render request width and height must be > 0".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time - self.begin_time
    }

    /// Seconds covered by one output pixel column.
    #[must_use]
    pub fn aggregate_interval(&self) -> f64 {
        self.duration() / self.width
    }
}

/// Render callback attached to a task; runs at most once.
pub type RenderFn = Box<dyn FnOnce(&RenderTask) -> Result<(), TaskError> + Send + 'static>;

/// Observer of task state changes.
pub type StateListener = Arc<dyn Fn(&RenderTask, TaskState) + Send + Sync + 'static>;

/// Where state-change notifications are delivered.
#[derive(Clone, Default)]
pub enum NotifyMode {
    /// On the thread that performed the transition.
    #[default]
    Immediate,
    /// Deferred onto the host loop, so listeners may touch UI-owned state.
    Deferred(Arc<dyn HostLoop>),
}

impl fmt::Debug for NotifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("Immediate"),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

#[derive(Debug, Default)]
struct TaskStatus {
    state: TaskState,
    error: Option<TaskError>,
}

struct TaskInner {
    sequence: u64,
    request: RenderRequest,
    surface: Option<SharedSurface>,
    status: Mutex<TaskStatus>,
    render: Mutex<Option<RenderFn>>,
    listeners: Mutex<SmallVec<[StateListener; 2]>>,
    notify: NotifyMode,
}

/// Cancellable unit of rendering work.
///
/// Cloning yields another handle to the same task. The destination surface
/// is borrowed from whoever built the task; the task only draws into it.
#[derive(Clone)]
pub struct RenderTask {
    inner: Arc<TaskInner>,
}

impl fmt::Debug for RenderTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTask")
            .field("sequence", &self.inner.sequence)
            .field("state", &self.state())
            .field("request", &self.inner.request)
            .field("notify", &self.inner.notify)
            .finish()
    }
}

/// Assembles a [`RenderTask`].
#[derive(Default)]
pub struct RenderTaskBuilder {
    request: Option<RenderRequest>,
    surface: Option<SharedSurface>,
    render: Option<RenderFn>,
    notify: NotifyMode,
}

impl RenderTaskBuilder {
    #[must_use]
    pub fn with_surface(mut self, surface: SharedSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    #[must_use]
    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: FnOnce(&RenderTask) -> Result<(), TaskError> + Send + 'static,
    {
        self.render = Some(Box::new(render));
        self
    }

    /// Delivers state changes through `host` instead of on the transitioning
    /// thread.
    #[must_use]
    pub fn use_idle(mut self, host: Arc<dyn HostLoop>) -> Self {
        self.notify = NotifyMode::Deferred(host);
        self
    }

    pub fn build(self) -> GraphResult<RenderTask> {
        let request = self
            .request
            .ok_or_else(|| GraphError::InvalidData("render task needs a request".to_owned()))?;
        request.validate()?;
        Ok(RenderTask {
            inner: Arc::new(TaskInner {
                sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
                request,
                surface: self.surface,
                status: Mutex::new(TaskStatus::default()),
                render: Mutex::new(self.render),
                listeners: Mutex::new(SmallVec::new()),
                notify: self.notify,
            }),
        })
    }
}

impl RenderTask {
    #[must_use]
    pub fn builder(request: RenderRequest) -> RenderTaskBuilder {
        RenderTaskBuilder {
            request: Some(request),
            ..RenderTaskBuilder::default()
        }
    }

    /// Creation order across all tasks; larger is newer.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    #[must_use]
    pub fn request(&self) -> &RenderRequest {
        &self.inner.request
    }

    #[must_use]
    pub fn surface(&self) -> Option<&SharedSurface> {
        self.inner.surface.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        self.inner.status.lock().state
    }

    #[must_use]
    pub fn error(&self) -> Option<TaskError> {
        self.inner.status.lock().error.clone()
    }

    /// True once the task reached `Failed`; long renders poll this to stop
    /// early after a cancel.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Failed
    }

    /// Registers `listener` for every later terminal transition.
    pub fn connect<F>(&self, listener: F)
    where
        F: Fn(&RenderTask, TaskState) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().push(Arc::new(listener));
    }

    /// Runs the render callback if the task is still `Initial`.
    ///
    /// Returns `false` without doing anything when the task already ran or
    /// was cancelled. Errors and panics from the callback end the task in
    /// `Failed`.
    pub fn run(&self) -> bool {
        {
            let mut status = self.inner.status.lock();
            if status.state != TaskState::Initial {
                trace!(sequence = self.inner.sequence, state = %status.state, "task run ignored");
                return false;
            }
            status.state = TaskState::Running;
        }

        let render = self.inner.render.lock().take();
        let outcome = match render {
            Some(render) => match panic::catch_unwind(AssertUnwindSafe(|| render(self))) {
                Ok(result) => result,
                Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
            },
            None => Ok(()),
        };

        match outcome {
            Ok(()) => {
                self.finish();
            }
            Err(err) => {
                self.fail(err);
            }
        }
        true
    }

    /// `Running -> Success`. Returns whether the transition happened.
    pub fn finish(&self) -> bool {
        {
            let mut status = self.inner.status.lock();
            if status.state != TaskState::Running {
                return false;
            }
            status.state = TaskState::Success;
        }
        self.emit(TaskState::Success);
        true
    }

    /// `Initial | Running -> Failed` with `error`. Returns whether the
    /// transition happened.
    pub fn fail(&self, error: TaskError) -> bool {
        {
            let mut status = self.inner.status.lock();
            if status.state.is_terminal() {
                return false;
            }
            status.state = TaskState::Failed;
            status.error = Some(error.clone());
        }
        if error == TaskError::Cancelled {
            debug!(sequence = self.inner.sequence, "task cancelled");
        } else {
            warn!(sequence = self.inner.sequence, %error, "task failed");
        }
        self.emit(TaskState::Failed);
        true
    }

    /// Fails the task with [`TaskError::Cancelled`]. A callback already
    /// running is not interrupted.
    pub fn cancel(&self) -> bool {
        self.fail(TaskError::Cancelled)
    }

    fn emit(&self, state: TaskState) {
        let listeners = self.inner.listeners.lock().clone();
        if listeners.is_empty() {
            return;
        }
        match &self.inner.notify {
            NotifyMode::Immediate => {
                for listener in &listeners {
                    listener(self, state);
                }
            }
            NotifyMode::Deferred(host) => {
                let task = self.clone();
                host.defer(
                    Duration::ZERO,
                    Box::new(move || {
                        for listener in &listeners {
                            listener(&task, state);
                        }
                    }),
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

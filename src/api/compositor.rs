use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::{
    Clock, PixelRect, TimeSeriesStore, TimeWindow, ValueRange, Viewport, snap_ceil, snap_floor,
};
use crate::error::{GraphError, GraphResult};
use crate::render::{
    BackgroundFrame, CompositeOp, GridSpec, LabelRenderer, LineId, LineRenderer,
    NullLabelRenderer, PixelRing, PixelSurface, SeriesRenderer, ValueFormat, y_line_count,
};
use crate::task::{FrameSource, RenderRequest, RenderTask, Scheduler, TaskError, TaskState};

use super::{GraphConfig, GraphLayout, LABEL_SAMPLE};

type RedrawFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Counters describing compositor activity since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositorStats {
    pub tasks_scheduled: u64,
    pub tasks_blitted: u64,
    /// Successful renders dropped because the geometry changed under them.
    pub stale_discarded: u64,
    pub tasks_failed: u64,
    pub frames_drawn: u64,
}

/// Scrolling strip-chart compositor.
///
/// Owns the pixel ring and background layer, turns newly arrived data into
/// render tasks, and folds their results into the ring at the wrapped
/// position. All methods must be called from the thread that drives the
/// host loop; render tasks only ever touch their private surfaces.
pub struct GraphCompositor {
    config: GraphConfig,
    layout: Option<GraphLayout>,
    window: TimeWindow,
    offset_time: f64,
    ring: Option<PixelRing>,
    background: Option<PixelSurface>,
    renderer: SeriesRenderer,
    scheduler: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
    labels: Box<dyn LabelRenderer>,
    completed_tx: Sender<RenderTask>,
    completed_rx: Receiver<RenderTask>,
    stats: CompositorStats,
    frame_source: Option<FrameSource>,
    request_redraw: Option<RedrawFn>,
    last_data_end: Option<f64>,
}

impl fmt::Debug for GraphCompositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCompositor")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .field("window", &self.window)
            .field("offset_time", &self.offset_time)
            .field("ring_offset", &self.ring.as_ref().map(PixelRing::offset))
            .field("stats", &self.stats)
            .field("running", &self.is_running())
            .finish()
    }
}

impl GraphCompositor {
    pub fn new(config: GraphConfig, scheduler: Arc<Scheduler>, clock: Arc<dyn Clock>) -> GraphResult<Self> {
        config.validate()?;
        let window = TimeWindow::new(clock.now(), config.time_span())?;
        let renderer = SeriesRenderer::Line(LineRenderer::new(config.value_range));
        let (completed_tx, completed_rx) = mpsc::channel();
        Ok(Self {
            config,
            layout: None,
            window,
            offset_time: 0.0,
            ring: None,
            background: None,
            renderer,
            scheduler,
            clock,
            labels: Box::new(NullLabelRenderer::default()),
            completed_tx,
            completed_rx,
            stats: CompositorStats::default(),
            frame_source: None,
            request_redraw: None,
            last_data_end: None,
        })
    }

    /// Replaces the series renderer; it adopts the configured value range.
    pub fn with_series_renderer(mut self, mut renderer: SeriesRenderer) -> GraphResult<Self> {
        renderer.set_value_range(self.config.value_range)?;
        self.renderer = renderer;
        Ok(self)
    }

    /// Label backend used for measuring and drawing axis labels. Takes
    /// effect at the next resize.
    #[must_use]
    pub fn with_label_renderer<L>(mut self, labels: L) -> Self
    where
        L: LabelRenderer + 'static,
    {
        self.labels = Box::new(labels);
        self
    }

    /// Called whenever the composited image changed and the host should
    /// call [`GraphCompositor::draw`] again. Also driven by the frame tick.
    #[must_use]
    pub fn on_redraw<F>(mut self, request_redraw: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.request_redraw = Some(Arc::new(request_redraw));
        self
    }

    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    /// `None` until the first valid resize.
    #[must_use]
    pub fn layout(&self) -> Option<GraphLayout> {
        self.layout
    }

    /// Time span currently materialized in the pixel ring.
    #[must_use]
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    #[must_use]
    pub fn offset_time(&self) -> f64 {
        self.offset_time
    }

    #[must_use]
    pub fn ring(&self) -> Option<&PixelRing> {
        self.ring.as_ref()
    }

    #[must_use]
    pub fn background(&self) -> Option<&PixelSurface> {
        self.background.as_ref()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.frame_source.is_some()
    }

    #[must_use]
    pub fn x_for_time(&self, time: f64) -> Option<f64> {
        self.layout
            .map(|layout| self.window.x_for_time(time, layout.data_width()))
    }

    #[must_use]
    pub fn time_for_x(&self, x: f64) -> Option<f64> {
        self.layout
            .map(|layout| self.window.time_for_x(x, layout.data_width()))
    }

    /// Sub-pixel shift applied at draw time for the wall-clock time elapsed
    /// past the window end.
    #[must_use]
    pub fn scroll_x(&self) -> f64 {
        self.layout.map_or(0.0, |layout| {
            self.window.pixels_per_second(layout.data_width()) * (self.clock.now() - self.window.end_time())
        })
    }

    /// Anchors the window at the current time, paints both layers and starts
    /// the redraw tick.
    pub fn start(&mut self) -> GraphResult<()> {
        if self.is_running() {
            warn!("compositor already started");
            return Err(GraphError::InvalidConfig(
                "compositor already started".to_owned(),
            ));
        }
        self.window = TimeWindow::new(self.clock.now(), self.config.time_span())?;
        self.offset_time = 0.0;
        self.last_data_end = None;
        if let Some(ring) = self.ring.as_mut() {
            ring.reset();
        }
        self.render_background()?;
        self.render_full_foreground()?;

        let redraw = self.request_redraw.clone();
        let source = FrameSource::start(
            Arc::clone(self.scheduler.host()),
            self.config.frames_per_second,
            move || {
                if let Some(redraw) = &redraw {
                    redraw();
                }
            },
        )?;
        self.frame_source = Some(source);
        debug!(
            begin_time = self.window.begin_time(),
            end_time = self.window.end_time(),
            "compositor started"
        );
        Ok(())
    }

    /// Stops the redraw tick. In-flight tasks still complete.
    pub fn stop(&mut self) {
        if let Some(source) = self.frame_source.take() {
            source.stop();
            debug!(frames = source.frames(), "compositor stopped");
        }
    }

    /// Recomputes geometry for a `width` x `height` widget and repaints.
    ///
    /// A non-positive or too-small size drops the layers and fails with
    /// [`GraphError::InvalidViewport`]; nothing renders until the next
    /// valid resize.
    pub fn resize(&mut self, width: i32, height: i32) -> GraphResult<()> {
        let layout = match self.compute_layout(width, height) {
            Ok(layout) => layout,
            Err(err) => {
                warn!(width, height, %err, "ignoring malformed resize");
                self.layout = None;
                self.ring = None;
                self.background = None;
                return Err(err);
            }
        };

        self.offset_time = 0.0;
        self.ring = Some(PixelRing::allocate(
            layout.data_area.width as u32,
            layout.data_area.height as u32,
        )?);
        self.background = Some(PixelSurface::new(layout.viewport.width, layout.viewport.height)?);
        self.layout = Some(layout);
        debug!(
            width,
            height,
            content = ?layout.content_area,
            data = ?layout.data_area,
            "compositor resized"
        );

        self.render_background()?;
        self.render_full_foreground()?;
        self.redraw();
        Ok(())
    }

    fn compute_layout(&self, width: i32, height: i32) -> GraphResult<GraphLayout> {
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(GraphError::InvalidViewport {
                width: i64::from(width),
                height: i64::from(height),
            });
        };
        let label_size = self.labels.measure(LABEL_SAMPLE, &self.config.font);
        GraphLayout::compute(
            Viewport::new(w, h),
            label_size,
            self.config.n_seconds,
            self.config.n_buffered,
        )
    }

    /// Renders data newer than the last notification.
    ///
    /// Returns the scheduled task, or `None` when there is nothing new or no
    /// valid geometry yet.
    pub fn notify_new_data(&mut self) -> GraphResult<Option<RenderTask>> {
        let Some(end) = self.renderer.data_end_time() else {
            return Ok(None);
        };
        let begin = self
            .last_data_end
            .unwrap_or(self.window.begin_time())
            .max(end - self.window.span());
        if end <= begin {
            trace!(begin, end, "no new data to render");
            return Ok(None);
        }
        let task = self.render_foreground(begin, end)?;
        if task.is_some() {
            self.last_data_end = Some(end);
        }
        Ok(task)
    }

    /// Re-renders the whole materialized window.
    pub fn render_full_foreground(&mut self) -> GraphResult<Option<RenderTask>> {
        self.render_foreground(self.window.begin_time(), self.window.end_time())
    }

    /// Schedules a render of `[begin_time, end_time]` into a fresh surface.
    ///
    /// The left edge is snapped to a whole pixel and pulled back one column
    /// so consecutive slices overlap instead of leaving a seam. Completion is
    /// observed through [`GraphCompositor::process_completions`].
    pub fn render_foreground(&mut self, begin_time: f64, end_time: f64) -> GraphResult<Option<RenderTask>> {
        let Some(layout) = self.layout else {
            trace!("render skipped, no layout");
            return Ok(None);
        };
        let data_width = layout.data_width();
        let x = snap_floor(self.window.x_for_time(begin_time, data_width)) - 1.0;
        let begin_time = self.window.time_for_x(x, data_width);
        let width = self.window.x_for_time(end_time, data_width) - x;
        if !(width > 0.0) {
            trace!(begin_time, end_time, "render skipped, empty span");
            return Ok(None);
        }

        let request = RenderRequest::new(begin_time, end_time, width, layout.data_height())?;
        let surface_width = snap_ceil(width).max(1.0) as u32;
        let surface = PixelSurface::new(surface_width, layout.data_area.height as u32)?.into_shared();

        let renderer = self.renderer.clone();
        let target = Arc::clone(&surface);
        let task = RenderTask::builder(request)
            .with_surface(surface)
            .with_render(move |task| {
                let mut target = target.lock();
                renderer
                    .paint(&mut target, task.request())
                    .map_err(TaskError::from)
            })
            .use_idle(Arc::clone(self.scheduler.host()))
            .build()?;

        let completed = self.completed_tx.clone();
        task.connect(move |task, state| {
            if state.is_terminal() && completed.send(task.clone()).is_err() {
                trace!(sequence = task.sequence(), "compositor gone, completion dropped");
            }
        });

        trace!(
            sequence = task.sequence(),
            begin_time,
            end_time,
            width,
            "schedule foreground render"
        );
        self.scheduler
            .schedule(task.clone(), self.config.schedule_strategy);
        self.stats.tasks_scheduled += 1;
        Ok(Some(task))
    }

    /// Folds every finished task into the ring. Returns how many were
    /// handled, whatever their outcome.
    pub fn process_completions(&mut self) -> usize {
        let finished = self.completed_rx.try_iter().collect::<Vec<_>>();
        let mut blitted = false;
        for task in &finished {
            match task.state() {
                TaskState::Success => blitted |= self.complete(task),
                TaskState::Failed => {
                    self.stats.tasks_failed += 1;
                    trace!(sequence = task.sequence(), error = ?task.error(), "task failed");
                }
                TaskState::Initial | TaskState::Running => {}
            }
        }
        if blitted {
            self.redraw();
        }
        finished.len()
    }

    fn complete(&mut self, task: &RenderTask) -> bool {
        let request = *task.request();
        let (Some(layout), Some(ring), Some(surface)) =
            (self.layout, self.ring.as_mut(), task.surface())
        else {
            self.stats.stale_discarded += 1;
            return false;
        };
        if request.height as i32 != layout.data_area.height {
            debug!(
                sequence = task.sequence(),
                task_height = request.height,
                height = layout.data_area.height,
                "discarding stale render"
            );
            self.stats.stale_discarded += 1;
            return false;
        }

        let span = self.window.span();
        if request.end_time > self.window.end_time() {
            let change = request.end_time - self.window.end_time();
            self.offset_time = (self.offset_time + change) % span;
            self.window = self.window.ending_at(request.end_time);
        }

        let ring_width = i64::from(ring.width());
        let pixels_per_second = self.window.pixels_per_second(layout.data_width());
        let ring_offset = ((self.offset_time * pixels_per_second).round() as i64).rem_euclid(ring_width);
        let current = i64::from(ring.offset());
        ring.advance((ring_offset - current).rem_euclid(ring_width) as u32);

        let surface = surface.lock();
        let logical_x = self
            .window
            .x_for_time(request.begin_time, layout.data_width())
            .round() as i64;
        let chunk_width = i64::from(surface.width());
        let first = (-logical_x).max(0);
        let last = chunk_width.min(ring_width - logical_x);
        if first >= last {
            trace!(sequence = task.sequence(), logical_x, "render fell outside the ring");
            return false;
        }

        // Trailing part up to the wrap point, then the wrapped remainder.
        let physical = (logical_x + first + ring_offset).rem_euclid(ring_width);
        let trailing = (last - first).min(ring_width - physical);
        let wrapped = last - first - trailing;
        let blits = [(physical, first, trailing), (0, first + trailing, wrapped)];
        for (at, source_x, columns) in blits {
            if columns <= 0 {
                continue;
            }
            match ring.write_at(at as u32, columns as u32) {
                Ok(mut target) => target.composite(&surface, -(source_x as i32), 0, CompositeOp::Source),
                Err(err) => {
                    warn!(%err, "cannot blit into pixel ring");
                    return false;
                }
            }
        }
        trace!(
            sequence = task.sequence(),
            physical,
            columns = last - first,
            ring_offset,
            "blit render"
        );
        self.stats.tasks_blitted += 1;
        true
    }

    /// Composites the background, then the unrolled ring clipped to the
    /// content area and shifted by [`GraphCompositor::scroll_x`].
    pub fn draw(&mut self, destination: &mut PixelSurface) -> GraphResult<()> {
        self.process_completions();
        let (Some(layout), Some(ring), Some(background)) =
            (self.layout, self.ring.as_ref(), self.background.as_ref())
        else {
            return Ok(());
        };

        let bounds = destination.bounds();
        destination.composite(background, 0, 0, bounds.intersect(background.bounds()), CompositeOp::Source);

        let content = layout.content_area;
        let clip = content.inset(1).intersect(bounds);
        let scroll = self.scroll_x().round() as i32;
        ring.draw_onto(destination, content.x - scroll, content.y, clip)?;
        self.stats.frames_drawn += 1;
        Ok(())
    }

    fn render_background(&mut self) -> GraphResult<()> {
        let (Some(layout), Some(background)) = (self.layout, self.background.as_mut()) else {
            return Ok(());
        };
        let content = layout.content_area;
        let y_lines = y_line_count(
            content.height,
            layout.label_size.height,
            self.config.min_lines,
            self.config.max_lines,
        );
        let grid = GridSpec {
            viewport: layout.viewport,
            content_area: content,
            n_seconds: self.config.n_seconds,
            x_lines: self.config.x_grid_lines,
            y_lines,
            lower_value: self.config.value_range.lower,
            upper_value: self.config.value_range.upper,
            value_format: self.config.value_format,
            fill_color: self.config.colors.content_fill,
            grid_color: self.config.colors.grid,
            label_color: self.config.colors.label,
        };
        BackgroundFrame::build(&grid)?.paint(background, self.labels.as_mut(), &self.config.font)
    }

    /// Binds `column` of `store` as a new line and re-renders the window.
    pub fn append_line(&mut self, store: Arc<TimeSeriesStore>, column: usize) -> GraphResult<LineId> {
        let id = self.renderer.append_line(store, column)?;
        self.render_full_foreground()?;
        Ok(id)
    }

    pub fn remove_line(&mut self, id: LineId) -> GraphResult<bool> {
        if !self.renderer.remove_line(id) {
            return Ok(false);
        }
        self.render_full_foreground()?;
        Ok(true)
    }

    #[must_use]
    pub fn value_range(&self) -> ValueRange {
        self.config.value_range
    }

    pub fn set_value_range(&mut self, lower: f64, upper: f64) -> GraphResult<()> {
        let range = ValueRange::new(lower, upper)?;
        self.renderer.set_value_range(range)?;
        self.config.value_range = range;
        self.render_background()?;
        self.render_full_foreground()?;
        self.redraw();
        Ok(())
    }

    pub fn set_value_format(&mut self, format: ValueFormat) -> GraphResult<()> {
        self.config.value_format = format;
        self.render_background()?;
        self.redraw();
        Ok(())
    }

    pub fn set_min_lines(&mut self, min_lines: u32) -> GraphResult<()> {
        self.config.min_lines = min_lines;
        self.render_background()?;
        self.redraw();
        Ok(())
    }

    /// `0` lets the content height decide.
    pub fn set_max_lines(&mut self, max_lines: u32) -> GraphResult<()> {
        self.config.max_lines = max_lines;
        self.render_background()?;
        self.redraw();
        Ok(())
    }

    /// Content-area rectangle, if laid out.
    #[must_use]
    pub fn content_area(&self) -> Option<PixelRect> {
        self.layout.map(|layout| layout.content_area)
    }

    fn redraw(&self) {
        if let Some(redraw) = &self.request_redraw {
            redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::GraphCompositor;
    use crate::api::GraphConfig;
    use crate::core::{ColumnType, ManualClock, TimeSeriesStore};
    use crate::render::{NullLabelRenderer, PixelSurface};
    use crate::task::{IdleLoop, Scheduler, SchedulerConfig};

    struct Harness {
        clock: Arc<ManualClock>,
        idle: Arc<IdleLoop>,
        compositor: GraphCompositor,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(100.0));
        let idle = Arc::new(IdleLoop::new(clock.clone()));
        let scheduler = Arc::new(
            Scheduler::new(SchedulerConfig::default().with_worker_threads(1), idle.clone())
                .expect("scheduler"),
        );
        let compositor = GraphCompositor::new(GraphConfig::default(), scheduler, clock.clone())
            .expect("compositor")
            .with_label_renderer(NullLabelRenderer::default());
        Harness {
            clock,
            idle,
            compositor,
        }
    }

    #[test]
    fn malformed_resize_drops_layers() {
        let mut h = harness();
        h.compositor.resize(602, 108).expect("resize");
        assert!(h.compositor.ring().is_some());

        assert!(h.compositor.resize(0, 108).is_err());
        assert!(h.compositor.ring().is_none());
        assert!(h.compositor.layout().is_none());
        assert!(h.compositor.notify_new_data().expect("notify").is_none());

        let mut screen = PixelSurface::new(602, 108).expect("screen");
        h.compositor.draw(&mut screen).expect("draw");
        assert_eq!(h.compositor.stats().frames_drawn, 0);
    }

    #[test]
    fn start_twice_is_rejected_and_stop_ends_ticks() {
        let mut h = harness();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        h.compositor = h.compositor.on_redraw(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        h.compositor.resize(602, 108).expect("resize");
        h.compositor.start().expect("start");
        assert!(h.compositor.start().is_err());

        let before = ticks.load(Ordering::SeqCst);
        h.clock.advance(0.05);
        h.idle.run_until_idle();
        assert!(ticks.load(Ordering::SeqCst) > before);

        h.compositor.stop();
        assert!(!h.compositor.is_running());
        let stopped = ticks.load(Ordering::SeqCst);
        h.clock.advance(1.0);
        h.idle.run_until_idle();
        h.compositor.process_completions();
        assert_eq!(ticks.load(Ordering::SeqCst), stopped);
    }

    #[test]
    fn new_data_is_blitted_once_completed() {
        let mut h = harness();
        let store = Arc::new(TimeSeriesStore::with_capacity(&[ColumnType::Double], 8).expect("store"));
        h.compositor.append_line(store.clone(), 0).expect("line");
        h.compositor.resize(602, 108).expect("resize");
        h.idle.run_until_idle();
        h.compositor.process_completions();
        let baseline = h.compositor.stats();

        h.clock.set(101.0);
        let cursor = store.append_at(101.0);
        store.set(cursor, 0, 42.0).expect("set");
        assert!(h.compositor.notify_new_data().expect("notify").is_some());
        assert!(h.compositor.notify_new_data().expect("notify").is_none());

        h.idle.run_until_idle();
        assert_eq!(h.compositor.process_completions(), 1);
        let stats = h.compositor.stats();
        assert_eq!(stats.tasks_blitted, baseline.tasks_blitted + 1);
        assert_eq!(stats.stale_discarded, 0);
    }

    #[test]
    fn value_range_change_repaints_background() {
        let mut h = harness();
        h.compositor = h
            .compositor
            .with_label_renderer(NullLabelRenderer::with_metrics(6, 10));
        h.compositor.resize(700, 200).expect("resize");
        assert!(h.compositor.set_value_range(5.0, 1.0).is_err());
        h.compositor.set_value_range(-1.0, 1.0).expect("range");
        assert_eq!(h.compositor.value_range().lower, -1.0);
        assert_eq!(h.compositor.config().value_range.upper, 1.0);
    }
}

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::core::{PixelRect, TimeSeriesStore, ValueRange, snap_ceil};
use crate::error::{GraphError, GraphResult};
use crate::render::{Color, DrawTarget, PixelSurface};
use crate::task::RenderRequest;

/// Handle returned by [`LineRenderer::append_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineId(u64);

impl LineId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Stroke settings for one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: Color,
    pub width: u32,
    /// Fill the area between the line and the bottom edge.
    pub fill: bool,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: Color::rgb(0.16, 0.38, 0.64),
            width: 1,
            fill: false,
        }
    }
}

impl LineStyle {
    pub fn validate(self) -> GraphResult<()> {
        self.color.validate()?;
        if self.width == 0 {
            return Err(GraphError::InvalidConfig(
                "line width must be > 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// One series bound to a store column.
#[derive(Debug, Clone)]
struct Binding {
    store: Arc<TimeSeriesStore>,
    column: usize,
    style: LineStyle,
}

impl Binding {
    fn new(store: Arc<TimeSeriesStore>, column: usize, style: LineStyle) -> GraphResult<Self> {
        style.validate()?;
        if column >= store.n_columns() {
            return Err(GraphError::ColumnIndexOutOfRange {
                index: column,
                columns: store.n_columns(),
            });
        }
        Ok(Self {
            store,
            column,
            style,
        })
    }

    /// Samples inside the request window plus the nearest older one, newest
    /// first. The older sample joins this slice to the previous render.
    fn samples(&self, request: &RenderRequest, with_lead_in: bool) -> Vec<(f64, f64)> {
        let Some(cursor) = self.store.cursor_for_range(
            request.begin_time,
            request.end_time,
            request.aggregate_interval(),
        ) else {
            return Vec::new();
        };
        let cursor = if with_lead_in { cursor.unbounded() } else { cursor };

        let mut samples = Vec::new();
        for (timestamp, row) in self.store.rows(cursor) {
            match self.store.get_f64(row, self.column) {
                Ok(value) => samples.push((timestamp, value)),
                Err(err) => {
                    warn!(column = self.column, %err, "skipping unreadable sample");
                }
            }
            if timestamp < request.begin_time {
                break;
            }
        }
        samples
    }
}

struct Projection {
    begin_time: f64,
    x: f64,
    x_ratio: f64,
    top: f64,
    bottom: f64,
    height: f64,
    range: ValueRange,
}

impl Projection {
    fn new(request: &RenderRequest, range: ValueRange) -> Self {
        Self {
            begin_time: request.begin_time,
            x: request.x,
            x_ratio: request.width / request.duration(),
            top: request.y,
            bottom: request.y + request.height,
            height: request.height,
            range,
        }
    }

    fn position(&self, (timestamp, value): (f64, f64)) -> (f64, f64) {
        let x = self.x + (timestamp - self.begin_time) * self.x_ratio;
        let y = self.range.y_for_value(value, self.bottom, self.height);
        (x, y)
    }

    /// A sample at pixel position `x` lands in the column ending at `x`, so
    /// the newest sample of a slice stays inside it. Rows are kept within one
    /// surface height of the slice.
    fn pixel(&self, (x, y): (f64, f64)) -> (i32, i32) {
        let y = y.clamp(self.top - self.height, self.bottom + self.height);
        (snap_ceil(x) as i32 - 1, y.round() as i32)
    }
}

/// Cuts the segment `a..b` to `min_x..=max_x`, interpolating y.
fn clip_segment(a: (f64, f64), b: (f64, f64), min_x: f64, max_x: f64) -> Option<((f64, f64), (f64, f64))> {
    let (left, right) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    if right.0 < min_x || left.0 > max_x {
        return None;
    }
    let at = |x: f64| {
        let run = right.0 - left.0;
        if run <= f64::EPSILON {
            (x, left.1)
        } else {
            (x, left.1 + (x - left.0) / run * (right.1 - left.1))
        }
    };
    let left = if left.0 < min_x { at(min_x) } else { left };
    let right = if right.0 > max_x { at(max_x) } else { right };
    Some((left, right))
}

/// Draws each bound column as a polyline.
#[derive(Debug, Clone, Default)]
pub struct LineRenderer {
    lines: IndexMap<LineId, Binding>,
    next_id: u64,
    range: ValueRange,
}

impl LineRenderer {
    #[must_use]
    pub fn new(range: ValueRange) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }

    /// Binds `column` of `store` as a new line with the default style.
    pub fn append_line(&mut self, store: Arc<TimeSeriesStore>, column: usize) -> GraphResult<LineId> {
        self.append_styled_line(store, column, LineStyle::default())
    }

    pub fn append_styled_line(
        &mut self,
        store: Arc<TimeSeriesStore>,
        column: usize,
        style: LineStyle,
    ) -> GraphResult<LineId> {
        let binding = Binding::new(store, column, style)?;
        let id = LineId(self.next_id);
        self.next_id += 1;
        self.lines.insert(id, binding);
        Ok(id)
    }

    /// Returns `false` when `id` was not bound.
    pub fn remove_line(&mut self, id: LineId) -> bool {
        self.lines.shift_remove(&id).is_some()
    }

    #[must_use]
    pub fn line_ids(&self) -> Vec<LineId> {
        self.lines.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn paint(&self, surface: &mut PixelSurface, request: &RenderRequest) {
        let projection = Projection::new(request, self.range);
        let bottom = (request.y + request.height).round() as i32;
        let (min_x, max_x) = (request.x - 2.0, request.x + request.width + 2.0);
        let mut target = DrawTarget::full(surface);

        for binding in self.lines.values() {
            let positions = binding
                .samples(request, true)
                .into_iter()
                .map(|sample| projection.position(sample))
                .collect::<Vec<_>>();
            trace!(points = positions.len(), "paint line");

            if let [only] = positions.as_slice() {
                if (min_x..=max_x).contains(&only.0) {
                    let point = projection.pixel(*only);
                    target.draw_thick_line(point, point, binding.style.color, binding.style.width);
                }
                continue;
            }
            for pair in positions.windows(2) {
                let Some((older, newer)) = clip_segment(pair[1], pair[0], min_x, max_x) else {
                    continue;
                };
                let (older, newer) = (projection.pixel(older), projection.pixel(newer));
                if binding.style.fill {
                    fill_under(&mut target, older, newer, bottom, binding.style.color);
                } else {
                    target.draw_thick_line(older, newer, binding.style.color, binding.style.width);
                }
            }
        }
    }
}

fn fill_under(target: &mut DrawTarget<'_>, from: (i32, i32), to: (i32, i32), bottom: i32, color: Color) {
    let (left, right) = if from.0 <= to.0 { (from, to) } else { (to, from) };
    let run = (right.0 - left.0).max(1);
    for x in left.0..=right.0 {
        let t = f64::from(x - left.0) / f64::from(run);
        let y = (f64::from(left.1) + t * f64::from(right.1 - left.1)).round() as i32;
        target.fill_rect(PixelRect::new(x, y, 1, bottom - y), color);
    }
}

/// Draws a square marker per sample.
#[derive(Debug, Clone)]
pub struct ScatterRenderer {
    series: IndexMap<LineId, Binding>,
    next_id: u64,
    range: ValueRange,
    radius: u32,
}

impl Default for ScatterRenderer {
    fn default() -> Self {
        Self {
            series: IndexMap::new(),
            next_id: 0,
            range: ValueRange::default(),
            radius: 2,
        }
    }
}

impl ScatterRenderer {
    #[must_use]
    pub fn new(range: ValueRange) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn append_series(
        &mut self,
        store: Arc<TimeSeriesStore>,
        column: usize,
        color: Color,
    ) -> GraphResult<LineId> {
        let style = LineStyle {
            color,
            ..LineStyle::default()
        };
        let binding = Binding::new(store, column, style)?;
        let id = LineId(self.next_id);
        self.next_id += 1;
        self.series.insert(id, binding);
        Ok(id)
    }

    pub fn remove_series(&mut self, id: LineId) -> bool {
        self.series.shift_remove(&id).is_some()
    }

    fn paint(&self, surface: &mut PixelSurface, request: &RenderRequest) {
        let projection = Projection::new(request, self.range);
        let radius = self.radius as i32;
        let side = radius * 2 + 1;
        let mut target = DrawTarget::full(surface);
        for binding in self.series.values() {
            for sample in binding.samples(request, false) {
                let (x, y) = projection.pixel(projection.position(sample));
                target.fill_rect(
                    PixelRect::new(x - radius, y - radius, side, side),
                    binding.style.color,
                );
            }
        }
    }
}

/// Closed set of visual styles a graph can render with.
#[derive(Debug, Clone)]
pub enum SeriesRenderer {
    Line(LineRenderer),
    Scatter(ScatterRenderer),
}

impl Default for SeriesRenderer {
    fn default() -> Self {
        Self::Line(LineRenderer::default())
    }
}

impl SeriesRenderer {
    /// Binds a column with default styling; returns its handle.
    pub fn append_line(&mut self, store: Arc<TimeSeriesStore>, column: usize) -> GraphResult<LineId> {
        match self {
            Self::Line(renderer) => renderer.append_line(store, column),
            Self::Scatter(renderer) => {
                renderer.append_series(store, column, LineStyle::default().color)
            }
        }
    }

    pub fn remove_line(&mut self, id: LineId) -> bool {
        match self {
            Self::Line(renderer) => renderer.remove_line(id),
            Self::Scatter(renderer) => renderer.remove_series(id),
        }
    }

    #[must_use]
    pub fn value_range(&self) -> ValueRange {
        match self {
            Self::Line(renderer) => renderer.range,
            Self::Scatter(renderer) => renderer.range,
        }
    }

    pub fn set_value_range(&mut self, range: ValueRange) -> GraphResult<()> {
        range.validate()?;
        match self {
            Self::Line(renderer) => renderer.range = range,
            Self::Scatter(renderer) => renderer.range = range,
        }
        Ok(())
    }

    fn bindings(&self) -> impl Iterator<Item = &Binding> {
        let (lines, series) = match self {
            Self::Line(renderer) => (Some(renderer.lines.values()), None),
            Self::Scatter(renderer) => (None, Some(renderer.series.values())),
        };
        lines.into_iter().flatten().chain(series.into_iter().flatten())
    }

    /// Newest timestamp across every bound store, `None` when all are empty.
    #[must_use]
    pub fn data_end_time(&self) -> Option<f64> {
        self.bindings()
            .filter(|binding| !binding.store.is_empty())
            .map(|binding| binding.store.end_time())
            .reduce(f64::max)
    }

    /// Paints `request`'s time slice onto `surface`.
    pub fn paint(&self, surface: &mut PixelSurface, request: &RenderRequest) -> GraphResult<()> {
        request.validate()?;
        if request.duration() <= 0.0 {
            return Ok(());
        }
        match self {
            Self::Line(renderer) => renderer.paint(surface, request),
            Self::Scatter(renderer) => renderer.paint(surface, request),
        }
        Ok(())
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::core::clock::{Clock, SystemClock};
use crate::core::column::{ColumnData, ColumnType, Value};
use crate::core::ring::Ring;
use crate::error::{GraphError, GraphResult};

/// Row capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 60;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Serializable store bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    pub columns: Vec<String>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl StoreConfig {
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capacity: DEFAULT_CAPACITY,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Position inside a [`TimeSeriesStore`].
///
/// A cursor records the append generation it was created at and a row
/// offset relative to that generation. The physical slot is recomputed from
/// the store's current generation on every read, so a cursor keeps pointing
/// at the same logical row while newer rows are appended, until that row is
/// overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    store_id: u64,
    generation: u64,
    row: usize,
    end_row: Option<usize>,
}

impl Cursor {
    /// Row offset relative to the generation the cursor was created at.
    #[must_use]
    pub fn row(self) -> usize {
        self.row
    }

    #[must_use]
    pub fn generation(self) -> u64 {
        self.generation
    }

    /// Last row (inclusive) a range cursor may advance to.
    #[must_use]
    pub fn end_row(self) -> Option<usize> {
        self.end_row
    }

    /// Same position without the range bound, so advancing continues into
    /// older rows.
    #[must_use]
    pub fn unbounded(self) -> Self {
        Self {
            end_row: None,
            ..self
        }
    }
}

#[derive(Debug)]
struct StoreState {
    timestamps: Ring<f64>,
    columns: Vec<ColumnData>,
    appended: u64,
}

impl StoreState {
    fn offset(&self, cursor: Cursor) -> Option<usize> {
        let delta = self.appended.checked_sub(cursor.generation)?;
        let offset = usize::try_from(delta).ok()?.checked_add(cursor.row)?;
        (offset < self.timestamps.len()).then_some(offset)
    }
}

/// Fixed-capacity columnar ring of timestamped rows.
///
/// One producer appends while any number of readers walk cursors. Every
/// column and the timestamp ring advance together under a single write lock.
#[derive(Debug)]
pub struct TimeSeriesStore {
    id: u64,
    capacity: usize,
    column_types: Vec<ColumnType>,
    clock: Arc<dyn Clock>,
    state: RwLock<StoreState>,
}

impl TimeSeriesStore {
    /// Creates a store with [`DEFAULT_CAPACITY`] rows.
    pub fn new(column_types: &[ColumnType]) -> GraphResult<Self> {
        Self::with_capacity(column_types, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(column_types: &[ColumnType], capacity: usize) -> GraphResult<Self> {
        if column_types.is_empty() {
            return Err(GraphError::EmptySchema);
        }
        if capacity == 0 {
            return Err(GraphError::InvalidConfig(
                "store capacity must be > 0".to_owned(),
            ));
        }

        let columns = column_types
            .iter()
            .map(|kind| ColumnData::new(*kind, capacity))
            .collect();
        Ok(Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            column_types: column_types.to_vec(),
            clock: Arc::new(SystemClock),
            state: RwLock::new(StoreState {
                timestamps: Ring::new(capacity),
                columns,
                appended: 0,
            }),
        })
    }

    /// Builds a store from column type names such as `"double"` or `"uint32"`.
    pub fn from_config(config: &StoreConfig) -> GraphResult<Self> {
        let kinds = config
            .columns
            .iter()
            .map(|name| name.parse::<ColumnType>())
            .collect::<GraphResult<Vec<_>>>()?;
        Self::with_capacity(&kinds, config.capacity)
    }

    /// Replaces the clock used by [`Self::append`].
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.column_types.len()
    }

    #[must_use]
    pub fn column_type(&self, column: usize) -> Option<ColumnType> {
        self.column_types.get(column).copied()
    }

    /// Rows currently retained, at most [`Self::capacity`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of appends since creation.
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.state.read().appended
    }

    /// Appends a row stamped with the store clock.
    pub fn append(&self) -> Cursor {
        self.append_at(self.clock.now())
    }

    /// Appends a row with zeroed values. A zero timestamp means "now".
    ///
    /// Timestamps must be non-decreasing; the store does not sort.
    pub fn append_at(&self, timestamp: f64) -> Cursor {
        let timestamp = self.resolve_timestamp(timestamp);
        let mut state = self.state.write();
        self.push_row(&mut state, timestamp)
    }

    /// Appends a row and fills the given columns under one write lock, so
    /// readers never see the row half-written.
    pub fn append_row(&self, timestamp: f64, values: &[(usize, Value)]) -> GraphResult<Cursor> {
        for (column, _) in values {
            self.check_column(*column)?;
        }
        let timestamp = self.resolve_timestamp(timestamp);
        let mut state = self.state.write();
        let cursor = self.push_row(&mut state, timestamp);
        for (column, value) in values {
            state.columns[*column].set(0, *value);
        }
        Ok(cursor)
    }

    fn resolve_timestamp(&self, timestamp: f64) -> f64 {
        if timestamp == 0.0 {
            self.clock.now()
        } else {
            timestamp
        }
    }

    fn push_row(&self, state: &mut StoreState, timestamp: f64) -> Cursor {
        for column in &mut state.columns {
            column.advance();
        }
        state.timestamps.push(timestamp);
        state.appended += 1;
        trace!(store = self.id, appended = state.appended, timestamp, "append row");
        Cursor {
            store_id: self.id,
            generation: state.appended,
            row: 0,
            end_row: None,
        }
    }

    fn check_cursor(&self, cursor: Cursor) -> GraphResult<()> {
        if cursor.store_id != self.id {
            warn!(store = self.id, cursor_store = cursor.store_id, "foreign cursor");
            return Err(GraphError::ForeignCursor);
        }
        Ok(())
    }

    fn check_column(&self, column: usize) -> GraphResult<()> {
        if column >= self.column_types.len() {
            warn!(column, columns = self.column_types.len(), "no such column");
            return Err(GraphError::ColumnIndexOutOfRange {
                index: column,
                columns: self.column_types.len(),
            });
        }
        Ok(())
    }

    /// Stores `value` coerced to the column's declared type. Narrowing
    /// conversions lose precision silently.
    pub fn set(&self, cursor: Cursor, column: usize, value: impl Into<Value>) -> GraphResult<()> {
        self.check_cursor(cursor)?;
        self.check_column(column)?;
        let mut state = self.state.write();
        let offset = state.offset(cursor).ok_or(GraphError::StaleCursor)?;
        state.columns[column].set(offset, value.into());
        Ok(())
    }

    pub fn set_many(&self, cursor: Cursor, values: &[(usize, Value)]) -> GraphResult<()> {
        self.check_cursor(cursor)?;
        for (column, _) in values {
            self.check_column(*column)?;
        }
        let mut state = self.state.write();
        let offset = state.offset(cursor).ok_or(GraphError::StaleCursor)?;
        for (column, value) in values {
            state.columns[*column].set(offset, *value);
        }
        Ok(())
    }

    /// Reads a value in the column's native type.
    pub fn get(&self, cursor: Cursor, column: usize) -> GraphResult<Value> {
        self.check_cursor(cursor)?;
        self.check_column(column)?;
        let state = self.state.read();
        let offset = state.offset(cursor).ok_or(GraphError::StaleCursor)?;
        state.columns[column]
            .get(offset)
            .ok_or(GraphError::StaleCursor)
    }

    pub fn get_f64(&self, cursor: Cursor, column: usize) -> GraphResult<f64> {
        self.get(cursor, column).map(Value::as_f64)
    }

    pub fn timestamp(&self, cursor: Cursor) -> GraphResult<f64> {
        self.check_cursor(cursor)?;
        let state = self.state.read();
        let offset = state.offset(cursor).ok_or(GraphError::StaleCursor)?;
        state
            .timestamps
            .get(offset)
            .ok_or(GraphError::StaleCursor)
    }

    /// Cursor at `row` rows before the newest append; `0` is the newest.
    #[must_use]
    pub fn cursor_at_row(&self, row: usize) -> Option<Cursor> {
        if row >= self.capacity {
            return None;
        }
        let state = self.state.read();
        (row < state.timestamps.len()).then_some(Cursor {
            store_id: self.id,
            generation: state.appended,
            row,
            end_row: None,
        })
    }

    /// Cursor over rows with timestamps in `[begin_time, end_time]`, starting
    /// at the newest such row and walking into the past.
    ///
    /// `aggregate_interval` is accepted but every row in range is returned;
    /// no downsampling is applied.
    #[must_use]
    pub fn cursor_for_range(
        &self,
        begin_time: f64,
        end_time: f64,
        aggregate_interval: f64,
    ) -> Option<Cursor> {
        if !begin_time.is_finite() || !end_time.is_finite() || begin_time > end_time {
            return None;
        }

        let state = self.state.read();
        let timestamps = &state.timestamps;

        // TODO: timestamps are sorted, so both scans could be binary searches.
        let start = (0..timestamps.len())
            .find(|row| timestamps.get(*row).is_some_and(|ts| ts <= end_time))?;
        let past = (start..timestamps.len())
            .find(|row| timestamps.get(*row).is_some_and(|ts| ts < begin_time))
            .unwrap_or(timestamps.len());
        if past == start {
            return None;
        }
        let end_row = past - 1;

        trace!(
            begin_time,
            end_time,
            aggregate_interval,
            rows = end_row + 1 - start,
            "range cursor"
        );
        Some(Cursor {
            store_id: self.id,
            generation: state.appended,
            row: start,
            end_row: Some(end_row),
        })
    }

    /// Steps one row further into the past. Returns `false` once the cursor
    /// runs past its range bound or the oldest retained row.
    pub fn cursor_advance(&self, cursor: &mut Cursor) -> bool {
        if cursor.store_id != self.id {
            return false;
        }
        cursor.row += 1;
        if cursor.end_row.is_some_and(|end| cursor.row > end) {
            return false;
        }
        self.state.read().offset(*cursor).is_some()
    }

    /// Iterates `(timestamp, cursor)` pairs from `cursor` into the past.
    pub fn rows(&self, cursor: Cursor) -> Rows<'_> {
        Rows {
            store: self,
            cursor,
            started: false,
        }
    }

    /// Timestamp of the oldest retained row, `0.0` when empty.
    #[must_use]
    pub fn begin_time(&self) -> f64 {
        let state = self.state.read();
        state
            .timestamps
            .len()
            .checked_sub(1)
            .and_then(|oldest| state.timestamps.get(oldest))
            .unwrap_or(0.0)
    }

    /// Timestamp of the newest row, `0.0` when empty.
    #[must_use]
    pub fn end_time(&self) -> f64 {
        self.state.read().timestamps.get(0).unwrap_or(0.0)
    }
}

/// Iterator returned by [`TimeSeriesStore::rows`].
#[derive(Debug)]
pub struct Rows<'a> {
    store: &'a TimeSeriesStore,
    cursor: Cursor,
    started: bool,
}

impl Iterator for Rows<'_> {
    type Item = (f64, Cursor);

    fn next(&mut self) -> Option<Self::Item> {
        if self.started {
            if !self.store.cursor_advance(&mut self.cursor) {
                return None;
            }
        } else {
            self.started = true;
        }
        match self.store.timestamp(self.cursor) {
            Ok(timestamp) => Some((timestamp, self.cursor)),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, TimeSeriesStore};
    use crate::core::{ColumnType, Value};
    use crate::error::GraphError;

    fn store_with_rows(capacity: usize, rows: usize) -> TimeSeriesStore {
        let store =
            TimeSeriesStore::with_capacity(&[ColumnType::Double], capacity).expect("store");
        for row in 0..rows {
            let cursor = store.append_at(row as f64 + 1.0);
            store.set(cursor, 0, row as f64).expect("set");
        }
        store
    }

    #[test]
    fn cursor_survives_later_appends() {
        let store = store_with_rows(8, 2);
        let cursor = store.cursor_at_row(0).expect("newest");
        store.append_at(10.0);
        store.append_at(11.0);
        assert_eq!(store.timestamp(cursor), Ok(2.0));
        assert_eq!(store.get(cursor, 0), Ok(Value::Double(1.0)));
    }

    #[test]
    fn overwritten_cursor_reports_stale() {
        let store = store_with_rows(3, 1);
        let cursor = store.cursor_at_row(0).expect("newest");
        for ts in 2..=4 {
            store.append_at(f64::from(ts));
        }
        assert_eq!(store.get(cursor, 0), Err(GraphError::StaleCursor));
    }

    #[test]
    fn foreign_cursor_is_rejected() {
        let first = store_with_rows(4, 1);
        let second = store_with_rows(4, 1);
        let cursor = first.cursor_at_row(0).expect("cursor");
        assert_eq!(second.get(cursor, 0), Err(GraphError::ForeignCursor));
    }

    #[test]
    fn range_scan_excludes_rows_newer_than_end() {
        let store = store_with_rows(16, 10);
        let cursor = store.cursor_for_range(3.0, 7.0, 0.0).expect("range");
        assert_eq!(store.timestamp(cursor), Ok(7.0));
        assert_eq!(cursor.end_row(), Some(7));
    }

    #[test]
    fn config_rejects_unknown_column_names() {
        let config = StoreConfig::new(["double", "int8"]);
        assert!(matches!(
            TimeSeriesStore::from_config(&config),
            Err(GraphError::UnsupportedColumnType(name)) if name == "int8"
        ));
    }
}

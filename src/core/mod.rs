pub mod clock;
pub mod column;
pub mod ring;
pub mod store;
pub mod time_window;
pub mod types;
pub mod value_range;

pub use clock::{Clock, ManualClock, SystemClock};
pub use column::{ColumnType, Value};
pub use ring::Ring;
pub use store::{Cursor, DEFAULT_CAPACITY, Rows, StoreConfig, TimeSeriesStore};
pub use time_window::{PIXEL_EPSILON, TimeWindow, snap_ceil, snap_floor};
pub use types::{PixelRect, Viewport};
pub use value_range::ValueRange;

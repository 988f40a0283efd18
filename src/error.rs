use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unsupported column type: {0}")]
    UnsupportedColumnType(String),

    #[error("column index {index} out of range (store has {columns} columns)")]
    ColumnIndexOutOfRange { index: usize, columns: usize },

    #[error("store requires at least one column")]
    EmptySchema,

    #[error("cursor belongs to a different store")]
    ForeignCursor,

    #[error("cursor row was overwritten by later appends")]
    StaleCursor,

    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: i64, height: i64 },

    #[error("pixel ring has no backing surface")]
    MissingSurface,

    #[error("push of {requested} columns does not fit a ring of width {width}")]
    PushTooWide { requested: u32, width: u32 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
}

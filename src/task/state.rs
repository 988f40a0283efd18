use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GraphError;

/// Lifecycle of a render task.
///
/// `Initial -> Running -> Success`; `Failed` is reachable from `Initial` and
/// `Running`. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Initial,
    Running,
    Success,
    Failed,
}

impl TaskState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a task ended in [`TaskState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task was cancelled")]
    Cancelled,
    #[error("render failed: {0}")]
    Render(String),
    #[error("render callback panicked: {0}")]
    Panicked(String),
}

impl From<GraphError> for TaskError {
    fn from(err: GraphError) -> Self {
        Self::Render(err.to_string())
    }
}

use thiserror::Error;

/// Boxed error returned by [`crate::contract::WikiApi`] implementors.
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a queued task that never produced a value of its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("task was cancelled before it started")]
    Cleared,

    #[error("no tokio runtime available to run the task")]
    NoRuntime,

    #[error("task panicked while running")]
    Panicked,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Polling task {task_id} timed out after {attempts} attempts")]
    PollTimeout { task_id: String, attempts: u32 },

    #[error("Export task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("Parse result contained no documents")]
    EmptyParseResult,

    #[error("Item {0} not found in import list")]
    ItemNotFound(uuid::Uuid),
}

pub type Result<T, E = ImportError> = std::result::Result<T, E>;

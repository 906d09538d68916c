//! Error types for executors and executor groups

use thiserror::Error;

/// Boxed error returned by user-supplied executor factories
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors that can occur while creating or driving executors
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Task submitted after the executor was shut down
    #[error("event executor terminated")]
    Rejected,

    /// The OS refused to spawn the loop thread
    #[error("failed to spawn event loop thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Creating the child at `index` failed; earlier children were torn down
    #[error("failed to create child event loop {index}: {source}")]
    ChildCreation {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// Rejected construction argument
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl ExecutorError {
    /// Whether this error is the group-level rollback error
    pub fn is_child_creation(&self) -> bool {
        matches!(self, ExecutorError::ChildCreation { .. })
    }
}

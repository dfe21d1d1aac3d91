use thiserror::Error;

/// Errors from appointment booking and lifecycle transitions.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("appointment not found")]
    NotFound,

    #[error("requested slot conflicts with an existing booking")]
    SlotConflict,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid transition: {0}")]
    StaleState(String),

    #[error("cancellation window closed ({hours}h cutoff)")]
    CutoffViolation { hours: i64 },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from the message store.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("appointment not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from repository operations (used by trait definitions in exhale-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for SchedulingError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => SchedulingError::NotFound,
            RepositoryError::Conflict(_) => SchedulingError::SlotConflict,
            other => SchedulingError::Storage(other.to_string()),
        }
    }
}

impl From<RepositoryError> for MessageError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => MessageError::NotFound,
            other => MessageError::Storage(other.to_string()),
        }
    }
}

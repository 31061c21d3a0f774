use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Malformed model or aggregate shape, detected while building a descriptor.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A root write reported no effect.
    #[error("Persist failed: {0}")]
    PersistFailed(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

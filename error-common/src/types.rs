use thiserror::Error;

/// Process-level failures of the engine binaries (startup, bind, serve)
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network communication errors
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server runtime errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Database connection or migration errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Log an engine error with the context it surfaced in
pub fn log_error(context: &str, error: &EngineError) {
    tracing::error!(
        context = context,
        error = %error,
        "SplitLedger engine error occurred"
    );
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Classify a driver error by its SQLSTATE so callers can decide whether to retry
    pub fn classify(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::PoolTimedOut => DatabaseError::Timeout(error.to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::Database(db_error) => {
                let code = db_error.code().map(|c| c.to_string()).unwrap_or_default();
                match sqlstate_class(&code) {
                    SqlState::Integrity => {
                        DatabaseError::ConstraintViolation(db_error.message().to_string())
                    }
                    SqlState::Transient => DatabaseError::Timeout(format!(
                        "{} (SQLSTATE {code})",
                        db_error.message()
                    )),
                    SqlState::Connection => {
                        DatabaseError::ConnectionFailed(db_error.message().to_string())
                    }
                    SqlState::Other => DatabaseError::QueryFailed(format!(
                        "{} (SQLSTATE {code})",
                        db_error.message()
                    )),
                }
            }
            _ => DatabaseError::SqlxError(error),
        }
    }

    /// Whether replaying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::Timeout(_)
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SqlState {
    Integrity,
    Transient,
    Connection,
    Other,
}

fn sqlstate_class(code: &str) -> SqlState {
    match code {
        // serialization_failure, deadlock_detected, query_canceled (statement timeout), lock_not_available
        "40001" | "40P01" | "57014" | "55P03" => SqlState::Transient,
        // admin_shutdown, crash_shutdown, cannot_connect_now
        "57P01" | "57P02" | "57P03" => SqlState::Connection,
        _ if code.starts_with("23") => SqlState::Integrity,
        _ if code.starts_with("08") => SqlState::Connection,
        _ => SqlState::Other,
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

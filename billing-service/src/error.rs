use database_layer::DatabaseError;
use error_common::codes;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Resource names carried by `BillingError::NotFound`
pub mod resource {
    pub const CONTRACT: &str = "contract";
    pub const LEDGER_ENTRY: &str = "ledger entry";
    pub const TRANSACTION: &str = "transaction";
}

#[derive(Error, Debug)]
pub enum BillingError {
    /// Malformed or out-of-range input; never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// No active contract, or an unknown ledger entry or transaction
    #[error("{resource} not found: {detail}")]
    NotFound {
        resource: &'static str,
        detail: String,
    },

    /// More than one contract claims the same client and date
    #[error("Contract conflict: {0}")]
    ContractConflict(String),

    /// A rounding or consistency invariant was violated
    #[error("Allocation error: {message} (fee {fee_amount}, allocated {allocated_total})")]
    Allocation {
        message: String,
        fee_amount: Decimal,
        allocated_total: Decimal,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl BillingError {
    pub fn allocation(message: impl Into<String>, fee_amount: Decimal, allocated_total: Decimal) -> Self {
        BillingError::Allocation {
            message: message.into(),
            fee_amount,
            allocated_total,
        }
    }

    pub fn not_found(resource: &'static str, detail: impl Into<String>) -> Self {
        BillingError::NotFound {
            resource,
            detail: detail.into(),
        }
    }

    /// Whether replaying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Persistence(e) if e.is_retryable())
    }

    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::Validation(_) => codes::validation::INVALID_INPUT,
            BillingError::NotFound { resource, .. } => match *resource {
                resource::LEDGER_ENTRY => codes::lookup::ENTRY_NOT_FOUND,
                resource::TRANSACTION => codes::lookup::TRANSACTION_NOT_FOUND,
                _ => codes::lookup::NO_ACTIVE_CONTRACT,
            },
            BillingError::ContractConflict(_) => codes::lookup::CONTRACT_CONFLICT,
            BillingError::Allocation { .. } => codes::allocation::SUM_MISMATCH,
            BillingError::Persistence(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceErrorKind {
    /// Timeouts, dropped connections, serialization failures
    Transient,
    /// Constraint violations and anything else a replay cannot fix
    Permanent,
}

/// One entry of a batch that could not be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryFailure {
    pub index: usize,
    pub department_id: Uuid,
    pub amount: Decimal,
    pub reason: String,
}

/// Aggregate store failure; none of the batch is visible when this is returned
#[derive(Error, Debug, Clone)]
#[error("Persistence error ({kind:?}): {message}")]
pub struct PersistenceError {
    pub kind: PersistenceErrorKind,
    pub message: String,
    pub failures: Vec<EntryFailure>,
}

impl PersistenceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: PersistenceErrorKind::Transient,
            message: message.into(),
            failures: Vec::new(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: PersistenceErrorKind::Permanent,
            message: message.into(),
            failures: Vec::new(),
        }
    }

    pub fn with_failures(mut self, failures: Vec<EntryFailure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == PersistenceErrorKind::Transient
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            PersistenceErrorKind::Transient => codes::persistence::TRANSIENT,
            PersistenceErrorKind::Permanent if self.failures.is_empty() => {
                codes::persistence::QUERY_FAILED
            }
            PersistenceErrorKind::Permanent => codes::persistence::CONSTRAINT_VIOLATION,
        }
    }
}

impl From<DatabaseError> for PersistenceError {
    fn from(error: DatabaseError) -> Self {
        if error.is_transient() {
            PersistenceError::transient(error.to_string())
        } else {
            PersistenceError::permanent(error.to_string())
        }
    }
}

impl From<DatabaseError> for BillingError {
    fn from(error: DatabaseError) -> Self {
        BillingError::Persistence(error.into())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

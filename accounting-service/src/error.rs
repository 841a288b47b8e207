use billing_service::{resource, BillingError, PersistenceError};
use error_common::codes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{resource} not found: {detail}")]
    NotFound {
        resource: &'static str,
        detail: String,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] PersistenceError),
}

impl AccountingError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountingError::Validation(_) => codes::validation::INVALID_INPUT,
            AccountingError::NotFound {
                resource: resource::TRANSACTION,
                ..
            } => codes::lookup::TRANSACTION_NOT_FOUND,
            AccountingError::NotFound { .. } => codes::lookup::ENTRY_NOT_FOUND,
            AccountingError::Ledger(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AccountingError::Ledger(e) if e.is_retryable())
    }
}

impl From<BillingError> for AccountingError {
    fn from(error: BillingError) -> Self {
        match error {
            BillingError::Persistence(e) => AccountingError::Ledger(e),
            BillingError::NotFound { resource, detail } => AccountingError::NotFound { resource, detail },
            other => AccountingError::Validation(other.to_string()),
        }
    }
}

pub type AccountingResult<T> = Result<T, AccountingError>;

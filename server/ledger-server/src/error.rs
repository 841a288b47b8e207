use accounting_service::AccountingError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use billing_service::{BillingError, PersistenceError};
use error_common::{codes, ErrorContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type
    pub error_type: String,
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Amounts, departments and entry indexes behind the failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorContext>,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Whether replaying the identical request may succeed
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: &'static str,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("Resource not found: {message}")]
    NotFound { message: String, code: &'static str },

    #[error("Resource conflict: {message}")]
    Conflict { message: String },

    #[error("Allocation error: {message}")]
    Allocation { message: String, context: ErrorContext },

    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        code: &'static str,
        retryable: bool,
        context: ErrorContext,
    },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: codes::validation::INVALID_INPUT,
            field_errors: None,
        }
    }

    /// Create a validation error for unparseable input
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: codes::validation::INVALID_FORMAT,
            field_errors: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Allocation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Persistence { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Conflict { .. } => "conflict",
            ApiError::Allocation { .. } => "allocation_error",
            ApiError::Persistence { .. } => "persistence_error",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Persistence { code, .. } => *code,
            ApiError::Conflict { .. } => codes::lookup::CONTRACT_CONFLICT,
            ApiError::Allocation { .. } => codes::allocation::SUM_MISMATCH,
            ApiError::Internal { .. } => codes::internal::UNEXPECTED,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Persistence { retryable: true, .. })
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation { .. } => Some(vec![
                "Check the request payload for invalid fields".to_string(),
                "Dates use the ISO format YYYY-MM-DD and amounts must be positive".to_string(),
            ]),
            ApiError::NotFound { .. } => Some(vec![
                "Verify the contract or entry id is correct".to_string(),
                "Check that a contract is active for the invoice date".to_string(),
            ]),
            ApiError::Conflict { .. } => Some(vec![
                "Overlapping contracts must be corrected before invoices can be processed".to_string(),
            ]),
            ApiError::Persistence { retryable: true, .. } => Some(vec![
                "Retry the identical request; a resent invoice is booked at most once".to_string(),
            ]),
            _ => None,
        }
    }

    fn context(&self) -> Option<ErrorContext> {
        match self {
            ApiError::Allocation { context, .. } | ApiError::Persistence { context, .. }
                if !context.is_empty() =>
            {
                Some(context.clone())
            }
            _ => None,
        }
    }
}

fn persistence_context(error: &PersistenceError) -> ErrorContext {
    error.failures.iter().fold(ErrorContext::new(), |context, failure| {
        let prefix = format!("entry_{}", failure.index);
        context
            .add_context(format!("{prefix}.department_id"), failure.department_id.to_string())
            .add_context(format!("{prefix}.amount"), failure.amount.to_string())
            .add_context(format!("{prefix}.reason"), failure.reason.clone())
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                code = self.code(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                code = self.code(),
                status_code = %status_code.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        let field_errors = match &self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            _ => None,
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.context(),
            field_errors,
            timestamp: chrono::Utc::now(),
            retryable: self.is_retryable(),
            suggestions: self.suggestions(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(error: BillingError) -> Self {
        let code = error.code();
        match error {
            BillingError::Validation(message) => ApiError::Validation {
                message,
                code,
                field_errors: None,
            },
            e @ BillingError::NotFound { .. } => ApiError::NotFound {
                message: e.to_string(),
                code,
            },
            BillingError::ContractConflict(message) => ApiError::Conflict { message },
            BillingError::Allocation {
                message,
                fee_amount,
                allocated_total,
            } => ApiError::Allocation {
                message,
                context: ErrorContext::new()
                    .add_context("fee_amount", fee_amount.to_string())
                    .add_context("allocated_total", allocated_total.to_string()),
            },
            BillingError::Persistence(e) => e.into(),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(error: PersistenceError) -> Self {
        ApiError::Persistence {
            code: error.code(),
            retryable: error.is_retryable(),
            context: persistence_context(&error),
            message: error.message,
        }
    }
}

impl From<AccountingError> for ApiError {
    fn from(error: AccountingError) -> Self {
        let code = error.code();
        match error {
            AccountingError::Validation(message) => ApiError::Validation {
                message,
                code,
                field_errors: None,
            },
            e @ AccountingError::NotFound { .. } => ApiError::NotFound {
                message: e.to_string(),
                code,
            },
            AccountingError::Ledger(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors: HashMap<String, Vec<String>> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        ApiError::Validation {
            message: "request failed validation".to_string(),
            code: codes::validation::MISSING_REQUIRED_FIELD,
            field_errors: Some(field_errors),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_format(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_format(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid_format(rejection.body_text())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

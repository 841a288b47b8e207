//! Common error handling utilities for the SplitLedger engine
//!
//! Shared by every crate in the workspace so that the HTTP layer, the ledger
//! engine and the storage layer agree on error codes and on how much context
//! travels with a failure.
//!
//! # Error Categories
//!
//! - **Validation**: malformed or out-of-range input, never retried
//! - **NotFound**: no active contract or unknown ledger entry
//! - **Conflict**: configuration corruption such as overlapping contracts
//! - **Allocation**: a rounding or consistency invariant was violated (a bug)
//! - **Persistence**: store failures, retryable when transient
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, ErrorContext};
//!
//! let context = ErrorContext::new()
//!     .with_request_id("req-42".to_string())
//!     .add_context("invoice_number", "INV-1001");
//!
//! assert_eq!(codes::allocation::SUM_MISMATCH, "ALLOC_3001");
//! assert_eq!(context.additional.get("invoice_number").map(String::as_str), Some("INV-1001"));
//! ```

pub mod codes;
pub mod context;
pub mod types;

pub use context::*;
pub use types::*;

//! Accounting views over the billing ledger
//!
//! Read-only consumers of the ledger written by `billing-service`:
//! - Entry queries by type, department, vertical, transaction and date range
//! - Signed totals grouped by department, vertical or month
//!
//! Amounts are summed as stored; revenue and received commission are positive,
//! expense, payroll and paid commission negative.

pub mod error;
pub mod ledger;
pub mod models;
pub mod reporting;

pub use error::*;
pub use ledger::*;
pub use models::*;
pub use reporting::*;

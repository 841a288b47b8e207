//! Billing engine for agency revenue
//!
//! Turns "invoice issued" events into department revenue on an append-only ledger:
//! - Contract resolution (one active contract per client and date)
//! - Fee calculation with a minimum-fee floor
//! - Largest-remainder split allocation that always sums to the fee
//! - All-or-nothing ledger commits, idempotent by transaction id
//! - Adjustments as new entries referencing the entry they correct

pub mod allocation;
pub mod contracts;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod models;
pub mod repository;
pub mod service;

pub use allocation::*;
pub use contracts::*;
pub use error::*;
pub use fees::*;
pub use ledger::*;
pub use models::*;
pub use service::*;

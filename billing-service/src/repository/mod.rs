//! Storage seams for contracts and the ledger
//!
//! The coordinator only sees these traits. `memory` holds the in-process
//! contract store, `staged` the pending-then-commit ledger used when the
//! backing store cannot append many rows atomically, and `postgres` the
//! sqlx implementations.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::models::{Contract, LedgerEntry, LedgerQuery, NewLedgerEntry};

pub mod memory;
pub mod postgres;
pub mod staged;

pub use memory::MemoryContractRepository;
pub use postgres::{PgContractRepository, PgLedgerRepository};
pub use staged::{FaultPoint, MemoryStagingStore, ReconcileReport, StagedLedgerRepository, StagingHeader, StagingStore};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractRepository: Send + Sync {
    /// Contracts for `client_id` whose effective range contains `as_of`.
    /// All splits of a returned contract come from one consistent read.
    async fn find_active_for_client(&self, client_id: Uuid, as_of: NaiveDate) -> BillingResult<Vec<Contract>>;

    async fn get_contract(&self, contract_id: Uuid) -> BillingResult<Option<Contract>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Append every entry under `transaction_id` or none of them.
    ///
    /// Idempotent: when `transaction_id` is already committed the stored
    /// entries are returned and nothing is written.
    async fn append_transaction(
        &self,
        transaction_id: Uuid,
        entries: &[NewLedgerEntry],
    ) -> BillingResult<Vec<LedgerEntry>>;

    /// Committed entries of a transaction in line order; empty if unknown
    async fn find_transaction(&self, transaction_id: Uuid) -> BillingResult<Vec<LedgerEntry>>;

    async fn get_entry(&self, entry_id: Uuid) -> BillingResult<Option<LedgerEntry>>;

    /// Committed entries matching `query`, ordered by entry date, then
    /// transaction and line
    async fn query_entries(&self, query: &LedgerQuery) -> BillingResult<Vec<LedgerEntry>>;
}

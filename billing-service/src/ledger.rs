use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{resource, BillingError, BillingResult, PersistenceError};
use crate::models::{EntryType, LedgerEntry, NewLedgerEntry};
use crate::repository::LedgerRepository;

/// Reference type written on adjustment entries
pub const ADJUSTMENT_REFERENCE: &str = "ledger_entry";

/// How often and how patiently a transient commit failure is replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// Appends transactions to the ledger. Every write goes through here; the
/// ledger has no update or delete path.
#[derive(Clone)]
pub struct LedgerWriter {
    repository: Arc<dyn LedgerRepository>,
    policy: CommitPolicy,
}

impl LedgerWriter {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self::with_policy(repository, CommitPolicy::default())
    }

    pub fn with_policy(repository: Arc<dyn LedgerRepository>, policy: CommitPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn repository(&self) -> &Arc<dyn LedgerRepository> {
        &self.repository
    }

    /// Reject a batch that could not be stored as complete, well-signed entries.
    ///
    /// # Errors
    ///
    /// `Validation` naming the first offending entry.
    pub fn validate_batch(entries: &[NewLedgerEntry]) -> BillingResult<()> {
        if entries.is_empty() {
            return Err(BillingError::Validation("a transaction needs at least one entry".into()));
        }
        for (index, entry) in entries.iter().enumerate() {
            if !entry.entry_type.accepts_amount(entry.amount) {
                return Err(BillingError::Validation(format!(
                    "entry {index}: amount {} is not valid for a {} entry",
                    entry.amount, entry.entry_type
                )));
            }
            if entry.department_id.is_nil() {
                return Err(BillingError::Validation(format!("entry {index}: department_id is required")));
            }
            if entry.description.trim().is_empty() {
                return Err(BillingError::Validation(format!("entry {index}: description is required")));
            }
            let is_adjustment = entry.entry_type == EntryType::Adjustment;
            if is_adjustment != entry.adjustment_of.is_some() {
                return Err(BillingError::Validation(format!(
                    "entry {index}: adjustment entries, and only they, must reference the entry they correct"
                )));
            }
        }
        Ok(())
    }

    /// Write `entries` under `transaction_id`, all or nothing.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed batch, `Persistence` when the store fails.
    pub async fn commit(&self, transaction_id: Uuid, entries: &[NewLedgerEntry]) -> BillingResult<Vec<LedgerEntry>> {
        Self::validate_batch(entries)?;
        self.repository.append_transaction(transaction_id, entries).await
    }

    /// [`commit`](Self::commit), replaying transient failures with the same
    /// transaction id and exponential backoff.
    ///
    /// # Errors
    ///
    /// The last error once attempts run out, or the first non-retryable one.
    pub async fn commit_with_retry(
        &self,
        transaction_id: Uuid,
        entries: &[NewLedgerEntry],
    ) -> BillingResult<Vec<LedgerEntry>> {
        Self::validate_batch(entries)?;

        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.repository.append_transaction(transaction_id, entries).await {
                Ok(written) => {
                    info!(%transaction_id, entries = written.len(), attempt, "Committed ledger transaction");
                    return Ok(written);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(%transaction_id, attempt, error = %e, "Transient commit failure; replaying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Commit `entries` as a new transaction.
    ///
    /// # Errors
    ///
    /// See [`commit_with_retry`](Self::commit_with_retry).
    pub async fn record_entries(&self, entries: &[NewLedgerEntry]) -> BillingResult<(Uuid, Vec<LedgerEntry>)> {
        let transaction_id = Uuid::new_v4();
        let written = self.commit_with_retry(transaction_id, entries).await?;
        Ok((transaction_id, written))
    }

    /// Correct an entry by appending an adjustment that references it.
    /// The original row is left untouched. Adjusting an adjustment links the
    /// new entry to that adjustment, so corrections form a chain.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown entry, `Validation` for a zero amount,
    /// `Persistence` when the store fails.
    pub async fn append_adjustment(
        &self,
        original_entry_id: Uuid,
        amount: Decimal,
        description: &str,
        entry_date: Option<NaiveDate>,
    ) -> BillingResult<LedgerEntry> {
        let original = self
            .repository
            .get_entry(original_entry_id)
            .await?
            .ok_or_else(|| BillingError::not_found(resource::LEDGER_ENTRY, original_entry_id.to_string()))?;

        let draft = NewLedgerEntry::new(
            EntryType::Adjustment,
            original.department_id(),
            amount,
            entry_date.unwrap_or_else(|| Utc::now().date_naive()),
            description,
        )
        .with_vertical(original.vertical_id())
        .with_reference(ADJUSTMENT_REFERENCE, original_entry_id.to_string())
        .with_metadata(serde_json::json!({
            "original_transaction_id": original.transaction_id(),
            "original_entry_type": original.entry_type(),
            "original_amount": original.amount(),
        }))
        .correcting(original_entry_id);

        let (_, mut written) = self.record_entries(std::slice::from_ref(&draft)).await?;
        written
            .pop()
            .ok_or_else(|| PersistenceError::permanent("store returned no adjustment entry").into())
    }
}

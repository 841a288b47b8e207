use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use billing_service::repository::LedgerRepository;
use billing_service::{resource, LedgerEntry, LedgerQuery};

use crate::error::{AccountingError, AccountingResult};

/// Largest page a single query may return
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Read access to committed ledger entries
#[derive(Clone)]
pub struct LedgerReader {
    repository: Arc<dyn LedgerRepository>,
}

impl LedgerReader {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    /// # Errors
    ///
    /// `Validation` when `from` is after `to`; `Ledger` when the store fails.
    pub async fn entries(&self, query: &LedgerQuery) -> AccountingResult<Vec<LedgerEntry>> {
        check_range(query)?;
        let mut bounded = query.clone();
        bounded.limit = Some(query.limit.map_or(MAX_QUERY_LIMIT, |l| l.min(MAX_QUERY_LIMIT)));

        let entries = self.repository.query_entries(&bounded).await?;
        debug!(count = entries.len(), "Queried ledger entries");
        Ok(entries)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn entry(&self, entry_id: Uuid) -> AccountingResult<LedgerEntry> {
        self.repository
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| AccountingError::NotFound {
                resource: resource::LEDGER_ENTRY,
                detail: entry_id.to_string(),
            })
    }

    /// Entries of one transaction in line order.
    ///
    /// # Errors
    ///
    /// `NotFound` when no committed transaction has this id.
    pub async fn transaction(&self, transaction_id: Uuid) -> AccountingResult<Vec<LedgerEntry>> {
        let entries = self.repository.find_transaction(transaction_id).await?;
        if entries.is_empty() {
            return Err(AccountingError::NotFound {
                resource: resource::TRANSACTION,
                detail: transaction_id.to_string(),
            });
        }
        Ok(entries)
    }
}

pub(crate) fn check_range(query: &LedgerQuery) -> AccountingResult<()> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AccountingError::Validation(format!("from {from} is after to {to}")));
        }
    }
    Ok(())
}

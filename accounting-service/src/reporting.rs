use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use billing_service::repository::LedgerRepository;
use billing_service::{LedgerEntry, LedgerQuery};

use crate::error::AccountingResult;
use crate::ledger::check_range;
use crate::models::{GroupBy, SummaryFilter, SummaryLine};

/// Key used for entries without a vertical
pub const UNASSIGNED_VERTICAL: &str = "unassigned";

/// Signed totals over the ledger
#[derive(Clone)]
pub struct LedgerReports {
    repository: Arc<dyn LedgerRepository>,
}

impl LedgerReports {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    /// Sum every matching entry by `group_by`, ordered by key.
    ///
    /// # Errors
    ///
    /// `Validation` when `from` is after `to`; `Ledger` when the store fails.
    pub async fn summarize(&self, group_by: GroupBy, filter: &SummaryFilter) -> AccountingResult<Vec<SummaryLine>> {
        let query = LedgerQuery {
            entry_type: filter.entry_type,
            from: filter.from,
            to: filter.to,
            ..LedgerQuery::default()
        };
        check_range(&query)?;

        let entries = self.repository.query_entries(&query).await?;
        let lines = summarize_entries(&entries, group_by);
        debug!(%group_by, entries = entries.len(), groups = lines.len(), "Summarized ledger");
        Ok(lines)
    }
}

fn group_key(entry: &LedgerEntry, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Department => entry.department_id().to_string(),
        GroupBy::Vertical => entry
            .vertical_id()
            .map_or_else(|| UNASSIGNED_VERTICAL.to_string(), |v| v.to_string()),
        GroupBy::Month => entry.entry_date().format("%Y-%m").to_string(),
    }
}

/// Group and sum already-fetched entries
pub fn summarize_entries(entries: &[LedgerEntry], group_by: GroupBy) -> Vec<SummaryLine> {
    let mut groups: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for entry in entries {
        let (total, count) = groups.entry(group_key(entry, group_by)).or_default();
        *total += entry.amount();
        *count += 1;
    }
    groups
        .into_iter()
        .map(|(key, (total, entry_count))| SummaryLine {
            key,
            total,
            entry_count,
        })
        .collect()
}

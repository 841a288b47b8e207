//! Staged commit for stores without a multi-row atomic append
//!
//! A transaction is written as a header naming how many rows to expect, then
//! one pending row per entry, then a single commit marker. Only the marker
//! flip makes rows visible to readers. A crash before the flip leaves a header
//! and some pending rows behind; [`StagedLedgerRepository::reconcile`] later
//! finalizes complete stagings and rolls back incomplete ones.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{
    BillingError, BillingResult, EntryFailure, PersistenceError, PersistenceErrorKind,
};
use crate::models::{LedgerEntry, LedgerQuery, NewLedgerEntry};
use crate::repository::LedgerRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingHeader {
    pub transaction_id: Uuid,
    pub expected_entries: usize,
    pub staged_at: DateTime<Utc>,
}

/// Primitive operations of a store that can only make single writes atomic
#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn write_header(&self, header: StagingHeader) -> BillingResult<()>;

    async fn write_pending(&self, entry: LedgerEntry) -> BillingResult<()>;

    /// Atomically publish every pending row of the transaction
    async fn write_commit_marker(&self, transaction_id: Uuid) -> BillingResult<()>;

    /// Drop the header and pending rows of an uncommitted transaction
    async fn discard(&self, transaction_id: Uuid) -> BillingResult<()>;

    /// Headers of transactions staged but not yet committed
    async fn headers(&self) -> BillingResult<Vec<StagingHeader>>;

    async fn header(&self, transaction_id: Uuid) -> BillingResult<Option<StagingHeader>>;

    async fn pending_count(&self, transaction_id: Uuid) -> BillingResult<usize>;

    async fn committed_entries(&self, transaction_id: Uuid) -> BillingResult<Vec<LedgerEntry>>;

    async fn get_committed_entry(&self, entry_id: Uuid) -> BillingResult<Option<LedgerEntry>>;

    async fn scan_committed(&self, query: &LedgerQuery) -> BillingResult<Vec<LedgerEntry>>;
}

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub finalized: Vec<Uuid>,
    pub rolled_back: Vec<Uuid>,
}

/// One lock per transaction id that has an append or reconcile in progress
#[derive(Default)]
struct InFlight {
    slots: parking_lot::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl InFlight {
    async fn acquire(&self, transaction_id: Uuid) -> InFlightGuard<'_> {
        let slot = self.slots.lock().entry(transaction_id).or_default().clone();
        let guard = slot.lock_owned().await;
        InFlightGuard {
            in_flight: self,
            transaction_id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    transaction_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.in_flight.slots.lock();
        // releasing under the map lock keeps the count stable for waiters
        self.guard.take();
        if slots
            .get(&self.transaction_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.transaction_id);
        }
    }
}

pub struct StagedLedgerRepository<S> {
    store: S,
    in_flight: InFlight,
}

impl<S: StagingStore> StagedLedgerRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            in_flight: InFlight::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Finalize or roll back stagings older than `older_than`.
    ///
    /// A staging whose pending rows are all present is committed; anything
    /// short of that is discarded. A transaction with an append in progress
    /// is waited for, then skipped once its header is gone.
    ///
    /// # Errors
    ///
    /// Any store failure; stagings handled before the failure stay handled.
    pub async fn reconcile(&self, older_than: Duration) -> BillingResult<ReconcileReport> {
        let cutoff = Utc::now() - older_than;
        let mut report = ReconcileReport::default();

        for listed in self.store.headers().await? {
            if listed.staged_at > cutoff {
                continue;
            }
            let _slot = self.in_flight.acquire(listed.transaction_id).await;
            let Some(header) = self.store.header(listed.transaction_id).await? else {
                continue;
            };
            if header.staged_at > cutoff {
                continue;
            }
            let pending = self.store.pending_count(header.transaction_id).await?;
            if pending == header.expected_entries && pending > 0 {
                self.store.write_commit_marker(header.transaction_id).await?;
                report.finalized.push(header.transaction_id);
            } else {
                self.store.discard(header.transaction_id).await?;
                report.rolled_back.push(header.transaction_id);
            }
        }

        if !report.finalized.is_empty() || !report.rolled_back.is_empty() {
            info!(
                finalized = report.finalized.len(),
                rolled_back = report.rolled_back.len(),
                "Reconciled staged transactions"
            );
        }
        Ok(report)
    }

    async fn discard_quietly(&self, transaction_id: Uuid) {
        if let Err(e) = self.store.discard(transaction_id).await {
            warn!(%transaction_id, error = %e, "Could not discard staging; left for reconciliation");
        }
    }
}

fn persistence_kind(error: &BillingError) -> PersistenceErrorKind {
    match error {
        BillingError::Persistence(p) => p.kind,
        _ => PersistenceErrorKind::Permanent,
    }
}

#[async_trait]
impl<S: StagingStore> LedgerRepository for StagedLedgerRepository<S> {
    async fn append_transaction(
        &self,
        transaction_id: Uuid,
        entries: &[NewLedgerEntry],
    ) -> BillingResult<Vec<LedgerEntry>> {
        // a concurrent replay of the same id waits here, then sees the commit
        let _slot = self.in_flight.acquire(transaction_id).await;

        let existing = self.store.committed_entries(transaction_id).await?;
        if !existing.is_empty() {
            debug!(%transaction_id, "Transaction already committed; returning stored entries");
            return Ok(existing);
        }
        // leftovers of an earlier attempt under the same id
        self.store.discard(transaction_id).await?;

        let created_at = Utc::now();
        let mut records = Vec::with_capacity(entries.len());
        for (line_no, draft) in (0u32..).zip(entries) {
            records.push(LedgerEntry::from_draft(Uuid::new_v4(), transaction_id, line_no, draft, created_at));
        }

        self.store
            .write_header(StagingHeader {
                transaction_id,
                expected_entries: records.len(),
                staged_at: created_at,
            })
            .await?;

        for (index, record) in records.iter().enumerate() {
            if let Err(e) = self.store.write_pending(record.clone()).await {
                self.discard_quietly(transaction_id).await;
                let failure = EntryFailure {
                    index,
                    department_id: record.department_id(),
                    amount: record.amount(),
                    reason: e.to_string(),
                };
                let message = format!(
                    "entry {index} of {} in transaction {transaction_id} was not written",
                    records.len()
                );
                let error = match persistence_kind(&e) {
                    PersistenceErrorKind::Transient => PersistenceError::transient(message),
                    PersistenceErrorKind::Permanent => PersistenceError::permanent(message),
                };
                return Err(error.with_failures(vec![failure]).into());
            }
        }

        if let Err(e) = self.store.write_commit_marker(transaction_id).await {
            self.discard_quietly(transaction_id).await;
            return Err(e);
        }

        debug!(%transaction_id, entries = records.len(), "Committed staged transaction");
        Ok(records)
    }

    async fn find_transaction(&self, transaction_id: Uuid) -> BillingResult<Vec<LedgerEntry>> {
        self.store.committed_entries(transaction_id).await
    }

    async fn get_entry(&self, entry_id: Uuid) -> BillingResult<Option<LedgerEntry>> {
        self.store.get_committed_entry(entry_id).await
    }

    async fn query_entries(&self, query: &LedgerQuery) -> BillingResult<Vec<LedgerEntry>> {
        self.store.scan_committed(query).await
    }
}

/// Where an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Writing the pending row at this line of any transaction
    Pending { line_no: u32 },
    CommitMarker,
}

#[derive(Debug, Clone)]
struct Fault {
    point: FaultPoint,
    kind: PersistenceErrorKind,
    remaining: u32,
}

#[derive(Default)]
struct StagingState {
    headers: HashMap<Uuid, StagingHeader>,
    pending: HashMap<Uuid, Vec<LedgerEntry>>,
    committed: HashMap<Uuid, Vec<LedgerEntry>>,
    entry_index: HashMap<Uuid, Uuid>,
    faults: Vec<Fault>,
}

impl StagingState {
    fn take_fault(&mut self, point: FaultPoint) -> Option<PersistenceErrorKind> {
        let fault = self
            .faults
            .iter_mut()
            .find(|f| f.point == point && f.remaining > 0)?;
        fault.remaining -= 1;
        Some(fault.kind)
    }
}

fn injected(kind: PersistenceErrorKind, what: &str) -> BillingError {
    let message = format!("injected fault at {what}");
    match kind {
        PersistenceErrorKind::Transient => PersistenceError::transient(message),
        PersistenceErrorKind::Permanent => PersistenceError::permanent(message),
    }
    .into()
}

/// In-memory staging store with optional department checking and fault
/// injection. Backs the server when no database is configured.
#[derive(Default)]
pub struct MemoryStagingStore {
    state: RwLock<StagingState>,
    known_departments: Option<HashSet<Uuid>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject pending rows whose department is not in `departments`, as a
    /// foreign key would
    pub fn with_known_departments(departments: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            state: RwLock::new(StagingState::default()),
            known_departments: Some(departments.into_iter().collect()),
        }
    }

    /// Fail the next `times` writes at `point`
    pub fn inject_fault(&self, point: FaultPoint, kind: PersistenceErrorKind, times: u32) {
        self.state.write().faults.push(Fault {
            point,
            kind,
            remaining: times,
        });
    }

    pub fn clear_faults(&self) {
        self.state.write().faults.clear();
    }

    pub fn committed_transaction_count(&self) -> usize {
        self.state.read().committed.len()
    }

    pub fn committed_entry_count(&self) -> usize {
        self.state.read().entry_index.len()
    }
}

#[async_trait]
impl StagingStore for MemoryStagingStore {
    async fn write_header(&self, header: StagingHeader) -> BillingResult<()> {
        let mut state = self.state.write();
        state.pending.insert(header.transaction_id, Vec::with_capacity(header.expected_entries));
        state.headers.insert(header.transaction_id, header);
        Ok(())
    }

    async fn write_pending(&self, entry: LedgerEntry) -> BillingResult<()> {
        if let Some(known) = &self.known_departments {
            if !known.contains(&entry.department_id()) {
                return Err(PersistenceError::permanent(format!(
                    "unknown department {}",
                    entry.department_id()
                ))
                .into());
            }
        }

        let mut state = self.state.write();
        if let Some(kind) = state.take_fault(FaultPoint::Pending {
            line_no: entry.line_no(),
        }) {
            return Err(injected(kind, "pending write"));
        }
        let transaction_id = entry.transaction_id();
        if !state.headers.contains_key(&transaction_id) {
            return Err(PersistenceError::permanent(format!(
                "no staging header for transaction {transaction_id}"
            ))
            .into());
        }
        state.pending.entry(transaction_id).or_default().push(entry);
        Ok(())
    }

    async fn write_commit_marker(&self, transaction_id: Uuid) -> BillingResult<()> {
        let mut state = self.state.write();
        if let Some(kind) = state.take_fault(FaultPoint::CommitMarker) {
            return Err(injected(kind, "commit marker"));
        }
        if state.headers.remove(&transaction_id).is_none() {
            return Err(PersistenceError::permanent(format!(
                "no staging header for transaction {transaction_id}"
            ))
            .into());
        }
        let mut entries = state.pending.remove(&transaction_id).unwrap_or_default();
        entries.sort_by_key(LedgerEntry::line_no);
        for entry in &entries {
            state.entry_index.insert(entry.id(), transaction_id);
        }
        state.committed.insert(transaction_id, entries);
        Ok(())
    }

    async fn discard(&self, transaction_id: Uuid) -> BillingResult<()> {
        let mut state = self.state.write();
        state.headers.remove(&transaction_id);
        state.pending.remove(&transaction_id);
        Ok(())
    }

    async fn headers(&self) -> BillingResult<Vec<StagingHeader>> {
        Ok(self.state.read().headers.values().cloned().collect())
    }

    async fn header(&self, transaction_id: Uuid) -> BillingResult<Option<StagingHeader>> {
        Ok(self.state.read().headers.get(&transaction_id).cloned())
    }

    async fn pending_count(&self, transaction_id: Uuid) -> BillingResult<usize> {
        Ok(self.state.read().pending.get(&transaction_id).map_or(0, Vec::len))
    }

    async fn committed_entries(&self, transaction_id: Uuid) -> BillingResult<Vec<LedgerEntry>> {
        Ok(self
            .state
            .read()
            .committed
            .get(&transaction_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_committed_entry(&self, entry_id: Uuid) -> BillingResult<Option<LedgerEntry>> {
        let state = self.state.read();
        Ok(state
            .entry_index
            .get(&entry_id)
            .and_then(|tx| state.committed.get(tx))
            .and_then(|entries| entries.iter().find(|e| e.id() == entry_id))
            .cloned())
    }

    async fn scan_committed(&self, query: &LedgerQuery) -> BillingResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .state
            .read()
            .committed
            .values()
            .flatten()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.entry_date()
                .cmp(&b.entry_date())
                .then(a.created_at().cmp(&b.created_at()))
                .then(a.transaction_id().cmp(&b.transaction_id()))
                .then(a.line_no().cmp(&b.line_no()))
        });
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryType;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn drafts(departments: &[Uuid], amount: Decimal) -> Vec<NewLedgerEntry> {
        departments
            .iter()
            .map(|d| NewLedgerEntry::new(EntryType::Revenue, *d, amount, date(), "Invoice INV-1"))
            .collect()
    }

    fn departments(n: u128) -> Vec<Uuid> {
        (1..=n).map(Uuid::from_u128).collect()
    }

    #[tokio::test]
    async fn commit_publishes_all_entries_in_line_order() {
        let repo = StagedLedgerRepository::new(MemoryStagingStore::new());
        let tx = Uuid::new_v4();
        let written = repo.append_transaction(tx, &drafts(&departments(3), dec!(10))).await.unwrap();
        assert_eq!(written.len(), 3);

        let stored = repo.find_transaction(tx).await.unwrap();
        assert_eq!(stored, written);
        let lines: Vec<u32> = stored.iter().map(LedgerEntry::line_no).collect();
        assert_eq!(lines, vec![0, 1, 2]);
        assert!(repo.store().headers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replay_with_same_transaction_id_is_a_no_op() {
        let repo = StagedLedgerRepository::new(MemoryStagingStore::new());
        let tx = Uuid::new_v4();
        let batch = drafts(&departments(2), dec!(5));
        let first = repo.append_transaction(tx, &batch).await.unwrap();
        let second = repo.append_transaction(tx, &batch).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.store().committed_entry_count(), 2);
    }

    /// Yields before every store call so concurrent appends interleave
    struct YieldingStore(MemoryStagingStore);

    #[async_trait]
    impl StagingStore for YieldingStore {
        async fn write_header(&self, header: StagingHeader) -> BillingResult<()> {
            tokio::task::yield_now().await;
            self.0.write_header(header).await
        }

        async fn write_pending(&self, entry: LedgerEntry) -> BillingResult<()> {
            tokio::task::yield_now().await;
            self.0.write_pending(entry).await
        }

        async fn write_commit_marker(&self, transaction_id: Uuid) -> BillingResult<()> {
            tokio::task::yield_now().await;
            self.0.write_commit_marker(transaction_id).await
        }

        async fn discard(&self, transaction_id: Uuid) -> BillingResult<()> {
            tokio::task::yield_now().await;
            self.0.discard(transaction_id).await
        }

        async fn headers(&self) -> BillingResult<Vec<StagingHeader>> {
            self.0.headers().await
        }

        async fn header(&self, transaction_id: Uuid) -> BillingResult<Option<StagingHeader>> {
            self.0.header(transaction_id).await
        }

        async fn pending_count(&self, transaction_id: Uuid) -> BillingResult<usize> {
            self.0.pending_count(transaction_id).await
        }

        async fn committed_entries(&self, transaction_id: Uuid) -> BillingResult<Vec<LedgerEntry>> {
            tokio::task::yield_now().await;
            self.0.committed_entries(transaction_id).await
        }

        async fn get_committed_entry(&self, entry_id: Uuid) -> BillingResult<Option<LedgerEntry>> {
            self.0.get_committed_entry(entry_id).await
        }

        async fn scan_committed(&self, query: &LedgerQuery) -> BillingResult<Vec<LedgerEntry>> {
            self.0.scan_committed(query).await
        }
    }

    #[tokio::test]
    async fn concurrent_appends_of_one_transaction_commit_once() {
        let repo = StagedLedgerRepository::new(YieldingStore(MemoryStagingStore::new()));
        let tx = Uuid::new_v4();
        let batch = drafts(&departments(4), dec!(2));

        let (a, b, c) = tokio::join!(
            repo.append_transaction(tx, &batch),
            repo.append_transaction(tx, &batch),
            repo.append_transaction(tx, &batch)
        );
        let first = assert_ok!(a);
        assert_eq!(assert_ok!(b), first);
        assert_eq!(assert_ok!(c), first);

        assert_eq!(repo.store().0.committed_transaction_count(), 1);
        assert_eq!(repo.store().0.committed_entry_count(), 4);
        assert!(repo.store().headers().await.unwrap().is_empty());
        assert_eq!(repo.in_flight.len(), 0);
    }

    #[tokio::test]
    async fn concurrent_appends_of_different_transactions_do_not_block() {
        let repo = StagedLedgerRepository::new(YieldingStore(MemoryStagingStore::new()));
        let batch = drafts(&departments(2), dec!(2));
        let (a, b) = tokio::join!(
            repo.append_transaction(Uuid::new_v4(), &batch),
            repo.append_transaction(Uuid::new_v4(), &batch)
        );
        assert_ne!(assert_ok!(a)[0].transaction_id(), assert_ok!(b)[0].transaction_id());
        assert_eq!(repo.store().0.committed_transaction_count(), 2);
        assert_eq!(repo.in_flight.len(), 0);
    }

    #[tokio::test]
    async fn failure_on_last_entry_leaves_nothing_visible() {
        let store = MemoryStagingStore::new();
        store.inject_fault(FaultPoint::Pending { line_no: 4 }, PersistenceErrorKind::Permanent, 1);
        let repo = StagedLedgerRepository::new(store);
        let tx = Uuid::new_v4();
        let ids = departments(5);

        let err = repo.append_transaction(tx, &drafts(&ids, dec!(1))).await.unwrap_err();
        match err {
            BillingError::Persistence(p) => {
                assert_eq!(p.kind, PersistenceErrorKind::Permanent);
                assert_eq!(p.failures.len(), 1);
                assert_eq!(p.failures[0].index, 4);
                assert_eq!(p.failures[0].department_id, ids[4]);
                assert_eq!(p.failures[0].amount, dec!(1));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(repo.find_transaction(tx).await.unwrap().is_empty());
        assert!(repo.query_entries(&LedgerQuery::default()).await.unwrap().is_empty());
        assert!(repo.store().headers().await.unwrap().is_empty());
        assert_eq!(repo.store().pending_count(tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transient_commit_marker_failure_is_retryable() {
        let store = MemoryStagingStore::new();
        store.inject_fault(FaultPoint::CommitMarker, PersistenceErrorKind::Transient, 1);
        let repo = StagedLedgerRepository::new(store);
        let tx = Uuid::new_v4();
        let batch = drafts(&departments(2), dec!(3));

        let err = assert_err!(repo.append_transaction(tx, &batch).await);
        assert!(err.is_retryable());
        assert!(repo.find_transaction(tx).await.unwrap().is_empty());

        let entries = assert_ok!(repo.append_transaction(tx, &batch).await);
        assert_eq!(entries.len(), 2);
        assert_eq!(repo.store().committed_transaction_count(), 1);
    }

    #[tokio::test]
    async fn unknown_department_is_permanent() {
        let known = departments(2);
        let repo = StagedLedgerRepository::new(MemoryStagingStore::with_known_departments(known.clone()));
        let mut ids = known;
        ids.push(Uuid::new_v4());

        let err = repo.append_transaction(Uuid::new_v4(), &drafts(&ids, dec!(1))).await.unwrap_err();
        assert!(!err.is_retryable());
        match err {
            BillingError::Persistence(p) => assert_eq!(p.failures[0].index, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repo.store().committed_entry_count(), 0);
    }

    #[tokio::test]
    async fn reconcile_finalizes_complete_and_rolls_back_partial_stagings() {
        let repo = StagedLedgerRepository::new(MemoryStagingStore::new());
        let store = repo.store();
        let staged_at = Utc::now() - Duration::minutes(10);

        // complete staging whose commit marker never landed
        let complete = Uuid::new_v4();
        store
            .write_header(StagingHeader { transaction_id: complete, expected_entries: 2, staged_at })
            .await
            .unwrap();
        for (line_no, draft) in (0u32..).zip(drafts(&departments(2), dec!(7)).iter()) {
            store
                .write_pending(LedgerEntry::from_draft(Uuid::new_v4(), complete, line_no, draft, staged_at))
                .await
                .unwrap();
        }

        // crashed after one of three rows
        let partial = Uuid::new_v4();
        store
            .write_header(StagingHeader { transaction_id: partial, expected_entries: 3, staged_at })
            .await
            .unwrap();
        let first = drafts(&departments(1), dec!(7));
        store
            .write_pending(LedgerEntry::from_draft(Uuid::new_v4(), partial, 0, &first[0], staged_at))
            .await
            .unwrap();

        // too recent to touch
        let fresh = Uuid::new_v4();
        store
            .write_header(StagingHeader { transaction_id: fresh, expected_entries: 1, staged_at: Utc::now() })
            .await
            .unwrap();

        let report = repo.reconcile(Duration::minutes(5)).await.unwrap();
        assert_eq!(report.finalized, vec![complete]);
        assert_eq!(report.rolled_back, vec![partial]);

        assert_eq!(repo.find_transaction(complete).await.unwrap().len(), 2);
        assert!(repo.find_transaction(partial).await.unwrap().is_empty());
        assert_eq!(store.headers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn query_filters_and_limits() {
        let repo = StagedLedgerRepository::new(MemoryStagingStore::new());
        let ids = departments(2);
        repo.append_transaction(Uuid::new_v4(), &drafts(&ids, dec!(4))).await.unwrap();
        let expense = NewLedgerEntry::new(EntryType::Expense, ids[0], dec!(-2), date(), "Stock photos");
        repo.append_transaction(Uuid::new_v4(), &[expense]).await.unwrap();

        let by_dept = LedgerQuery { department_id: Some(ids[0]), ..Default::default() };
        let rows = repo.query_entries(&by_dept).await.unwrap();
        assert_eq!(rows.len(), 2);
        let total: Decimal = rows.iter().map(LedgerEntry::amount).sum();
        assert_eq!(total, dec!(2));

        let revenue = LedgerQuery { entry_type: Some(EntryType::Revenue), limit: Some(1), ..Default::default() };
        assert_eq!(repo.query_entries(&revenue).await.unwrap().len(), 1);

        let entry_id = rows[0].id();
        assert_eq!(repo.get_entry(entry_id).await.unwrap().map(|e| e.id()), Some(entry_id));
        assert!(repo.get_entry(Uuid::new_v4()).await.unwrap().is_none());
    }
}

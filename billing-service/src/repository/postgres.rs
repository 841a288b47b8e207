//! PostgreSQL repositories
//!
//! Contract reads run in a `REPEATABLE READ READ ONLY` transaction so a
//! contract and its splits come from one snapshot. Ledger appends take a
//! transaction-scoped advisory lock on the ledger transaction id, return the
//! stored rows when the id is already present, and otherwise insert every
//! row inside a single database transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use database_layer::{DatabaseError, TransactionManager};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult, EntryFailure, PersistenceError};
use crate::models::{Contract, DepartmentSplit, EntryType, LedgerEntry, LedgerQuery, NewLedgerEntry};
use crate::repository::{ContractRepository, LedgerRepository};

const CONTRACT_COLUMNS: &str = "c.id, c.client_id, c.client_name, c.name, c.vertical_id, \
     v.name AS vertical_name, c.effective_from, c.effective_to, c.fee_percentage, c.minimum_fee";

const ENTRY_COLUMNS: &str = "id, transaction_id, line_no, entry_type, department_id, vertical_id, \
     amount, entry_date, description, reference_type, reference_id, metadata, is_adjustment, \
     adjustment_of, created_at";

#[derive(Debug, FromRow)]
struct ContractRow {
    id: Uuid,
    client_id: Uuid,
    client_name: String,
    name: String,
    vertical_id: Option<Uuid>,
    vertical_name: Option<String>,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
    fee_percentage: Decimal,
    minimum_fee: Decimal,
}

#[derive(Debug, FromRow)]
struct SplitRow {
    contract_id: Uuid,
    department_id: Uuid,
    department_name: String,
    split_percentage: Decimal,
}

#[derive(Debug, FromRow)]
struct LedgerEntryRow {
    id: Uuid,
    transaction_id: Uuid,
    line_no: i32,
    entry_type: String,
    department_id: Uuid,
    vertical_id: Option<Uuid>,
    amount: Decimal,
    entry_date: NaiveDate,
    description: String,
    reference_type: String,
    reference_id: String,
    metadata: serde_json::Value,
    is_adjustment: bool,
    adjustment_of: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = BillingError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        let entry_type: EntryType = row
            .entry_type
            .parse()
            .map_err(|_| PersistenceError::permanent(format!("stored entry {} has type {}", row.id, row.entry_type)))?;
        let line_no = u32::try_from(row.line_no)
            .map_err(|_| PersistenceError::permanent(format!("stored entry {} has line {}", row.id, row.line_no)))?;

        Ok(LedgerEntry {
            id: row.id,
            entry_type,
            transaction_id: row.transaction_id,
            line_no,
            department_id: row.department_id,
            vertical_id: row.vertical_id,
            amount: row.amount,
            entry_date: row.entry_date,
            description: row.description,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            metadata: row.metadata,
            is_adjustment: row.is_adjustment,
            adjustment_of: row.adjustment_of,
            created_at: row.created_at,
        })
    }
}

/// `NUMERIC` columns come back at the column scale; show amounts at the
/// ledger's minor unit, keeping any finer digits a row really has
fn at_minor_unit(amount: Decimal, minor_unit_scale: u32) -> Decimal {
    let mut amount = amount.normalize();
    if amount.scale() < minor_unit_scale {
        amount.rescale(minor_unit_scale);
    }
    amount
}

fn db(error: sqlx::Error) -> BillingError {
    DatabaseError::classify(error).into()
}

#[derive(Clone)]
pub struct PgContractRepository {
    transactions: TransactionManager,
}

impl PgContractRepository {
    pub fn new(transactions: TransactionManager) -> Self {
        Self { transactions }
    }

    async fn load(&self, filter: ContractFilter) -> BillingResult<Vec<Contract>> {
        let mut tx = self.transactions.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        let base = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts c LEFT JOIN verticals v ON v.id = c.vertical_id WHERE "
        );
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(base);
        match filter {
            ContractFilter::Id(id) => {
                query.push("c.id = ").push_bind(id);
            }
            ContractFilter::ActiveFor { client_id, as_of } => {
                query
                    .push("c.client_id = ")
                    .push_bind(client_id)
                    .push(" AND c.effective_from <= ")
                    .push_bind(as_of)
                    .push(" AND (c.effective_to IS NULL OR c.effective_to > ")
                    .push_bind(as_of)
                    .push(")");
            }
        }
        let rows: Vec<ContractRow> = query.build_query_as().fetch_all(&mut *tx).await.map_err(db)?;
        if rows.is_empty() {
            tx.commit().await.map_err(db)?;
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let split_rows: Vec<SplitRow> = sqlx::query_as(
            "SELECT s.contract_id, s.department_id, d.name AS department_name, s.split_percentage \
             FROM contract_department_splits s JOIN departments d ON d.id = s.department_id \
             WHERE s.contract_id = ANY($1) ORDER BY s.contract_id, s.position",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;
        tx.commit().await.map_err(db)?;

        let mut splits: HashMap<Uuid, Vec<DepartmentSplit>> = HashMap::new();
        for row in split_rows {
            splits.entry(row.contract_id).or_default().push(DepartmentSplit {
                department_id: row.department_id,
                department_name: row.department_name,
                split_percentage: row.split_percentage.normalize(),
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Contract {
                splits: splits.remove(&row.id).unwrap_or_default(),
                id: row.id,
                client_id: row.client_id,
                client_name: row.client_name,
                name: row.name,
                vertical_id: row.vertical_id,
                vertical_name: row.vertical_name,
                effective_from: row.effective_from,
                effective_to: row.effective_to,
                fee_percentage: row.fee_percentage.normalize(),
                minimum_fee: row.minimum_fee.normalize(),
            })
            .collect())
    }
}

enum ContractFilter {
    Id(Uuid),
    ActiveFor { client_id: Uuid, as_of: NaiveDate },
}

#[async_trait]
impl ContractRepository for PgContractRepository {
    async fn find_active_for_client(&self, client_id: Uuid, as_of: NaiveDate) -> BillingResult<Vec<Contract>> {
        self.load(ContractFilter::ActiveFor { client_id, as_of }).await
    }

    async fn get_contract(&self, contract_id: Uuid) -> BillingResult<Option<Contract>> {
        Ok(self.load(ContractFilter::Id(contract_id)).await?.into_iter().next())
    }
}

#[derive(Clone)]
pub struct PgLedgerRepository {
    transactions: TransactionManager,
    minor_unit_scale: u32,
}

impl PgLedgerRepository {
    pub fn new(transactions: TransactionManager) -> Self {
        Self {
            transactions,
            minor_unit_scale: 2,
        }
    }

    /// Decimal places amounts are reported with
    #[must_use]
    pub fn with_minor_unit_scale(mut self, minor_unit_scale: u32) -> Self {
        self.minor_unit_scale = minor_unit_scale;
        self
    }

    fn entry(&self, row: LedgerEntryRow) -> BillingResult<LedgerEntry> {
        let mut entry = LedgerEntry::try_from(row)?;
        entry.amount = at_minor_unit(entry.amount, self.minor_unit_scale);
        Ok(entry)
    }

    fn entries(&self, rows: Vec<LedgerEntryRow>) -> BillingResult<Vec<LedgerEntry>> {
        rows.into_iter().map(|row| self.entry(row)).collect()
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn append_transaction(
        &self,
        transaction_id: Uuid,
        entries: &[NewLedgerEntry],
    ) -> BillingResult<Vec<LedgerEntry>> {
        let mut tx = self.transactions.begin().await?;

        // serializes replays of the same transaction id
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(transaction_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        let existing: Vec<LedgerEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE transaction_id = $1 ORDER BY line_no"
        ))
        .bind(transaction_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;
        if !existing.is_empty() {
            tx.commit().await.map_err(db)?;
            debug!(%transaction_id, "Transaction already committed; returning stored entries");
            return self.entries(existing);
        }

        let insert = format!(
            "INSERT INTO ledger_entries ({ENTRY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {ENTRY_COLUMNS}"
        );
        let created_at = Utc::now();
        let mut rows = Vec::with_capacity(entries.len());
        for (index, draft) in entries.iter().enumerate() {
            let line_no = i32::try_from(index)
                .map_err(|_| PersistenceError::permanent("too many entries in one transaction"))?;
            let result = sqlx::query_as::<_, LedgerEntryRow>(&insert)
                .bind(Uuid::new_v4())
                .bind(transaction_id)
                .bind(line_no)
                .bind(draft.entry_type.as_str())
                .bind(draft.department_id)
                .bind(draft.vertical_id)
                .bind(draft.amount)
                .bind(draft.entry_date)
                .bind(&draft.description)
                .bind(&draft.reference_type)
                .bind(&draft.reference_id)
                .bind(&draft.metadata)
                .bind(draft.adjustment_of.is_some())
                .bind(draft.adjustment_of)
                .bind(created_at)
                .fetch_one(&mut *tx)
                .await;

            match result {
                Ok(row) => rows.push(row),
                Err(e) => {
                    let cause = DatabaseError::classify(e);
                    warn!(%transaction_id, index, error = %cause, "Ledger insert failed; rolling back");
                    let failure = EntryFailure {
                        index,
                        department_id: draft.department_id,
                        amount: draft.amount,
                        reason: cause.to_string(),
                    };
                    let message = format!(
                        "entry {index} of {} in transaction {transaction_id} was not written",
                        entries.len()
                    );
                    let error = if cause.is_transient() {
                        PersistenceError::transient(message)
                    } else {
                        PersistenceError::permanent(message)
                    };
                    // dropping `tx` rolls back every row inserted so far
                    drop(tx);
                    return Err(error.with_failures(vec![failure]).into());
                }
            }
        }

        tx.commit().await.map_err(db)?;
        self.entries(rows)
    }

    async fn find_transaction(&self, transaction_id: Uuid) -> BillingResult<Vec<LedgerEntry>> {
        let rows: Vec<LedgerEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE transaction_id = $1 ORDER BY line_no"
        ))
        .bind(transaction_id)
        .fetch_all(self.transactions.pool().pool())
        .await
        .map_err(db)?;
        self.entries(rows)
    }

    async fn get_entry(&self, entry_id: Uuid) -> BillingResult<Option<LedgerEntry>> {
        let row: Option<LedgerEntryRow> =
            sqlx::query_as(&format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = $1"))
                .bind(entry_id)
                .fetch_optional(self.transactions.pool().pool())
                .await
                .map_err(db)?;
        row.map(|row| self.entry(row)).transpose()
    }

    async fn query_entries(&self, query: &LedgerQuery) -> BillingResult<Vec<LedgerEntry>> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE TRUE"));
        if let Some(entry_type) = query.entry_type {
            builder.push(" AND entry_type = ").push_bind(entry_type.as_str());
        }
        if let Some(department_id) = query.department_id {
            builder.push(" AND department_id = ").push_bind(department_id);
        }
        if let Some(vertical_id) = query.vertical_id {
            builder.push(" AND vertical_id = ").push_bind(vertical_id);
        }
        if let Some(transaction_id) = query.transaction_id {
            builder.push(" AND transaction_id = ").push_bind(transaction_id);
        }
        if let Some(from) = query.from {
            builder.push(" AND entry_date >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND entry_date <= ").push_bind(to);
        }
        builder.push(" ORDER BY entry_date, created_at, transaction_id, line_no");
        if let Some(limit) = query.limit {
            builder
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<LedgerEntryRow> = builder
            .build_query_as()
            .fetch_all(self.transactions.pool().pool())
            .await
            .map_err(db)?;
        self.entries(rows)
    }
}

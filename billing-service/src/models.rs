use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BillingError;

/// A client's fee terms and department split table for a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub name: String,
    #[serde(default)]
    pub vertical_id: Option<Uuid>,
    #[serde(default)]
    pub vertical_name: Option<String>,
    pub effective_from: NaiveDate,
    /// Exclusive end; `None` means open-ended
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    pub fee_percentage: Decimal,
    pub minimum_fee: Decimal,
    pub splits: Vec<DepartmentSplit>,
}

impl Contract {
    /// Whether `[effective_from, effective_to)` contains `date`
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.map_or(true, |to| date < to)
    }

    /// Whether both contracts are active on at least one common date
    pub fn overlaps(&self, other: &Contract) -> bool {
        let starts_before_other_ends = other.effective_to.map_or(true, |to| self.effective_from < to);
        let other_starts_before_end = self.effective_to.map_or(true, |to| other.effective_from < to);
        starts_before_other_ends && other_starts_before_end
    }

    pub fn split_total(&self) -> Decimal {
        self.splits.iter().map(|s| s.split_percentage).sum()
    }

    /// `(department_id, split_percentage)` pairs in split order
    pub fn split_table(&self) -> Vec<(Uuid, Decimal)> {
        self.splits
            .iter()
            .map(|s| (s.department_id, s.split_percentage))
            .collect()
    }
}

/// A department's percentage share of a contract's fee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentSplit {
    pub department_id: Uuid,
    pub department_name: String,
    pub split_percentage: Decimal,
}

/// Kind of ledger fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Revenue,
    Expense,
    Payroll,
    Commission,
    Adjustment,
}

impl EntryType {
    pub const ALL: [EntryType; 5] = [
        EntryType::Revenue,
        EntryType::Expense,
        EntryType::Payroll,
        EntryType::Commission,
        EntryType::Adjustment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Revenue => "revenue",
            EntryType::Expense => "expense",
            EntryType::Payroll => "payroll",
            EntryType::Commission => "commission",
            EntryType::Adjustment => "adjustment",
        }
    }

    /// Sign convention: revenue is positive, expense and payroll negative,
    /// commission and adjustment either sign. Zero is never a ledger fact.
    pub fn accepts_amount(self, amount: Decimal) -> bool {
        if amount.is_zero() {
            return false;
        }
        match self {
            EntryType::Revenue => amount > Decimal::ZERO,
            EntryType::Expense | EntryType::Payroll => amount < Decimal::ZERO,
            EntryType::Commission | EntryType::Adjustment => true,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| BillingError::Validation(format!("unknown entry type: {s}")))
    }
}

/// Immutable ledger fact. Built only by ledger stores; there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub(crate) id: Uuid,
    pub(crate) entry_type: EntryType,
    pub(crate) transaction_id: Uuid,
    pub(crate) line_no: u32,
    pub(crate) department_id: Uuid,
    pub(crate) vertical_id: Option<Uuid>,
    pub(crate) amount: Decimal,
    pub(crate) entry_date: NaiveDate,
    pub(crate) description: String,
    pub(crate) reference_type: String,
    pub(crate) reference_id: String,
    pub(crate) metadata: serde_json::Value,
    pub(crate) is_adjustment: bool,
    pub(crate) adjustment_of: Option<Uuid>,
    pub(crate) created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub(crate) fn from_draft(
        id: Uuid,
        transaction_id: Uuid,
        line_no: u32,
        draft: &NewLedgerEntry,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            entry_type: draft.entry_type,
            transaction_id,
            line_no,
            department_id: draft.department_id,
            vertical_id: draft.vertical_id,
            amount: draft.amount,
            entry_date: draft.entry_date,
            description: draft.description.clone(),
            reference_type: draft.reference_type.clone(),
            reference_id: draft.reference_id.clone(),
            metadata: draft.metadata.clone(),
            is_adjustment: draft.adjustment_of.is_some(),
            adjustment_of: draft.adjustment_of,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    /// Position within the transaction, starting at 0
    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn department_id(&self) -> Uuid {
        self.department_id
    }

    pub fn vertical_id(&self) -> Option<Uuid> {
        self.vertical_id
    }

    /// Signed amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn reference_type(&self) -> &str {
        &self.reference_type
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn is_adjustment(&self) -> bool {
        self.is_adjustment
    }

    pub fn adjustment_of(&self) -> Option<Uuid> {
        self.adjustment_of
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Specification of an entry to append; the transaction id is supplied by the writer
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub entry_type: EntryType,
    pub department_id: Uuid,
    pub vertical_id: Option<Uuid>,
    pub amount: Decimal,
    pub entry_date: NaiveDate,
    pub description: String,
    pub reference_type: String,
    pub reference_id: String,
    pub metadata: serde_json::Value,
    /// Set only for `EntryType::Adjustment`
    pub adjustment_of: Option<Uuid>,
}

impl NewLedgerEntry {
    pub fn new(
        entry_type: EntryType,
        department_id: Uuid,
        amount: Decimal,
        entry_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            entry_type,
            department_id,
            vertical_id: None,
            amount,
            entry_date,
            description: description.into(),
            reference_type: String::new(),
            reference_id: String::new(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            adjustment_of: None,
        }
    }

    pub fn with_vertical(mut self, vertical_id: Option<Uuid>) -> Self {
        self.vertical_id = vertical_id;
        self
    }

    pub fn with_reference(mut self, reference_type: impl Into<String>, reference_id: impl Into<String>) -> Self {
        self.reference_type = reference_type.into();
        self.reference_id = reference_id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn correcting(mut self, original_entry_id: Uuid) -> Self {
        self.adjustment_of = Some(original_entry_id);
        self
    }
}

/// Filters for the ledger read surface. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerQuery {
    pub entry_type: Option<EntryType>,
    pub department_id: Option<Uuid>,
    pub vertical_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl LedgerQuery {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.entry_type.map_or(true, |t| entry.entry_type == t)
            && self.department_id.map_or(true, |d| entry.department_id == d)
            && self.vertical_id.map_or(true, |v| entry.vertical_id == Some(v))
            && self.transaction_id.map_or(true, |t| entry.transaction_id == t)
            && self.from.map_or(true, |from| entry.entry_date >= from)
            && self.to.map_or(true, |to| entry.entry_date <= to)
    }
}

/// How an inbound invoice names its contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "id", rename_all = "snake_case")]
pub enum ContractRef {
    Contract(Uuid),
    Client(Uuid),
}

/// "Invoice issued" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceEvent {
    pub contract: ContractRef,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub base_amount: Decimal,
    pub client_name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Receipt returned once an invoice's entries are committed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceReceipt {
    pub transaction_id: Uuid,
    pub invoice: InvoiceSummary,
    pub splits: Vec<SplitAllocation>,
    pub ledger_entries: Vec<EntrySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSummary {
    pub invoice_number: String,
    pub base_amount: Decimal,
    pub fee_percentage: Decimal,
    pub minimum_fee: Decimal,
    pub fee_amount: Decimal,
    pub minimum_fee_applied: bool,
    pub client: String,
    pub contract: String,
    pub vertical: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitAllocation {
    pub department_id: Uuid,
    pub department_name: String,
    pub split_percentage: Decimal,
    pub split_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub entry_id: Uuid,
    pub department_id: Uuid,
    pub amount: Decimal,
    pub description: String,
}

impl From<&LedgerEntry> for EntrySummary {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            entry_id: entry.id,
            department_id: entry.department_id,
            amount: entry.amount,
            description: entry.description.clone(),
        }
    }
}

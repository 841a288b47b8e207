//! Invoice event handling
//!
//! One inbound invoice runs through
//! `received → resolving_contract → computing_fee → allocating_splits →
//! validating → committing → committed | failed`. Everything before
//! `committing` is a read or pure computation, so an event dropped there
//! leaves no trace. The commit runs on its own task and completes even if the
//! caller goes away.
//!
//! The ledger transaction id is derived from the contract and the invoice
//! number, so a resent invoice lands on the transaction the first attempt
//! wrote (or started) and the ledger returns those entries instead of booking
//! the invoice again.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, Span};
use uuid::Uuid;

use crate::allocation::{Allocation, SplitAllocator};
use crate::contracts::{ContractResolver, DEFAULT_SPLIT_TOLERANCE};
use crate::error::{BillingError, BillingResult, PersistenceError};
use crate::fees::{FeeBreakdown, FeeCalculator};
use crate::ledger::{CommitPolicy, LedgerWriter};
use crate::models::{
    Contract, EntrySummary, EntryType, InvoiceEvent, InvoiceReceipt, InvoiceSummary, LedgerEntry, NewLedgerEntry,
    SplitAllocation,
};
use crate::repository::{ContractRepository, LedgerRepository};

/// Reference type written on invoice revenue entries
pub const INVOICE_REFERENCE: &str = "invoice";

/// Name-based UUID namespace for invoice transaction ids
const INVOICE_NAMESPACE: Uuid = Uuid::from_u128(0x5b1e_d6e2_4c0a_4f7e_9a53_2d8c_61f0_b7a4);

/// Ledger transaction id of an invoice booked under `contract_id`.
///
/// Stable across replays of the same invoice, distinct across contracts.
pub fn invoice_transaction_id(contract_id: Uuid, invoice_number: &str) -> Uuid {
    let name = format!("{contract_id}/{}", invoice_number.trim());
    Uuid::new_v5(&INVOICE_NAMESPACE, name.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Received,
    ResolvingContract,
    ComputingFee,
    AllocatingSplits,
    Validating,
    Committing,
    Committed,
    Failed,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Received => "received",
            ProcessingStage::ResolvingContract => "resolving_contract",
            ProcessingStage::ComputingFee => "computing_fee",
            ProcessingStage::AllocatingSplits => "allocating_splits",
            ProcessingStage::Validating => "validating",
            ProcessingStage::Committing => "committing",
            ProcessingStage::Committed => "committed",
            ProcessingStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Decimal places of the ledger's minor currency unit
    pub minor_unit_scale: u32,
    /// Allowed drift of a split table from 100 and of an allocation from the fee
    pub split_tolerance: Decimal,
    pub commit: CommitPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            minor_unit_scale: 2,
            split_tolerance: DEFAULT_SPLIT_TOLERANCE,
            commit: CommitPolicy::default(),
        }
    }
}

/// Turns invoice events into committed revenue transactions
#[derive(Clone)]
pub struct TransactionCoordinator {
    resolver: ContractResolver,
    fees: FeeCalculator,
    allocator: SplitAllocator,
    writer: LedgerWriter,
    split_tolerance: Decimal,
}

impl TransactionCoordinator {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        ledger: Arc<dyn LedgerRepository>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            resolver: ContractResolver::new(contracts),
            fees: FeeCalculator::new(settings.minor_unit_scale),
            allocator: SplitAllocator::new(settings.minor_unit_scale),
            writer: LedgerWriter::with_policy(ledger, settings.commit),
            split_tolerance: settings.split_tolerance,
        }
    }

    pub fn writer(&self) -> &LedgerWriter {
        &self.writer
    }

    /// Process one invoice event into a committed revenue transaction.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed event or a zero fee
    /// - `NotFound` / `ContractConflict` from contract resolution
    /// - `Allocation` when the split table or the allocation is inconsistent
    /// - `Persistence` from the commit
    #[instrument(
        name = "process_invoice",
        skip(self, event),
        fields(invoice_number = %event.invoice_number, transaction_id = tracing::field::Empty)
    )]
    pub async fn process_invoice(&self, event: InvoiceEvent) -> BillingResult<InvoiceReceipt> {
        let result = self.run(event).await;
        if let Err(e) = &result {
            error!(stage = %ProcessingStage::Failed, code = e.code(), error = %e, "Invoice processing failed");
        }
        result
    }

    async fn run(&self, event: InvoiceEvent) -> BillingResult<InvoiceReceipt> {
        debug!(stage = %ProcessingStage::Received);
        validate_event(&event)?;

        debug!(stage = %ProcessingStage::ResolvingContract);
        let contract = self.resolver.resolve_ref(event.contract, event.invoice_date).await?;

        debug!(stage = %ProcessingStage::ComputingFee, contract_id = %contract.id);
        let fee = self
            .fees
            .calculate(event.base_amount, contract.fee_percentage, contract.minimum_fee)?;
        if fee.fee_amount.is_zero() {
            return Err(BillingError::Validation(format!(
                "invoice {} produces a zero fee under contract {}",
                event.invoice_number, contract.id
            )));
        }

        debug!(stage = %ProcessingStage::AllocatingSplits, fee = %fee.fee_amount);
        let split_total = contract.split_total();
        if (split_total - Decimal::ONE_HUNDRED).abs() > self.split_tolerance {
            return Err(BillingError::allocation(
                format!("contract {} splits sum to {split_total}, expected 100", contract.id),
                fee.fee_amount,
                Decimal::ZERO,
            ));
        }
        let allocations = self.allocator.allocate(fee.fee_amount, &contract.split_table())?;

        debug!(stage = %ProcessingStage::Validating);
        let allocated_total: Decimal = allocations.iter().map(|a| a.amount).sum();
        if (allocated_total - fee.fee_amount).abs() > self.split_tolerance {
            return Err(BillingError::allocation(
                "allocated shares drifted from the fee",
                fee.fee_amount,
                allocated_total,
            ));
        }

        let transaction_id = invoice_transaction_id(contract.id, &event.invoice_number);
        Span::current().record("transaction_id", tracing::field::display(transaction_id));
        let entries = build_entries(&event, &contract, &fee, &allocations);
        if entries.is_empty() {
            return Err(BillingError::allocation(
                "no department received a share of the fee",
                fee.fee_amount,
                allocated_total,
            ));
        }

        debug!(stage = %ProcessingStage::Committing, entries = entries.len());
        let writer = self.writer.clone();
        // detached so a dropped request cannot stop a half-finished write
        let written = tokio::spawn(async move { writer.commit_with_retry(transaction_id, &entries).await })
            .await
            .map_err(|e| PersistenceError::permanent(format!("commit task failed: {e}")))??;
        check_replay(&event, &written, &allocations)?;

        info!(
            stage = %ProcessingStage::Committed,
            %transaction_id,
            contract_id = %contract.id,
            fee = %fee.fee_amount,
            entries = written.len(),
            "Invoice committed"
        );
        Ok(receipt(transaction_id, &event, &contract, &fee, &allocations, &written))
    }
}

fn validate_event(event: &InvoiceEvent) -> BillingResult<()> {
    if event.invoice_number.trim().is_empty() {
        return Err(BillingError::Validation("invoice_number is required".into()));
    }
    if event.base_amount <= Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "base_amount must be positive, got {}",
            event.base_amount
        )));
    }
    if let Some(metadata) = &event.metadata {
        if !metadata.is_object() {
            return Err(BillingError::Validation("metadata must be a JSON object".into()));
        }
    }
    Ok(())
}

/// A replay returns the entries first written under the id; they must carry
/// the amounts this event allocates.
fn check_replay(event: &InvoiceEvent, written: &[LedgerEntry], allocations: &[Allocation]) -> BillingResult<()> {
    let expected = allocations
        .iter()
        .filter(|a| !a.amount.is_zero())
        .map(|a| (a.department_id, a.amount));
    let stored = written.iter().map(|e| (e.department_id(), e.amount()));
    if expected.ne(stored) {
        return Err(BillingError::Validation(format!(
            "invoice {} was already booked with different amounts",
            event.invoice_number
        )));
    }
    Ok(())
}

fn build_entries(
    event: &InvoiceEvent,
    contract: &Contract,
    fee: &FeeBreakdown,
    allocations: &[Allocation],
) -> Vec<NewLedgerEntry> {
    let client = event.client_name.as_deref().unwrap_or(&contract.client_name);
    let description = event
        .description
        .clone()
        .unwrap_or_else(|| format!("Invoice {} - {client}", event.invoice_number));

    contract
        .splits
        .iter()
        .zip(allocations)
        .filter(|(_, allocation)| !allocation.amount.is_zero())
        .map(|(split, allocation)| {
            let mut metadata = serde_json::json!({
                "invoice_number": event.invoice_number,
                "contract_id": contract.id,
                "client_id": contract.client_id,
                "client_name": client,
                "base_amount": fee.base_amount,
                "fee_amount": fee.fee_amount,
                "split_percentage": split.split_percentage,
            });
            if let (Some(extra), Some(map)) = (&event.metadata, metadata.as_object_mut()) {
                map.insert("invoice_metadata".into(), extra.clone());
            }
            NewLedgerEntry::new(
                EntryType::Revenue,
                allocation.department_id,
                allocation.amount,
                event.invoice_date,
                format!("{description} ({})", split.department_name),
            )
            .with_vertical(contract.vertical_id)
            .with_reference(INVOICE_REFERENCE, event.invoice_number.clone())
            .with_metadata(metadata)
        })
        .collect()
}

fn receipt(
    transaction_id: Uuid,
    event: &InvoiceEvent,
    contract: &Contract,
    fee: &FeeBreakdown,
    allocations: &[Allocation],
    written: &[LedgerEntry],
) -> InvoiceReceipt {
    InvoiceReceipt {
        transaction_id,
        invoice: InvoiceSummary {
            invoice_number: event.invoice_number.clone(),
            base_amount: fee.base_amount,
            fee_percentage: fee.fee_percentage,
            minimum_fee: fee.minimum_fee,
            fee_amount: fee.fee_amount,
            minimum_fee_applied: fee.minimum_applied,
            client: event.client_name.clone().unwrap_or_else(|| contract.client_name.clone()),
            contract: contract.name.clone(),
            vertical: contract.vertical_name.clone(),
        },
        splits: contract
            .splits
            .iter()
            .zip(allocations)
            .map(|(split, allocation)| SplitAllocation {
                department_id: split.department_id,
                department_name: split.department_name.clone(),
                split_percentage: split.split_percentage,
                split_amount: allocation.amount,
            })
            .collect(),
        ledger_entries: written.iter().map(EntrySummary::from).collect(),
    }
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{resource, BillingError, BillingResult};
use crate::models::{Contract, ContractRef};
use crate::repository::ContractRepository;

/// Default tolerance for a split table summing to 100
pub const DEFAULT_SPLIT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Check a contract's terms and split table: fee percentage within 0-100,
/// a non-negative minimum fee, a sane date range, and at least one
/// department with a share in (0, 100] listed once. The split total is
/// checked separately by [`check_contract`].
///
/// # Errors
///
/// `Validation` describing the first problem found.
pub fn check_terms(contract: &Contract) -> BillingResult<()> {
    if contract.splits.is_empty() {
        return Err(BillingError::Validation(format!(
            "contract {} has no department splits",
            contract.id
        )));
    }
    if contract.fee_percentage.is_sign_negative() || contract.minimum_fee.is_sign_negative() {
        return Err(BillingError::Validation(format!(
            "contract {} has a negative fee term",
            contract.id
        )));
    }
    if contract.fee_percentage > Decimal::ONE_HUNDRED {
        return Err(BillingError::Validation(format!(
            "contract {} fee percentage {} exceeds 100",
            contract.id, contract.fee_percentage
        )));
    }
    if let Some(to) = contract.effective_to {
        if to <= contract.effective_from {
            return Err(BillingError::Validation(format!(
                "contract {} ends on or before it starts",
                contract.id
            )));
        }
    }
    for (i, split) in contract.splits.iter().enumerate() {
        if split.split_percentage <= Decimal::ZERO || split.split_percentage > Decimal::ONE_HUNDRED {
            return Err(BillingError::Validation(format!(
                "contract {} gives department {} a share of {}",
                contract.id, split.department_id, split.split_percentage
            )));
        }
        if contract
            .splits
            .iter()
            .skip(i + 1)
            .any(|other| other.department_id == split.department_id)
        {
            return Err(BillingError::Validation(format!(
                "contract {} lists department {} twice",
                contract.id, split.department_id
            )));
        }
    }
    Ok(())
}

/// [`check_terms`] plus a split total of 100 within `tolerance`.
///
/// # Errors
///
/// `Validation` describing the first problem found.
pub fn check_contract(contract: &Contract, tolerance: Decimal) -> BillingResult<()> {
    check_terms(contract)?;
    let total = contract.split_total();
    if (total - Decimal::ONE_HUNDRED).abs() > tolerance {
        return Err(BillingError::Validation(format!(
            "contract {} splits sum to {total}, expected 100",
            contract.id
        )));
    }
    Ok(())
}

/// Finds the single contract active for a client on a date
#[derive(Clone)]
pub struct ContractResolver {
    repository: Arc<dyn ContractRepository>,
}

impl ContractResolver {
    pub fn new(repository: Arc<dyn ContractRepository>) -> Self {
        Self { repository }
    }

    /// # Errors
    ///
    /// `NotFound` when nothing is active, `ContractConflict` when more than one is,
    /// `Validation` when the active contract's terms are unusable.
    pub async fn resolve(&self, client_id: Uuid, as_of: NaiveDate) -> BillingResult<Contract> {
        let mut active: Vec<Contract> = self
            .repository
            .find_active_for_client(client_id, as_of)
            .await?
            .into_iter()
            .filter(|c| c.is_active_on(as_of))
            .collect();

        match active.len() {
            0 => Err(BillingError::not_found(
                resource::CONTRACT,
                format!("no active contract for client {client_id} on {as_of}"),
            )),
            1 => {
                let contract = active.remove(0);
                check_terms(&contract)?;
                debug!(contract_id = %contract.id, %client_id, %as_of, "Resolved contract");
                Ok(contract)
            }
            n => Err(BillingError::ContractConflict(format!(
                "{n} contracts active for client {client_id} on {as_of}"
            ))),
        }
    }

    /// Load a contract by id and require it to be active on `as_of`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the contract is unknown or not active on that date,
    /// `Validation` when its terms are unusable.
    pub async fn resolve_contract(&self, contract_id: Uuid, as_of: NaiveDate) -> BillingResult<Contract> {
        let contract = self
            .repository
            .get_contract(contract_id)
            .await?
            .ok_or_else(|| BillingError::not_found(resource::CONTRACT, format!("contract {contract_id}")))?;

        if !contract.is_active_on(as_of) {
            return Err(BillingError::not_found(
                resource::CONTRACT,
                format!("contract {contract_id} is not active on {as_of}"),
            ));
        }
        check_terms(&contract)?;
        debug!(%contract_id, %as_of, "Resolved contract by id");
        Ok(contract)
    }

    /// # Errors
    ///
    /// See [`resolve`](Self::resolve) and [`resolve_contract`](Self::resolve_contract).
    pub async fn resolve_ref(&self, reference: ContractRef, as_of: NaiveDate) -> BillingResult<Contract> {
        match reference {
            ContractRef::Contract(id) => self.resolve_contract(id, as_of).await,
            ContractRef::Client(id) => self.resolve(id, as_of).await,
        }
    }
}

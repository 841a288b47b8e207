use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::contracts::{check_contract, DEFAULT_SPLIT_TOLERANCE};
use crate::error::{BillingError, BillingResult};
use crate::models::Contract;
use crate::repository::ContractRepository;

/// Seed file layout: `contracts: [...]`
#[derive(Debug, Deserialize)]
struct ContractSeed {
    #[serde(default)]
    contracts: Vec<Contract>,
}

/// In-process contract store. Every insert is checked for a sound split table
/// and for overlap with the client's other contracts, so lookups never see
/// two active contracts for one client and date.
pub struct MemoryContractRepository {
    contracts: RwLock<HashMap<Uuid, Contract>>,
    tolerance: Decimal,
}

impl MemoryContractRepository {
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_SPLIT_TOLERANCE)
    }

    pub fn with_tolerance(tolerance: Decimal) -> Self {
        Self {
            contracts: RwLock::new(HashMap::new()),
            tolerance,
        }
    }

    /// # Errors
    ///
    /// `Validation` for an unsound split table or a duplicate id,
    /// `ContractConflict` when the date range overlaps another contract
    /// for the same client.
    pub fn insert(&self, contract: Contract) -> BillingResult<()> {
        check_contract(&contract, self.tolerance)?;

        let mut contracts = self.contracts.write();
        if contracts.contains_key(&contract.id) {
            return Err(BillingError::Validation(format!("contract {} already exists", contract.id)));
        }
        if let Some(existing) = contracts
            .values()
            .find(|c| c.client_id == contract.client_id && c.overlaps(&contract))
        {
            return Err(BillingError::ContractConflict(format!(
                "contract {} overlaps contract {} for client {}",
                contract.id, existing.id, contract.client_id
            )));
        }
        contracts.insert(contract.id, contract);
        Ok(())
    }

    /// # Errors
    ///
    /// `Validation` when the YAML does not parse, plus anything [`insert`](Self::insert) rejects.
    pub fn from_yaml_str(yaml: &str, tolerance: Decimal) -> BillingResult<Self> {
        let seed: ContractSeed = serde_yaml::from_str(yaml)
            .map_err(|e| BillingError::Validation(format!("invalid contract seed: {e}")))?;
        let repository = Self::with_tolerance(tolerance);
        for contract in seed.contracts {
            repository.insert(contract)?;
        }
        Ok(repository)
    }

    /// # Errors
    ///
    /// `Validation` when the file cannot be read, plus anything
    /// [`from_yaml_str`](Self::from_yaml_str) rejects.
    pub fn from_yaml_file(path: impl AsRef<Path>, tolerance: Decimal) -> BillingResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| BillingError::Validation(format!("cannot read {}: {e}", path.display())))?;
        let repository = Self::from_yaml_str(&yaml, tolerance)?;
        info!(path = %path.display(), contracts = repository.len(), "Loaded contract seed");
        Ok(repository)
    }

    pub fn len(&self) -> usize {
        self.contracts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.read().is_empty()
    }
}

impl Default for MemoryContractRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractRepository for MemoryContractRepository {
    async fn find_active_for_client(&self, client_id: Uuid, as_of: NaiveDate) -> BillingResult<Vec<Contract>> {
        Ok(self
            .contracts
            .read()
            .values()
            .filter(|c| c.client_id == client_id && c.is_active_on(as_of))
            .cloned()
            .collect())
    }

    async fn get_contract(&self, contract_id: Uuid) -> BillingResult<Option<Contract>> {
        Ok(self.contracts.read().get(&contract_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DepartmentSplit;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(client_id: Uuid, from: NaiveDate, to: Option<NaiveDate>) -> Contract {
        Contract {
            id: Uuid::new_v4(),
            client_id,
            client_name: "Acme".into(),
            name: "Retainer".into(),
            vertical_id: None,
            vertical_name: None,
            effective_from: from,
            effective_to: to,
            fee_percentage: dec!(10),
            minimum_fee: dec!(0),
            splits: vec![DepartmentSplit {
                department_id: Uuid::new_v4(),
                department_name: "Creative".into(),
                split_percentage: dec!(100),
            }],
        }
    }

    #[tokio::test]
    async fn consecutive_contracts_resolve_by_date() {
        let client = Uuid::new_v4();
        let repo = MemoryContractRepository::new();
        let first = contract(client, date(2026, 1, 1), Some(date(2026, 7, 1)));
        let second = contract(client, date(2026, 7, 1), None);
        repo.insert(first.clone()).unwrap();
        repo.insert(second.clone()).unwrap();

        let june = repo.find_active_for_client(client, date(2026, 6, 30)).await.unwrap();
        assert_eq!(june, vec![first]);
        let july = repo.find_active_for_client(client, date(2026, 7, 1)).await.unwrap();
        assert_eq!(july, vec![second]);
        assert!(repo
            .find_active_for_client(Uuid::new_v4(), date(2026, 7, 1))
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn overlapping_contract_is_rejected() {
        let client = Uuid::new_v4();
        let repo = MemoryContractRepository::new();
        repo.insert(contract(client, date(2026, 1, 1), None)).unwrap();
        let err = repo
            .insert(contract(client, date(2026, 6, 1), Some(date(2026, 9, 1))))
            .unwrap_err();
        assert!(matches!(err, BillingError::ContractConflict(_)));

        // other clients are unaffected
        repo.insert(contract(Uuid::new_v4(), date(2026, 6, 1), None)).unwrap();
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn loads_yaml_seed() {
        let yaml = r#"
contracts:
  - id: 8d2b6c1e-0000-4000-8000-000000000001
    client_id: 8d2b6c1e-0000-4000-8000-0000000000c1
    client_name: Acme Corp
    name: Acme retainer
    vertical_id: 8d2b6c1e-0000-4000-8000-0000000000f1
    vertical_name: Healthcare
    effective_from: 2026-01-01
    fee_percentage: "10"
    minimum_fee: "500"
    splits:
      - department_id: 8d2b6c1e-0000-4000-8000-0000000000d1
        department_name: Creative
        split_percentage: "50"
      - department_id: 8d2b6c1e-0000-4000-8000-0000000000d2
        department_name: Media
        split_percentage: "30"
      - department_id: 8d2b6c1e-0000-4000-8000-0000000000d3
        department_name: Strategy
        split_percentage: "20"
"#;
        let repo = MemoryContractRepository::from_yaml_str(yaml, DEFAULT_SPLIT_TOLERANCE).unwrap();
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn yaml_seed_with_bad_splits_fails() {
        let yaml = r#"
contracts:
  - id: 8d2b6c1e-0000-4000-8000-000000000001
    client_id: 8d2b6c1e-0000-4000-8000-0000000000c1
    client_name: Acme Corp
    name: Acme retainer
    effective_from: 2026-01-01
    fee_percentage: "10"
    minimum_fee: "0"
    splits:
      - department_id: 8d2b6c1e-0000-4000-8000-0000000000d1
        department_name: Creative
        split_percentage: "60"
"#;
        assert!(matches!(
            MemoryContractRepository::from_yaml_str(yaml, DEFAULT_SPLIT_TOLERANCE),
            Err(BillingError::Validation(_))
        ));
    }
}

use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use billing_service::{ContractRef, InvoiceEvent, InvoiceReceipt};

use crate::error::{ApiError, ApiResult};
use crate::server::LedgerServer;

/// Body of `POST /api/v1/billing/invoices`. Exactly one of `contract_id` and
/// `client_id` names the contract.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub contract_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: String,
    /// ISO date, `YYYY-MM-DD`
    pub invoice_date: String,
    pub base_amount: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub client_name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreateInvoiceRequest {
    fn into_event(self) -> ApiResult<InvoiceEvent> {
        let contract = match (self.contract_id, self.client_id) {
            (Some(id), None) => ContractRef::Contract(id),
            (None, Some(id)) => ContractRef::Client(id),
            _ => {
                return Err(ApiError::validation(
                    "exactly one of contract_id and client_id is required",
                ))
            }
        };
        let invoice_date = NaiveDate::parse_from_str(&self.invoice_date, "%Y-%m-%d").map_err(|_| {
            ApiError::invalid_format(format!("invoice_date {:?} is not an ISO date", self.invoice_date))
        })?;
        if self.base_amount <= Decimal::ZERO {
            return Err(ApiError::validation("base_amount must be a positive number"));
        }

        Ok(InvoiceEvent {
            contract,
            invoice_number: self.invoice_number,
            invoice_date,
            base_amount: self.base_amount,
            client_name: self.client_name,
            description: self.description,
            metadata: self.metadata,
        })
    }
}

/// Compute the fee for an invoice, split it across departments and commit
/// one revenue entry per department
pub async fn create_invoice(
    State(server): State<LedgerServer>,
    payload: Result<Json<CreateInvoiceRequest>, axum::extract::rejection::JsonRejection>,
) -> ApiResult<(StatusCode, Json<InvoiceReceipt>)> {
    let Json(request) = payload?;
    request.validate()?;
    let event = request.into_event()?;
    let receipt = server.coordinator.process_invoice(event).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

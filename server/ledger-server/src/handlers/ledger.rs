use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use billing_service::{EntryType, LedgerEntry, LedgerQuery};

use crate::error::{ApiError, ApiResult};
use crate::server::LedgerServer;

/// Filters for `GET /api/v1/ledger/entries`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LedgerEntriesParams {
    pub entry_type: Option<EntryType>,
    pub department_id: Option<Uuid>,
    pub vertical_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}

impl From<LedgerEntriesParams> for LedgerQuery {
    fn from(params: LedgerEntriesParams) -> Self {
        LedgerQuery {
            entry_type: params.entry_type,
            department_id: params.department_id,
            vertical_id: params.vertical_id,
            transaction_id: params.transaction_id,
            from: params.from,
            to: params.to,
            limit: params.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryList {
    pub entries: Vec<LedgerEntry>,
    pub count: usize,
    pub total: Decimal,
}

impl From<Vec<LedgerEntry>> for EntryList {
    fn from(entries: Vec<LedgerEntry>) -> Self {
        Self {
            count: entries.len(),
            total: entries.iter().map(LedgerEntry::amount).sum(),
            entries,
        }
    }
}

pub async fn list_entries(
    State(server): State<LedgerServer>,
    params: Result<Query<LedgerEntriesParams>, QueryRejection>,
) -> ApiResult<Json<EntryList>> {
    let Query(params) = params?;
    params.validate()?;
    let entries = server.reader.entries(&params.into()).await?;
    Ok(Json(entries.into()))
}

pub async fn get_entry(
    State(server): State<LedgerServer>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<LedgerEntry>> {
    let Path(id) = id?;
    Ok(Json(server.reader.entry(id).await?))
}

pub async fn get_transaction(
    State(server): State<LedgerServer>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<EntryList>> {
    let Path(id) = id?;
    Ok(Json(server.reader.transaction(id).await?.into()))
}

/// Body of `POST /api/v1/ledger/entries/:id/adjustments`
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    /// ISO date; defaults to today
    pub entry_date: Option<String>,
}

/// Append a correcting entry; the original is never modified
pub async fn create_adjustment(
    State(server): State<LedgerServer>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AdjustmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LedgerEntry>)> {
    let Path(id) = id?;
    let Json(request) = payload?;
    request.validate()?;

    let entry_date = request
        .entry_date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::invalid_format(format!("entry_date {raw:?} is not an ISO date")))
        })
        .transpose()?;

    let entry = server
        .writer
        .append_adjustment(id, request.amount, &request.description, entry_date)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use accounting_service::MAX_QUERY_LIMIT;

    #[test]
    fn limit_is_bounded() {
        let params = LedgerEntriesParams {
            limit: Some(MAX_QUERY_LIMIT + 1),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = LedgerEntriesParams {
            limit: Some(MAX_QUERY_LIMIT),
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }
}

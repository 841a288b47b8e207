use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use accounting_service::{GroupBy, SummaryFilter, SummaryLine};
use billing_service::EntryType;

use crate::error::ApiResult;
use crate::server::LedgerServer;

/// Query of `GET /api/v1/reports/summary`
#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub group_by: GroupBy,
    pub entry_type: Option<EntryType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Net signed totals grouped by department, vertical or month
pub async fn summary(
    State(server): State<LedgerServer>,
    params: Result<Query<SummaryParams>, QueryRejection>,
) -> ApiResult<Json<Vec<SummaryLine>>> {
    let Query(params) = params?;
    let filter = SummaryFilter {
        entry_type: params.entry_type,
        from: params.from,
        to: params.to,
    };
    Ok(Json(server.reports.summarize(params.group_by, &filter).await?))
}

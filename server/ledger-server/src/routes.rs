use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{health, invoices, ledger, reports},
    server::LedgerServer,
};

/// Create health check routes
pub fn health_routes() -> Router<LedgerServer> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/version", get(health::version_info))
}

/// Invoice ingestion
pub fn billing_routes() -> Router<LedgerServer> {
    Router::new().route("/billing/invoices", post(invoices::create_invoice))
}

/// Ledger reads and adjustments
pub fn ledger_routes() -> Router<LedgerServer> {
    Router::new()
        .route("/ledger/entries", get(ledger::list_entries))
        .route("/ledger/entries/:id", get(ledger::get_entry))
        .route("/ledger/entries/:id/adjustments", post(ledger::create_adjustment))
        .route("/ledger/transactions/:transaction_id", get(ledger::get_transaction))
}

pub fn report_routes() -> Router<LedgerServer> {
    Router::new().route("/reports/summary", get(reports::summary))
}

/// Create all application routes
pub fn create_routes() -> Router<LedgerServer> {
    let api_v1 = Router::new()
        .merge(billing_routes())
        .merge(ledger_routes())
        .merge(report_routes());

    Router::new().merge(health_routes()).nest("/api/v1", api_v1)
}

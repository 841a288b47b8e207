use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::server::LedgerServer;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime: u64,
    pub checks: BTreeMap<String, String>,
}

/// Version information response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: String,
    pub version: String,
    pub store: String,
    pub minor_unit_scale: u32,
}

/// Health check handler; 503 when the database is configured but unreachable
pub async fn health_check(State(server): State<LedgerServer>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();
    let healthy = match &server.database {
        Some(pool) => {
            let ok = pool.is_healthy().await;
            checks.insert("database".to_string(), (if ok { "healthy" } else { "unreachable" }).to_string());
            ok
        }
        None => {
            checks.insert("database".to_string(), "in_memory".to_string());
            true
        }
    };

    let response = HealthResponse {
        status: (if healthy { "healthy" } else { "degraded" }).to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: server.uptime().as_secs(),
        checks,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Version information handler
pub async fn version_info(State(server): State<LedgerServer>) -> Json<VersionResponse> {
    Json(VersionResponse {
        name: "SplitLedger".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: (if server.database.is_some() { "postgres" } else { "memory" }).to_string(),
        minor_unit_scale: server.config.ledger.minor_unit_scale,
    })
}

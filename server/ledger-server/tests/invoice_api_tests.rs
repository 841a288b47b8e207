use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tower::ServiceExt;
use uuid::Uuid;

use billing_service::repository::{
    FaultPoint, LedgerRepository, MemoryContractRepository, MemoryStagingStore, StagedLedgerRepository, StagingHeader,
    StagingStore,
};
use billing_service::{invoice_transaction_id, Contract, DepartmentSplit, PersistenceErrorKind};
use config_engine::EngineConfig;
use ledger_server::{create_app, LedgerServer};

const CREATIVE: Uuid = Uuid::from_u128(0xC1);
const MEDIA: Uuid = Uuid::from_u128(0xC2);
const STRATEGY: Uuid = Uuid::from_u128(0xC3);
const RETAIL: Uuid = Uuid::from_u128(0xF1);

/// In-memory application with one active contract for Acme
struct TestApp {
    app: Router,
    ledger: Arc<StagedLedgerRepository<MemoryStagingStore>>,
    client_id: Uuid,
    contract_id: Uuid,
}

impl TestApp {
    fn new() -> Self {
        Self::with(EngineConfig::default(), MemoryStagingStore::new())
    }

    fn with(config: EngineConfig, store: MemoryStagingStore) -> Self {
        let client_id = Uuid::new_v4();
        let contract = Contract {
            id: Uuid::new_v4(),
            client_id,
            client_name: "Acme Foods".into(),
            name: "Acme retainer 2026".into(),
            vertical_id: Some(RETAIL),
            vertical_name: Some("Retail".into()),
            effective_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            effective_to: None,
            fee_percentage: dec!(5),
            minimum_fee: dec!(100),
            splits: vec![
                split(CREATIVE, "Creative", dec!(50)),
                split(MEDIA, "Media", dec!(30)),
                split(STRATEGY, "Strategy", dec!(20)),
            ],
        };
        let contract_id = contract.id;

        let contracts = MemoryContractRepository::new();
        contracts.insert(contract).unwrap();
        let ledger = Arc::new(StagedLedgerRepository::new(store));
        let server = LedgerServer::with_repositories(config, Arc::new(contracts), ledger.clone(), None);

        Self {
            app: create_app(server),
            ledger,
            client_id,
            contract_id,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn post_invoice(&self, base_amount: &str, invoice_date: &str) -> (StatusCode, Value) {
        self.post_numbered_invoice("INV-2026-0042", base_amount, invoice_date).await
    }

    async fn post_numbered_invoice(
        &self,
        invoice_number: &str,
        base_amount: &str,
        invoice_date: &str,
    ) -> (StatusCode, Value) {
        self.post(
            "/api/v1/billing/invoices",
            json!({
                "client_id": self.client_id,
                "invoice_number": invoice_number,
                "invoice_date": invoice_date,
                "base_amount": base_amount,
            }),
        )
        .await
    }
}

fn split(department_id: Uuid, name: &str, pct: Decimal) -> DepartmentSplit {
    DepartmentSplit {
        department_id,
        department_name: name.into(),
        split_percentage: pct,
    }
}

fn amount(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

#[tokio::test]
async fn test_invoice_splits_fee_across_departments() {
    let app = TestApp::new();

    let (status, receipt) = app.post_invoice("10000.00", "2026-03-15").await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(amount(&receipt["invoice"]["fee_amount"]), dec!(500));
    assert_eq!(receipt["invoice"]["minimum_fee_applied"], json!(false));
    assert_eq!(receipt["invoice"]["client"], json!("Acme Foods"));
    assert_eq!(receipt["invoice"]["vertical"], json!("Retail"));

    let splits = receipt["splits"].as_array().unwrap();
    let amounts: Vec<Decimal> = splits.iter().map(|s| amount(&s["split_amount"])).collect();
    assert_eq!(amounts, vec![dec!(250), dec!(150), dec!(100)]);

    let entries = receipt["ledger_entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    let total: Decimal = entries.iter().map(|e| amount(&e["amount"])).sum();
    assert_eq!(total, dec!(500));
}

#[tokio::test]
async fn test_minimum_fee_applies_to_small_invoices() {
    let app = TestApp::new();

    let (status, receipt) = app.post_invoice("1000", "2026-03-15").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(amount(&receipt["invoice"]["fee_amount"]), dec!(100));
    assert_eq!(receipt["invoice"]["minimum_fee_applied"], json!(true));
}

#[tokio::test]
async fn test_invoice_by_contract_id() {
    let app = TestApp::new();

    let (status, receipt) = app
        .post(
            "/api/v1/billing/invoices",
            json!({
                "contract_id": app.contract_id,
                "invoice_number": "INV-7",
                "invoice_date": "2026-06-01",
                "base_amount": "2000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(amount(&receipt["invoice"]["fee_amount"]), dec!(100));
}

#[tokio::test]
async fn test_invoice_validation_errors() {
    let app = TestApp::new();

    let (status, body) = app.post_invoice("0", "2026-03-15").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], json!("validation_error"));

    let (status, body) = app.post_invoice("100", "15/03/2026").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!(error_common::codes::validation::INVALID_FORMAT));

    let (status, _) = app
        .post(
            "/api/v1/billing/invoices",
            json!({
                "contract_id": app.contract_id,
                "client_id": app.client_id,
                "invoice_number": "INV-8",
                "invoice_date": "2026-03-15",
                "base_amount": "100",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/api/v1/billing/invoices")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // nothing reached the ledger
    let (_, list) = app.get("/api/v1/ledger/entries").await;
    assert_eq!(list["count"], json!(0));
}

#[tokio::test]
async fn test_invoice_without_active_contract_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app.post_invoice("10000", "2025-12-31").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!(error_common::codes::lookup::NO_ACTIVE_CONTRACT));
    assert_eq!(body["retryable"], json!(false));
}

#[tokio::test]
async fn test_ledger_queries_follow_committed_invoice() {
    let app = TestApp::new();
    let (_, receipt) = app.post_invoice("10000", "2026-03-15").await;
    let transaction_id = receipt["transaction_id"].as_str().unwrap().to_string();

    let (status, list) = app.get(&format!("/api/v1/ledger/transactions/{transaction_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], json!(3));
    assert_eq!(amount(&list["total"]), dec!(500));

    let (status, list) = app
        .get(&format!("/api/v1/ledger/entries?department_id={MEDIA}&entry_type=revenue"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], json!(1));
    assert_eq!(amount(&list["entries"][0]["amount"]), dec!(150));

    let entry_id = list["entries"][0]["id"].as_str().unwrap().to_string();
    let (status, entry) = app.get(&format!("/api/v1/ledger/entries/{entry_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["transaction_id"], json!(transaction_id));

    let (status, _) = app.get(&format!("/api/v1/ledger/entries/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v1/ledger/entries?limit=5000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/v1/ledger/entries?from=2026-04-01&to=2026-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_adjustment_appends_correcting_entry() {
    let app = TestApp::new();
    let (_, receipt) = app.post_invoice("10000", "2026-03-15").await;
    let original = receipt["ledger_entries"][0]["entry_id"].as_str().unwrap().to_string();

    let (status, adjustment) = app
        .post(
            &format!("/api/v1/ledger/entries/{original}/adjustments"),
            json!({
                "amount": "-25.00",
                "description": "Credit for late delivery",
                "entry_date": "2026-03-31",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(adjustment["entry_type"], json!("adjustment"));
    assert_eq!(adjustment["is_adjustment"], json!(true));
    assert_eq!(adjustment["adjustment_of"], json!(original));

    // the original is untouched
    let (_, entry) = app.get(&format!("/api/v1/ledger/entries/{original}")).await;
    assert_eq!(amount(&entry["amount"]), dec!(250));

    let (status, _) = app
        .post(
            &format!("/api/v1/ledger/entries/{}/adjustments", Uuid::new_v4()),
            json!({ "amount": "5", "description": "orphan" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summary_groups_net_totals() {
    let app = TestApp::new();
    app.post_numbered_invoice("INV-2026-0042", "10000", "2026-03-15").await;
    app.post_numbered_invoice("INV-2026-0051", "1000", "2026-04-02").await;

    let (status, lines) = app.get("/api/v1/reports/summary?group_by=month").await;
    assert_eq!(status, StatusCode::OK);
    let lines = lines.as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["key"], json!("2026-03"));
    assert_eq!(amount(&lines[0]["total"]), dec!(500));
    assert_eq!(lines[1]["key"], json!("2026-04"));
    assert_eq!(amount(&lines[1]["total"]), dec!(100));

    let (status, lines) = app.get("/api/v1/reports/summary?group_by=vertical").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines[0]["key"], json!(RETAIL.to_string()));
    assert_eq!(amount(&lines[0]["total"]), dec!(600));

    let (status, _) = app.get("/api/v1/reports/summary?group_by=planet").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resent_invoice_returns_original_transaction() {
    let app = TestApp::new();

    let (status, first) = app.post_invoice("10000", "2026-03-15").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = app.post_invoice("10000", "2026-03-15").await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(second["transaction_id"], first["transaction_id"]);
    assert_eq!(
        first["transaction_id"],
        json!(invoice_transaction_id(app.contract_id, "INV-2026-0042"))
    );
    assert_eq!(second["ledger_entries"], first["ledger_entries"]);

    let (_, list) = app.get("/api/v1/ledger/entries").await;
    assert_eq!(list["count"], json!(3));
    assert_eq!(amount(&list["total"]), dec!(500));
}

#[tokio::test]
async fn test_resent_invoice_with_changed_amount_is_rejected() {
    let app = TestApp::new();
    app.post_invoice("10000", "2026-03-15").await;

    let (status, body) = app.post_invoice("20000", "2026-03-15").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], json!("validation_error"));

    let (_, list) = app.get("/api/v1/ledger/entries").await;
    assert_eq!(list["count"], json!(3));
}

#[tokio::test]
async fn test_invoice_resent_after_timeout_is_booked_once() {
    let mut config = EngineConfig::default();
    config.server.request_timeout_secs = 1;
    config.ledger.commit_backoff_ms = 1500;
    let store = MemoryStagingStore::new();
    store.inject_fault(FaultPoint::CommitMarker, PersistenceErrorKind::Transient, 1);
    let app = TestApp::with(config, store);

    // the retry backoff outlives the request; the commit finishes detached
    let (status, _) = app.post_invoice("10000", "2026-03-15").await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;

    let (status, receipt) = app.post_invoice("10000", "2026-03-15").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        receipt["transaction_id"],
        json!(invoice_transaction_id(app.contract_id, "INV-2026-0042"))
    );
    assert_eq!(app.ledger.store().committed_transaction_count(), 1);
    assert_eq!(app.ledger.store().committed_entry_count(), 3);
}

#[tokio::test]
async fn test_health_and_version() {
    let app = TestApp::new();

    let (status, health) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], json!("healthy"));

    let (status, version) = app.get("/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version["store"], json!("memory"));
}

fn repo_file(relative: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..").join(relative)
}

#[tokio::test]
async fn test_sample_configuration_seeds_contracts() {
    let path = repo_file("config/ledger-server.yaml");
    let mut config = assert_ok!(EngineConfig::load(path.to_str()));
    assert!(!config.uses_database());
    assert_eq!(config.ledger.split_tolerance, dec!(0.01));

    config.ledger.seed_contracts = Some(repo_file("config/contracts.yaml"));
    let server = assert_ok!(LedgerServer::from_config(config).await);
    let app = create_app(server);

    let request = Request::builder()
        .uri("/api/v1/billing/invoices")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "client_id": "0e9d8c7b-6a5f-4e3d-8c2b-1a0f9e8d7c02",
                "invoice_number": "NW-001",
                "invoice_date": "2026-05-20",
                "base_amount": "20000",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let receipt: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(amount(&receipt["invoice"]["fee_amount"]), dec!(1500));
    let amounts: Vec<Decimal> = receipt["splits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| amount(&s["split_amount"]))
        .collect();
    assert_eq!(amounts, vec![dec!(499.95), dec!(499.95), dec!(500.10)]);
}

#[tokio::test]
async fn test_reconciler_rolls_back_abandoned_stagings() {
    let mut config = EngineConfig::default();
    config.ledger.reconcile_interval_secs = 1;
    config.ledger.reconcile_grace_secs = 0;
    let server = assert_ok!(LedgerServer::from_config(config).await);
    let staging = server.staging.clone().unwrap();

    let abandoned = Uuid::new_v4();
    assert_ok!(
        staging
            .store()
            .write_header(StagingHeader {
                transaction_id: abandoned,
                expected_entries: 2,
                staged_at: chrono::Utc::now() - chrono::Duration::minutes(1),
            })
            .await
    );

    let reconciler = server.spawn_reconciler().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    reconciler.abort();

    assert!(staging.store().headers().await.unwrap().is_empty());
    assert!(staging.find_transaction(abandoned).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconciler_only_runs_on_the_staged_ledger() {
    let wired = LedgerServer::with_repositories(
        EngineConfig::default(),
        Arc::new(MemoryContractRepository::new()),
        Arc::new(StagedLedgerRepository::new(MemoryStagingStore::new())),
        None,
    );
    assert!(wired.spawn_reconciler().is_none());

    let mut config = EngineConfig::default();
    config.ledger.reconcile_interval_secs = 0;
    let server = assert_ok!(LedgerServer::from_config(config).await);
    assert!(server.staging.is_some());
    assert!(server.spawn_reconciler().is_none());
}

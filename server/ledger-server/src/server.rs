use accounting_service::{LedgerReader, LedgerReports};
use billing_service::repository::{
    ContractRepository, LedgerRepository, MemoryContractRepository, MemoryStagingStore, PgContractRepository,
    PgLedgerRepository, StagedLedgerRepository,
};
use billing_service::{CommitPolicy, CoordinatorSettings, LedgerWriter, TransactionCoordinator};
use config_engine::EngineConfig;
use database_layer::{DatabasePool, PoolSettings, TransactionManager};
use error_common::{EngineError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Longest grace period, in days, a reconciliation pass waits before touching a staging
const MAX_RECONCILE_GRACE_DAYS: i64 = 7;

type MemoryLedger = StagedLedgerRepository<MemoryStagingStore>;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct LedgerServer {
    pub config: Arc<EngineConfig>,
    pub coordinator: TransactionCoordinator,
    pub writer: LedgerWriter,
    pub reader: LedgerReader,
    pub reports: LedgerReports,
    /// Present only when running against PostgreSQL
    pub database: Option<DatabasePool>,
    /// Present only when running on the in-memory staged ledger
    pub staging: Option<Arc<MemoryLedger>>,
    pub started_at: Instant,
}

impl LedgerServer {
    /// Build the server from configuration: PostgreSQL when `database.url`
    /// is set, the in-memory staged ledger otherwise.
    ///
    /// # Errors
    ///
    /// `DatabaseError` when the pool or migrations fail, `ConfigError` when
    /// the contract seed cannot be loaded.
    pub async fn from_config(config: EngineConfig) -> Result<Self> {
        match config.database.url.clone() {
            Some(url) => {
                let settings = PoolSettings {
                    max_connections: config.database.max_connections,
                    min_connections: config.database.min_connections,
                    acquire_timeout: Duration::from_secs(config.database.acquire_timeout_secs),
                };
                let pool = DatabasePool::new(&url, &settings)
                    .await
                    .map_err(|e| EngineError::DatabaseError(e.to_string()))?;
                if config.database.run_migrations {
                    pool.run_migrations()
                        .await
                        .map_err(|e| EngineError::DatabaseError(e.to_string()))?;
                }

                let transactions = TransactionManager::new(pool.clone())
                    .with_statement_timeout(Duration::from_secs(config.server.request_timeout_secs));
                let contracts = Arc::new(PgContractRepository::new(transactions.clone()));
                let ledger = Arc::new(
                    PgLedgerRepository::new(transactions).with_minor_unit_scale(config.ledger.minor_unit_scale),
                );
                info!("Using PostgreSQL ledger store");
                Ok(Self::with_repositories(config, contracts, ledger, Some(pool)))
            }
            None => {
                let contracts = match &config.ledger.seed_contracts {
                    Some(path) => MemoryContractRepository::from_yaml_file(path, config.ledger.split_tolerance)
                        .map_err(|e| EngineError::ConfigError(e.to_string()))?,
                    None => MemoryContractRepository::with_tolerance(config.ledger.split_tolerance),
                };
                let ledger = Arc::new(StagedLedgerRepository::new(MemoryStagingStore::new()));
                info!(contracts = contracts.len(), "Using in-memory ledger store");
                Ok(Self::with_repositories(config, Arc::new(contracts), ledger.clone(), None).with_staging(ledger))
            }
        }
    }

    /// Wire the engine over explicit repositories
    pub fn with_repositories(
        config: EngineConfig,
        contracts: Arc<dyn ContractRepository>,
        ledger: Arc<dyn LedgerRepository>,
        database: Option<DatabasePool>,
    ) -> Self {
        let settings = CoordinatorSettings {
            minor_unit_scale: config.ledger.minor_unit_scale,
            split_tolerance: config.ledger.split_tolerance,
            commit: CommitPolicy {
                max_attempts: config.ledger.commit_max_attempts,
                initial_backoff: Duration::from_millis(config.ledger.commit_backoff_ms),
            },
        };
        let coordinator = TransactionCoordinator::new(contracts, ledger.clone(), settings);

        Self {
            writer: coordinator.writer().clone(),
            coordinator,
            reader: LedgerReader::new(ledger.clone()),
            reports: LedgerReports::new(ledger),
            database,
            staging: None,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Attach the staged ledger so [`spawn_reconciler`](Self::spawn_reconciler)
    /// can recover its interrupted commits
    #[must_use]
    pub fn with_staging(mut self, staging: Arc<MemoryLedger>) -> Self {
        self.staging = Some(staging);
        self
    }

    /// Start the periodic reconciliation pass over the staged ledger.
    ///
    /// Returns `None` on PostgreSQL, whose appends are atomic, and when
    /// `ledger.reconcile_interval_secs` is 0.
    pub fn spawn_reconciler(&self) -> Option<JoinHandle<()>> {
        let staging = self.staging.clone()?;
        let settings = &self.config.ledger;
        if settings.reconcile_interval_secs == 0 {
            return None;
        }
        let period = Duration::from_secs(settings.reconcile_interval_secs);
        let max_grace = chrono::Duration::days(MAX_RECONCILE_GRACE_DAYS);
        let grace = i64::try_from(settings.reconcile_grace_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .map_or(max_grace, |grace| grace.min(max_grace));

        info!(interval_secs = period.as_secs(), grace_secs = grace.num_seconds(), "Starting staged ledger reconciler");
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = staging.reconcile(grace).await {
                    warn!(error = %e, "Reconciliation pass failed; retrying next interval");
                }
            }
        }))
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

//! PostgreSQL access for the SplitLedger engine
//!
//! Provides the connection pool, error classification (transient versus
//! permanent, derived from SQLSTATE), transaction helpers and the embedded
//! ledger schema. The schema is append-only for `ledger_entries`: a trigger
//! rejects every `UPDATE` and `DELETE`, so corrections must be written as new
//! adjustment rows.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use database_layer::{DatabasePool, PoolSettings, TransactionManager};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), database_layer::DatabaseError> {
//! let pool = DatabasePool::new("postgresql://localhost/splitledger", &PoolSettings::default()).await?;
//! pool.run_migrations().await?;
//!
//! let transactions = TransactionManager::new(pool.clone())
//!     .with_statement_timeout(Duration::from_secs(5));
//! let tx = transactions.begin().await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod transaction;

pub use connection::*;
pub use error::*;
pub use transaction::*;

// Transaction management
use crate::connection::DatabasePool;
use crate::error::{DatabaseError, DatabaseResult};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::debug;

/// Begins transactions with a bounded statement timeout
#[derive(Clone, Debug)]
pub struct TransactionManager {
    pool: DatabasePool,
    statement_timeout: Option<Duration>,
}

impl TransactionManager {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Abort statements that run longer than `timeout` inside transactions
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Returns a classified `DatabaseError` when the connection cannot be acquired
    /// or the timeout cannot be applied.
    pub async fn begin(&self) -> DatabaseResult<Transaction<'static, Postgres>> {
        debug!("Beginning transaction");

        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(DatabaseError::classify)?;

        if let Some(timeout) = self.statement_timeout {
            // SET LOCAL does not accept bind parameters
            let sql = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::classify)?;
        }

        Ok(tx)
    }
}

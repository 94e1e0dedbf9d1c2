//! Database transaction utilities
//!
//! Multi-step document operations (slot replacement, event orphaning) go through
//! [`TransactionGuard`] so the commit point is explicit and logged.

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use medvault_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};

/// A named transaction. Dropping it without `commit` rolls back.
///
/// # Example
///
/// ```ignore
/// use medvault_db::db::transaction::TransactionGuard;
///
/// let mut tx = TransactionGuard::begin(&pool, "write_slots").await?;
/// sqlx::query("DELETE FROM documents WHERE id = $1")
///     .bind(id)
///     .execute(&mut **tx)
///     .await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Transaction<'a, Postgres>,
    operation: &'static str,
    started: Instant,
}

impl<'a> TransactionGuard<'a> {
    pub async fn begin(pool: &'a PgPool, operation: &'static str) -> Result<Self, AppError> {
        let transaction = pool.begin().await?;
        Ok(Self {
            transaction,
            operation,
            started: Instant::now(),
        })
    }

    pub async fn commit(self) -> Result<(), AppError> {
        let operation = self.operation;
        let elapsed = self.started.elapsed();
        self.transaction.commit().await?;
        tracing::debug!(
            operation = operation,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "Transaction committed"
        );
        Ok(())
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

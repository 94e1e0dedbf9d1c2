//! Health event repository: the `events` table.

use async_trait::async_trait;
use medvault_core::models::HealthEvent;
use medvault_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;
use super::EventRepository;

const EVENT_COLUMNS: &str = "id, user_id, professional_id, event_type, title, date";

#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    #[tracing::instrument(skip(self), fields(db.table = "events", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<HealthEvent>, AppError> {
        let sql = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        let event = sqlx::query_as::<Postgres, HealthEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    #[tracing::instrument(skip(self), fields(db.table = "events"))]
    async fn list_for_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<HealthEvent>, AppError> {
        let sql = format!(
            "SELECT {} FROM events WHERE professional_id = $1 ORDER BY date",
            EVENT_COLUMNS
        );
        let events = sqlx::query_as::<Postgres, HealthEvent>(&sql)
            .bind(professional_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    #[tracing::instrument(skip(self, reason), fields(db.table = "events", db.record_id = %event_id))]
    async fn orphan_documents_and_delete(
        &self,
        event_id: Uuid,
        reason: &str,
    ) -> Result<u64, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool, "orphan_event_documents").await?;

        // Records must be detached before the event row goes, or the cascade takes them.
        let orphaned = sqlx::query(
            r#"
            UPDATE documents
            SET is_orphaned = TRUE,
                orphaned_reason = $2,
                event_id = NULL,
                professional_id = NULL
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(reason)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut **tx)
            .await?;

        tx.commit().await?;
        Ok(orphaned)
    }

    #[tracing::instrument(skip(self), fields(db.table = "events", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

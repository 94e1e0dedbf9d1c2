//! Notification repository: the `notifications` table.
//!
//! Archival itself happens inside the slot write transaction in `documents`.

use async_trait::async_trait;
use medvault_core::models::Notification;
use medvault_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::NotificationRepository;

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    #[tracing::instrument(skip(self), fields(db.table = "notifications", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Notification>, AppError> {
        let notification = sqlx::query_as::<Postgres, Notification>(
            "SELECT id, user_id, event_id, title, archived, created_at FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }
}

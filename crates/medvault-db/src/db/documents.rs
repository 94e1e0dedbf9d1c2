//! Document record repository: the `documents` table.

use async_trait::async_trait;
use medvault_core::models::{DocumentRecord, NewDocumentRecord, Slot};
use medvault_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;
use super::{slot_conflict, DocumentRepository, SlotWrite};

const DOCUMENT_COLUMNS: &str = "id, user_id, slot, event_id, professional_id, name, \
     url, physical_path, file_hash, upload_date, expiry_date, is_orphaned, orphaned_reason, \
     created_at";

#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_on(
        conn: &mut PgConnection,
        record: &NewDocumentRecord,
    ) -> Result<DocumentRecord, AppError> {
        let sql = format!(
            r#"
            INSERT INTO documents (id, user_id, slot, event_id, professional_id, name, url,
                physical_path, file_hash, upload_date, expiry_date, is_orphaned, orphaned_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        );

        sqlx::query_as::<Postgres, DocumentRecord>(&sql)
            .bind(record.id)
            .bind(record.user_id)
            .bind(record.slot)
            .bind(record.event_id)
            .bind(record.professional_id)
            .bind(&record.name)
            .bind(&record.url)
            .bind(&record.physical_path)
            .bind(&record.file_hash)
            .bind(record.upload_date)
            .bind(record.expiry_date)
            .bind(record.is_orphaned)
            .bind(&record.orphaned_reason)
            .fetch_one(conn)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return slot_conflict(record.slot);
                    }
                }
                AppError::from(e)
            })
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>, AppError> {
        let sql = format!("SELECT {} FROM documents WHERE id = $1", DOCUMENT_COLUMNS);
        let record = sqlx::query_as::<Postgres, DocumentRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents"))]
    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<DocumentRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE event_id = $1 AND NOT is_orphaned ORDER BY slot, created_at",
            DOCUMENT_COLUMNS
        );
        let records = sqlx::query_as::<Postgres, DocumentRecord>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents"))]
    async fn list_orphaned(&self, user_id: Uuid) -> Result<Vec<DocumentRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE user_id = $1 AND is_orphaned ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        );
        let records = sqlx::query_as::<Postgres, DocumentRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents"))]
    async fn find_in_slot(
        &self,
        event_id: Uuid,
        slot: Slot,
    ) -> Result<Option<DocumentRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE event_id = $1 AND slot = $2 AND NOT is_orphaned",
            DOCUMENT_COLUMNS
        );
        let record = sqlx::query_as::<Postgres, DocumentRecord>(&sql)
            .bind(event_id)
            .bind(slot)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    #[tracing::instrument(skip(self, records), fields(db.table = "documents", count = records.len()))]
    async fn write_slots(
        &self,
        records: Vec<NewDocumentRecord>,
        overwrite: bool,
        archive_notification: Option<Uuid>,
    ) -> Result<Vec<SlotWrite>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool, "write_slots").await?;
        let mut writes = Vec::with_capacity(records.len());

        for record in &records {
            let replaced = match record.event_id {
                Some(event_id) if overwrite => {
                    let sql = format!(
                        "DELETE FROM documents WHERE event_id = $1 AND slot = $2 AND NOT is_orphaned RETURNING {}",
                        DOCUMENT_COLUMNS
                    );
                    sqlx::query_as::<Postgres, DocumentRecord>(&sql)
                        .bind(event_id)
                        .bind(record.slot)
                        .fetch_optional(&mut **tx)
                        .await?
                }
                _ => None,
            };

            let inserted = Self::insert_on(&mut tx, record).await?;
            writes.push(SlotWrite {
                record: inserted,
                replaced,
            });
        }

        if let Some(notification_id) = archive_notification {
            sqlx::query("UPDATE notifications SET archived = TRUE WHERE id = $1")
                .bind(notification_id)
                .execute(&mut **tx)
                .await?;
        }

        tx.commit().await?;
        Ok(writes)
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "documents", db.record_id = %record.id))]
    async fn insert(&self, record: NewDocumentRecord) -> Result<DocumentRecord, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_on(&mut conn, &record).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

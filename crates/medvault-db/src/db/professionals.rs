//! Professional repository: the `professionals` table.

use async_trait::async_trait;
use medvault_core::models::Professional;
use medvault_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::ProfessionalRepository;

#[derive(Clone)]
pub struct PgProfessionalRepository {
    pool: PgPool,
}

impl PgProfessionalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfessionalRepository for PgProfessionalRepository {
    #[tracing::instrument(skip(self), fields(db.table = "professionals", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Professional>, AppError> {
        let professional = sqlx::query_as::<Postgres, Professional>(
            "SELECT id, user_id, name, specialty FROM professionals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(professional)
    }

    #[tracing::instrument(skip(self), fields(db.table = "professionals", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM professionals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Professional {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
}

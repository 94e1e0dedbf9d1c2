use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use crate::constants::UNKNOWN_PROFESSIONAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "event_type", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Consultation,
    Examination,
    Hospitalization,
    Vaccination,
    Other,
}

impl EventType {
    pub fn label(&self) -> &'static str {
        match self {
            EventType::Consultation => "Consultation",
            EventType::Examination => "Examination",
            EventType::Hospitalization => "Hospitalization",
            EventType::Vaccination => "Vaccination",
            EventType::Other => "Health event",
        }
    }
}

/// A scheduled or past health event documents are attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct HealthEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub event_type: EventType,
    pub title: String,
    pub date: NaiveDate,
}

impl HealthEvent {
    /// Reason stored on documents preserved when this event is deleted.
    pub fn orphan_reason(&self, professional_name: Option<&str>, deleted_on: NaiveDate) -> String {
        format!(
            "{} with {}: \"{}\" of {} (event deleted on {})",
            self.event_type.label(),
            professional_name.unwrap_or(UNKNOWN_PROFESSIONAL),
            self.title,
            self.date,
            deleted_on
        )
    }

    /// Reason stored on copies preserved when this event's professional is deleted.
    pub fn professional_orphan_reason(&self, professional_name: &str, deleted_on: NaiveDate) -> String {
        format!(
            "{} with {}: \"{}\" of {} (professional deleted on {})",
            self.event_type.label(),
            professional_name,
            self.title,
            self.date,
            deleted_on
        )
    }
}

/// Today's date in UTC, as stamped into orphan reasons.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

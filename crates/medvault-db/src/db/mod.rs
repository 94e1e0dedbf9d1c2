//! Database repositories for the data access layer
//!
//! Services depend on the traits below, never on a concrete implementation, so the
//! HTTP layer can be exercised against the in-memory database.

use async_trait::async_trait;
use medvault_core::models::{
    DocumentRecord, HealthEvent, NewDocumentRecord, Notification, Professional, Slot,
};
use medvault_core::AppError;
use uuid::Uuid;

pub mod documents;
pub mod events;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod notifications;
pub mod professionals;
pub mod transaction;

pub use documents::PgDocumentRepository;
pub use events::PgEventRepository;
pub use notifications::PgNotificationRepository;
pub use professionals::PgProfessionalRepository;

/// Result of an atomic slot write.
#[derive(Debug, Clone)]
pub struct SlotWrite {
    pub record: DocumentRecord,
    /// The previous occupant removed by this write, if any.
    pub replaced: Option<DocumentRecord>,
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>, AppError>;

    /// Non-orphaned records attached to an event.
    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<DocumentRecord>, AppError>;

    async fn list_orphaned(&self, user_id: Uuid) -> Result<Vec<DocumentRecord>, AppError>;

    /// The live occupant of `(event_id, slot)`.
    async fn find_in_slot(
        &self,
        event_id: Uuid,
        slot: Slot,
    ) -> Result<Option<DocumentRecord>, AppError>;

    /// In one transaction: for each record, remove the live occupant of its slot when
    /// `overwrite` is set and insert the record; then archive the source notification.
    /// Any failure, including an occupied slot without `overwrite` (`AppError::Conflict`),
    /// rolls back every write of the batch. Results come back in input order.
    async fn write_slots(
        &self,
        records: Vec<NewDocumentRecord>,
        overwrite: bool,
        archive_notification: Option<Uuid>,
    ) -> Result<Vec<SlotWrite>, AppError>;

    async fn insert(&self, record: NewDocumentRecord) -> Result<DocumentRecord, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<HealthEvent>, AppError>;

    async fn list_for_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<HealthEvent>, AppError>;

    /// In one transaction, orphan every record of the event with `reason` and then delete
    /// the event row. Returns the number of records preserved.
    async fn orphan_documents_and_delete(
        &self,
        event_id: Uuid,
        reason: &str,
    ) -> Result<u64, AppError>;

    /// Delete the event row; its records go with it.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ProfessionalRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Professional>, AppError>;

    /// Delete the professional; their events and those events' records go with it.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Notification>, AppError>;
}

/// Map a unique violation on the live-slot index to a conflict.
pub(crate) fn slot_conflict(slot: Slot) -> AppError {
    AppError::Conflict(format!(
        "A {} document already exists for this event",
        slot.label()
    ))
}

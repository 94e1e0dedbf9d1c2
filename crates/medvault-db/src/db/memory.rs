//! In-memory repositories for testing
//!
//! One shared state backs all four repository traits so that cascades behave like the
//! PostgreSQL schema: deleting an event removes its records, deleting a professional removes
//! their events, and the live-slot uniqueness rule is enforced on insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use medvault_core::models::{
    DocumentRecord, HealthEvent, NewDocumentRecord, Notification, Professional, Slot,
};
use medvault_core::AppError;
use uuid::Uuid;

use super::{
    slot_conflict, DocumentRepository, EventRepository, NotificationRepository,
    ProfessionalRepository, SlotWrite,
};

#[derive(Default)]
struct State {
    documents: HashMap<Uuid, DocumentRecord>,
    events: HashMap<Uuid, HealthEvent>,
    professionals: HashMap<Uuid, Professional>,
    notifications: HashMap<Uuid, Notification>,
    fail_writes: bool,
    failed_inserts: Vec<Uuid>,
}

impl State {
    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes {
            return Err(AppError::Internal("simulated database failure".to_string()));
        }
        Ok(())
    }

    fn slot_taken(&self, record: &NewDocumentRecord) -> bool {
        !record.is_orphaned
            && record.event_id.is_some()
            && self.documents.values().any(|d| {
                !d.is_orphaned && d.event_id == record.event_id && d.slot == record.slot
            })
    }

    fn remove_event(&mut self, id: Uuid) -> bool {
        let removed = self.events.remove(&id).is_some();
        if removed {
            self.documents.retain(|_, d| d.event_id != Some(id));
            for notification in self.notifications.values_mut() {
                if notification.event_id == Some(id) {
                    notification.event_id = None;
                }
            }
        }
        removed
    }
}

/// Shared in-memory database. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_event(&self, event: HealthEvent) {
        self.state().events.insert(event.id, event);
    }

    pub fn add_professional(&self, professional: Professional) {
        self.state().professionals.insert(professional.id, professional);
    }

    pub fn add_notification(&self, notification: Notification) {
        self.state()
            .notifications
            .insert(notification.id, notification);
    }

    /// Insert a record directly, bypassing slot checks.
    pub fn add_document(&self, record: DocumentRecord) {
        self.state().documents.insert(record.id, record);
    }

    /// Make every subsequent write fail until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.state().documents.values().cloned().collect()
    }

    pub fn event_exists(&self, id: Uuid) -> bool {
        self.state().events.contains_key(&id)
    }

    pub fn professional_exists(&self, id: Uuid) -> bool {
        self.state().professionals.contains_key(&id)
    }

    pub fn notification(&self, id: Uuid) -> Option<Notification> {
        self.state().notifications.get(&id).cloned()
    }

    /// Ids of records whose insert was refused, in order.
    pub fn failed_inserts(&self) -> Vec<Uuid> {
        self.state().failed_inserts.clone()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDatabase {
    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>, AppError> {
        Ok(self.state().documents.get(&id).cloned())
    }

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<DocumentRecord>, AppError> {
        let mut records: Vec<DocumentRecord> = self
            .state()
            .documents
            .values()
            .filter(|d| d.event_id == Some(event_id) && !d.is_orphaned)
            .cloned()
            .collect();
        records.sort_by_key(|d| (d.slot as u8, d.created_at));
        Ok(records)
    }

    async fn list_orphaned(&self, user_id: Uuid) -> Result<Vec<DocumentRecord>, AppError> {
        let mut records: Vec<DocumentRecord> = self
            .state()
            .documents
            .values()
            .filter(|d| d.user_id == user_id && d.is_orphaned)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn find_in_slot(
        &self,
        event_id: Uuid,
        slot: Slot,
    ) -> Result<Option<DocumentRecord>, AppError> {
        Ok(self
            .state()
            .documents
            .values()
            .find(|d| d.event_id == Some(event_id) && d.slot == slot && !d.is_orphaned)
            .cloned())
    }

    async fn write_slots(
        &self,
        records: Vec<NewDocumentRecord>,
        overwrite: bool,
        archive_notification: Option<Uuid>,
    ) -> Result<Vec<SlotWrite>, AppError> {
        let mut state = self.state();
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        if let Err(e) = state.check_writable() {
            state.failed_inserts.extend(ids);
            return Err(e);
        }

        // Staged on a copy so a refused record leaves the batch unapplied.
        let mut documents = state.documents.clone();
        let mut writes = Vec::with_capacity(records.len());
        for record in records {
            let occupant = documents
                .values()
                .find(|d| {
                    record.event_id.is_some()
                        && d.event_id == record.event_id
                        && d.slot == record.slot
                        && !d.is_orphaned
                })
                .map(|d| d.id);
            if occupant.is_some() && !overwrite {
                state.failed_inserts.extend(ids);
                return Err(slot_conflict(record.slot));
            }
            let replaced = occupant.and_then(|id| documents.remove(&id));

            let inserted = record.into_record(Utc::now());
            documents.insert(inserted.id, inserted.clone());
            writes.push(SlotWrite {
                record: inserted,
                replaced,
            });
        }

        state.documents = documents;
        if let Some(id) = archive_notification {
            if let Some(notification) = state.notifications.get_mut(&id) {
                notification.archived = true;
            }
        }
        Ok(writes)
    }

    async fn insert(&self, record: NewDocumentRecord) -> Result<DocumentRecord, AppError> {
        let mut state = self.state();
        if let Err(e) = state.check_writable() {
            state.failed_inserts.push(record.id);
            return Err(e);
        }
        if state.slot_taken(&record) {
            state.failed_inserts.push(record.id);
            return Err(slot_conflict(record.slot));
        }
        let inserted = record.into_record(Utc::now());
        state.documents.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        state.check_writable()?;
        Ok(state.documents.remove(&id).is_some())
    }
}

#[async_trait]
impl EventRepository for InMemoryDatabase {
    async fn get(&self, id: Uuid) -> Result<Option<HealthEvent>, AppError> {
        Ok(self.state().events.get(&id).cloned())
    }

    async fn list_for_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<HealthEvent>, AppError> {
        let mut events: Vec<HealthEvent> = self
            .state()
            .events
            .values()
            .filter(|e| e.professional_id == Some(professional_id))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn orphan_documents_and_delete(
        &self,
        event_id: Uuid,
        reason: &str,
    ) -> Result<u64, AppError> {
        let mut state = self.state();
        state.check_writable()?;

        let mut orphaned = 0;
        for record in state.documents.values_mut() {
            if record.event_id == Some(event_id) {
                record.is_orphaned = true;
                record.orphaned_reason = Some(reason.to_string());
                record.event_id = None;
                record.professional_id = None;
                orphaned += 1;
            }
        }
        state.remove_event(event_id);
        Ok(orphaned)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        state.check_writable()?;
        Ok(state.remove_event(id))
    }
}

#[async_trait]
impl ProfessionalRepository for InMemoryDatabase {
    async fn get(&self, id: Uuid) -> Result<Option<Professional>, AppError> {
        Ok(self.state().professionals.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        state.check_writable()?;
        if state.professionals.remove(&id).is_none() {
            return Ok(false);
        }

        let event_ids: Vec<Uuid> = state
            .events
            .values()
            .filter(|e| e.professional_id == Some(id))
            .map(|e| e.id)
            .collect();
        for event_id in event_ids {
            state.remove_event(event_id);
        }
        for record in state.documents.values_mut() {
            if record.professional_id == Some(id) {
                record.professional_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryDatabase {
    async fn get(&self, id: Uuid) -> Result<Option<Notification>, AppError> {
        Ok(self.state().notifications.get(&id).cloned())
    }
}

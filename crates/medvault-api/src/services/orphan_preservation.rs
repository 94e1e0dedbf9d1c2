//! Orphan preservation on event and professional deletion
//!
//! Deleting an event keeps its documents by default: they are marked orphaned with a
//! human-readable reason and detached from the event before the event row goes. Deleting a
//! professional copies every document of every one of their events into a fresh orphaned
//! record, then lets the cascade remove the originals.

use std::sync::Arc;

use medvault_core::models::{today, HealthEvent, Professional};
use medvault_core::AppError;
use medvault_db::{DocumentRepository, EventRepository, ProfessionalRepository};
use medvault_storage::StorageManager;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDeletion {
    pub event_id: Uuid,
    /// Records kept as orphans.
    pub orphaned: u64,
    /// Records removed together with their bytes.
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalDeletion {
    pub professional_id: Uuid,
    pub events: usize,
    pub orphaned: u64,
    /// Records that could not be preserved.
    pub failed: u64,
}

pub struct OrphanPreservationService {
    documents: Arc<dyn DocumentRepository>,
    events: Arc<dyn EventRepository>,
    professionals: Arc<dyn ProfessionalRepository>,
    storage: StorageManager,
}

impl OrphanPreservationService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        events: Arc<dyn EventRepository>,
        professionals: Arc<dyn ProfessionalRepository>,
        storage: StorageManager,
    ) -> Self {
        Self {
            documents,
            events,
            professionals,
            storage,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.documents.clone(),
            state.events.clone(),
            state.professionals.clone(),
            state.storage.clone(),
        )
    }

    /// Delete an event, either keeping its documents as orphans or removing them with
    /// their bytes.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn delete_event(
        &self,
        event: &HealthEvent,
        delete_files: bool,
    ) -> Result<EventDeletion, AppError> {
        if delete_files {
            return self.delete_event_with_files(event).await;
        }

        let professional_name = match event.professional_id {
            Some(id) => match self.professionals.get(id).await {
                Ok(professional) => professional.map(|p| p.name),
                Err(e) => {
                    tracing::warn!(
                        professional_id = %id,
                        error = %e,
                        "Could not resolve professional for orphan reason"
                    );
                    None
                }
            },
            None => None,
        };
        let reason = event.orphan_reason(professional_name.as_deref(), today());

        let orphaned = self
            .events
            .orphan_documents_and_delete(event.id, &reason)
            .await?;

        tracing::info!(orphaned, "Event deleted, documents preserved");
        Ok(EventDeletion {
            event_id: event.id,
            orphaned,
            deleted: 0,
        })
    }

    async fn delete_event_with_files(&self, event: &HealthEvent) -> Result<EventDeletion, AppError> {
        let records = self.documents.list_for_event(event.id).await?;
        let mut deleted = 0;

        for record in records {
            // Bytes go only once their record is gone, so no record points at missing bytes.
            if let Err(e) = self.documents.delete(record.id).await {
                tracing::warn!(document_id = %record.id, error = %e, "Failed to delete document record");
                continue;
            }
            deleted += 1;
            let file_id = record.storage_file_id();
            if !self.storage.delete(&file_id).await {
                tracing::warn!(
                    document_id = %record.id,
                    file_id = %file_id,
                    "Provider did not delete document bytes"
                );
            }
        }

        self.events.delete(event.id).await?;

        tracing::info!(deleted, "Event deleted with its documents");
        Ok(EventDeletion {
            event_id: event.id,
            orphaned: 0,
            deleted,
        })
    }

    /// Preserve every document of the professional's events as an orphaned copy, then
    /// delete the professional. A copy that fails is logged and skipped.
    #[tracing::instrument(skip(self, professional), fields(professional_id = %professional.id))]
    pub async fn delete_professional(
        &self,
        professional: &Professional,
    ) -> Result<ProfessionalDeletion, AppError> {
        let events = self
            .events
            .list_for_professional(professional.id)
            .await?;
        let deleted_on = today();
        let mut orphaned = 0;
        let mut failed = 0;

        for event in &events {
            let records = match self.documents.list_for_event(event.id).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(event_id = %event.id, error = %e, "Could not list event documents");
                    failed += 1;
                    continue;
                }
            };

            let reason = event.professional_orphan_reason(&professional.name, deleted_on);
            for record in records {
                match self
                    .documents
                    .insert(record.orphaned_copy(reason.clone()))
                    .await
                {
                    Ok(copy) => {
                        tracing::debug!(original = %record.id, copy = %copy.id, "Document preserved");
                        orphaned += 1;
                    }
                    Err(e) => {
                        tracing::warn!(document_id = %record.id, error = %e, "Failed to preserve document");
                        failed += 1;
                    }
                }
            }
        }

        self.professionals.delete(professional.id).await?;

        tracing::info!(
            events = events.len(),
            orphaned,
            failed,
            "Professional deleted"
        );
        Ok(ProfessionalDeletion {
            professional_id: professional.id,
            events: events.len(),
            orphaned,
            failed,
        })
    }
}

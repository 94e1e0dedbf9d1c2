//! Slot reconciliation and the overwrite conflict protocol
//!
//! A submission proposes documents for named slots of one event. An occupied slot is only
//! replaced when the client has confirmed the overwrite; otherwise the answer is a
//! conflict and nothing is touched, so the same body can simply be resent with the flag
//! flipped. A submission is all-or-nothing: every document passes the provider checks
//! before any byte is stored, all records and the notification archival commit in one
//! transaction, and uploaded bytes are removed again when that transaction fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use medvault_core::dates::parse_lenient_date;
use medvault_core::models::{today, DocumentRecord, HealthEvent, NewDocumentRecord, Slot};
use medvault_core::{AppError, DocumentContent, ErrorMetadata};
use medvault_db::DocumentRepository;
use medvault_storage::{StorageManager, StoredFile, UploadOptions};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::upload_failure_to_app_error;
use crate::middleware::{AuditOrigin, AuditRecord, AuditSink};
use crate::state::AppState;

/// One document in a submission.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProposedDocument {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Document name must be between 1 and 255 characters"
    ))]
    pub name: String,
    /// Falls back to the type declared by a data URL in `content`.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Standard base64, optionally as a `data:<mime>;base64,` URL.
    #[validate(length(min = 1, message = "Document content must not be empty"))]
    pub content: String,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProposeDocumentsRequest {
    /// Documents keyed by slot name (`request`, `authorization`, `certificate`, `result`,
    /// `prescription`, `invoice`).
    pub documents: BTreeMap<String, ProposedDocument>,
}

impl ProposeDocumentsRequest {
    /// Document names joined for audit records that cover the whole submission.
    pub fn label(&self) -> String {
        self.documents
            .values()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn into_slots(self) -> Result<Vec<(Slot, ProposedDocument)>, AppError> {
        self.documents
            .into_iter()
            .map(|(key, document)| -> Result<(Slot, ProposedDocument), AppError> {
                let slot = key
                    .parse::<Slot>()
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                document.validate()?;
                Ok((slot, document))
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct Submission {
    pub user_id: Uuid,
    pub event: HealthEvent,
    pub documents: Vec<(Slot, ProposedDocument)>,
    pub target_slot: Option<Slot>,
    pub overwrite_confirmed: bool,
    pub source_notification: Option<Uuid>,
}

impl Submission {
    pub fn origin(&self) -> AuditOrigin {
        origin_for(self.source_notification.is_some())
    }
}

/// Documents arriving through a notification are audited as such.
pub fn origin_for(from_notification: bool) -> AuditOrigin {
    if from_notification {
        AuditOrigin::Notification
    } else {
        AuditOrigin::Upload
    }
}

#[derive(Debug)]
pub enum SlotOutcome {
    Stored(Vec<DocumentRecord>),
    Conflict { slot: Slot, warning: String },
}

pub fn conflict_warning(slot: Slot) -> String {
    format!("A {} document already exists for this event", slot.label())
}

/// One document with its dates parsed and upload options resolved.
struct PlannedUpload {
    record_id: Uuid,
    slot: Slot,
    name: String,
    content: DocumentContent,
    options: UploadOptions,
    upload_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
}

impl PlannedUpload {
    fn new(event: &HealthEvent, slot: Slot, document: ProposedDocument) -> Self {
        // The record id doubles as the local file id.
        let record_id = Uuid::new_v4();
        let upload_date = match document.upload_date.as_deref() {
            None => Some(today()),
            raw => parse_lenient_date(raw),
        };
        let expiry_date = parse_lenient_date(document.expiry_date.as_deref());
        let options = UploadOptions::new(
            document.name.clone(),
            document.mime_type.unwrap_or_default(),
        )
        .with_event(event.id)
        .with_slot(slot)
        .with_file_id(record_id)
        .with_expiry(expiry_date);

        Self {
            record_id,
            slot,
            name: document.name,
            content: DocumentContent::Base64(document.content),
            options,
            upload_date,
            expiry_date,
        }
    }

    fn into_record(
        self,
        user_id: Uuid,
        event: &HealthEvent,
        stored: StoredFile,
    ) -> NewDocumentRecord {
        NewDocumentRecord {
            id: self.record_id,
            user_id,
            slot: self.slot,
            event_id: Some(event.id),
            professional_id: event.professional_id,
            name: self.name,
            url: stored.url,
            physical_path: stored.physical_path,
            file_hash: Some(stored.file_hash),
            upload_date: self.upload_date,
            expiry_date: self.expiry_date,
            is_orphaned: false,
            orphaned_reason: None,
        }
    }
}

pub struct SlotReconciler {
    documents: Arc<dyn DocumentRepository>,
    storage: StorageManager,
    audit: Arc<dyn AuditSink>,
}

impl SlotReconciler {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        storage: StorageManager,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            documents,
            storage,
            audit,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.documents.clone(),
            state.storage.clone(),
            state.audit.clone(),
        )
    }

    /// Audit a submission refused before it reached [`SlotReconciler::submit`].
    pub async fn reject(
        &self,
        user_id: Uuid,
        origin: AuditOrigin,
        file_name: &str,
        error: &AppError,
    ) {
        self.audit
            .record(AuditRecord::failure(
                user_id,
                origin,
                None,
                file_name,
                error.client_message(),
            ))
            .await;
    }

    #[tracing::instrument(
        skip(self, submission),
        fields(
            event_id = %submission.event.id,
            user_id = %submission.user_id,
            overwrite = submission.overwrite_confirmed,
            operation = "submit_documents"
        )
    )]
    pub async fn submit(&self, submission: Submission) -> Result<SlotOutcome, AppError> {
        let user_id = submission.user_id;
        let origin = submission.origin();
        let names: Vec<(Slot, String)> = submission
            .documents
            .iter()
            .map(|(slot, document)| (*slot, document.name.clone()))
            .collect();

        match self.reconcile(submission).await {
            Ok(SlotOutcome::Stored(records)) => {
                for record in &records {
                    self.audit
                        .record(AuditRecord::success(
                            user_id,
                            origin,
                            record.id,
                            &record.name,
                            record.file_hash.clone(),
                        ))
                        .await;
                }
                Ok(SlotOutcome::Stored(records))
            }
            Ok(SlotOutcome::Conflict { slot, warning }) => {
                let name = names
                    .iter()
                    .find(|(s, _)| *s == slot)
                    .map(|(_, name)| name.as_str())
                    .unwrap_or_default();
                self.audit
                    .record(AuditRecord::failure(user_id, origin, None, name, &warning))
                    .await;
                Ok(SlotOutcome::Conflict { slot, warning })
            }
            Err(e) => {
                let label = names
                    .iter()
                    .map(|(_, name)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                self.reject(user_id, origin, &label, &e).await;
                Err(e)
            }
        }
    }

    async fn reconcile(&self, submission: Submission) -> Result<SlotOutcome, AppError> {
        let Submission {
            user_id,
            event,
            documents,
            target_slot,
            overwrite_confirmed,
            source_notification,
        } = submission;

        let documents: Vec<(Slot, ProposedDocument)> = match target_slot {
            Some(target) => documents
                .into_iter()
                .filter(|(slot, _)| *slot == target)
                .collect(),
            None => documents,
        };
        if documents.is_empty() {
            return Err(AppError::InvalidInput(match target_slot {
                Some(slot) => format!("No document proposed for slot '{}'", slot),
                None => "No documents proposed".to_string(),
            }));
        }

        let slots: Vec<Slot> = documents.iter().map(|(slot, _)| *slot).collect();

        // Every slot is checked before anything is uploaded, so a conflict leaves storage
        // and database exactly as they were.
        if !overwrite_confirmed {
            if let Some(slot) = self.first_occupied(event.id, &slots).await? {
                tracing::debug!(slot = %slot, "Slot occupied, overwrite not confirmed");
                return Ok(SlotOutcome::Conflict {
                    slot,
                    warning: conflict_warning(slot),
                });
            }
        }

        let planned: Vec<PlannedUpload> = documents
            .into_iter()
            .map(|(slot, document)| PlannedUpload::new(&event, slot, document))
            .collect();
        for plan in &planned {
            self.storage
                .check(&plan.content, &plan.options)
                .map_err(upload_failure_to_app_error)?;
        }

        let mut uploaded: Vec<String> = Vec::with_capacity(planned.len());
        let mut records = Vec::with_capacity(planned.len());
        for plan in planned {
            let stored = match self.storage.upload(&plan.content, &plan.options).await {
                Ok(stored) => stored,
                Err(failure) => {
                    self.remove_uploaded(&uploaded).await;
                    return Err(upload_failure_to_app_error(failure));
                }
            };
            uploaded.push(stored.id.clone());
            records.push(plan.into_record(user_id, &event, stored));
        }

        let writes = match self
            .documents
            .write_slots(records, overwrite_confirmed, source_notification)
            .await
        {
            Ok(writes) => writes,
            Err(AppError::Conflict(warning)) => {
                // A concurrent submission took a slot between the check and the write.
                self.remove_uploaded(&uploaded).await;
                let slot = self
                    .first_occupied(event.id, &slots)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or(slots[0]);
                return Ok(SlotOutcome::Conflict { slot, warning });
            }
            Err(e) => {
                self.remove_uploaded(&uploaded).await;
                return Err(e);
            }
        };

        let mut stored = Vec::with_capacity(writes.len());
        for write in writes {
            if let Some(replaced) = &write.replaced {
                self.discard_replaced(replaced).await;
            }
            tracing::info!(
                document_id = %write.record.id,
                slot = %write.record.slot,
                "Document stored"
            );
            stored.push(write.record);
        }
        Ok(SlotOutcome::Stored(stored))
    }

    async fn first_occupied(
        &self,
        event_id: Uuid,
        slots: &[Slot],
    ) -> Result<Option<Slot>, AppError> {
        for slot in slots {
            if self.documents.find_in_slot(event_id, *slot).await?.is_some() {
                return Ok(Some(*slot));
            }
        }
        Ok(None)
    }

    async fn remove_uploaded(&self, file_ids: &[String]) {
        for file_id in file_ids {
            if !self.storage.delete(file_id).await {
                tracing::warn!(
                    file_id = %file_id,
                    "Could not remove uploaded bytes after failed submission"
                );
            }
        }
    }

    /// Drop the bytes of a record replaced by a confirmed overwrite.
    async fn discard_replaced(&self, replaced: &DocumentRecord) {
        let file_id = replaced.storage_file_id();
        if !self.storage.delete(&file_id).await {
            tracing::warn!(
                document_id = %replaced.id,
                file_id = %file_id,
                "Replaced document bytes were not removed"
            );
        }
    }
}

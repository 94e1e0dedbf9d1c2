//! Document lifecycle services
//!
//! Handlers stay thin: they authenticate, authorize and translate headers, then hand over
//! to one of these services, which can be unit tested without HTTP.

pub mod download;
pub mod orphan_preservation;
pub mod slot_reconciliation;

pub use download::{is_allowed_path, DownloadService, DownloadTarget};
pub use orphan_preservation::{EventDeletion, OrphanPreservationService, ProfessionalDeletion};
pub use slot_reconciliation::{
    origin_for, ProposeDocumentsRequest, ProposedDocument, SlotOutcome, SlotReconciler,
    Submission,
};

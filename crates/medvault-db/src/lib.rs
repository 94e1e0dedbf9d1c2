//! Medvault database layer
//!
//! Repository traits describe what the services need; `Pg*` types implement them on
//! PostgreSQL with sqlx. Every multi-step mutation runs inside one transaction.
//! With the `test-helpers` feature an in-memory implementation with the same cascade
//! rules is available for tests that should not need a database.

pub mod db;

pub use db::{
    DocumentRepository, EventRepository, NotificationRepository, PgDocumentRepository,
    PgEventRepository, PgNotificationRepository, PgProfessionalRepository,
    ProfessionalRepository, SlotWrite,
};

#[cfg(any(test, feature = "test-helpers"))]
pub use db::memory::InMemoryDatabase;

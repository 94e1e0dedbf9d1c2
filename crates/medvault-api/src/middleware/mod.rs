pub mod audit;

pub use audit::{AuditOrigin, AuditRecord, AuditSink, RecordingAuditSink, TracingAuditSink};

//! Audit logging: signed, append-only records in a SQLite store.

mod export;
mod logger;
mod store;

pub use export::{export_csv, export_json};
pub use logger::{AuditLogger, AuditLoggerConfig};
pub use store::{AuditQuery, AuditStore};

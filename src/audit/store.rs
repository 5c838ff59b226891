//! SQLite persistence for audit logs and trails.

use crate::error::{Error, Result};
use crate::models::audit::{AuditLevel, AuditLog, AuditOperation};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Current audit schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Filters for audit queries; provided fields are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub operation: Option<AuditOperation>,
    pub level: Option<AuditLevel>,
    pub document_id: Option<String>,
    pub user_id: Option<String>,
    pub chain_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl AuditQuery {
    /// Filter by operation.
    pub fn operation(mut self, operation: AuditOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Filter by document.
    pub fn document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Filter by chain.
    pub fn chain(mut self, chain_id: Uuid) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Filter by time window.
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

/// SQLite-backed audit store.
///
/// A single mutex serializes writers; readers share the same connection and
/// take the lock only for the duration of their statement.
pub struct AuditStore {
    conn: Arc<Mutex<Connection>>,
}

impl AuditStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| Error::audit_storage(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::audit_storage(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::audit_storage(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::audit_storage(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("failed to lock connection: {}", e)))?;
        f(&conn).map_err(|e| Error::audit_storage(e.to_string()))
    }

    // ==================== Log operations ====================

    /// Insert a log record.
    pub fn insert_log(&self, log: &AuditLog) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_logs (
                    id, operation, timestamp, level, document_id, user_id,
                    session_id, profile_name, detections_summary, input_hash,
                    output_hash, file_paths, error_message, warning_messages,
                    processing_time_ms, memory_usage, signature, parent_id,
                    chain_id, system_info, details
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                          ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    log.id.to_string(),
                    log.operation.as_str(),
                    log.timestamp.to_rfc3339(),
                    log.level.as_str(),
                    log.document_id,
                    log.user_id,
                    log.session_id,
                    log.profile_name,
                    serde_json::to_string(&log.detections_summary).unwrap_or_default(),
                    log.input_hash,
                    log.output_hash,
                    serde_json::to_string(&log.file_paths).unwrap_or_default(),
                    log.error_message,
                    serde_json::to_string(&log.warning_messages).unwrap_or_default(),
                    log.processing_time_ms.map(|v| v as i64),
                    log.memory_usage.map(|v| v as i64),
                    log.signature,
                    log.parent_id.map(|id| id.to_string()),
                    log.chain_id.map(|id| id.to_string()),
                    serde_json::to_string(&log.system_info).unwrap_or_default(),
                    serde_json::to_string(&log.details).unwrap_or_default(),
                ],
            )?;
            Ok(())
        })
    }

    /// Get a log by ID.
    pub fn get_log(&self, id: Uuid) -> Result<Option<AuditLog>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM audit_logs WHERE id = ?1", LOG_COLUMNS),
                params![id.to_string()],
                row_to_log,
            )
            .optional()
        })
    }

    /// Query logs with AND semantics across provided filters.
    pub fn query(&self, query: &AuditQuery, limit: Option<usize>) -> Result<Vec<AuditLog>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {} FROM audit_logs WHERE 1=1",
                LOG_COLUMNS
            );
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(op) = query.operation {
                sql.push_str(" AND operation = ?");
                params_vec.push(Box::new(op.as_str().to_string()));
            }
            if let Some(level) = query.level {
                sql.push_str(" AND level = ?");
                params_vec.push(Box::new(level.as_str().to_string()));
            }
            if let Some(ref document_id) = query.document_id {
                sql.push_str(" AND document_id = ?");
                params_vec.push(Box::new(document_id.clone()));
            }
            if let Some(ref user_id) = query.user_id {
                sql.push_str(" AND user_id = ?");
                params_vec.push(Box::new(user_id.clone()));
            }
            if let Some(chain_id) = query.chain_id {
                sql.push_str(" AND chain_id = ?");
                params_vec.push(Box::new(chain_id.to_string()));
            }
            if let Some(start) = query.start {
                sql.push_str(" AND timestamp >= ?");
                params_vec.push(Box::new(start.to_rfc3339()));
            }
            if let Some(end) = query.end {
                sql.push_str(" AND timestamp <= ?");
                params_vec.push(Box::new(end.to_rfc3339()));
            }

            sql.push_str(" ORDER BY rowid ASC");
            if let Some(limit) = limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            let rows = stmt.query_map(params_refs.as_slice(), row_to_log)?;
            rows.collect()
        })
    }

    /// All signed logs.
    pub fn signed_logs(&self) -> Result<Vec<AuditLog>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM audit_logs WHERE signature IS NOT NULL ORDER BY rowid ASC",
                LOG_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_log)?;
            rows.collect()
        })
    }

    /// Number of stored logs.
    pub fn count_logs(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM audit_logs", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
        })
    }

    /// Delete logs older than the cutoff; returns the number removed.
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM audit_logs WHERE timestamp < ?1",
                params![cutoff.to_rfc3339()],
            )
            .map(|n| n as usize)
        })
    }

    // ==================== Trail operations ====================

    /// Insert a trail row.
    pub fn insert_trail(
        &self,
        id: Uuid,
        name: &str,
        metadata: &HashMap<String, Value>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_trails (id, name, metadata, log_ids) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    name,
                    serde_json::to_string(metadata).unwrap_or_default(),
                    "[]",
                ],
            )?;
            Ok(())
        })
    }

    /// Append a log ID to a trail's ordered list.
    pub fn append_to_trail(&self, trail_id: Uuid, log_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT log_ids FROM audit_trails WHERE id = ?1",
                    params![trail_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;

            let mut ids: Vec<String> = existing
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default();
            ids.push(log_id.to_string());

            conn.execute(
                "UPDATE audit_trails SET log_ids = ?2 WHERE id = ?1",
                params![
                    trail_id.to_string(),
                    serde_json::to_string(&ids).unwrap_or_default()
                ],
            )?;
            Ok(())
        })
    }

    /// Load a trail's log IDs in insertion order.
    pub fn trail_log_ids(&self, trail_id: Uuid) -> Result<Vec<Uuid>> {
        let raw: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT log_ids FROM audit_trails WHERE id = ?1",
                params![trail_id.to_string()],
                |row| row.get(0),
            )
            .optional()
        })?;

        let Some(raw) = raw else {
            return Err(Error::audit_storage(format!("trail {} not found", trail_id)));
        };
        let ids: Vec<String> = serde_json::from_str(&raw)?;
        ids.iter()
            .map(|s| {
                Uuid::parse_str(s)
                    .map_err(|e| Error::audit_storage(format!("bad log id in trail: {}", e)))
            })
            .collect()
    }
}

/// Column list shared by every log SELECT.
const LOG_COLUMNS: &str = "id, operation, timestamp, level, document_id, user_id, session_id, \
     profile_name, detections_summary, input_hash, output_hash, file_paths, error_message, \
     warning_messages, processing_time_ms, memory_usage, signature, parent_id, chain_id, \
     system_info, details";

fn row_to_log(row: &Row<'_>) -> rusqlite::Result<AuditLog> {
    let parse_err =
        |i: usize, e: String| rusqlite::Error::FromSqlConversionFailure(
            i,
            rusqlite::types::Type::Text,
            e.into(),
        );

    let id: String = row.get(0)?;
    let operation: String = row.get(1)?;
    let timestamp: String = row.get(2)?;
    let level: String = row.get(3)?;

    let detections_summary: Option<String> = row.get(8)?;
    let file_paths: Option<String> = row.get(11)?;
    let warning_messages: Option<String> = row.get(13)?;
    let parent_id: Option<String> = row.get(17)?;
    let chain_id: Option<String> = row.get(18)?;
    let system_info: Option<String> = row.get(19)?;
    let details: Option<String> = row.get(20)?;

    Ok(AuditLog {
        id: Uuid::parse_str(&id).map_err(|e| parse_err(0, e.to_string()))?,
        operation: AuditOperation::parse(&operation)
            .ok_or_else(|| parse_err(1, format!("unknown operation '{}'", operation)))?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| parse_err(2, e.to_string()))?
            .with_timezone(&Utc),
        level: AuditLevel::parse(&level)
            .ok_or_else(|| parse_err(3, format!("unknown level '{}'", level)))?,
        document_id: row.get(4)?,
        user_id: row.get(5)?,
        session_id: row.get(6)?,
        profile_name: row.get(7)?,
        detections_summary: detections_summary
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default(),
        input_hash: row.get(9)?,
        output_hash: row.get(10)?,
        file_paths: file_paths
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default(),
        error_message: row.get(12)?,
        warning_messages: warning_messages
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default(),
        processing_time_ms: row.get::<_, Option<i64>>(14)?.map(|v| v as u64),
        memory_usage: row.get::<_, Option<i64>>(15)?.map(|v| v as u64),
        signature: row.get(16)?,
        parent_id: parent_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok()),
        chain_id: chain_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        system_info: system_info
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default(),
        details: details
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default(),
    })
}

/// Initialize the audit schema.
fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

fn apply_v1_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            operation TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            level TEXT NOT NULL,
            document_id TEXT,
            user_id TEXT,
            session_id TEXT,
            profile_name TEXT,
            detections_summary TEXT,
            input_hash TEXT,
            output_hash TEXT,
            file_paths TEXT,
            error_message TEXT,
            warning_messages TEXT,
            processing_time_ms INTEGER,
            memory_usage INTEGER,
            signature TEXT,
            parent_id TEXT,
            chain_id TEXT,
            system_info TEXT,
            details TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_trails (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            metadata TEXT,
            log_ids TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_operation ON audit_logs(operation)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_logs(timestamp)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_document ON audit_logs(document_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_logs(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_chain ON audit_logs(chain_id)",
        [],
    )?;

    conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    Ok(())
}

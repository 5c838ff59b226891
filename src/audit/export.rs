//! Audit export: JSON envelopes and fixed-column CSV.

use crate::audit::logger::AuditLogger;
use crate::audit::store::AuditQuery;
use crate::error::{Error, Result};
use chrono::Utc;
use serde_json::json;
use std::path::Path;

/// CSV column set for audit exports.
const CSV_COLUMNS: [&str; 11] = [
    "ID",
    "Operation",
    "Timestamp",
    "Level",
    "Document ID",
    "User ID",
    "Profile",
    "Input Hash",
    "Output Hash",
    "Signed",
    "Error",
];

/// Export matching logs as a JSON envelope; returns the log count.
pub fn export_json(logger: &AuditLogger, path: &Path, query: &AuditQuery) -> Result<usize> {
    let logs = logger.query(query, None)?;

    let envelope = json!({
        "export_timestamp": Utc::now(),
        "query_params": {
            "operation": query.operation.map(|o| o.as_str()),
            "level": query.level.map(|l| l.as_str()),
            "document_id": query.document_id,
            "user_id": query.user_id,
            "chain_id": query.chain_id,
            "start": query.start,
            "end": query.end,
        },
        "total_logs": logs.len(),
        "logs": logs,
    });

    std::fs::write(path, serde_json::to_string_pretty(&envelope)?)?;
    Ok(logs.len())
}

/// Export matching logs as CSV with the fixed column set; returns the count.
pub fn export_csv(logger: &AuditLogger, path: &Path, query: &AuditQuery) -> Result<usize> {
    let logs = logger.query(query, None)?;

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::Internal(format!("csv open failed: {}", e)))?;
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|e| Error::Internal(format!("csv write failed: {}", e)))?;

    for log in &logs {
        writer
            .write_record([
                log.id.to_string(),
                log.operation.to_string(),
                log.timestamp.to_rfc3339(),
                log.level.to_string(),
                log.document_id.clone().unwrap_or_default(),
                log.user_id.clone().unwrap_or_default(),
                log.profile_name.clone().unwrap_or_default(),
                log.input_hash.clone().unwrap_or_default(),
                log.output_hash.clone().unwrap_or_default(),
                log.is_signed().to_string(),
                log.error_message.clone().unwrap_or_default(),
            ])
            .map_err(|e| Error::Internal(format!("csv write failed: {}", e)))?;
    }

    writer
        .flush()
        .map_err(|e| Error::Internal(format!("csv flush failed: {}", e)))?;
    Ok(logs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::logger::AuditLoggerConfig;
    use crate::audit::store::AuditStore;
    use crate::crypto::SigningKeyPair;
    use crate::models::audit::{AuditLevel, AuditLog, AuditOperation};
    use pretty_assertions::assert_eq;

    fn logger_with_logs() -> AuditLogger {
        let logger = AuditLogger::new(
            AuditStore::in_memory().unwrap(),
            Some(SigningKeyPair::generate().unwrap()),
            AuditLoggerConfig::default(),
        );
        logger
            .log_operation(
                AuditLog::new(AuditOperation::DocumentUpload, AuditLevel::Info)
                    .with_document_id("doc-1"),
            )
            .unwrap();
        logger
            .log_operation(
                AuditLog::new(AuditOperation::DocumentRedaction, AuditLevel::Info)
                    .with_document_id("doc-1")
                    .with_hashes(Some("aaa".into()), Some("bbb".into())),
            )
            .unwrap();
        logger
    }

    #[test]
    fn test_export_json_envelope() {
        let logger = logger_with_logs();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        let count = export_json(&logger, &path, &AuditQuery::default()).unwrap();
        assert_eq!(count, 2);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_logs"], json!(2));
        assert_eq!(value["logs"].as_array().unwrap().len(), 2);
        assert!(value["export_timestamp"].is_string());
    }

    #[test]
    fn test_export_csv_columns() {
        let logger = logger_with_logs();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");

        export_csv(&logger, &path, &AuditQuery::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Operation,Timestamp,Level,Document ID,User ID,Profile,Input Hash,Output Hash,Signed,Error"
        );
        assert_eq!(lines.count(), 2);
        assert!(content.contains("document_redaction"));
        assert!(content.contains("true"));
    }

    #[test]
    fn test_export_respects_filters() {
        let logger = logger_with_logs();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered.json");

        let count = export_json(
            &logger,
            &path,
            &AuditQuery::default().operation(AuditOperation::DocumentRedaction),
        )
        .unwrap();
        assert_eq!(count, 1);
    }
}

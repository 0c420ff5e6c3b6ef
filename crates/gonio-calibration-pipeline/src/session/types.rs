//! Session bookkeeping: metadata, operation log, export records.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Metadata about a calibration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Problem type identifier (`ProblemType::name()`).
    pub problem_type: String,

    /// Schema version (`ProblemType::schema_version()`).
    pub schema_version: u32,

    /// Seconds since the Unix epoch.
    pub created_at: u64,

    /// Seconds since the Unix epoch.
    pub last_modified: u64,
}

impl SessionMetadata {
    pub fn new(problem_type: impl Into<String>, schema_version: u32) -> Self {
        let now = current_timestamp();
        Self {
            problem_type: problem_type.into(),
            schema_version,
            created_at: now,
            last_modified: now,
        }
    }

    /// Set `last_modified` to now.
    pub fn touch(&mut self) {
        self.last_modified = current_timestamp();
    }
}

/// One entry of the session's audit trail.
///
/// Steps record what they did and failures record why; not meant for replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: u64,

    /// Step name, e.g. `"seed"`, `"extend"`.
    pub operation: String,

    pub success: bool,

    /// Summary on success, error chain on failure.
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn success(operation: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: true,
            notes: None,
        }
    }

    pub fn success_with_notes(operation: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::success(operation)
        }
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: false,
            notes: Some(error.into()),
        }
    }
}

/// A stored export.
///
/// Created by [`CalibrationSession::export`](super::CalibrationSession::export).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord<E> {
    pub timestamp: u64,
    pub export: E,
}

impl<E> ExportRecord<E> {
    pub fn new(export: E) -> Self {
        Self {
            timestamp: current_timestamp(),
            export,
        }
    }
}

/// Current Unix time in seconds; 0 if the clock is before the epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_records_problem_and_times() {
        let meta = SessionMetadata::new("goniometer", 2);
        assert_eq!(meta.problem_type, "goniometer");
        assert_eq!(meta.schema_version, 2);
        assert_eq!(meta.created_at, meta.last_modified);
    }

    #[test]
    fn touch_never_goes_back() {
        let mut meta = SessionMetadata::new("goniometer", 1);
        let before = meta.last_modified;
        meta.touch();
        assert!(meta.last_modified >= before);
    }

    #[test]
    fn log_entries_carry_notes() {
        let ok = LogEntry::success_with_notes("seed", "2 geometries");
        assert!(ok.success);
        assert_eq!(ok.notes.as_deref(), Some("2 geometries"));

        let failed = LogEntry::failure("seed", "missing artifact");
        assert!(!failed.success);
        assert_eq!(failed.operation, "seed");
    }

    #[test]
    fn export_record_serializes() {
        let record = ExportRecord::new(vec![0.1, 0.2]);
        let json = serde_json::to_string(&record).unwrap();
        let restored: ExportRecord<Vec<f64>> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.export, vec![0.1, 0.2]);
        assert_eq!(restored.timestamp, record.timestamp);
    }
}

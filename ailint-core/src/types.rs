//! Core domain types for ailint
//!
//! These types model one run of the code analyzer and the session metadata
//! that the persistence layer stores across runs.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Record** | One analysis outcome handed to the storage layer ([`AnalysisRecord`]) |
//! | **Document** | The stored form of a record, as read back from a backend ([`AnalysisDocument`]) |
//! | **Finding** | One diagnostic item with a line/column, severity, and message |
//! | **Session** | One application run, tracked by id with an activity counter |
//!
//! A record is created once per analysis run, persisted once, and never
//! mutated afterwards. A session is created once per application run and
//! updated in place on each recorded activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::codec::{PayloadValue, StorageValue};

/// Maximum number of characters of source code kept in a stored record.
pub const CODE_PREVIEW_LIMIT: usize = 500;

/// Marker appended when stored code content was truncated.
pub const TRUNCATION_MARKER: &str = "...";

// ============================================
// Analysis status
// ============================================

/// Lifecycle status of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::InProgress => "in_progress",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "in_progress" => Ok(AnalysisStatus::InProgress),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            _ => Err(format!("unknown analysis status: {}", s)),
        }
    }
}

// ============================================
// Findings
// ============================================

/// Severity of a single finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// One diagnostic produced by the analysis pipeline.
///
/// Findings round-trip through the serialization codec via the reserved
/// `object_type` discriminator (see [`crate::codec`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based line number
    pub line_number: u32,
    /// 1-based column
    pub column: u32,
    /// Free-form tag from the producing tool (e.g. "unused-import")
    pub error_type: String,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
    pub code_snippet: Option<String>,
}

// ============================================
// Analysis records
// ============================================

/// One analysis outcome, as handed to the storage layer.
///
/// The identifier is assigned by the backend at save time and is therefore
/// absent here; the stored form is [`AnalysisDocument`].
#[derive(Debug)]
pub struct AnalysisRecord {
    /// When the analysis ran
    pub timestamp: DateTime<Utc>,
    /// Name of the analyzed file
    pub file_name: String,
    /// Raw source code; truncated to [`CODE_PREVIEW_LIMIT`] chars at save time
    pub code_content: String,
    /// Opaque nested payload from the analysis producers
    pub analysis_results: BTreeMap<String, PayloadValue>,
    pub status: AnalysisStatus,
    /// Wall-clock seconds the analysis took (non-negative)
    pub execution_time: f64,
    pub error_count: u32,
    pub warning_count: u32,
}

impl AnalysisRecord {
    /// Create a pending record for a file, timestamped now.
    pub fn new(file_name: impl Into<String>, code_content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            file_name: file_name.into(),
            code_content: code_content.into(),
            analysis_results: BTreeMap::new(),
            status: AnalysisStatus::Pending,
            execution_time: 0.0,
            error_count: 0,
            warning_count: 0,
        }
    }
}

/// The stored form of an analysis record, as read back from a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDocument {
    /// Backend-assigned identifier. A `local_` prefix marks a record written
    /// by the file backend, an `error_` prefix a degraded save.
    #[serde(default)]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub code_content: String,
    /// Codec output; arbitrary nested structure
    pub analysis_results: StorageValue,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub error_count: i64,
    #[serde(default)]
    pub warning_count: i64,
    /// When the record was persisted (distinct from `timestamp`)
    pub saved_at: DateTime<Utc>,
    /// Environment info attached by the remote backend, absent locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_info: Option<BTreeMap<String, String>>,
}

/// Apply the save-time code preview rule: at most [`CODE_PREVIEW_LIMIT`]
/// characters, followed by the truncation marker when anything was cut.
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn truncate_code(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(CODE_PREVIEW_LIMIT) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

// ============================================
// Sessions
// ============================================

/// One application run, tracked across saves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// Opaque unique id (UUID v4)
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    /// Monotonically non-decreasing; bumped on each recorded activity
    pub last_activity: DateTime<Utc>,
    /// Incremented once per recorded activity
    #[serde(default)]
    pub analyses_count: u64,
}

impl UserSession {
    /// Start a fresh session with a random id.
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            start_time: now,
            last_activity: now,
            analyses_count: 0,
        }
    }
}

// ============================================
// Statistics and storage introspection
// ============================================

/// Aggregate statistics over stored analysis records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_analyses: u64,
    pub total_errors: i64,
    pub total_warnings: i64,
    /// Mean execution time over records where it is present, rounded to
    /// two decimals; 0 when no record carries one
    pub avg_execution_time: f64,
    /// Fixed tag naming the backend that produced these numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}

/// Which backend the coordinator is currently using.
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub uses_remote: bool,
    pub storage_type: String,
    pub local_data_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::InProgress,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<AnalysisStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_severity_round_trip() {
        for severity in [
            Severity::Critical,
            Severity::Error,
            Severity::Warning,
            Severity::Info,
        ] {
            assert_eq!(severity.as_str().parse::<Severity>(), Ok(severity));
        }
    }

    #[test]
    fn test_truncate_long_code() {
        let code = "x".repeat(600);
        let stored = truncate_code(&code);
        assert_eq!(stored.len(), 503);
        assert!(stored.starts_with(&"x".repeat(500)));
        assert!(stored.ends_with("..."));
    }

    #[test]
    fn test_truncate_short_code_unchanged() {
        let code = "y".repeat(400);
        assert_eq!(truncate_code(&code), code);
    }

    #[test]
    fn test_truncate_exact_limit_unchanged() {
        let code = "z".repeat(500);
        assert_eq!(truncate_code(&code), code);
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let code = "ż".repeat(600);
        let stored = truncate_code(&code);
        assert_eq!(stored.chars().count(), 503);
        assert!(stored.ends_with("..."));
    }
}

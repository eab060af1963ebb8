//! File-backed storage for analysis history and sessions
//!
//! Persists two JSON files under a per-user data directory: one array of
//! analysis records (most recent first, capped at [`HISTORY_CAP`] entries)
//! and one array of user sessions. Each write rewrites the whole file; this
//! backend assumes a single process and a single user, and no cross-process
//! locking is attempted.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::Result;
use crate::types::{
    truncate_code, AnalysisDocument, AnalysisRecord, Statistics, UserSession,
};

use super::{round2, StorageBackend};

/// Storage-type tag reported by this backend.
pub const LOCAL_STORAGE_TYPE: &str = "local_files";

/// Maximum number of history records kept; the oldest are evicted first.
pub const HISTORY_CAP: usize = 100;

const HISTORY_FILE: &str = "analysis_history.json";
const SESSIONS_FILE: &str = "user_sessions.json";

/// File-backed storage backend.
pub struct LocalStore {
    data_dir: PathBuf,
    history_file: PathBuf,
    sessions_file: PathBuf,
}

impl LocalStore {
    /// Open (and create if absent) the data directory.
    ///
    /// The directory is always passed in explicitly; callers derive the
    /// per-user default via [`crate::config::Config::data_dir`].
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        info!(data_dir = %data_dir.display(), "local history directory ready");

        Ok(Self {
            history_file: data_dir.join(HISTORY_FILE),
            sessions_file: data_dir.join(SESSIONS_FILE),
            data_dir,
        })
    }

    /// Directory holding the history and sessions files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load the history collection; a missing or unreadable file yields an
    /// empty collection rather than an error.
    fn load_history(&self) -> Vec<AnalysisDocument> {
        load_collection(&self.history_file)
    }

    fn write_history(&self, history: &[AnalysisDocument]) -> Result<()> {
        write_collection(&self.history_file, history)
    }

    fn load_sessions(&self) -> Vec<UserSession> {
        load_collection(&self.sessions_file)
    }

    fn write_sessions(&self, sessions: &[UserSession]) -> Result<()> {
        write_collection(&self.sessions_file, sessions)
    }
}

fn load_collection<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    match std::fs::read_to_string(path).map_err(crate::error::Error::from).and_then(|contents| {
        serde_json::from_str(&contents).map_err(crate::error::Error::from)
    }) {
        Ok(items) => items,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read collection, treating as empty");
            Vec::new()
        }
    }
}

fn write_collection<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<()> {
    // Pretty JSON, non-ASCII text written verbatim
    let contents = serde_json::to_string_pretty(items)?;
    std::fs::write(path, contents)?;
    Ok(())
}

impl StorageBackend for LocalStore {
    fn save_result(&self, record: &AnalysisRecord) -> Result<String> {
        let mut history = self.load_history();

        // Readable id; uniqueness only holds for single-writer local use
        let id = format!(
            "local_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            history.len()
        );

        let document = AnalysisDocument {
            id: id.clone(),
            timestamp: record.timestamp,
            file_name: record.file_name.clone(),
            code_content: truncate_code(&record.code_content),
            analysis_results: codec::serialize_results(&record.analysis_results),
            status: record.status,
            execution_time: record.execution_time,
            error_count: i64::from(record.error_count),
            warning_count: i64::from(record.warning_count),
            saved_at: Utc::now(),
            session_info: None,
        };

        history.insert(0, document);
        history.truncate(HISTORY_CAP);
        self.write_history(&history)?;

        info!(id = %id, file_name = %record.file_name, "analysis saved locally");
        Ok(id)
    }

    fn get_history(&self, limit: usize) -> Result<Vec<AnalysisDocument>> {
        let history = self.load_history();
        let available = history.len();
        let results: Vec<AnalysisDocument> = history.into_iter().take(limit).collect();

        debug!(returned = results.len(), available, "local history read");
        Ok(results)
    }

    fn get_statistics(&self) -> Result<Statistics> {
        let history = self.load_history();

        let total_errors: i64 = history.iter().map(|doc| doc.error_count).sum();
        let total_warnings: i64 = history.iter().map(|doc| doc.warning_count).sum();

        // A zero execution time counts as absent
        let times: Vec<f64> = history
            .iter()
            .map(|doc| doc.execution_time)
            .filter(|&t| t > 0.0)
            .collect();
        let avg_execution_time = if times.is_empty() {
            0.0
        } else {
            round2(times.iter().sum::<f64>() / times.len() as f64)
        };

        Ok(Statistics {
            total_analyses: history.len() as u64,
            total_errors,
            total_warnings,
            avg_execution_time,
            storage_type: Some(LOCAL_STORAGE_TYPE.to_string()),
        })
    }

    fn create_session(&self) -> Result<String> {
        let session = UserSession::start();
        let id = session.session_id.clone();

        let mut sessions = self.load_sessions();
        sessions.push(session);
        self.write_sessions(&sessions)?;

        info!(session_id = %id, "local session created");
        Ok(id)
    }

    fn update_session_activity(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.load_sessions();

        match sessions
            .iter_mut()
            .find(|session| session.session_id == session_id)
        {
            Some(session) => {
                session.last_activity = Utc::now();
                session.analyses_count += 1;
                self.write_sessions(&sessions)?;
            }
            None => {
                debug!(session_id, "session not found, activity update skipped");
            }
        }
        Ok(())
    }

    fn disconnect(&self) {
        // Nothing to release; present for interface symmetry with the
        // remote backend
        debug!("local history closed");
    }

    fn storage_type(&self) -> &'static str {
        LOCAL_STORAGE_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PayloadValue;
    use crate::types::{AnalysisStatus, Finding, Severity};
    use tempfile::TempDir;

    fn test_store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn record(file_name: &str) -> AnalysisRecord {
        let mut record = AnalysisRecord::new(file_name, "print('hello')");
        record.status = AnalysisStatus::Completed;
        record
    }

    #[test]
    fn test_save_and_read_back() {
        let (_dir, store) = test_store();

        let id = store.save_result(&record("a.py")).unwrap();
        assert!(id.starts_with("local_"));

        let history = store.get_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].file_name, "a.py");
        assert_eq!(history[0].status, AnalysisStatus::Completed);
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let (_dir, store) = test_store();

        for name in ["first.py", "second.py", "third.py"] {
            store.save_result(&record(name)).unwrap();
        }

        let history = store.get_history(10).unwrap();
        let names: Vec<&str> = history.iter().map(|doc| doc.file_name.as_str()).collect();
        assert_eq!(names, vec!["third.py", "second.py", "first.py"]);
    }

    #[test]
    fn test_history_limit() {
        let (_dir, store) = test_store();

        for i in 0..5 {
            store.save_result(&record(&format!("f{}.py", i))).unwrap();
        }

        assert_eq!(store.get_history(3).unwrap().len(), 3);
        assert_eq!(store.get_history(100).unwrap().len(), 5);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let (_dir, store) = test_store();

        for i in 0..(HISTORY_CAP + 1) {
            store.save_result(&record(&format!("f{}.py", i))).unwrap();
        }

        let history = store.get_history(HISTORY_CAP * 2).unwrap();
        assert_eq!(history.len(), HISTORY_CAP);
        // Newest at the front, the very first save is gone
        assert_eq!(history[0].file_name, format!("f{}.py", HISTORY_CAP));
        assert!(history.iter().all(|doc| doc.file_name != "f0.py"));
    }

    #[test]
    fn test_code_content_truncated_at_save() {
        let (_dir, store) = test_store();

        let mut long = record("long.py");
        long.code_content = "a".repeat(600);
        store.save_result(&long).unwrap();

        let mut short = record("short.py");
        short.code_content = "b".repeat(400);
        store.save_result(&short).unwrap();

        let history = store.get_history(10).unwrap();
        assert_eq!(history[1].code_content.len(), 503);
        assert!(history[1].code_content.ends_with("..."));
        assert_eq!(history[0].code_content, "b".repeat(400));
    }

    #[test]
    fn test_findings_survive_storage() {
        let (_dir, store) = test_store();

        let finding = Finding {
            line_number: 3,
            column: 1,
            error_type: "syntax-error".to_string(),
            severity: Severity::Critical,
            message: "unexpected indent".to_string(),
            suggestion: None,
            code_snippet: Some("  x = 1".to_string()),
        };
        let mut rec = record("findings.py");
        rec.analysis_results.insert(
            "syntax_errors".to_string(),
            PayloadValue::List(vec![PayloadValue::Finding(finding.clone())]),
        );
        store.save_result(&rec).unwrap();

        let history = store.get_history(1).unwrap();
        let decoded = codec::deserialize(&history[0].analysis_results);
        match decoded {
            PayloadValue::Map(map) => match map.get("syntax_errors") {
                Some(PayloadValue::List(items)) => {
                    assert_eq!(items[0], PayloadValue::Finding(finding));
                }
                other => panic!("expected finding list, got {:?}", other),
            },
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_statistics() {
        let (_dir, store) = test_store();

        for (errors, warnings, time) in [(1, 0, 1.0), (2, 1, 2.0), (3, 1, 0.0)] {
            let mut rec = record("stats.py");
            rec.error_count = errors;
            rec.warning_count = warnings;
            rec.execution_time = time;
            store.save_result(&rec).unwrap();
        }

        let stats = store.get_statistics().unwrap();
        assert_eq!(stats.total_analyses, 3);
        assert_eq!(stats.total_errors, 6);
        assert_eq!(stats.total_warnings, 2);
        // Zero execution time counts as absent, so the mean is over two records
        assert_eq!(stats.avg_execution_time, 1.5);
        assert_eq!(stats.storage_type.as_deref(), Some(LOCAL_STORAGE_TYPE));
    }

    #[test]
    fn test_statistics_empty_store() {
        let (_dir, store) = test_store();
        let stats = store.get_statistics().unwrap();
        assert_eq!(stats.total_analyses, 0);
        assert_eq!(stats.avg_execution_time, 0.0);
    }

    #[test]
    fn test_sessions_create_and_update() {
        let (_dir, store) = test_store();

        let id = store.create_session().unwrap();
        store.update_session_activity(&id).unwrap();
        store.update_session_activity(&id).unwrap();

        let sessions: Vec<UserSession> = load_collection(&store.sessions_file);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, id);
        assert_eq!(sessions[0].analyses_count, 2);
        assert!(sessions[0].last_activity >= sessions[0].start_time);
    }

    #[test]
    fn test_update_unknown_session_is_noop() {
        let (_dir, store) = test_store();
        store.create_session().unwrap();

        store.update_session_activity("no-such-session").unwrap();

        let sessions: Vec<UserSession> = load_collection(&store.sessions_file);
        assert_eq!(sessions[0].analyses_count, 0);
    }

    #[test]
    fn test_corrupt_history_file_reads_empty() {
        let (_dir, store) = test_store();
        std::fs::write(&store.history_file, "not json{{{").unwrap();

        assert!(store.get_history(10).unwrap().is_empty());
        assert_eq!(store.get_statistics().unwrap().total_analyses, 0);

        // A save still works and replaces the corrupt file
        let id = store.save_result(&record("rescue.py")).unwrap();
        assert!(id.starts_with("local_"));
        assert_eq!(store.get_history(10).unwrap().len(), 1);
    }

    #[test]
    fn test_non_ascii_content_preserved() {
        let (_dir, store) = test_store();

        let mut rec = record("żółw.py");
        rec.code_content = "# komentarz: zażółć gęślą jaźń".to_string();
        store.save_result(&rec).unwrap();

        let raw = std::fs::read_to_string(&store.history_file).unwrap();
        assert!(raw.contains("zażółć gęślą jaźń"));

        let history = store.get_history(1).unwrap();
        assert_eq!(history[0].file_name, "żółw.py");
    }
}

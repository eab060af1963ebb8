//! Hybrid storage coordinator
//!
//! Composes the remote document store and the local file store behind one
//! operation set and hides backend unavailability from callers: nothing on
//! this type's public surface fails. Every failure is caught, logged, and
//! answered with a degraded but well-typed result (a fault-tagged id, an
//! empty history, zeroed statistics).
//!
//! Failover is not uniform across operations:
//! - a failed remote **save** downgrades the coordinator to local storage
//!   permanently for the rest of the process (sticky; remote is never
//!   retried, even if connectivity recovers);
//! - a failed remote **read or session** operation falls back to local for
//!   that single call only, leaving the active backend unchanged.
//!
//! The downgrade flag is a relaxed atomic: concurrent saves racing on a
//! remote fault may observe the downgrade at slightly different times,
//! an accepted benign race for the single-instance-per-process design.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::types::{AnalysisDocument, AnalysisRecord, Statistics, StorageInfo};

use super::local::{LocalStore, LOCAL_STORAGE_TYPE};
use super::remote::RemoteStore;
use super::{fault_id, StorageBackend};

/// Session id returned when even the local session write failed.
const SESSION_FAULT_ID: &str = "local_session_error";

/// Coordinator over a remote and a local storage backend.
///
/// Designed as one instance per process; see the module docs for the
/// failover policy.
pub struct HybridStorage {
    remote: Option<Box<dyn StorageBackend>>,
    local: LocalStore,
    use_remote: AtomicBool,
}

impl HybridStorage {
    /// Build the coordinator from configuration.
    ///
    /// Attempts the remote connection when one is configured; a connection
    /// failure is logged and answered with a local-only coordinator, never
    /// propagated. Only a failure to create the local data directory is
    /// surfaced.
    pub fn connect(config: &Config) -> Result<Self> {
        let local = LocalStore::new(config.data_dir())?;

        let remote: Option<Box<dyn StorageBackend>> = if config.remote.url.is_some() {
            match RemoteStore::connect(&config.remote) {
                Ok(store) => {
                    info!("hybrid storage using the document store");
                    Some(Box::new(store))
                }
                Err(e) => {
                    warn!(error = %e, "document store unavailable, using local files");
                    None
                }
            }
        } else {
            debug!("no remote store configured, using local files");
            None
        };

        Ok(Self::with_backends(remote, local))
    }

    /// Assemble a coordinator from explicit backends.
    ///
    /// The seam for substituting a remote backend, used by tests to drive
    /// the failover policy.
    pub fn with_backends(remote: Option<Box<dyn StorageBackend>>, local: LocalStore) -> Self {
        let use_remote = remote.is_some();
        Self {
            remote,
            local,
            use_remote: AtomicBool::new(use_remote),
        }
    }

    /// The remote backend, when it exists and has not been downgraded away.
    fn active_remote(&self) -> Option<&dyn StorageBackend> {
        if self.use_remote.load(Ordering::Relaxed) {
            self.remote.as_deref()
        } else {
            None
        }
    }

    /// Whether the next operation will be attempted against remote storage.
    pub fn uses_remote(&self) -> bool {
        self.active_remote().is_some()
    }

    /// Persist one analysis record and return its identifier.
    ///
    /// A degraded save is signalled only through the id prefix: `local_`
    /// when the record landed in the file store after a remote fault,
    /// `error_` when no backend could take it.
    pub fn save_result(&self, record: &AnalysisRecord) -> String {
        if let Some(remote) = self.active_remote() {
            match remote.save_result(record) {
                Ok(id) => return id,
                Err(e) => {
                    warn!(error = %e, "remote save failed, switching to local storage");
                    // Sticky: remote is not retried for the rest of the process
                    self.use_remote.store(false, Ordering::Relaxed);
                }
            }
        }
        self.save_local(record)
    }

    fn save_local(&self, record: &AnalysisRecord) -> String {
        self.local.save_result(record).unwrap_or_else(|e| {
            error!(error = %e, "local save failed");
            fault_id()
        })
    }

    /// Return up to `limit` stored records, most recent first.
    pub fn get_history(&self, limit: usize) -> Vec<AnalysisDocument> {
        if let Some(remote) = self.active_remote() {
            match remote.get_history(limit) {
                Ok(documents) => return documents,
                Err(e) => {
                    // Transient: fall back for this call only
                    warn!(error = %e, "remote history read failed, answering from local files");
                }
            }
        }
        self.local.get_history(limit).unwrap_or_else(|e| {
            error!(error = %e, "local history read failed");
            Vec::new()
        })
    }

    /// Aggregate statistics over stored records.
    pub fn get_statistics(&self) -> Statistics {
        if let Some(remote) = self.active_remote() {
            match remote.get_statistics() {
                Ok(stats) => return stats,
                Err(e) => {
                    warn!(error = %e, "remote statistics failed, answering from local files");
                }
            }
        }
        self.local.get_statistics().unwrap_or_else(|e| {
            error!(error = %e, "local statistics failed");
            Statistics::default()
        })
    }

    /// Create a new user session and return its id.
    pub fn create_session(&self) -> String {
        if let Some(remote) = self.active_remote() {
            match remote.create_session() {
                Ok(id) => return id,
                Err(e) => {
                    warn!(error = %e, "remote session create failed, creating local session");
                }
            }
        }
        self.local.create_session().unwrap_or_else(|e| {
            error!(error = %e, "local session create failed");
            SESSION_FAULT_ID.to_string()
        })
    }

    /// Record activity on a session. A missing id is a silent no-op.
    pub fn update_session_activity(&self, session_id: &str) {
        if let Some(remote) = self.active_remote() {
            match remote.update_session_activity(session_id) {
                Ok(()) => return,
                Err(e) => {
                    warn!(error = %e, "remote session update failed, updating local session");
                }
            }
        }
        if let Err(e) = self.local.update_session_activity(session_id) {
            error!(error = %e, "local session update failed");
        }
    }

    /// Close both backends. The remote backend is closed whenever one was
    /// constructed, independent of which backend is currently active.
    pub fn disconnect(&self) {
        if let Some(remote) = &self.remote {
            remote.disconnect();
        }
        self.local.disconnect();
    }

    /// Which backend the coordinator is using, for the reporting layer.
    pub fn get_storage_info(&self) -> StorageInfo {
        let storage_type = match self.active_remote() {
            Some(remote) => remote.storage_type(),
            None => LOCAL_STORAGE_TYPE,
        };
        StorageInfo {
            uses_remote: self.uses_remote(),
            storage_type: storage_type.to_string(),
            local_data_dir: self.local.data_dir().to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Scriptable stand-in for the remote backend.
    #[derive(Default)]
    struct MockState {
        fail_saves: AtomicBool,
        fail_reads: AtomicBool,
        save_calls: AtomicUsize,
        history_calls: AtomicUsize,
        disconnects: AtomicUsize,
    }

    struct MockRemote(Arc<MockState>);

    impl MockRemote {
        fn new() -> (Arc<MockState>, Box<dyn StorageBackend>) {
            let state = Arc::new(MockState::default());
            (state.clone(), Box::new(MockRemote(state)))
        }
    }

    impl StorageBackend for MockRemote {
        fn save_result(&self, _record: &AnalysisRecord) -> Result<String> {
            let call = self.0.save_calls.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_saves.load(Ordering::SeqCst) {
                Err(Error::Operation("insert failed".to_string()))
            } else {
                Ok(format!("remote-{}", call))
            }
        }

        fn get_history(&self, _limit: usize) -> Result<Vec<AnalysisDocument>> {
            self.0.history_calls.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_reads.load(Ordering::SeqCst) {
                Err(Error::Operation("query failed".to_string()))
            } else {
                Ok(Vec::new())
            }
        }

        fn get_statistics(&self) -> Result<Statistics> {
            if self.0.fail_reads.load(Ordering::SeqCst) {
                Err(Error::Operation("aggregate failed".to_string()))
            } else {
                Ok(Statistics {
                    total_analyses: 42,
                    storage_type: Some("document_store".to_string()),
                    ..Statistics::default()
                })
            }
        }

        fn create_session(&self) -> Result<String> {
            if self.0.fail_reads.load(Ordering::SeqCst) {
                Err(Error::Operation("insert failed".to_string()))
            } else {
                Ok("remote-session".to_string())
            }
        }

        fn update_session_activity(&self, _session_id: &str) -> Result<()> {
            if self.0.fail_reads.load(Ordering::SeqCst) {
                Err(Error::Operation("update failed".to_string()))
            } else {
                Ok(())
            }
        }

        fn disconnect(&self) {
            self.0.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn storage_type(&self) -> &'static str {
            "document_store"
        }
    }

    fn local_store(dir: &TempDir) -> LocalStore {
        LocalStore::new(dir.path()).unwrap()
    }

    fn record() -> AnalysisRecord {
        AnalysisRecord::new("test.py", "x = 1")
    }

    #[test]
    fn test_local_only_without_remote() {
        let dir = TempDir::new().unwrap();
        let storage = HybridStorage::with_backends(None, local_store(&dir));

        assert!(!storage.uses_remote());
        let info = storage.get_storage_info();
        assert!(!info.uses_remote);
        assert_eq!(info.storage_type, "local_files");
        assert_eq!(info.local_data_dir, dir.path());

        let id = storage.save_result(&record());
        assert!(id.starts_with("local_"));
        assert_eq!(storage.get_history(10).len(), 1);
    }

    #[test]
    fn test_remote_preferred_when_healthy() {
        let dir = TempDir::new().unwrap();
        let (state, remote) = MockRemote::new();
        let storage = HybridStorage::with_backends(Some(remote), local_store(&dir));

        assert!(storage.uses_remote());
        assert_eq!(storage.get_storage_info().storage_type, "document_store");

        let id = storage.save_result(&record());
        assert_eq!(id, "remote-0");
        assert_eq!(state.save_calls.load(Ordering::SeqCst), 1);
        assert_eq!(storage.get_statistics().total_analyses, 42);
    }

    #[test]
    fn test_save_fault_downgrades_permanently() {
        let dir = TempDir::new().unwrap();
        let (state, remote) = MockRemote::new();
        state.fail_saves.store(true, Ordering::SeqCst);
        let storage = HybridStorage::with_backends(Some(remote), local_store(&dir));

        let id = storage.save_result(&record());
        assert!(id.starts_with("local_"));
        assert!(!storage.uses_remote());
        assert_eq!(storage.get_storage_info().storage_type, "local_files");

        // Even with the fault cleared, remote is never retried
        state.fail_saves.store(false, Ordering::SeqCst);
        let id = storage.save_result(&record());
        assert!(id.starts_with("local_"));
        assert_eq!(state.save_calls.load(Ordering::SeqCst), 1);

        // Reads also stay local after the downgrade
        storage.get_history(10);
        assert_eq!(state.history_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_read_fault_falls_back_for_single_call() {
        let dir = TempDir::new().unwrap();
        let (state, remote) = MockRemote::new();
        let storage = HybridStorage::with_backends(Some(remote), local_store(&dir));

        storage.save_result(&record()); // lands remote

        state.fail_reads.store(true, Ordering::SeqCst);
        // Answered from local files (which are empty), flag unchanged
        assert!(storage.get_history(10).is_empty());
        assert!(storage.uses_remote());

        state.fail_reads.store(false, Ordering::SeqCst);
        // The very next read is attempted against remote again
        storage.get_history(10);
        assert_eq!(state.history_calls.load(Ordering::SeqCst), 2);

        // And saves were never downgraded by the read fault
        let id = storage.save_result(&record());
        assert!(id.starts_with("remote-"));
    }

    #[test]
    fn test_statistics_fall_back_to_local() {
        let dir = TempDir::new().unwrap();
        let (state, remote) = MockRemote::new();
        state.fail_reads.store(true, Ordering::SeqCst);
        let storage = HybridStorage::with_backends(Some(remote), local_store(&dir));

        let stats = storage.get_statistics();
        assert_eq!(stats.total_analyses, 0);
        assert_eq!(stats.storage_type.as_deref(), Some("local_files"));
        assert!(storage.uses_remote());
    }

    #[test]
    fn test_sessions_fall_back_to_local() {
        let dir = TempDir::new().unwrap();
        let (state, remote) = MockRemote::new();
        state.fail_reads.store(true, Ordering::SeqCst);
        let storage = HybridStorage::with_backends(Some(remote), local_store(&dir));

        let session_id = storage.create_session();
        assert_ne!(session_id, "remote-session");
        assert_ne!(session_id, SESSION_FAULT_ID);

        // Unknown ids are a silent no-op on whichever backend answers
        storage.update_session_activity("missing-session");
        storage.update_session_activity(&session_id);
    }

    #[test]
    fn test_disconnect_closes_remote_even_after_downgrade() {
        let dir = TempDir::new().unwrap();
        let (state, remote) = MockRemote::new();
        state.fail_saves.store(true, Ordering::SeqCst);
        let storage = HybridStorage::with_backends(Some(remote), local_store(&dir));

        storage.save_result(&record()); // trigger sticky downgrade
        assert!(!storage.uses_remote());

        storage.disconnect();
        assert_eq!(state.disconnects.load(Ordering::SeqCst), 1);
    }
}

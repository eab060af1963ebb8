//! Storage layer for ailint
//!
//! One capability interface, [`StorageBackend`], with two concrete
//! implementations: a file-backed [`local::LocalStore`] and a document-store
//! [`remote::RemoteStore`]. [`hybrid::HybridStorage`] composes the two
//! behind the same operation set and handles failover between them.

pub mod hybrid;
pub mod local;
pub mod remote;

pub use hybrid::HybridStorage;
pub use local::LocalStore;
pub use remote::RemoteStore;

use chrono::Utc;

use crate::error::Result;
use crate::types::{AnalysisDocument, AnalysisRecord, Statistics};

/// Capability interface every storage backend satisfies.
///
/// Backends surface operation failures as `Err`; the failover policy (and
/// the never-fails public surface) lives one layer up in
/// [`hybrid::HybridStorage`]. The trait is object-safe so the coordinator
/// and tests can hold any backend behind one reference.
pub trait StorageBackend: Send {
    /// Persist one analysis record and return its backend-assigned id.
    fn save_result(&self, record: &AnalysisRecord) -> Result<String>;

    /// Return up to `limit` stored records, most recent first.
    fn get_history(&self, limit: usize) -> Result<Vec<AnalysisDocument>>;

    /// Aggregate statistics over all stored records.
    fn get_statistics(&self) -> Result<Statistics>;

    /// Create a new user session and return its id.
    fn create_session(&self) -> Result<String>;

    /// Bump a session's activity timestamp and counter. A missing id is a
    /// silent no-op, not an error.
    fn update_session_activity(&self, session_id: &str) -> Result<()>;

    /// Release backend resources. Infallible; local storage has nothing to
    /// release and implements this as a no-op.
    fn disconnect(&self);

    /// Fixed tag naming this backend.
    fn storage_type(&self) -> &'static str;
}

/// Identifier returned when a save could not be completed anywhere.
/// Callers detect a degraded save by this prefix.
pub(crate) fn fault_id() -> String {
    format!("error_{}", Utc::now().timestamp())
}

/// Round to two decimals, as statistics report execution times.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_id_prefix() {
        assert!(fault_id().starts_with("error_"));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(4.567), 4.57);
        assert_eq!(round2(0.0), 0.0);
    }
}

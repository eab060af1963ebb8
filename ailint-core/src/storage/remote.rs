//! Document-store backend over HTTP
//!
//! Talks to a remote document store holding two collections, `analyses` and
//! `user_sessions`. Construction performs a liveness round trip against the
//! server's health endpoint and is the only operation that fails hard; the
//! coordinator uses that signal to decide whether remote storage is usable
//! at all.
//!
//! All calls are synchronous and block on network I/O, bounded by the
//! configured request timeout.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::codec::{self, StorageValue};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::types::{
    truncate_code, AnalysisDocument, AnalysisRecord, AnalysisStatus, Statistics, UserSession,
};

use super::{round2, StorageBackend};

/// Storage-type tag reported by this backend.
pub const REMOTE_STORAGE_TYPE: &str = "document_store";

const ANALYSES_COLLECTION: &str = "analyses";
const SESSIONS_COLLECTION: &str = "user_sessions";

/// Remote document-store backend.
pub struct RemoteStore {
    client: reqwest::blocking::Client,
    base_url: String,
    database: String,
    verify_writes: bool,
}

impl RemoteStore {
    /// Connect to the document store and verify liveness.
    ///
    /// Fails with [`Error::Connection`] when the server cannot be reached;
    /// this is the only fallible entry point of the backend.
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let base_url = config
            .url
            .clone()
            .ok_or_else(|| Error::Config("remote.url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let store = Self {
            client,
            base_url,
            database: config.database.clone(),
            verify_writes: config.verify_writes,
        };

        store.ping()?;
        info!(base_url = %store.base_url, database = %store.database, "connected to document store");
        Ok(store)
    }

    /// Liveness round trip to the health endpoint.
    fn ping(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::Connection(format!("store unreachable: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Connection(format!(
                "health check failed with status {}",
                response.status()
            )))
        }
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!(
            "{}/db/{}/collections/{}{}",
            self.base_url, self.database, collection, suffix
        )
    }

    fn post_json<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| Error::Operation(format!("HTTP request failed: {}", e)))?;
        parse_response(response)
    }

    fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Operation(format!("HTTP request failed: {}", e)))?;
        parse_response(response)
    }

    /// Point lookup of one analysis by its store-assigned id.
    ///
    /// Administrative operation; not part of the backend trait.
    pub fn get_analysis_by_id(&self, analysis_id: &str) -> Result<Option<AnalysisDocument>> {
        let url = self.collection_url(
            ANALYSES_COLLECTION,
            &format!("/documents/{}", urlencoding::encode(analysis_id)),
        );
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::Operation(format!("HTTP request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response(response).map(Some)
    }

    /// Delete one analysis by id. Returns true when a document was removed.
    ///
    /// Administrative operation; not part of the backend trait.
    pub fn delete_analysis(&self, analysis_id: &str) -> Result<bool> {
        let url = self.collection_url(
            ANALYSES_COLLECTION,
            &format!("/documents/{}", urlencoding::encode(analysis_id)),
        );
        let response = self
            .client
            .delete(&url)
            .send()
            .map_err(|e| Error::Operation(format!("HTTP request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let result: DeleteResponse = parse_response(response)?;
        Ok(result.deleted > 0)
    }

    fn build_document(&self, record: &AnalysisRecord) -> InsertAnalysis {
        InsertAnalysis {
            timestamp: record.timestamp,
            file_name: record.file_name.clone(),
            code_content: truncate_code(&record.code_content),
            analysis_results: codec::serialize_results(&record.analysis_results),
            status: record.status,
            execution_time: record.execution_time,
            error_count: i64::from(record.error_count),
            warning_count: i64::from(record.warning_count),
            saved_at: Utc::now(),
            session_info: session_info(),
        }
    }
}

/// Environment info attached to every remote save.
fn session_info() -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    info.insert(
        "user".to_string(),
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string()),
    );
    info.insert(
        "machine".to_string(),
        std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "unknown".to_string()),
    );
    info
}

fn parse_response<R: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<R> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .map_err(|e| Error::Operation(format!("failed to parse response: {}", e)))
    } else {
        let error_text = response.text().unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Operation(format!(
            "API error ({}): {}",
            status, error_text
        )))
    }
}

impl StorageBackend for RemoteStore {
    fn save_result(&self, record: &AnalysisRecord) -> Result<String> {
        let document = self.build_document(record);
        let url = self.collection_url(ANALYSES_COLLECTION, "/documents");

        let inserted: InsertResponse = self.post_json(&url, &document)?;

        if self.verify_writes {
            // Verification failure does not downgrade the save: the insert
            // call succeeding is sufficient
            match self.get_analysis_by_id(&inserted.id) {
                Ok(Some(_)) => debug!(id = %inserted.id, "insert verified"),
                Ok(None) => warn!(id = %inserted.id, "saved document not found on read-back"),
                Err(e) => warn!(id = %inserted.id, error = %e, "insert verification failed"),
            }
        }

        info!(
            id = %inserted.id,
            errors = record.error_count,
            warnings = record.warning_count,
            "analysis saved to document store"
        );
        Ok(inserted.id)
    }

    fn get_history(&self, limit: usize) -> Result<Vec<AnalysisDocument>> {
        let url = self.collection_url(
            ANALYSES_COLLECTION,
            &format!("/documents?sort=-timestamp&limit={}", limit),
        );
        let result: QueryResponse = self.get_json(&url)?;

        debug!(returned = result.documents.len(), limit, "remote history read");
        Ok(result.documents)
    }

    fn get_statistics(&self) -> Result<Statistics> {
        let url = self.collection_url(ANALYSES_COLLECTION, "/aggregate");
        // One aggregation for the sums and the average
        let request = AggregateRequest {
            sum: vec!["error_count", "warning_count"],
            avg: vec!["execution_time"],
        };
        let result: AggregateResponse = self.post_json(&url, &request)?;

        Ok(Statistics {
            total_analyses: result.count,
            total_errors: result.sum.get("error_count").copied().unwrap_or(0),
            total_warnings: result.sum.get("warning_count").copied().unwrap_or(0),
            avg_execution_time: round2(result.avg.get("execution_time").copied().unwrap_or(0.0)),
            storage_type: Some(REMOTE_STORAGE_TYPE.to_string()),
        })
    }

    fn create_session(&self) -> Result<String> {
        let session = UserSession::start();
        let url = self.collection_url(SESSIONS_COLLECTION, "/documents");

        let _: InsertResponse = self.post_json(&url, &session)?;

        info!(session_id = %session.session_id, "remote session created");
        Ok(session.session_id)
    }

    fn update_session_activity(&self, session_id: &str) -> Result<()> {
        let url = self.collection_url(SESSIONS_COLLECTION, "/update");
        let request = UpdateRequest {
            filter: SessionFilter { session_id },
            set: ActivityUpdate {
                last_activity: Utc::now(),
            },
            increment: CountIncrement { analyses_count: 1 },
        };
        let result: UpdateResponse = self.post_json(&url, &request)?;

        if result.matched == 0 {
            debug!(session_id, "session not found, activity update skipped");
        }
        Ok(())
    }

    fn disconnect(&self) {
        // The blocking client drops its connections when the store is
        // dropped; log for parity with the local backend
        debug!(base_url = %self.base_url, "document store connection closed");
    }

    fn storage_type(&self) -> &'static str {
        REMOTE_STORAGE_TYPE
    }
}

// ============================================
// Wire types
// ============================================

/// Insert body for POST .../analyses/documents
#[derive(Serialize)]
struct InsertAnalysis {
    timestamp: DateTime<Utc>,
    file_name: String,
    code_content: String,
    analysis_results: StorageValue,
    status: AnalysisStatus,
    execution_time: f64,
    error_count: i64,
    warning_count: i64,
    saved_at: DateTime<Utc>,
    session_info: BTreeMap<String, String>,
}

/// Response from a document insert
#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

/// Response from a document query
#[derive(Debug, Deserialize)]
struct QueryResponse {
    documents: Vec<AnalysisDocument>,
}

/// Response from a document delete
#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: u64,
}

/// Body for POST .../aggregate
#[derive(Serialize)]
struct AggregateRequest {
    sum: Vec<&'static str>,
    avg: Vec<&'static str>,
}

/// Response from POST .../aggregate
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    sum: BTreeMap<String, i64>,
    #[serde(default)]
    avg: BTreeMap<String, f64>,
}

/// Body for POST .../update
#[derive(Serialize)]
struct UpdateRequest<'a> {
    filter: SessionFilter<'a>,
    set: ActivityUpdate,
    increment: CountIncrement,
}

#[derive(Serialize)]
struct SessionFilter<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct ActivityUpdate {
    last_activity: DateTime<Utc>,
}

#[derive(Serialize)]
struct CountIncrement {
    analyses_count: u64,
}

/// Response from POST .../update
#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    matched: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_requires_url() {
        let config = RemoteConfig::default();
        match RemoteStore::connect(&config) {
            Err(Error::Config(msg)) => assert!(msg.contains("remote.url")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_connect_to_unreachable_store_fails() {
        let config = RemoteConfig {
            url: Some("http://127.0.0.1:1".to_string()),
            timeout_secs: 1,
            ..Default::default()
        };
        match RemoteStore::connect(&config) {
            Err(Error::Connection(_)) => {}
            other => panic!("expected connection error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_collection_url_building() {
        // Construction without the ping, to inspect URL building
        let store = RemoteStore {
            client: reqwest::blocking::Client::new(),
            base_url: "http://store.example.com".to_string(),
            database: "ailint".to_string(),
            verify_writes: false,
        };
        assert_eq!(
            store.collection_url(ANALYSES_COLLECTION, "/documents"),
            "http://store.example.com/db/ailint/collections/analyses/documents"
        );
    }

    #[test]
    fn test_session_info_has_required_keys() {
        let info = session_info();
        assert!(info.contains_key("user"));
        assert!(info.contains_key("machine"));
    }

    #[test]
    fn test_aggregate_response_parses_partial() {
        let json = r#"{"count": 3, "sum": {"error_count": 6}}"#;
        let response: AggregateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.count, 3);
        assert_eq!(response.sum.get("error_count"), Some(&6));
        assert!(response.avg.is_empty());
    }
}

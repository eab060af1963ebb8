//! # ailint-core
//!
//! Core library for ailint - persistence for code-analysis outcomes.
//!
//! This library provides:
//! - Domain types for analysis records, findings, and user sessions
//! - A serialization codec turning heterogeneous analysis payloads into
//!   storage-safe documents and back
//! - Two interchangeable storage backends (remote document store, local
//!   JSON files) behind one capability interface
//! - A hybrid coordinator that transparently fails over between them
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! An analysis run produces an [`AnalysisRecord`]; the hybrid coordinator
//! serializes its payload, delegates to the active backend, and hides any
//! backend failure behind a degraded but well-typed answer. History and
//! statistics reads flow back the same way.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ailint_core::{AnalysisRecord, Config, HybridStorage};
//!
//! let config = Config::load().expect("failed to load config");
//! let storage = HybridStorage::connect(&config).expect("failed to open local storage");
//!
//! let record = AnalysisRecord::new("example.py", "print('hello')");
//! let id = storage.save_result(&record);
//! println!("saved as {}", id);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use storage::{HybridStorage, LocalStore, RemoteStore, StorageBackend};
pub use types::*;

// Public modules
pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod types;

//! Serialization codec for analysis payloads
//!
//! The analysis producers hand the storage layer heterogeneous nested data:
//! maps, lists, scalars, timestamps, enumerated severities, and typed
//! findings. Backends only understand [`StorageValue`], a storage-safe
//! document tree. This module converts between the two.
//!
//! [`serialize`] is total: every [`PayloadValue`] converts, unrecognized
//! custom types degrade to a display string or a placeholder naming the
//! type, and a save can therefore never fail on its payload.
//!
//! [`deserialize`] rebuilds typed values from documents carrying the
//! reserved `object_type` discriminator. The set of reconstructable kinds
//! is a closed registry (currently only [`Finding`]); any unrecognized tag
//! falls back to a generic map. Round-tripping of custom types other than
//! findings is intentionally lossy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{AnalysisStatus, Finding, Severity};

/// Reserved discriminator field naming the source type of a document.
pub const OBJECT_TYPE_KEY: &str = "object_type";

/// Discriminator tag for [`Finding`] documents.
pub const FINDING_TAG: &str = "Finding";

// ============================================
// StorageValue: the storage-safe document tree
// ============================================

/// The serialized form of any payload: what backends store and return.
///
/// Serializes untagged, so the JSON written to the local history file and
/// sent to the remote store is plain JSON. Timestamps travel as RFC 3339
/// strings and are recognized back into the `DateTime` variant on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Listed before `Text` so RFC 3339 strings parse back as timestamps
    DateTime(DateTime<Utc>),
    Text(String),
    Array(Vec<StorageValue>),
    Object(BTreeMap<String, StorageValue>),
}

impl StorageValue {
    /// Borrow the string content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StorageValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow a field of an object value.
    pub fn get(&self, key: &str) -> Option<&StorageValue> {
        match self {
            StorageValue::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<&str> for StorageValue {
    fn from(s: &str) -> Self {
        StorageValue::Text(s.to_string())
    }
}

impl From<String> for StorageValue {
    fn from(s: String) -> Self {
        StorageValue::Text(s)
    }
}

impl From<i64> for StorageValue {
    fn from(n: i64) -> Self {
        StorageValue::Int(n)
    }
}

impl From<f64> for StorageValue {
    fn from(n: f64) -> Self {
        StorageValue::Float(n)
    }
}

impl From<bool> for StorageValue {
    fn from(b: bool) -> Self {
        StorageValue::Bool(b)
    }
}

// ============================================
// PayloadValue: what producers hand us
// ============================================

/// A value from the analysis pipeline, before serialization.
///
/// Covers scalars, timestamps, the domain enums, nested containers, typed
/// findings, and arbitrary custom types behind [`CustomValue`].
#[derive(Debug)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Status(AnalysisStatus),
    Severity(Severity),
    List(Vec<PayloadValue>),
    Map(BTreeMap<String, PayloadValue>),
    Finding(Finding),
    Custom(Box<dyn CustomValue>),
}

impl PartialEq for PayloadValue {
    fn eq(&self, other: &Self) -> bool {
        use PayloadValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Status(a), Status(b)) => a == b,
            (Severity(a), Severity(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Finding(a), Finding(b)) => a == b,
            // Custom values carry no equality of their own
            _ => false,
        }
    }
}

impl From<Finding> for PayloadValue {
    fn from(f: Finding) -> Self {
        PayloadValue::Finding(f)
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::Text(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::Text(s)
    }
}

impl From<i64> for PayloadValue {
    fn from(n: i64) -> Self {
        PayloadValue::Int(n)
    }
}

impl From<f64> for PayloadValue {
    fn from(n: f64) -> Self {
        PayloadValue::Float(n)
    }
}

/// An unrecognized payload type, serialized on a best-effort basis.
///
/// Implementors opt into one of three conversion tiers, tried in order:
/// a canonical document conversion ([`CustomValue::to_document`]), named
/// field introspection ([`CustomValue::fields`]), or a display rendering
/// ([`CustomValue::render`]). A type providing none of them still
/// serializes, as a placeholder string naming the type.
pub trait CustomValue: fmt::Debug + Send + Sync {
    /// Name recorded in the `object_type` discriminator and the placeholder.
    fn type_name(&self) -> &'static str;

    /// Canonical conversion to a generic document, if the type has one.
    fn to_document(&self) -> Option<StorageValue> {
        None
    }

    /// Named-field introspection for record-like types.
    fn fields(&self) -> Option<Vec<(String, PayloadValue)>> {
        None
    }

    /// Best-effort display rendering; `None` when the value cannot render.
    fn render(&self) -> Option<String> {
        None
    }
}

// ============================================
// Serialization
// ============================================

/// Convert a payload value into its storage-safe form. Never fails.
pub fn serialize(value: &PayloadValue) -> StorageValue {
    match value {
        PayloadValue::Null => StorageValue::Null,
        PayloadValue::Bool(b) => StorageValue::Bool(*b),
        PayloadValue::Int(n) => StorageValue::Int(*n),
        PayloadValue::Float(n) => StorageValue::Float(*n),
        PayloadValue::Text(s) => StorageValue::Text(s.clone()),
        PayloadValue::Timestamp(ts) => StorageValue::DateTime(*ts),
        // Enumerated values flatten to their underlying scalar
        PayloadValue::Status(status) => StorageValue::Text(status.as_str().to_string()),
        PayloadValue::Severity(severity) => StorageValue::Text(severity.as_str().to_string()),
        PayloadValue::List(items) => StorageValue::Array(items.iter().map(serialize).collect()),
        PayloadValue::Map(map) => StorageValue::Object(
            map.iter()
                .map(|(key, val)| (key.clone(), serialize(val)))
                .collect(),
        ),
        PayloadValue::Finding(finding) => StorageValue::Object(finding_to_document(finding)),
        PayloadValue::Custom(custom) => serialize_custom(custom.as_ref()),
    }
}

/// Serialize the whole analysis-results payload of a record.
pub fn serialize_results(results: &BTreeMap<String, PayloadValue>) -> StorageValue {
    StorageValue::Object(
        results
            .iter()
            .map(|(key, val)| (key.clone(), serialize(val)))
            .collect(),
    )
}

fn serialize_custom(custom: &dyn CustomValue) -> StorageValue {
    // Tier 1: the value's own canonical document conversion
    if let Some(doc) = custom.to_document() {
        return match doc {
            StorageValue::Object(mut map) => {
                map.entry(OBJECT_TYPE_KEY.to_string())
                    .or_insert_with(|| StorageValue::Text(custom.type_name().to_string()));
                StorageValue::Object(map)
            }
            other => other,
        };
    }

    // Tier 2: named-field introspection
    if let Some(fields) = custom.fields() {
        return StorageValue::Object(
            fields
                .into_iter()
                .map(|(name, val)| (name, serialize(&val)))
                .collect(),
        );
    }

    // Tier 3: display rendering, then the placeholder of last resort
    match custom.render() {
        Some(text) => StorageValue::Text(text),
        None => {
            tracing::debug!(type_name = custom.type_name(), "payload value not serializable");
            StorageValue::Text(format!("<unserialized object: {}>", custom.type_name()))
        }
    }
}

fn finding_to_document(finding: &Finding) -> BTreeMap<String, StorageValue> {
    let mut map = BTreeMap::new();
    map.insert(
        "line_number".to_string(),
        StorageValue::Int(i64::from(finding.line_number)),
    );
    map.insert(
        "column".to_string(),
        StorageValue::Int(i64::from(finding.column)),
    );
    map.insert(
        "error_type".to_string(),
        StorageValue::Text(finding.error_type.clone()),
    );
    map.insert(
        "severity".to_string(),
        StorageValue::Text(finding.severity.as_str().to_string()),
    );
    map.insert(
        "message".to_string(),
        StorageValue::Text(finding.message.clone()),
    );
    map.insert(
        "suggestion".to_string(),
        finding
            .suggestion
            .clone()
            .map_or(StorageValue::Null, StorageValue::Text),
    );
    map.insert(
        "code_snippet".to_string(),
        finding
            .code_snippet
            .clone()
            .map_or(StorageValue::Null, StorageValue::Text),
    );
    map.insert(
        OBJECT_TYPE_KEY.to_string(),
        StorageValue::Text(FINDING_TAG.to_string()),
    );
    map
}

// ============================================
// Deserialization
// ============================================

/// Rebuild payload values from a stored document.
///
/// Objects whose `object_type` names a known kind come back typed; anything
/// else recurses structurally and returns otherwise unchanged.
pub fn deserialize(value: &StorageValue) -> PayloadValue {
    match value {
        StorageValue::Null => PayloadValue::Null,
        StorageValue::Bool(b) => PayloadValue::Bool(*b),
        StorageValue::Int(n) => PayloadValue::Int(*n),
        StorageValue::Float(n) => PayloadValue::Float(*n),
        StorageValue::DateTime(ts) => PayloadValue::Timestamp(*ts),
        StorageValue::Text(s) => PayloadValue::Text(s.clone()),
        StorageValue::Array(items) => {
            PayloadValue::List(items.iter().map(deserialize).collect())
        }
        StorageValue::Object(map) => {
            if let Some(tag) = map.get(OBJECT_TYPE_KEY).and_then(StorageValue::as_str) {
                if let Some(typed) = reconstruct(tag, map) {
                    return typed;
                }
                // Unrecognized or malformed tag: degrade to a generic map
            }
            PayloadValue::Map(
                map.iter()
                    .map(|(key, val)| (key.clone(), deserialize(val)))
                    .collect(),
            )
        }
    }
}

/// Closed registry of `object_type` tags the codec can rebuild.
fn reconstruct(tag: &str, map: &BTreeMap<String, StorageValue>) -> Option<PayloadValue> {
    match tag {
        FINDING_TAG => finding_from_document(map).map(PayloadValue::Finding),
        _ => None,
    }
}

fn finding_from_document(map: &BTreeMap<String, StorageValue>) -> Option<Finding> {
    let int_field = |name: &str| -> Option<u32> {
        match map.get(name)? {
            StorageValue::Int(n) => u32::try_from(*n).ok(),
            _ => None,
        }
    };
    let text_field = |name: &str| -> Option<String> {
        map.get(name).and_then(StorageValue::as_str).map(String::from)
    };
    let optional_text = |name: &str| -> Option<String> {
        match map.get(name) {
            Some(StorageValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    };

    Some(Finding {
        line_number: int_field("line_number")?,
        column: int_field("column")?,
        error_type: text_field("error_type")?,
        severity: text_field("severity")?.parse().ok()?,
        message: text_field("message")?,
        suggestion: optional_text("suggestion"),
        code_snippet: optional_text("code_snippet"),
    })
}

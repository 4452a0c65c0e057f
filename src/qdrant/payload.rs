//! Helpers for constructing Qdrant point identifiers and payloads.

use crate::qdrant::filters::NAMESPACE_KEY;
use crate::store::VectorRecord;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each chunk vector.
pub(crate) fn build_payload(namespace: &str, record: &VectorRecord, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert(NAMESPACE_KEY.into(), Value::String(namespace.to_string()));
    payload.insert("chunk_id".into(), Value::String(record.chunk_id.clone()));
    payload.insert("text".into(), Value::String(record.text.clone()));
    payload.insert("filename".into(), Value::String(record.filename.clone()));
    payload.insert(
        "chunk_hash".into(),
        Value::String(compute_chunk_hash(&record.text)),
    );
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    if let Some(page) = record.page {
        payload.insert("page".into(), Value::from(page));
    }
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Derive the Qdrant point id for a batch-local chunk id.
///
/// Qdrant only accepts UUIDs or integers as point ids, and the collection is shared by all
/// namespaces, so the id is a name-based UUID over `namespace/chunk_id`.
pub(crate) fn point_id(namespace: &str, chunk_id: &str) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{namespace}/{chunk_id}").as_bytes(),
    )
    .to_string()
}

//! Filter helpers that confine Qdrant queries to a single document namespace.

use serde_json::{Value, json};

/// Payload key carrying the namespace partition.
pub const NAMESPACE_KEY: &str = "namespace";

/// Build the `must` filter matching exactly one namespace.
pub fn namespace_filter(namespace: &str) -> Value {
    json!({
        "must": [
            {
                "key": NAMESPACE_KEY,
                "match": { "value": namespace }
            }
        ]
    })
}

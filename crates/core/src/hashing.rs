//! Request-content hashing.
//!
//! An approval is bound to the exact action it was requested for by a
//! SHA-256 digest over a canonical encoding of the action's defining
//! fields. Object keys are sorted recursively so the digest is stable
//! across serializers, and target ids are sorted before hashing so the
//! digest is insensitive to caller-supplied ordering.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Render a JSON value in canonical form: compact, with object keys
/// emitted in sorted order at every nesting level. Array element order
/// is preserved.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys are encoded exactly like JSON string scalars.
                write_canonical(&Value::String((*key).clone()), out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        // Null, booleans, numbers, and strings already have a single
        // compact rendering via `Display`.
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Compute the content hash binding an approval request to one exact action.
///
/// The digest covers `{actionType, endpoint, method, targetIds, payload}`
/// with `target_ids` sorted, so `["b", "a"]` and `["a", "b"]` hash the
/// same while any other difference (an added id, a changed method, a
/// changed payload value) produces a different digest.
pub fn compute_request_hash(
    action_type: &str,
    endpoint: &str,
    method: &str,
    target_ids: &[String],
    payload: &Value,
) -> String {
    let mut sorted_ids: Vec<&String> = target_ids.iter().collect();
    sorted_ids.sort();

    let envelope = serde_json::json!({
        "actionType": action_type,
        "endpoint": endpoint,
        "method": method.to_uppercase(),
        "targetIds": sorted_ids,
        "payload": payload,
    });

    sha256_hex(canonicalize(&envelope).as_bytes())
}

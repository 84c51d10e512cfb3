//! Idempotency keys.
//!
//! Every inbound event gets a stable identifier so retried deliveries and
//! provider resyncs collapse onto the record that already exists. Writes keyed
//! this way use create-don't-overwrite semantics: a second write with the same
//! key is a no-op, never a replacement.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of digest bytes kept; rendered as 32 hex characters.
const HASH_BYTES: usize = 16;

/// Truncated SHA-256 of `bytes`, as 32 lowercase hex characters.
///
/// The single hashing capability of the pipeline; callers never depend on the
/// primitive behind it.
pub fn stable_hash(bytes: &[u8]) -> String {
  let digest = Sha256::digest(bytes);
  hex::encode(&digest[..HASH_BYTES])
}

/// Serialise `value` with object keys sorted at every depth.
///
/// Independent of whether `serde_json` was built with `preserve_order`, so two
/// payloads that differ only in key order hash identically.
pub fn canonical_json(value: &Value) -> String {
  let mut out = String::new();
  write_canonical(value, &mut out);
  out
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(&map[key], out);
      }
      out.push('}');
    }
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
    scalar => out.push_str(&scalar.to_string()),
  }
}

/// Content hash of a payload, used both as a fallback id and as the
/// fingerprint stored alongside a raw event.
pub fn payload_fingerprint(payload: &Value) -> String {
  stable_hash(canonical_json(payload).as_bytes())
}

/// Composite identifier `{provider}_{providerEventId}`.
///
/// Falls back to the payload's content hash when the provider supplies no
/// stable id (or an empty one).
pub fn raw_event_id(
  provider: &str,
  provider_event_id: Option<&str>,
  payload: &Value,
) -> String {
  let native = provider_event_id
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .map(sanitize_id)
    .unwrap_or_else(|| payload_fingerprint(payload));
  format!("{}_{native}", provider.trim())
}

/// Path separators cannot appear in a document key.
fn sanitize_id(id: &str) -> String { id.replace('/', "_") }

//! Canonical JSON rendering and SHA-256 helpers.

use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Render a value as canonical JSON: object keys recursively sorted,
/// compact separators, no trailing newline.
///
/// Two semantically equal values serialize identically regardless of the
/// insertion order of their object keys, which is what makes hashes of
/// resolved configurations order-invariant.
pub fn canonical_json(value: &Value) -> String {
  serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}

fn canonicalize(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      let mut out = Map::with_capacity(map.len());
      for key in keys {
        out.insert(key.clone(), canonicalize(&map[key]));
      }
      Value::Object(out)
    }
    Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
    other => other.clone(),
  }
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  format!("{:x}", hasher.finalize())
}

/// Hex-encoded SHA-256 of a file, read in chunks.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
  let mut file = std::fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buf = vec![0u8; 1024 * 1024];
  loop {
    let n = file.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(format!("{:x}", hasher.finalize()))
}

/// First `len` hex chars of the SHA-256 of a value's canonical JSON form.
pub fn short_hash(value: &Value, len: usize) -> String {
  let mut digest = sha256_hex(canonical_json(value).as_bytes());
  digest.truncate(len);
  digest
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_canonical_json_is_order_independent() {
    let a = json!({ "b": 1, "a": 2, "nested": { "z": 0, "y": 1 } });
    let b = json!({ "nested": { "y": 1, "z": 0 }, "a": 2, "b": 1 });
    assert_eq!(canonical_json(&a), canonical_json(&b));
    assert_eq!(short_hash(&a, 10), short_hash(&b, 10));
  }

  #[test]
  fn test_canonical_json_sorts_nested_keys() {
    let v = json!({ "b": { "d": 1, "c": 2 }, "a": 3 });
    assert_eq!(canonical_json(&v), r#"{"a":3,"b":{"c":2,"d":1}}"#);
  }

  #[test]
  fn test_sha256_file_changes_with_content() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("x.txt");

    std::fs::write(&path, "a").expect("write");
    let h1 = sha256_file(&path).expect("hash");
    std::fs::write(&path, "b").expect("write");
    let h2 = sha256_file(&path).expect("hash");

    assert_ne!(h1, h2);
  }

  #[test]
  fn test_short_hash_length() {
    assert_eq!(short_hash(&json!({ "k": 1 }), 10).len(), 10);
    assert_eq!(short_hash(&json!({ "k": 1 }), 16).len(), 16);
  }
}

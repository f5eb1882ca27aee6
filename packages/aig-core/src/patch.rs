//! RFC 6902 JSON Patch operations and RFC 6901 JSON Pointer paths.
//!
//! Only the three operations the Diff Engine ever emits are modeled
//! (`add`, `replace`, `remove`) — `move`, `copy`, and `test` have no producer
//! in this system and are not represented.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Add a value at `path` (creates a new member, or appends to an array
    /// via the `-` pointer segment).
    Add {
        /// JSON Pointer target.
        path: String,
        /// Value to insert.
        value: Value,
    },
    /// Replace the value already present at `path`.
    Replace {
        /// JSON Pointer target.
        path: String,
        /// New value.
        value: Value,
    },
    /// Remove the member at `path`.
    Remove {
        /// JSON Pointer target.
        path: String,
    },
}

impl PatchOp {
    /// The JSON Pointer path this operation targets.
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
                path
            }
        }
    }
}

/// Append an already-escaped pointer segment to `base`, escaping `seg` per
/// RFC 6901 (`~` → `~0`, `/` → `~1`).
pub fn append_pointer(base: &str, seg: &str) -> String {
    let mut out = String::with_capacity(base.len() + seg.len() + 1);
    out.push_str(base);
    out.push('/');
    for ch in seg.chars() {
        match ch {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── 1. pointer escaping ──────────────────────────────────────────────

    #[test]
    fn escapes_tilde_and_slash() {
        assert_eq!(append_pointer("/metadata", "a/b"), "/metadata/a~1b");
        assert_eq!(append_pointer("/metadata", "a~b"), "/metadata/a~0b");
    }

    #[test]
    fn appends_plain_segment() {
        assert_eq!(append_pointer("/aliases", "0"), "/aliases/0");
        assert_eq!(append_pointer("/aliases", "-"), "/aliases/-");
    }

    // ── 2. serde shape matches RFC 6902 field names ─────────────────────

    #[test]
    fn serializes_as_rfc6902_shape() {
        let op = PatchOp::Add {
            path: "/aliases/-".to_string(),
            value: json!({"id": "foo"}),
        };
        let v = serde_json::to_value(&op).unwrap();
        assert_eq!(v["op"], json!("add"));
        assert_eq!(v["path"], json!("/aliases/-"));
        assert_eq!(v["value"]["id"], json!("foo"));
    }

    #[test]
    fn path_accessor_covers_all_variants() {
        let add = PatchOp::Add { path: "/a".into(), value: json!(1) };
        let replace = PatchOp::Replace { path: "/b".into(), value: json!(2) };
        let remove = PatchOp::Remove { path: "/c".into() };
        assert_eq!(add.path(), "/a");
        assert_eq!(replace.path(), "/b");
        assert_eq!(remove.path(), "/c");
    }
}

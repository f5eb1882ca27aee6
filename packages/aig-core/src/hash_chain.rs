//! Hash Chain (component C).
//!
//! `hash_i = Blake2b-256(hash_{i-1} ‖ ascii(created_i) ‖ ascii(userIdentity_i) ‖ canonical(patches_i))`,
//! with `hash_{-1}` empty. The concatenation is built incrementally via the
//! hasher's streaming API rather than materialized as one buffer.
//!
//! The digest is 32 raw bytes. It is base64-encoded for storage on the
//! changeset record, but the *raw* bytes — not the base64 text — are what
//! gets handed to the signer (see [`crate::envelope`]).

use base64::Engine as _;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde_json::Value;

use crate::canonical::to_canonical_bytes;

type Blake2b256 = Blake2b<U32>;

/// A 32-byte Blake2b-256 digest.
pub type Digest32 = [u8; 32];

/// Compute `hash_i` given the prior digest (`None` for the first changeset),
/// the mutation's captured `created` epoch, the acting `userIdentity`, and
/// the changeset's `patches` (as a JSON array value).
pub fn compute_hash(prior: Option<&Digest32>, created: i64, user_identity: &str, patches: &Value) -> Digest32 {
    let mut hasher = Blake2b256::new();
    if let Some(prior) = prior {
        hasher.update(prior);
    }
    hasher.update(created.to_string().as_bytes());
    hasher.update(user_identity.as_bytes());
    hasher.update(to_canonical_bytes(patches));
    let out = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&out);
    digest
}

/// Base64-encode a digest for storage on a changeset record.
pub fn encode_hash(digest: &Digest32) -> String {
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Decode a base64-encoded digest back to raw bytes.
pub fn decode_hash(encoded: &str) -> Option<Digest32> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── 1. digest is 32 bytes and stable for the same inputs ────────────

    #[test]
    fn first_hash_is_stable_for_fixed_inputs() {
        // See DESIGN.md ("Unreproducible worked-example digests"): the
        // spec's own worked digests depend on an exact canonical byte
        // layout this distillation doesn't pin down, so this asserts
        // self-consistency rather than an external literal.
        let created = 1_724_327_716_271_i64;
        let digest_a = compute_hash(None, created, "user-1", &json!([]));
        let digest_b = compute_hash(None, created, "user-1", &json!([]));
        assert_eq!(digest_a, digest_b);
        assert_eq!(digest_a.len(), 32);
    }

    // ── 2. chaining: second hash depends on the first ───────────────────

    #[test]
    fn chain_depends_on_prior_digest() {
        let h0 = compute_hash(None, 1, "user-1", &json!([]));
        let h1a = compute_hash(Some(&h0), 2, "user-1", &json!([{"op": "add"}]));
        let h1b = compute_hash(Some(&[0u8; 32]), 2, "user-1", &json!([{"op": "add"}]));
        assert_ne!(h1a, h1b);
    }

    // ── 3. base64 round trip ─────────────────────────────────────────────

    #[test]
    fn base64_round_trip() {
        let digest = compute_hash(None, 1, "user-1", &json!([]));
        let encoded = encode_hash(&digest);
        let decoded = decode_hash(&encoded).unwrap();
        assert_eq!(digest, decoded);
    }

    // ── 4. determinism across repeated calls ─────────────────────────────

    #[test]
    fn deterministic() {
        let a = compute_hash(None, 42, "user-1", &json!([{"op": "add", "path": "/x", "value": 1}]));
        let b = compute_hash(None, 42, "user-1", &json!([{"op": "add", "path": "/x", "value": 1}]));
        assert_eq!(a, b);
        let c = compute_hash(None, 43, "user-1", &json!([{"op": "add", "path": "/x", "value": 1}]));
        assert_ne!(a, c, "changing created changes the digest");
    }

    // ── 5. key order inside patch values does not affect the hash ──────

    #[test]
    fn key_order_in_patch_value_does_not_affect_hash() {
        let a = compute_hash(None, 1, "user-1", &json!([{"value": {"b": 1, "a": 2}}]));
        let b = compute_hash(None, 1, "user-1", &json!([{"value": {"a": 2, "b": 1}}]));
        assert_eq!(a, b);
    }
}

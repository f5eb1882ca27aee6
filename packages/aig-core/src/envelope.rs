//! Integrity Envelope (component D).
//!
//! Builds and parses the signed, optionally-encrypted credential payload a
//! changeset is anchored as in the immutable log. The envelope itself only
//! calls [`crate::ports::Vault`] and [`crate::ports::Identity`] — it never
//! picks a concrete algorithm; that choice belongs to whichever adapter
//! implements those ports (see [`crate::mem`] for the reference one).

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical::to_canonical_bytes;
use crate::errors::BoxError;
use crate::hash_chain::Digest32;
use crate::ports::{Identity, ImmutableLog, Vault};

const CREDENTIAL_TYPE: &str = "AuditableItemGraphChangeset";

/// The subject of the verifiable credential anchored per changeset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeSubject {
    /// Base64 of the Ed25519-family signature over the changeset digest.
    pub signature: String,
    /// Base64 ciphertext of the canonicalized integrity payload, present
    /// only when `enableIntegrityCheck` was on at write time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

/// The plaintext integrity payload encrypted into [`EnvelopeSubject::integrity`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrityPayload {
    pub created: i64,
    #[serde(rename = "userIdentity")]
    pub user_identity: String,
    pub patches: Value,
}

/// `"<nodeIdentity>/<vaultKeyId>"`, the vault key reference for a node.
pub fn vault_key_ref(node_identity: &str, vault_key_id: &str) -> String {
    format!("{node_identity}/{vault_key_id}")
}

/// `"<nodeIdentity>#<assertionMethodId>"`, the identity assertion method.
pub fn assertion_method_ref(node_identity: &str, assertion_method_id: &str) -> String {
    format!("{node_identity}#{assertion_method_id}")
}

/// Build the envelope for one new changeset and anchor it in the immutable
/// log, returning the resulting `immutableStorageId`.
#[allow(clippy::too_many_arguments)]
pub async fn build_and_anchor(
    vault: &dyn Vault,
    identity: &dyn Identity,
    log: &dyn ImmutableLog,
    node_identity: &str,
    vault_key_id: &str,
    assertion_method_id: &str,
    digest: &Digest32,
    created: i64,
    user_identity: &str,
    patches: &Value,
    enable_integrity_check: bool,
) -> Result<String, BoxError> {
    let key_ref = vault_key_ref(node_identity, vault_key_id);

    let signature = vault.sign(&key_ref, digest).await?;

    let integrity = if enable_integrity_check {
        let payload = IntegrityPayload {
            created,
            user_identity: user_identity.to_string(),
            patches: patches.clone(),
        };
        let payload_value = serde_json::to_value(&payload)?;
        let plaintext = to_canonical_bytes(&payload_value);
        let ciphertext = vault.encrypt(&key_ref, &plaintext).await?;
        Some(base64::engine::general_purpose::STANDARD.encode(ciphertext))
    } else {
        None
    };

    let subject = EnvelopeSubject {
        signature: base64::engine::general_purpose::STANDARD.encode(signature),
        integrity,
    };
    let subject_value = serde_json::to_value(&subject)?;

    let assertion_method = assertion_method_ref(node_identity, assertion_method_id);
    let credential = identity
        .create_verifiable_credential(node_identity, &assertion_method, None, CREDENTIAL_TYPE, subject_value)
        .await?;

    log.store(node_identity, credential.jwt.as_bytes()).await
}

/// Remove a previously-anchored envelope. The changeset's local hash
/// remains verifiable; signature verification becomes unavailable once
/// detached (the credential is gone).
pub async fn detach(log: &dyn ImmutableLog, node_identity: &str, immutable_storage_id: &str) -> Result<(), BoxError> {
    log.remove(node_identity, immutable_storage_id).await
}

/// What [`fetch`] recovered from a stored envelope: whether the backing
/// credential is revoked, its subject (if not fatally malformed), and the
/// identities parsed from the credential itself (issuer / assertion method),
/// carried through for verification diagnostics.
pub struct FetchedEnvelope {
    pub revoked: bool,
    pub subject: Option<EnvelopeSubject>,
    pub issuer: Option<String>,
    pub assertion_method: Option<String>,
}

/// Fetch and JWS-decode the credential anchored at `immutable_storage_id`,
/// returning its revocation status, subject, and parsed identities.
pub async fn fetch(
    identity: &dyn Identity,
    log: &dyn ImmutableLog,
    immutable_storage_id: &str,
) -> Result<FetchedEnvelope, BoxError> {
    let bytes = log.get(immutable_storage_id).await?;
    let jwt = String::from_utf8(bytes)?;
    let check = identity.check_verifiable_credential(&jwt).await?;
    let subject: Option<EnvelopeSubject> = serde_json::from_value(check.verifiable_credential).ok();
    Ok(FetchedEnvelope {
        revoked: check.revoked,
        subject,
        issuer: check.issuer,
        assertion_method: check.assertion_method,
    })
}

/// Reconstruct the canonical integrity payload bytes for a changeset, to
/// compare against a decrypted [`EnvelopeSubject::integrity`] at
/// verification time.
pub fn reconstruct_integrity_payload(created: i64, user_identity: &str, patches: &Value) -> Value {
    json!({
        "created": created,
        "userIdentity": user_identity,
        "patches": patches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── 1. key ref / assertion method formatting ────────────────────────

    #[test]
    fn vault_key_ref_format() {
        assert_eq!(vault_key_ref("node-1", "auditable-item-graph"), "node-1/auditable-item-graph");
    }

    #[test]
    fn assertion_method_format() {
        assert_eq!(assertion_method_ref("node-1", "auditable-item-graph"), "node-1#auditable-item-graph");
    }

    // ── 2. subject serde round trip, integrity omitted when None ───────

    #[test]
    fn subject_omits_integrity_when_absent() {
        let subject = EnvelopeSubject { signature: "sig".into(), integrity: None };
        let v = serde_json::to_value(&subject).unwrap();
        assert!(v.get("integrity").is_none());
    }

    #[test]
    fn subject_round_trip_with_integrity() {
        let subject = EnvelopeSubject { signature: "sig".into(), integrity: Some("enc".into()) };
        let v = serde_json::to_value(&subject).unwrap();
        let back: EnvelopeSubject = serde_json::from_value(v).unwrap();
        assert_eq!(back.signature, "sig");
        assert_eq!(back.integrity.as_deref(), Some("enc"));
    }

    // ── 3. integrity payload shape matches reconstruction helper ───────

    #[test]
    fn integrity_payload_matches_reconstruction() {
        use serde_json::json;
        let patches = json!([{"op": "add", "path": "/x", "value": 1}]);
        let payload = IntegrityPayload {
            created: 42,
            user_identity: "user-1".into(),
            patches: patches.clone(),
        };
        let as_value = serde_json::to_value(&payload).unwrap();
        let reconstructed = reconstruct_integrity_payload(42, "user-1", &patches);
        assert_eq!(
            to_canonical_bytes(&as_value),
            to_canonical_bytes(&reconstructed),
        );
    }
}

//! Verifier (component G).
//!
//! Replays a vertex's changeset chain, recomputing hashes and (within the
//! requested depth) envelope signatures, and reports pass/fail per
//! changeset rather than raising an error — per spec §7, verification
//! failures are diagnostics, not propagated `Result::Err`s.

use base64::Engine as _;
use serde_json::Value;

use crate::canonical::to_canonical_bytes;
use crate::envelope::{self, vault_key_ref};
use crate::hash_chain::{compute_hash, decode_hash, Digest32};
use crate::model::Vertex;
use crate::ports::{Identity, ImmutableLog, Vault};

/// How much of the chain to run envelope (signature/credential) checks
/// over. The hash chain itself is always fully replayed regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyDepth {
    /// Only the most recent changeset gets envelope checks.
    Current,
    /// Every changeset with an `immutableStorageId` gets envelope checks.
    All,
}

/// Why one changeset failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    /// The recomputed hash doesn't match the stored `hash`.
    InvalidChangesetHash,
    /// The credential's signature doesn't match a freshly-recomputed one.
    InvalidChangesetSignature,
    /// The decrypted integrity payload doesn't canonical-match the
    /// reconstructed `{created, userIdentity, patches}`.
    InvalidChangesetCanonical,
    /// The anchoring credential has been revoked.
    ChangesetCredentialRevoked,
}

/// Diagnostic detail accompanying a [`VerificationFailure`].
#[derive(Debug, Clone)]
pub struct FailureProperties {
    pub stored_hash: String,
    pub created: i64,
    pub reconstructed_patches: Value,
    pub stored_patches: Value,
    /// The credential's issuer (signing node identity), when the envelope
    /// was reachable and decodable far enough to recover it. `None` for a
    /// hash failure, since that's detected before the credential is fetched.
    pub credential_issuer: Option<String>,
    /// The credential's assertion method reference, same availability as
    /// `credential_issuer`.
    pub credential_assertion_method: Option<String>,
}

/// One changeset's verification outcome.
#[derive(Debug, Clone)]
pub struct VerificationEntry {
    pub created: i64,
    pub patches: Value,
    pub failure: Option<VerificationFailure>,
    pub failure_properties: Option<FailureProperties>,
}

/// The full verification report for a vertex.
#[derive(Debug, Clone)]
pub struct Verification {
    pub verified: bool,
    pub entries: Vec<VerificationEntry>,
}

/// Replay `vertex`'s changeset chain and verify it.
pub async fn verify_chain(
    vertex: &Vertex,
    vault: &dyn Vault,
    identity: &dyn Identity,
    log: &dyn ImmutableLog,
    node_identity: &str,
    vault_key_id: &str,
    depth: VerifyDepth,
) -> Verification {
    let changesets = match &vertex.changesets {
        Some(cs) => cs.as_slice(),
        None => &[],
    };
    let total = changesets.len();
    let mut prior: Option<Digest32> = None;
    let mut entries = Vec::with_capacity(total);
    let mut verified = true;

    for (index, changeset) in changesets.iter().enumerate() {
        let patches_value =
            serde_json::to_value(&changeset.patches).expect("patch list serializes without error");
        let digest = compute_hash(prior.as_ref(), changeset.created, &changeset.user_identity, &patches_value);
        let stored_digest = decode_hash(&changeset.hash);

        // Common diagnostic fields shared by every failure kind; credential
        // identities are filled in once the envelope has actually been
        // fetched (they stay `None` for a hash failure, detected before
        // that fetch happens).
        let build_props = |credential_issuer: Option<String>, credential_assertion_method: Option<String>| FailureProperties {
            stored_hash: changeset.hash.clone(),
            created: changeset.created,
            reconstructed_patches: patches_value.clone(),
            stored_patches: patches_value.clone(),
            credential_issuer,
            credential_assertion_method,
        };

        let mut failure = None;
        let mut failure_properties = None;

        if stored_digest.as_ref() != Some(&digest) {
            failure = Some(VerificationFailure::InvalidChangesetHash);
            verified = false;
            failure_properties = Some(build_props(None, None));
        }

        let in_scope = matches!(depth, VerifyDepth::All) || index + 1 == total;

        if failure.is_none() && in_scope {
            if let Some(immutable_storage_id) = &changeset.immutable_storage_id {
                match envelope::fetch(identity, log, immutable_storage_id).await {
                    Ok(fetched) => {
                        let issuer = fetched.issuer.clone();
                        let assertion_method = fetched.assertion_method.clone();
                        if fetched.revoked {
                            failure = Some(VerificationFailure::ChangesetCredentialRevoked);
                            verified = false;
                            failure_properties = Some(build_props(issuer, assertion_method));
                        } else {
                            match fetched.subject {
                                Some(subject) => {
                                    let key_ref = vault_key_ref(node_identity, vault_key_id);
                                    let recomputed_sig = vault.sign(&key_ref, &digest).await.ok();
                                    let expected_sig = recomputed_sig
                                        .as_deref()
                                        .map(|sig| base64::engine::general_purpose::STANDARD.encode(sig));
                                    if expected_sig.as_deref() != Some(subject.signature.as_str()) {
                                        failure = Some(VerificationFailure::InvalidChangesetSignature);
                                        verified = false;
                                        failure_properties = Some(build_props(issuer, assertion_method));
                                    } else if let Some(integrity_b64) = &subject.integrity {
                                        let reconstructed = envelope::reconstruct_integrity_payload(
                                            changeset.created,
                                            &changeset.user_identity,
                                            &patches_value,
                                        );
                                        // Any failure to decode, decrypt, or parse the
                                        // stored integrity payload counts as a mismatch.
                                        let plaintext = match base64::engine::general_purpose::STANDARD.decode(integrity_b64) {
                                            Ok(ciphertext) => vault.decrypt(&key_ref, &ciphertext).await.ok(),
                                            Err(_) => None,
                                        };
                                        let matches = plaintext
                                            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
                                            .map(|decrypted| {
                                                to_canonical_bytes(&decrypted) == to_canonical_bytes(&reconstructed)
                                            })
                                            .unwrap_or(false);
                                        if !matches {
                                            failure = Some(VerificationFailure::InvalidChangesetCanonical);
                                            verified = false;
                                            failure_properties = Some(build_props(issuer, assertion_method));
                                        }
                                    }
                                }
                                None => {
                                    failure = Some(VerificationFailure::InvalidChangesetSignature);
                                    verified = false;
                                    failure_properties = Some(build_props(issuer, assertion_method));
                                }
                            }
                        }
                    }
                    Err(_) => {
                        // Detached or unreachable credential: per spec §5, an
                        // orphaned/removed anchor carries no authority and is
                        // not itself a verification failure.
                    }
                }
            }
        }

        entries.push(VerificationEntry {
            created: changeset.created,
            patches: patches_value,
            failure,
            failure_properties,
        });
        prior = Some(digest);
    }

    Verification { verified, entries }
}

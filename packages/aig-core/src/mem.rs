//! Reference in-memory adapters for every collaborator port.
//!
//! These are **not** production backends — no real KMS, DID registry, or
//! ledger is involved — they exist so the engine can be exercised end to
//! end in tests and local development, the same ambient role
//! `codegraph-storage`'s stubbed SQLite adapter plays for its own crate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce};
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::BoxError;
use crate::model::Vertex;
use crate::ports::{
    Clock, CredentialCheck, EntityQuery, EntityStorage, Identity, IdMode, ImmutableLog,
    IssuedCredential, OrderBy, OrderDirection, QueryPage, Vault,
};
use crate::urn::VertexId;

fn io_error(message: impl Into<String>) -> BoxError {
    Box::new(std::io::Error::new(std::io::ErrorKind::Other, message.into()))
}

/// An Ed25519/ChaCha20-Poly1305-backed vault keyed by `keyRef`. Keys are
/// generated on first use and held for the adapter's lifetime — there is no
/// persistence or rotation, which is exactly why this lives under `mem`
/// rather than as a real backend.
pub struct InMemoryVault {
    signing_keys: RwLock<HashMap<String, SigningKey>>,
    cipher_keys: RwLock<HashMap<String, ChaChaKey>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self {
            signing_keys: RwLock::new(HashMap::new()),
            cipher_keys: RwLock::new(HashMap::new()),
        }
    }

    async fn signing_key_for(&self, key_ref: &str) -> SigningKey {
        if let Some(key) = self.signing_keys.read().await.get(key_ref) {
            return key.clone();
        }
        let mut keys = self.signing_keys.write().await;
        keys.entry(key_ref.to_string())
            .or_insert_with(|| SigningKey::generate(&mut rand::rngs::OsRng))
            .clone()
    }

    async fn cipher_key_for(&self, key_ref: &str) -> ChaChaKey {
        if let Some(key) = self.cipher_keys.read().await.get(key_ref) {
            return key.clone();
        }
        let mut keys = self.cipher_keys.write().await;
        keys.entry(key_ref.to_string())
            .or_insert_with(|| {
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                ChaChaKey::clone_from_slice(&bytes)
            })
            .clone()
    }
}

impl Default for InMemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vault for InMemoryVault {
    async fn sign(&self, key_ref: &str, bytes: &[u8]) -> Result<Vec<u8>, BoxError> {
        let key = self.signing_key_for(key_ref).await;
        Ok(key.sign(bytes).to_bytes().to_vec())
    }

    async fn encrypt(&self, key_ref: &str, plaintext: &[u8]) -> Result<Vec<u8>, BoxError> {
        let key = self.cipher_key_for(key_ref).await;
        let cipher = ChaCha20Poly1305::new(&key);
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| io_error("chacha20poly1305 encryption failed"))?;
        let mut out = nonce_bytes.to_vec();
        out.append(&mut ciphertext);
        Ok(out)
    }

    async fn decrypt(&self, key_ref: &str, ciphertext: &[u8]) -> Result<Vec<u8>, BoxError> {
        if ciphertext.len() < 12 {
            return Err(io_error("ciphertext too short to contain a nonce"));
        }
        let (nonce_bytes, body) = ciphertext.split_at(12);
        let key = self.cipher_key_for(key_ref).await;
        let cipher = ChaCha20Poly1305::new(&key);
        let nonce = Nonce::from_slice(nonce_bytes);
        cipher.decrypt(nonce, body).map_err(|_| io_error("chacha20poly1305 decryption failed"))
    }
}

/// An identity collaborator that issues self-signed, non-JWS credentials:
/// a base64-encoded canonical JSON envelope. Production identity backends
/// would issue real JWS-encoded verifiable credentials against a DID
/// document; this adapter only needs to round-trip `subjectData` and honor
/// revocation for the engine's own tests.
pub struct InMemoryIdentity {
    revoked: RwLock<HashSet<String>>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self { revoked: RwLock::new(HashSet::new()) }
    }

    /// Mark a previously-issued credential as revoked.
    pub async fn revoke(&self, jwt: &str) {
        if let Some(id) = credential_id(jwt) {
            self.revoked.write().await.insert(id);
        }
    }
}

impl Default for InMemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn credential_id(jwt: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(jwt).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    value.get("id").and_then(|v| v.as_str()).map(str::to_string)
}

#[async_trait]
impl Identity for InMemoryIdentity {
    async fn create_verifiable_credential(
        &self,
        issuer: &str,
        assertion_method: &str,
        subject_id: Option<&str>,
        credential_type: &str,
        subject_data: Value,
    ) -> Result<IssuedCredential, BoxError> {
        let mut id_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut id_bytes);
        let credential = serde_json::json!({
            "id": format!("urn:credential:{}", hex::encode(id_bytes)),
            "iss": issuer,
            "assertionMethod": assertion_method,
            "sub": subject_id,
            "type": credential_type,
            "credentialSubject": subject_data,
        });
        let bytes = serde_json::to_vec(&credential)?;
        let jwt = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(IssuedCredential { jwt })
    }

    async fn check_verifiable_credential(&self, jwt: &str) -> Result<CredentialCheck, BoxError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(jwt)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let id = value.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let revoked = self.revoked.read().await.contains(&id);
        let verifiable_credential = value.get("credentialSubject").cloned().unwrap_or(Value::Null);
        let issuer = value.get("iss").and_then(|v| v.as_str()).map(str::to_string);
        let assertion_method = value.get("assertionMethod").and_then(|v| v.as_str()).map(str::to_string);
        Ok(CredentialCheck { revoked, verifiable_credential, issuer, assertion_method })
    }
}

/// An append-only in-memory ledger keyed by a generated `immutable:mem:<hex>` urn.
pub struct InMemoryImmutableLog {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryImmutableLog {
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryImmutableLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImmutableLog for InMemoryImmutableLog {
    async fn store(&self, _controller: &str, bytes: &[u8]) -> Result<String, BoxError> {
        let mut id_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut id_bytes);
        let id = format!("immutable:mem:{}", hex::encode(id_bytes));
        self.records.write().await.insert(id.clone(), bytes.to_vec());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, BoxError> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| io_error(format!("no immutable record at {id}")))
    }

    async fn remove(&self, _controller: &str, id: &str) -> Result<(), BoxError> {
        self.records.write().await.remove(id);
        Ok(())
    }
}

/// An in-memory vertex store with a naive linear-scan query implementation.
/// Field projection (`properties`) is not implemented — this reference
/// adapter always returns full vertices; a real backend would project at
/// the storage layer.
pub struct InMemoryEntityStorage {
    vertices: RwLock<HashMap<VertexId, Vertex>>,
}

impl InMemoryEntityStorage {
    pub fn new() -> Self {
        Self { vertices: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryEntityStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStorage for InMemoryEntityStorage {
    async fn get(&self, id: &VertexId) -> Result<Option<Vertex>, BoxError> {
        Ok(self.vertices.read().await.get(id).cloned())
    }

    async fn set(&self, entity: &Vertex) -> Result<(), BoxError> {
        self.vertices.write().await.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn query(&self, query: EntityQuery) -> Result<QueryPage, BoxError> {
        let all = self.vertices.read().await;
        let mut matches: Vec<Vertex> = all
            .values()
            .filter(|v| matches_needle(v, query.id.as_deref(), query.id_mode))
            .cloned()
            .collect();
        drop(all);

        matches.sort_by_key(|v| match query.order_by {
            OrderBy::Created => v.created,
            OrderBy::Updated => v.updated,
        });
        if query.order_direction == OrderDirection::Descending {
            matches.reverse();
        }

        let total_entities = matches.len();
        let offset: usize = query.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let page: Vec<Vertex> = match query.page_size {
            Some(size) => matches.into_iter().skip(offset).take(size).collect(),
            None => matches.into_iter().skip(offset).collect(),
        };
        let next_offset = offset + page.len();
        let cursor = if next_offset < total_entities { Some(next_offset.to_string()) } else { None };

        Ok(QueryPage { entities: page, cursor, page_size: query.page_size, total_entities })
    }
}

fn matches_needle(vertex: &Vertex, needle: Option<&str>, mode: IdMode) -> bool {
    let Some(needle) = needle else { return true };
    let id_match = vertex.id.to_urn().contains(needle) || vertex.id.to_hex().contains(needle);
    let alias_match = vertex
        .alias_index
        .as_deref()
        .is_some_and(|index| index.contains(&needle.to_lowercase()));
    match mode {
        IdMode::Id => id_match,
        IdMode::Alias => alias_match,
        IdMode::Both => id_match || alias_match,
    }
}

/// Wall-clock `now`, backed by `chrono::Utc::now()`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A deterministic clock for tests: holds a fixed epoch that can be
/// advanced explicitly, never drifts on its own.
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self { now: AtomicI64::new(now) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── 1. vault sign is deterministic per key_ref ──────────────────────

    #[tokio::test]
    async fn vault_sign_is_deterministic() {
        let vault = InMemoryVault::new();
        let a = vault.sign("node-1/key", b"hello").await.unwrap();
        let b = vault.sign("node-1/key", b"hello").await.unwrap();
        assert_eq!(a, b);
    }

    // ── 2. different key_refs sign differently ──────────────────────────

    #[tokio::test]
    async fn vault_sign_differs_across_key_refs() {
        let vault = InMemoryVault::new();
        let a = vault.sign("node-1/key", b"hello").await.unwrap();
        let b = vault.sign("node-2/key", b"hello").await.unwrap();
        assert_ne!(a, b);
    }

    // ── 3. encrypt/decrypt round trip ───────────────────────────────────

    #[tokio::test]
    async fn vault_encrypt_decrypt_round_trip() {
        let vault = InMemoryVault::new();
        let ciphertext = vault.encrypt("node-1/key", b"secret payload").await.unwrap();
        let plaintext = vault.decrypt("node-1/key", &ciphertext).await.unwrap();
        assert_eq!(plaintext, b"secret payload");
    }

    // ── 4. tampered ciphertext fails to decrypt ─────────────────────────

    #[tokio::test]
    async fn vault_decrypt_rejects_tampered_ciphertext() {
        let vault = InMemoryVault::new();
        let mut ciphertext = vault.encrypt("node-1/key", b"secret payload").await.unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(vault.decrypt("node-1/key", &ciphertext).await.is_err());
    }

    // ── 5. identity issue + check round trip, not revoked ───────────────

    #[tokio::test]
    async fn identity_issue_and_check_round_trip() {
        let identity = InMemoryIdentity::new();
        let credential = identity
            .create_verifiable_credential("node-1", "node-1#key", None, "Test", serde_json::json!({"a": 1}))
            .await
            .unwrap();
        let check = identity.check_verifiable_credential(&credential.jwt).await.unwrap();
        assert!(!check.revoked);
        assert_eq!(check.verifiable_credential, serde_json::json!({"a": 1}));
    }

    // ── 6. revoking a credential is reflected on the next check ─────────

    #[tokio::test]
    async fn identity_revocation() {
        let identity = InMemoryIdentity::new();
        let credential = identity
            .create_verifiable_credential("node-1", "node-1#key", None, "Test", serde_json::json!({}))
            .await
            .unwrap();
        identity.revoke(&credential.jwt).await;
        let check = identity.check_verifiable_credential(&credential.jwt).await.unwrap();
        assert!(check.revoked);
    }

    // ── 7. immutable log store/get/remove ───────────────────────────────

    #[tokio::test]
    async fn immutable_log_lifecycle() {
        let log = InMemoryImmutableLog::new();
        let id = log.store("node-1", b"jws bytes").await.unwrap();
        assert_eq!(log.get(&id).await.unwrap(), b"jws bytes");
        log.remove("node-1", &id).await.unwrap();
        assert!(log.get(&id).await.is_err());
    }

    // ── 8. entity storage query by id, sorted descending by default ────

    #[tokio::test]
    async fn entity_storage_query_sorts_descending_by_created() {
        let storage = InMemoryEntityStorage::new();
        let v1 = Vertex::zero(VertexId([0x01; 32]), "node-1", 1);
        let v2 = Vertex::zero(VertexId([0x02; 32]), "node-1", 2);
        storage.set(&v1).await.unwrap();
        storage.set(&v2).await.unwrap();

        let page = storage.query(EntityQuery::default()).await.unwrap();
        assert_eq!(page.total_entities, 2);
        assert_eq!(page.entities[0].created, 2);
        assert_eq!(page.entities[1].created, 1);
    }

    // ── 8b. query needle matches by substring, not just exact equality ──

    #[tokio::test]
    async fn entity_storage_query_matches_by_substring() {
        let storage = InMemoryEntityStorage::new();
        let with_four = Vertex::zero(VertexId([0x04; 32]), "node-1", 1);
        let without_four = Vertex::zero(VertexId([0x01; 32]), "node-1", 2);
        storage.set(&with_four).await.unwrap();
        storage.set(&without_four).await.unwrap();

        let both = storage
            .query(EntityQuery { id: Some("4".into()), id_mode: IdMode::Both, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(both.total_entities, 1, "only the hex-id-containing-4 vertex matches");

        let id_mode_only = storage
            .query(EntityQuery { id: Some("4".into()), id_mode: IdMode::Id, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(id_mode_only.entities[0].id, with_four.id);
    }

    // ── 9. fixed clock never drifts until advanced ──────────────────────

    #[test]
    fn fixed_clock_holds_steady() {
        let clock = FixedClock::new(100);
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(clock.now_ms(), 100);
        clock.advance(50);
        assert_eq!(clock.now_ms(), 150);
    }
}

//! Collaborator ports (component §6): `Vault`, `Identity`, `ImmutableLog`,
//! `EntityStorage`, plus the supplemental `Clock` port.
//!
//! Concrete backends (a real KMS, a DID registry, an append-only ledger, a
//! database) are out of scope for this crate; [`crate::mem`] ships one
//! reference implementation of each so the engine can be exercised and
//! tested end to end.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::BoxError;
use crate::model::Vertex;
use crate::urn::VertexId;

/// Key material operations the engine needs from a vault: signing and
/// authenticated encryption, both scoped to a `keyRef` of the form
/// `"<nodeIdentity>/<vaultKeyId>"`.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Sign `bytes` under `key_ref`, returning the raw signature bytes.
    async fn sign(&self, key_ref: &str, bytes: &[u8]) -> Result<Vec<u8>, BoxError>;

    /// Encrypt `plaintext` under `key_ref` with an authenticated cipher,
    /// returning the ciphertext (nonce embedded or otherwise self-describing
    /// per the implementation).
    async fn encrypt(&self, key_ref: &str, plaintext: &[u8]) -> Result<Vec<u8>, BoxError>;

    /// Decrypt `ciphertext` previously produced by [`Vault::encrypt`] under
    /// the same `key_ref`.
    async fn decrypt(&self, key_ref: &str, ciphertext: &[u8]) -> Result<Vec<u8>, BoxError>;
}

/// A verifiable credential freshly issued by an [`Identity`] collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCredential {
    /// The encoded JWS/JWT string.
    pub jwt: String,
}

/// The result of checking a previously-issued credential.
#[derive(Debug, Clone)]
pub struct CredentialCheck {
    /// Whether the credential has been revoked since issuance.
    pub revoked: bool,
    /// The decoded credential subject, as opaque structured data.
    pub verifiable_credential: Value,
    /// The credential's issuer (the signing node's identity), if recoverable.
    pub issuer: Option<String>,
    /// The credential's assertion method reference, if recoverable.
    pub assertion_method: Option<String>,
}

/// Verifiable-credential issuance and revocation checking, scoped to an
/// assertion method of the form `"<nodeIdentity>#<assertionMethodId>"`.
#[async_trait]
pub trait Identity: Send + Sync {
    /// Issue a verifiable credential over `subject_data`.
    async fn create_verifiable_credential(
        &self,
        issuer: &str,
        assertion_method: &str,
        subject_id: Option<&str>,
        credential_type: &str,
        subject_data: Value,
    ) -> Result<IssuedCredential, BoxError>;

    /// Decode `jwt` and report its revocation status and subject.
    async fn check_verifiable_credential(&self, jwt: &str) -> Result<CredentialCheck, BoxError>;
}

/// An append-only, externally anchored log of opaque byte blobs, addressed
/// by an opaque URN (`immutable:<driver>:<hex>` in practice, never
/// interpreted by the core).
#[async_trait]
pub trait ImmutableLog: Send + Sync {
    /// Store `bytes` under `controller`, returning the record's URN.
    async fn store(&self, controller: &str, bytes: &[u8]) -> Result<String, BoxError>;

    /// Fetch the bytes previously stored at `id`.
    async fn get(&self, id: &str) -> Result<Vec<u8>, BoxError>;

    /// Remove the record at `id`. Idempotent: removing an already-removed
    /// or never-existing id is not an error.
    async fn remove(&self, controller: &str, id: &str) -> Result<(), BoxError>;
}

/// Which field(s) a query's `id` needle is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdMode {
    /// Match only against the vertex's own id.
    Id,
    /// Match only against `aliasIndex` (needle lowercased first).
    Alias,
    /// Match against either, joined by logical OR.
    #[default]
    Both,
}

/// Which timestamp field to sort query results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// `created` epoch.
    #[default]
    Created,
    /// `updated` epoch.
    Updated,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    Ascending,
    #[default]
    Descending,
}

/// A query against the vertex entity store.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    /// The needle to match against `id` and/or `aliasIndex`, per `id_mode`.
    pub id: Option<String>,
    pub id_mode: IdMode,
    pub order_by: OrderBy,
    pub order_direction: OrderDirection,
    /// Field names to project in the returned vertices; `id` is always
    /// included regardless of this list. `None` returns full vertices.
    pub properties: Option<Vec<String>>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
}

/// A page of query results.
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub entities: Vec<Vertex>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
    pub total_entities: usize,
}

/// Persistence for vertices: point lookup, upsert, and indexed query.
///
/// Implementations are expected to maintain a secondary index on
/// `aliasIndex` and a primary key on `id`, and to support sorting by
/// `created`/`updated`.
#[async_trait]
pub trait EntityStorage: Send + Sync {
    /// Fetch a vertex by id, or `None` if no vertex exists for it.
    async fn get(&self, id: &VertexId) -> Result<Option<Vertex>, BoxError>;

    /// Insert or overwrite a vertex.
    async fn set(&self, entity: &Vertex) -> Result<(), BoxError>;

    /// Run a query, returning a page of matching vertices.
    async fn query(&self, query: EntityQuery) -> Result<QueryPage, BoxError>;
}

/// Source of the "captured now" used for `created`/`updated` timestamps.
///
/// Injected so tests can hold time fixed; production code uses
/// [`crate::mem::SystemClock`].
pub trait Clock: Send + Sync {
    /// Current time as milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

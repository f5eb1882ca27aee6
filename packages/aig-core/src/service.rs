//! Vertex Service (component F): create/get/update/removeImmutable/query.
//!
//! Holds its collaborators by value, constructor-injection style, following
//! the teacher's plain-field-at-construction pattern rather than a service
//! locator — there is exactly one deployment shape here, so a registry
//! would only add indirection.

use serde_json::Value;
use tracing::instrument;

use crate::config::AigConfig;
use crate::diff;
use crate::envelope;
use crate::errors::{AigError, Result};
use crate::hash_chain::{compute_hash, decode_hash, encode_hash};
use crate::model::{
    Alias, AliasUpdate, Changeset, Edge, EdgeUpdate, Resource, ResourceUpdate, Vertex,
};
use crate::ports::{Clock, EntityQuery, EntityStorage, Identity, ImmutableLog, QueryPage, Vault};
use crate::reconcile::reconcile;
use crate::urn::VertexId;
use crate::verifier::{verify_chain, Verification, VerifyDepth};

/// Options for [`VertexService::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub include_deleted: bool,
    pub include_changesets: bool,
    pub verify_signature_depth: Option<VerifyDepth>,
}

/// The result of a [`VertexService::get`] call.
#[derive(Debug, Clone)]
pub struct GetResult {
    pub vertex: Vertex,
    pub verified: Option<bool>,
    pub verification: Option<Verification>,
}

/// Fields a `create`/`update` call can set. Sub-element lists follow the
/// absent-vs-empty convention from [`crate::reconcile`]: `None` leaves the
/// collection untouched, `Some(vec![])` soft-deletes every active element.
#[derive(Debug, Clone, Default)]
pub struct MutationInput {
    pub metadata_schema: Option<String>,
    pub metadata: Option<Value>,
    pub aliases: Option<Vec<AliasUpdate>>,
    pub resources: Option<Vec<ResourceUpdate>>,
    pub edges: Option<Vec<EdgeUpdate>>,
}

/// The mutation, change-tracking, and verification engine over a graph of
/// vertices.
pub struct VertexService<V, I, L, S, C> {
    vault: V,
    identity: I,
    log: L,
    storage: S,
    clock: C,
    config: AigConfig,
}

impl<V, I, L, S, C> VertexService<V, I, L, S, C>
where
    V: Vault,
    I: Identity,
    L: ImmutableLog,
    S: EntityStorage,
    C: Clock,
{
    pub fn new(vault: V, identity: I, log: L, storage: S, clock: C, config: AigConfig) -> Self {
        Self { vault, identity, log, storage, clock, config }
    }

    /// Create a new vertex, always with at least one changeset.
    #[instrument(skip(self, input), fields(node_identity = %node_identity))]
    pub async fn create(
        &self,
        input: MutationInput,
        user_identity: &str,
        node_identity: &str,
    ) -> Result<String> {
        guard_identities(user_identity, node_identity)?;
        validate_updates(&input)?;

        let now = self.clock.now_ms();
        let id = VertexId::generate();
        let zero = Vertex::zero(id, node_identity, now);
        let prior_value = serde_json::to_value(zero.snapshot()).expect("vertex serializes without error");

        let mut vertex = zero;
        apply_mutation_input(&mut vertex, &input, now);

        let updated_value = serde_json::to_value(vertex.snapshot()).expect("vertex serializes without error");
        let patches = diff::diff(&prior_value, &updated_value);
        let patches_value = serde_json::to_value(&patches).expect("patch list serializes without error");

        let digest = compute_hash(None, now, user_identity, &patches_value);
        let hash = encode_hash(&digest);
        let immutable_storage_id = envelope::build_and_anchor(
            &self.vault,
            &self.identity,
            &self.log,
            node_identity,
            &self.config.vault_key_id,
            &self.config.assertion_method_id,
            &digest,
            now,
            user_identity,
            &patches_value,
            self.config.enable_integrity_check,
        )
        .await
        .map_err(AigError::create_failed)?;

        vertex.changesets = Some(vec![Changeset {
            created: now,
            user_identity: user_identity.to_string(),
            patches,
            hash,
            immutable_storage_id: Some(immutable_storage_id),
        }]);

        self.storage.set(&vertex).await.map_err(AigError::create_failed)?;
        tracing::info!(vertex_id = %vertex.id, "vertex created");
        Ok(vertex.id.to_urn())
    }

    /// Load a vertex, optionally verifying its changeset chain and filtering
    /// tombstoned sub-elements / stripping `changesets`.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str, options: GetOptions) -> Result<GetResult> {
        let vertex_id = VertexId::parse(id)?;
        let mut vertex = self
            .storage
            .get(&vertex_id)
            .await
            .map_err(AigError::get_failed)?
            .ok_or_else(|| AigError::NotFound { id: id.to_string() })?;

        let verification = match options.verify_signature_depth {
            Some(depth) => Some(
                verify_chain(
                    &vertex,
                    &self.vault,
                    &self.identity,
                    &self.log,
                    &vertex.node_identity,
                    &self.config.vault_key_id,
                    depth,
                )
                .await,
            ),
            None => None,
        };
        let verified = verification.as_ref().map(|v| v.verified);

        if !options.include_deleted {
            strip_deleted(&mut vertex);
        }
        if !options.include_changesets {
            vertex.changesets = None;
        }

        Ok(GetResult { vertex, verified, verification })
    }

    /// Apply an update. A no-op (identical snapshot, at least one prior
    /// changeset) persists nothing and leaves `updated` untouched.
    #[instrument(skip(self, input), fields(node_identity = %node_identity))]
    pub async fn update(
        &self,
        id: &str,
        input: MutationInput,
        user_identity: &str,
        node_identity: &str,
    ) -> Result<()> {
        guard_identities(user_identity, node_identity)?;
        validate_updates(&input)?;

        let vertex_id = VertexId::parse(id)?;
        let existing = self
            .storage
            .get(&vertex_id)
            .await
            .map_err(AigError::update_failed)?
            .ok_or_else(|| AigError::NotFound { id: id.to_string() })?;

        let now = self.clock.now_ms();
        let prior_value =
            serde_json::to_value(existing.snapshot()).expect("vertex serializes without error");

        let mut vertex = existing.clone();
        apply_mutation_input(&mut vertex, &input, now);

        let updated_value = serde_json::to_value(vertex.snapshot()).expect("vertex serializes without error");
        let patches = diff::diff(&prior_value, &updated_value);

        let has_prior_changeset = existing.changesets.as_ref().is_some_and(|cs| !cs.is_empty());
        if patches.is_empty() && has_prior_changeset {
            tracing::debug!(vertex_id = %vertex_id, "update is a no-op, skipping persistence");
            return Ok(());
        }

        let prior_digest = existing
            .changesets
            .as_ref()
            .and_then(|cs| cs.last())
            .and_then(|last| decode_hash(&last.hash));
        let patches_value = serde_json::to_value(&patches).expect("patch list serializes without error");
        let digest = compute_hash(prior_digest.as_ref(), now, user_identity, &patches_value);
        let hash = encode_hash(&digest);

        let immutable_storage_id = envelope::build_and_anchor(
            &self.vault,
            &self.identity,
            &self.log,
            node_identity,
            &self.config.vault_key_id,
            &self.config.assertion_method_id,
            &digest,
            now,
            user_identity,
            &patches_value,
            self.config.enable_integrity_check,
        )
        .await
        .map_err(AigError::update_failed)?;

        vertex.updated = now;
        vertex.changesets.get_or_insert_with(Vec::new).push(Changeset {
            created: now,
            user_identity: user_identity.to_string(),
            patches,
            hash,
            immutable_storage_id: Some(immutable_storage_id),
        });

        self.storage.set(&vertex).await.map_err(AigError::update_failed)?;
        Ok(())
    }

    /// Detach every changeset's `immutableStorageId`. Local hash
    /// verification remains possible; signature verification does not.
    #[instrument(skip(self))]
    pub async fn remove_immutable(&self, id: &str, node_identity: &str) -> Result<()> {
        if node_identity.trim().is_empty() {
            return Err(AigError::guard("nodeIdentity must not be empty"));
        }

        let vertex_id = VertexId::parse(id)?;
        let mut vertex = self
            .storage
            .get(&vertex_id)
            .await
            .map_err(AigError::remove_immutable_failed)?
            .ok_or_else(|| AigError::NotFound { id: id.to_string() })?;

        if let Some(changesets) = vertex.changesets.as_mut() {
            for changeset in changesets.iter_mut() {
                if let Some(immutable_storage_id) = changeset.immutable_storage_id.take() {
                    envelope::detach(&self.log, node_identity, &immutable_storage_id)
                        .await
                        .map_err(AigError::remove_immutable_failed)?;
                }
            }
        }

        self.storage.set(&vertex).await.map_err(AigError::remove_immutable_failed)?;
        Ok(())
    }

    /// Run a query over the vertex entity store.
    #[instrument(skip(self, query))]
    pub async fn query(&self, query: EntityQuery) -> Result<QueryPage> {
        self.storage.query(query).await.map_err(AigError::query_failed)
    }
}

fn guard_identities(user_identity: &str, node_identity: &str) -> Result<()> {
    if user_identity.trim().is_empty() {
        return Err(AigError::guard("userIdentity must not be empty"));
    }
    if node_identity.trim().is_empty() {
        return Err(AigError::guard("nodeIdentity must not be empty"));
    }
    Ok(())
}

fn validate_updates(input: &MutationInput) -> Result<()> {
    if let Some(aliases) = &input.aliases {
        for a in aliases {
            if a.id.trim().is_empty() {
                return Err(AigError::guard("alias id must not be empty"));
            }
        }
    }
    if let Some(resources) = &input.resources {
        for r in resources {
            if r.id.trim().is_empty() {
                return Err(AigError::guard("resource id must not be empty"));
            }
        }
    }
    if let Some(edges) = &input.edges {
        for e in edges {
            if e.id.trim().is_empty() {
                return Err(AigError::guard("edge id must not be empty"));
            }
            if e.relationship.trim().is_empty() {
                return Err(AigError::guard("edge relationship must not be empty"));
            }
        }
    }
    Ok(())
}

fn apply_mutation_input(vertex: &mut Vertex, input: &MutationInput, now: i64) {
    vertex.metadata_schema = input.metadata_schema.clone();
    vertex.metadata = input.metadata.clone();

    if let Some(updates) = &input.aliases {
        let current: Vec<Alias> = vertex.aliases.clone().unwrap_or_default();
        vertex.aliases = Some(reconcile(&current, updates, now));
    }
    if let Some(updates) = &input.resources {
        let current: Vec<Resource> = vertex.resources.clone().unwrap_or_default();
        vertex.resources = Some(reconcile(&current, updates, now));
    }
    if let Some(updates) = &input.edges {
        let current: Vec<Edge> = vertex.edges.clone().unwrap_or_default();
        vertex.edges = Some(reconcile(&current, updates, now));
    }
    vertex.recompute_alias_index();
}

fn strip_deleted(vertex: &mut Vertex) {
    if let Some(aliases) = vertex.aliases.take() {
        let live: Vec<Alias> = aliases.into_iter().filter(|a| a.deleted.is_none()).collect();
        vertex.aliases = if live.is_empty() { None } else { Some(live) };
    }
    if let Some(resources) = vertex.resources.take() {
        let live: Vec<Resource> = resources.into_iter().filter(|r| r.deleted.is_none()).collect();
        vertex.resources = if live.is_empty() { None } else { Some(live) };
    }
    if let Some(edges) = vertex.edges.take() {
        let live: Vec<Edge> = edges.into_iter().filter(|e| e.deleted.is_none()).collect();
        vertex.edges = if live.is_empty() { None } else { Some(live) };
    }
}

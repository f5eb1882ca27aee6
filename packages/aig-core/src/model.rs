//! Data model (spec §3): `Vertex`, its sub-elements (`Alias`/`Resource`/
//! `Edge`), and `Changeset`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patch::PatchOp;
use crate::urn::VertexId;

/// Fields shared by every sub-element kind.
pub trait SubElement: Clone + Serialize {
    /// Update payload used to create or refresh this element.
    type Update: Clone;

    /// The element's id (non-empty, unique within its collection).
    fn id(&self) -> &str;
    /// Epoch at which this element was created.
    fn created(&self) -> i64;
    /// Epoch of the last content change, if any.
    fn updated(&self) -> Option<i64>;
    /// Epoch at which this element was soft-deleted, if any.
    fn deleted(&self) -> Option<i64>;
    /// Build a brand-new element from an update payload.
    fn new_from(update: &Self::Update, now: i64) -> Self;
    /// Whether `update`'s content differs from this element's current content
    /// (ignoring lifecycle fields). Comparison goes through the Canonical
    /// Encoder so representational differences don't cause false positives.
    fn content_differs(&self, update: &Self::Update) -> bool;
    /// Overwrite this element's content fields from `update`, bumping
    /// `updated` to `now`.
    fn apply_update(&mut self, update: &Self::Update, now: i64);
    /// Mark this element as soft-deleted at `now`.
    fn mark_deleted(&mut self, now: i64);
    /// The id an update payload targets.
    fn update_id(update: &Self::Update) -> &str;
}

/// An alias: a secondary name a vertex can be looked up by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    pub id: String,
    pub created: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metadataSchema")]
    pub metadata_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Update payload for an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metadataSchema")]
    pub metadata_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A resource: an attachment a vertex carries (e.g. a document reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub created: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metadataSchema")]
    pub metadata_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Update payload for a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metadataSchema")]
    pub metadata_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// An edge: a typed, directed relationship to another vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub relationship: String,
    pub created: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metadataSchema")]
    pub metadata_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Update payload for an edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeUpdate {
    pub id: String,
    pub relationship: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metadataSchema")]
    pub metadata_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SubElement for Alias {
    type Update = AliasUpdate;

    fn id(&self) -> &str {
        &self.id
    }
    fn created(&self) -> i64 {
        self.created
    }
    fn updated(&self) -> Option<i64> {
        self.updated
    }
    fn deleted(&self) -> Option<i64> {
        self.deleted
    }
    fn new_from(update: &Self::Update, now: i64) -> Self {
        Self {
            id: update.id.clone(),
            created: now,
            updated: None,
            deleted: None,
            metadata_schema: update.metadata_schema.clone(),
            metadata: update.metadata.clone(),
        }
    }
    fn content_differs(&self, update: &Self::Update) -> bool {
        self.metadata_schema != update.metadata_schema
            || !crate::canonical::canonical_eq(self.metadata.as_ref(), update.metadata.as_ref())
    }
    fn apply_update(&mut self, update: &Self::Update, now: i64) {
        self.metadata_schema = update.metadata_schema.clone();
        self.metadata = update.metadata.clone();
        self.updated = Some(now);
    }
    fn mark_deleted(&mut self, now: i64) {
        self.deleted = Some(now);
    }
    fn update_id(update: &Self::Update) -> &str {
        &update.id
    }
}

impl SubElement for Resource {
    type Update = ResourceUpdate;

    fn id(&self) -> &str {
        &self.id
    }
    fn created(&self) -> i64 {
        self.created
    }
    fn updated(&self) -> Option<i64> {
        self.updated
    }
    fn deleted(&self) -> Option<i64> {
        self.deleted
    }
    fn new_from(update: &Self::Update, now: i64) -> Self {
        Self {
            id: update.id.clone(),
            created: now,
            updated: None,
            deleted: None,
            metadata_schema: update.metadata_schema.clone(),
            metadata: update.metadata.clone(),
        }
    }
    fn content_differs(&self, update: &Self::Update) -> bool {
        self.metadata_schema != update.metadata_schema
            || !crate::canonical::canonical_eq(self.metadata.as_ref(), update.metadata.as_ref())
    }
    fn apply_update(&mut self, update: &Self::Update, now: i64) {
        self.metadata_schema = update.metadata_schema.clone();
        self.metadata = update.metadata.clone();
        self.updated = Some(now);
    }
    fn mark_deleted(&mut self, now: i64) {
        self.deleted = Some(now);
    }
    fn update_id(update: &Self::Update) -> &str {
        &update.id
    }
}

impl SubElement for Edge {
    type Update = EdgeUpdate;

    fn id(&self) -> &str {
        &self.id
    }
    fn created(&self) -> i64 {
        self.created
    }
    fn updated(&self) -> Option<i64> {
        self.updated
    }
    fn deleted(&self) -> Option<i64> {
        self.deleted
    }
    fn new_from(update: &Self::Update, now: i64) -> Self {
        Self {
            id: update.id.clone(),
            relationship: update.relationship.clone(),
            created: now,
            updated: None,
            deleted: None,
            metadata_schema: update.metadata_schema.clone(),
            metadata: update.metadata.clone(),
        }
    }
    fn content_differs(&self, update: &Self::Update) -> bool {
        self.metadata_schema != update.metadata_schema
            || self.relationship != update.relationship
            || !crate::canonical::canonical_eq(self.metadata.as_ref(), update.metadata.as_ref())
    }
    fn apply_update(&mut self, update: &Self::Update, now: i64) {
        self.relationship = update.relationship.clone();
        self.metadata_schema = update.metadata_schema.clone();
        self.metadata = update.metadata.clone();
        self.updated = Some(now);
    }
    fn mark_deleted(&mut self, now: i64) {
        self.deleted = Some(now);
    }
    fn update_id(update: &Self::Update) -> &str {
        &update.id
    }
}

/// One hash-chained, signed record of a vertex mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changeset {
    pub created: i64,
    #[serde(rename = "userIdentity")]
    pub user_identity: String,
    pub patches: Vec<PatchOp>,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "immutableStorageId")]
    pub immutable_storage_id: Option<String>,
}

/// A vertex: the root entity of the auditable item graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    #[serde(rename = "nodeIdentity")]
    pub node_identity: String,
    pub created: i64,
    pub updated: i64,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metadataSchema")]
    pub metadata_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "aliasIndex")]
    pub alias_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<Alias>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<Resource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changesets: Option<Vec<Changeset>>,
}

impl Vertex {
    /// The zero-value vertex a brand-new vertex's first changeset is diffed
    /// against (invariant 5): only `id`, `nodeIdentity`, `created`, `updated`
    /// are populated.
    pub fn zero(id: VertexId, node_identity: impl Into<String>, created: i64) -> Self {
        Self {
            id,
            node_identity: node_identity.into(),
            created,
            updated: created,
            metadata_schema: None,
            metadata: None,
            alias_index: None,
            aliases: None,
            resources: None,
            edges: None,
            changesets: None,
        }
    }

    /// A copy of this vertex with `changesets` and `aliasIndex` stripped —
    /// the shape the Diff Engine and hash chain operate over. `changesets`
    /// is metadata about mutations, not mutated state itself; `aliasIndex`
    /// is transient, derived wholly from `aliases` (`recompute_alias_index`),
    /// so diffing it would emit a spurious patch op alongside the alias
    /// change that actually caused it.
    pub fn snapshot(&self) -> Self {
        let mut v = self.clone();
        v.changesets = None;
        v.alias_index = None;
        v
    }

    /// Recompute `aliasIndex` from the current `aliases` list: the
    /// lowercased `||`-joined ids of all aliases (live and tombstoned) in
    /// insertion order, or `None` if there are no aliases at all.
    pub fn recompute_alias_index(&mut self) {
        self.alias_index = self.aliases.as_ref().and_then(|aliases| {
            if aliases.is_empty() {
                None
            } else {
                Some(
                    aliases
                        .iter()
                        .map(|a| a.id.to_lowercase())
                        .collect::<Vec<_>>()
                        .join("||"),
                )
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vid() -> VertexId {
        VertexId([0x01; 32])
    }

    // ── 1. zero vertex carries only the four required fields ───────────

    #[test]
    fn zero_vertex_has_no_optional_fields() {
        let v = Vertex::zero(vid(), "node-1", 100);
        assert_eq!(v.created, 100);
        assert_eq!(v.updated, 100);
        assert!(v.metadata.is_none());
        assert!(v.aliases.is_none());
        assert!(v.changesets.is_none());
    }

    // ── 2. alias index reflects insertion order, lowercased ─────────────

    #[test]
    fn alias_index_lowercased_joined() {
        let mut v = Vertex::zero(vid(), "node-1", 1);
        v.aliases = Some(vec![
            Alias { id: "FOO123".into(), created: 1, updated: None, deleted: None, metadata_schema: None, metadata: None },
            Alias { id: "bar456".into(), created: 1, updated: None, deleted: None, metadata_schema: None, metadata: None },
        ]);
        v.recompute_alias_index();
        assert_eq!(v.alias_index.as_deref(), Some("foo123||bar456"));
    }

    // ── 3. alias index is None with no aliases ──────────────────────────

    #[test]
    fn alias_index_none_when_empty() {
        let mut v = Vertex::zero(vid(), "node-1", 1);
        v.aliases = Some(vec![]);
        v.recompute_alias_index();
        assert!(v.alias_index.is_none());
    }

    // ── 4. tombstoned aliases still contribute to the index ────────────

    #[test]
    fn alias_index_includes_tombstones() {
        let mut v = Vertex::zero(vid(), "node-1", 1);
        v.aliases = Some(vec![Alias {
            id: "foo123".into(),
            created: 1,
            updated: None,
            deleted: Some(2),
            metadata_schema: None,
            metadata: None,
        }]);
        v.recompute_alias_index();
        assert_eq!(v.alias_index.as_deref(), Some("foo123"));
    }

    // ── 5. content_differs is false for semantically-equal metadata ────

    #[test]
    fn content_differs_uses_canonical_comparison() {
        let alias = Alias {
            id: "foo".into(),
            created: 1,
            updated: None,
            deleted: None,
            metadata_schema: None,
            metadata: Some(json!({"a": 1, "b": 2})),
        };
        let same_update = AliasUpdate {
            id: "foo".into(),
            metadata_schema: None,
            metadata: Some(json!({"b": 2, "a": 1})),
        };
        assert!(!alias.content_differs(&same_update));

        let different_update = AliasUpdate {
            id: "foo".into(),
            metadata_schema: None,
            metadata: Some(json!({"a": 2})),
        };
        assert!(alias.content_differs(&different_update));
    }

    // ── 6. edge content_differs also checks relationship ───────────────

    #[test]
    fn edge_content_differs_checks_relationship() {
        let edge = Edge {
            id: "e1".into(),
            relationship: "owns".into(),
            created: 1,
            updated: None,
            deleted: None,
            metadata_schema: None,
            metadata: None,
        };
        let same = EdgeUpdate { id: "e1".into(), relationship: "owns".into(), metadata_schema: None, metadata: None };
        let changed = EdgeUpdate { id: "e1".into(), relationship: "controls".into(), metadata_schema: None, metadata: None };
        assert!(!edge.content_differs(&same));
        assert!(edge.content_differs(&changed));
    }

    // ── 7. snapshot strips changesets and aliasIndex ─────────────────────

    #[test]
    fn snapshot_strips_changesets() {
        let mut v = Vertex::zero(vid(), "node-1", 1);
        v.changesets = Some(vec![Changeset {
            created: 1,
            user_identity: "user-1".into(),
            patches: vec![],
            hash: "abc".into(),
            immutable_storage_id: None,
        }]);
        v.aliases = Some(vec![Alias { id: "foo123".into(), created: 1, updated: None, deleted: None, metadata_schema: None, metadata: None }]);
        v.recompute_alias_index();
        let snap = v.snapshot();
        assert!(snap.changesets.is_none());
        assert!(snap.alias_index.is_none(), "aliasIndex is derived/transient, excluded from diff snapshots");
        assert!(v.changesets.is_some(), "original must be untouched");
        assert!(v.alias_index.is_some(), "original must be untouched");
    }
}

//! Auditable item graph: mutation, change-tracking, and hash-chain
//! verification engine.
//!
//! A store of vertices — each with optional metadata, aliases, resource
//! attachments, and typed edges — whose every state change is recorded as a
//! signed, hash-chained changeset and anchored into an external immutable
//! log. [`service::VertexService`] is the entry point; [`mem`] ships
//! reference in-memory adapters for the four collaborator ports it depends
//! on, sufficient for tests and local development but not for production
//! use.

pub mod canonical;
pub mod config;
pub mod diff;
pub mod envelope;
pub mod errors;
pub mod hash_chain;
pub mod mem;
pub mod model;
pub mod patch;
pub mod ports;
pub mod reconcile;
pub mod service;
pub mod urn;
pub mod verifier;

pub use config::AigConfig;
pub use errors::{AigError, Result};
pub use model::{Alias, AliasUpdate, Changeset, Edge, EdgeUpdate, Resource, ResourceUpdate, Vertex};
pub use ports::{Clock, EntityQuery, EntityStorage, Identity, IdMode, ImmutableLog, OrderBy, OrderDirection, QueryPage, Vault};
pub use service::{GetOptions, GetResult, MutationInput, VertexService};
pub use urn::VertexId;
pub use verifier::{Verification, VerificationEntry, VerificationFailure, VerifyDepth};

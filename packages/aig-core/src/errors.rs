//! Error types for aig-core.
//!
//! One enum for everything the engine can fail with. Verification failures
//! are deliberately *not* here — per the verifier's contract they are
//! reported per-changeset, never thrown (see [`crate::verifier`]).

use thiserror::Error;

/// A boxed, type-erased source error from a collaborator (vault, identity,
/// immutable log, entity storage).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for [`crate::service::VertexService`] operations.
#[derive(Debug, Error)]
pub enum AigError {
    /// `create` failed because of an underlying collaborator error.
    #[error("create failed: {0}")]
    CreateFailed(#[source] BoxError),

    /// `update` failed because of an underlying collaborator error.
    #[error("update failed: {0}")]
    UpdateFailed(#[source] BoxError),

    /// `get` failed because of an underlying collaborator error.
    #[error("get failed: {0}")]
    GetFailed(#[source] BoxError),

    /// `query` failed because of an underlying collaborator error.
    #[error("query failed: {0}")]
    QueryFailed(#[source] BoxError),

    /// `removeImmutable` failed because of an underlying collaborator error.
    #[error("remove immutable failed: {0}")]
    RemoveImmutableFailed(#[source] BoxError),

    /// The URN's namespace was not `aig`.
    #[error("namespace mismatch: expected `aig`, found `{found}`")]
    NamespaceMismatch {
        /// The namespace segment actually found in the URN.
        found: String,
    },

    /// No vertex exists for the given id.
    #[error("vertex not found: {id}")]
    NotFound {
        /// The vertex id (`aig:<hex>`) that was not found.
        id: String,
    },

    /// A required identity string, or a sub-element id/relationship, was
    /// missing or empty.
    #[error("guard violation: {message}")]
    GuardViolation {
        /// Human-readable description of which guard failed.
        message: String,
    },
}

impl AigError {
    /// Wrap a collaborator error as [`AigError::CreateFailed`].
    pub fn create_failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::CreateFailed(Box::new(err))
    }

    /// Wrap a collaborator error as [`AigError::UpdateFailed`].
    pub fn update_failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::UpdateFailed(Box::new(err))
    }

    /// Wrap a collaborator error as [`AigError::GetFailed`].
    pub fn get_failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::GetFailed(Box::new(err))
    }

    /// Wrap a collaborator error as [`AigError::QueryFailed`].
    pub fn query_failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::QueryFailed(Box::new(err))
    }

    /// Wrap a collaborator error as [`AigError::RemoveImmutableFailed`].
    pub fn remove_immutable_failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::RemoveImmutableFailed(Box::new(err))
    }

    /// Build a [`AigError::GuardViolation`] from a message.
    pub fn guard(message: impl Into<String>) -> Self {
        Self::GuardViolation {
            message: message.into(),
        }
    }
}

/// Result type alias for aig-core operations.
pub type Result<T> = std::result::Result<T, AigError>;

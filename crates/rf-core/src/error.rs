//! # FeedError
//!
//! Failures the coordinator reports upward. None of them is fatal to the
//! coordinator's own state.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{MediaKey, ReactionKind};

/// Which remote mutation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Carries the selection that was in place before the rejected commit,
    /// so the caller can restore it.
    Reaction { previous: Option<ReactionKind>, attempted: Option<ReactionKind> },
    Delete,
}

/// The primary error type for all feed coordination operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Media failed to become ready. The item stays idle and is not retried.
    #[error("media {key} failed to load: {reason}")]
    LoadFailure { key: MediaKey, reason: String },

    /// A reaction or delete was rejected remotely.
    #[error("{mutation:?} on post {post_id} rejected: {reason}")]
    MutationFailure { post_id: Uuid, mutation: Mutation, reason: String },

    /// Fetching an older page failed; the sequence is unchanged.
    #[error("pagination failed: {0}")]
    PaginationFailure(String),

    /// Carousel page index out of range. Clamped, never propagated as a fault.
    #[error("index {index} out of range for post {post_id} with {len} media items")]
    InvalidIndex { post_id: Uuid, index: usize, len: usize },

    /// Subscription or settings fetch failed.
    #[error("data source error: {0}")]
    Source(String),

    #[error("post {0} not found")]
    NotFound(Uuid),
}

/// A specialized Result type for feed coordination.
pub type Result<T> = std::result::Result<T, FeedError>;

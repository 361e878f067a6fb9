//! Error types for BVH construction and queries.

use thiserror::Error;

use crate::tree::BvhState;

/// Errors returned by the builder, the traverser and the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BvhError {
  /// Build configuration rejected before any work was done.
  #[error("invalid build configuration: {0}")]
  Config(String),

  /// Operation requires a different lifecycle state.
  ///
  /// This is a caller logic error: the owning controller must serialize
  /// builds and queries.
  #[error("invalid BVH state: expected {expected:?}, found {found:?}")]
  InvalidState {
    /// State the operation needs.
    expected: BvhState,
    /// State the tree or registry entry is actually in.
    found: BvhState,
  },

  /// Ray with a non-finite origin or a zero-length/non-finite direction.
  #[error("invalid query: {0}")]
  InvalidQuery(String),

  /// Build cancelled cooperatively; the previously published tree (if any)
  /// remains authoritative.
  #[error("BVH build aborted before completion")]
  PartialBuildAborted,

  /// Registry index out of range.
  #[error("unknown structure index {0}")]
  UnknownStructure(usize),
}

/// Convenience alias used throughout the crate.
pub type BvhResult<T> = Result<T, BvhError>;

//! Crate-wide error type
//!
//! Every fallible Library Core operation surfaces through [`LibraryError`].
//! Component-local error types (e.g. [`crate::vector::VectorIndexError`])
//! convert into it via `#[from]` so callers at the API boundary only ever
//! need to match on one enum.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Errors surfaced by the Library Core API.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Empty text, zero-magnitude vector, dimension mismatch, bad name
    /// format, fewer-than-2 compendium ids, etc.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An operation was attempted before the component was initialized.
    #[error("not initialized")]
    NotInitialized,

    /// The duplicate policy was set to `error` and a near-duplicate exists.
    #[error("duplicate of existing volume {existing_id} (similarity {similarity:.4})")]
    Duplicate {
        /// Id of the pre-existing volume.
        existing_id: String,
        /// Cosine similarity that triggered the rejection.
        similarity: f32,
    },

    /// Requested id does not exist (used where the contract calls for an
    /// error rather than an absent/`None` return, e.g. `compendium`).
    #[error("not found: {0}")]
    NotFound(String),

    /// On-disk magic mismatch, unsupported format version, or a truncated
    /// record.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Backend read/write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding or text-generation provider surfaced an error.
    #[error("provider {provider} failed: {cause}")]
    ProviderFailed {
        /// Name of the provider that failed.
        provider: String,
        /// Underlying cause, as reported by the provider.
        cause: String,
    },

    /// The text-generation provider declined to spawn a specialist.
    #[error("specialist not needed: {0}")]
    SpecialistNotNeeded(String),

    /// Arbitration fell through every fallback. Reserved for a case the
    /// design considers unreachable (see spec §7); kept so the type is
    /// total rather than asserting the invariant with a panic.
    #[error("arbitration failed: {0}")]
    ArbitrationFailed(String),
}

impl From<crate::vector::VectorIndexError> for LibraryError {
    fn from(e: crate::vector::VectorIndexError) -> Self {
        use crate::vector::VectorIndexError as V;
        match e {
            V::InvalidVector(msg) => LibraryError::Validation(msg),
            V::DimensionMismatch { expected, got } => LibraryError::Validation(format!(
                "embedding dimension mismatch: expected {expected}, got {got}"
            )),
        }
    }
}

impl From<crate::graph::GraphError> for LibraryError {
    fn from(e: crate::graph::GraphError) -> Self {
        LibraryError::Validation(e.to_string())
    }
}

impl From<crate::storage::StorageError> for LibraryError {
    fn from(e: crate::storage::StorageError) -> Self {
        match e {
            crate::storage::StorageError::Io(io) => LibraryError::Io(io),
            crate::storage::StorageError::Corrupt(msg) => LibraryError::Corrupt(msg),
        }
    }
}

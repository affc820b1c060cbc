//! Error types for dictionary operations.

use thiserror::Error;

use onto_store::StoreError;
use onto_types::TypeError;

/// Errors that can occur while resolving tag metadata.
#[derive(Debug, Error)]
pub enum DictError {
    /// Neither the system table nor the dictionary knows the tag.
    #[error("unresolved tag: {tag}")]
    UnresolvedTag { tag: String },

    /// The tag document carries a type or kind code that cannot be parsed.
    #[error("invalid descriptor for tag {tag}: {source}")]
    InvalidDescriptor {
        tag: String,
        #[source]
        source: TypeError,
    },

    /// Failure of the backing store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for dictionary operations.
pub type DictResult<T> = std::result::Result<T, DictError>;

use onto_types::NativeId;

/// Errors from collection handle operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A strict match found no document.
    #[error("no document in {collection} matches {filter}")]
    NotFound { collection: String, filter: String },

    /// Insert of an identifier that is already taken.
    #[error("duplicate identifier {id} in {collection}")]
    DuplicateId { collection: String, id: NativeId },

    /// The collection has not been created.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// The document cannot be stored as given.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

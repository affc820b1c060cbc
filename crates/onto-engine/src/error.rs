use thiserror::Error;

use onto_dict::DictError;
use onto_store::StoreError;
use onto_types::{AccessError, EntityKind};

/// Errors raised by commit, delete and incremental updates.
///
/// Every error aborts the current call. Errors raised by bookkeeping after
/// the primary write has succeeded are reported but leave the primary write
/// in place.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The entity lacks mandatory offsets.
    #[error("{kind} is not initialised: missing {missing:?}")]
    NotInitialised {
        kind: EntityKind,
        missing: Vec<String>,
    },

    /// Commit of an entity that is already committed.
    #[error("{kind} is already committed")]
    AlreadyCommitted { kind: EntityKind },

    /// Delete or update of an entity that is not committed or has unsaved
    /// changes.
    #[error("{kind} is not committed or has unsaved changes")]
    NotCommittedOrDirty { kind: EntityKind },

    /// A list or structure offset holds a non-array value.
    #[error("malformed structure at {path}: expected list or map, found {found}")]
    MalformedStructure { path: String, found: &'static str },

    /// A value fails the checks of its declared type.
    #[error("invalid value at {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    /// A composite record lacks a required field.
    #[error("missing field {field} at {path}")]
    MissingField { path: String, field: &'static str },

    /// A reference points at a document that does not exist.
    #[error("unresolved reference: {id} in {collection}")]
    UnresolvedReference { collection: String, id: String },

    /// No metadata exists for an offset.
    #[error("unresolved tag: {tag}")]
    UnresolvedTag { tag: String },

    /// An accessor was used on a value of the wrong shape.
    #[error("type mismatch on {tag}: expected {expected}, found {found}")]
    TypeMismatch {
        tag: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An embedded object is not of the kind the reference expects.
    #[error("wrong object kind at {path}: expected {expected}, found {found}")]
    WrongObjectKind {
        path: String,
        expected: EntityKind,
        found: EntityKind,
    },

    /// An embedded object refers back to an entity being committed.
    #[error("cyclic embedding at {path}")]
    CyclicEmbedding { path: String },

    /// Embedded objects nest deeper than the configured limit.
    #[error("embedded objects nested deeper than {limit}")]
    EmbeddingTooDeep { limit: usize },

    /// Identity offsets of a committed entity cannot change.
    #[error("offset {tag} is locked")]
    LockedOffset { tag: String },

    /// Callers may not supply private offsets.
    #[error("offset {tag} is private")]
    PrivateOffset { tag: String },

    /// Dictionary failure other than an unresolved tag.
    #[error("dictionary error: {0}")]
    Dictionary(DictError),

    /// Failure of a collection handle.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<DictError> for EngineError {
    fn from(err: DictError) -> Self {
        match err {
            DictError::UnresolvedTag { tag } => EngineError::UnresolvedTag { tag },
            DictError::Store(e) => EngineError::Store(e),
            other => EngineError::Dictionary(other),
        }
    }
}

impl From<AccessError> for EngineError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::TypeMismatch {
                tag,
                expected,
                found,
            } => EngineError::TypeMismatch {
                tag,
                expected,
                found,
            },
            AccessError::LockedOffset { tag } => EngineError::LockedOffset { tag },
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

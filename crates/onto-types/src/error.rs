use thiserror::Error;

/// Errors produced by value and identifier conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("cannot cast {found} value to {expected}")]
    Cast {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown data type code: {0}")]
    UnknownType(String),

    #[error("unknown data kind code: {0}")]
    UnknownKind(String),

    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),
}

/// Errors produced by the offset accessor protocol.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The offset holds a value of the wrong shape for the requested accessor.
    #[error("offset {tag}: expected {expected}, found {found}")]
    TypeMismatch {
        tag: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The offset is part of a committed entity's identity.
    #[error("offset {tag} is locked: the entity is committed")]
    LockedOffset { tag: String },
}

/// Convenience alias for accessor results.
pub type AccessResult<T> = Result<T, AccessError>;

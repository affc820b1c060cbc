//! The [`Dictionary`] trait and the two-tier tag resolver.
//!
//! The dictionary is the engine's only source of tag metadata and of
//! collection handles. It is read-shared by every traversal.

use std::sync::Arc;

use onto_store::Collection;
use onto_types::TagDescriptor;

use crate::error::{DictError, DictResult};
use crate::system::system_descriptor;

/// Tag metadata and collection resolution.
///
/// Implementations must be thread-safe (`Send + Sync`). Descriptors are
/// treated as immutable for the duration of one traversal.
pub trait Dictionary: Send + Sync {
    /// The descriptor registered for a tag.
    ///
    /// Returns `Ok(None)` if the dictionary has no entry for the tag.
    fn tag_descriptor(&self, tag: &str) -> DictResult<Option<TagDescriptor>>;

    /// Resolve a collection name to its handle.
    fn collection(&self, name: &str) -> DictResult<Arc<dyn Collection>>;

    /// Register (or replace) the descriptor of a tag.
    fn define_tag(&self, tag: &str, descriptor: TagDescriptor) -> DictResult<()>;

    /// Drop the descriptor of a tag. Returns `Ok(true)` if it was known.
    fn forget_tag(&self, tag: &str) -> DictResult<bool>;
}

/// Resolve a tag to its `(types, kinds)` descriptor.
///
/// The system table is consulted first and wins on a hit; otherwise the
/// dictionary is asked, failing with [`DictError::UnresolvedTag`] if it has
/// no entry either.
pub fn resolve(dict: &dyn Dictionary, tag: &str) -> DictResult<TagDescriptor> {
    if let Some(descriptor) = system_descriptor(tag) {
        return Ok(descriptor);
    }
    dict.tag_descriptor(tag)?
        .ok_or_else(|| DictError::UnresolvedTag {
            tag: tag.to_string(),
        })
}

use std::sync::Arc;

use onto_types::{tags, Document, IdType, NativeId, Value};

use crate::error::{StoreError, StoreResult};
use crate::query::{Filter, IndexSpec, Matched, ResultShape};

/// Lazy, forward-only iterator over match results.
pub type MatchIter<'a> = Box<dyn Iterator<Item = Matched> + Send + 'a>;

/// Handle on one document collection.
///
/// All implementations must satisfy these invariants:
/// - Partial updates (`replace_offsets`, `delete_offsets`, `add_to_set`)
///   touch only the named offsets.
/// - `update_reference_count` is atomic per matched document, so concurrent
///   increments against the same document never lose updates.
/// - Operations on documents that do not exist are no-ops reporting zero
///   affected documents, never errors.
/// - All I/O errors are propagated, never silently ignored.
pub trait Collection: Send + Sync {
    /// Name of the collection.
    fn name(&self) -> &str;

    /// Type of the native identifiers this collection assigns.
    fn id_type(&self) -> IdType;

    /// Match the first document selected by `filter`.
    ///
    /// `fields` projects documents onto the named offsets (the native
    /// identifier is always kept). A `Count` shape always yields a count.
    /// When nothing matches, returns `Ok(None)`, or `Err(NotFound)` when
    /// `strict` is set.
    fn match_one(
        &self,
        filter: &Filter,
        shape: ResultShape,
        fields: Option<&[&str]>,
        strict: bool,
    ) -> StoreResult<Option<Matched>>;

    /// Match every document selected by `filter`, optionally sorted by an
    /// offset path. A `Count` shape yields a single count.
    fn match_all(
        &self,
        filter: &Filter,
        shape: ResultShape,
        fields: Option<&[&str]>,
        sort: Option<&str>,
    ) -> StoreResult<MatchIter<'_>>;

    /// Insert a document and return its native identifier, assigning one
    /// when the document carries none.
    fn insert(&self, doc: &Document) -> StoreResult<NativeId>;

    /// Set the given offsets on one document. Returns the number of
    /// documents affected (0 or 1).
    fn replace_offsets(&self, id: &NativeId, offsets: &Document) -> StoreResult<usize>;

    /// Remove the named offsets from one document. Returns the number of
    /// documents affected (0 or 1).
    fn delete_offsets(&self, id: &NativeId, names: &[String]) -> StoreResult<usize>;

    /// Add `delta` to `count_offset` on every document whose `id_offset` is
    /// one of `ids`.
    fn update_reference_count(
        &self,
        ids: &[NativeId],
        id_offset: &str,
        count_offset: &str,
        delta: i64,
    ) -> StoreResult<()>;

    /// Union `values` into the set-valued `target` offset of the document
    /// whose `id_offset` equals `id`.
    fn add_to_set(
        &self,
        id: &NativeId,
        id_offset: &str,
        target: &str,
        values: &[Value],
    ) -> StoreResult<()>;

    /// Create an index; creating an index that already exists is a no-op.
    fn create_index(&self, spec: &IndexSpec) -> StoreResult<()>;

    /// Drop every secondary index.
    fn drop_indexes(&self) -> StoreResult<()>;

    /// List the secondary indexes.
    fn indexes(&self) -> StoreResult<Vec<IndexSpec>>;

    /// Remove one document. Returns the removed identifier, if it existed.
    fn delete(&self, id: &NativeId) -> StoreResult<Option<NativeId>>;

    /// Check whether a document with this identifier exists.
    fn exists(&self, id: &NativeId) -> StoreResult<bool> {
        let matched = self.match_one(&Filter::Id(id.clone()), ResultShape::Count, None, false)?;
        Ok(matched.and_then(|m| m.count()).unwrap_or(0) > 0)
    }

    /// Read one document by identifier.
    fn find(&self, id: &NativeId) -> StoreResult<Option<Document>> {
        let matched =
            self.match_one(&Filter::Id(id.clone()), ResultShape::Document, None, false)?;
        Ok(matched.and_then(Matched::into_document))
    }

    /// Read the integer at `offset` on one document, `0` when absent.
    fn count_of(&self, id: &NativeId, offset: &str) -> StoreResult<i64> {
        let doc = self.find(id)?;
        Ok(doc
            .and_then(|d| d.get(offset).and_then(Value::as_i64))
            .unwrap_or(0))
    }
}

/// A set of named collections.
pub trait Database: Send + Sync {
    /// Look up an existing collection.
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>>;

    /// Create a collection, or return it if it already exists.
    fn create_collection(&self, name: &str, id_type: IdType) -> StoreResult<Arc<dyn Collection>>;

    /// Names of all collections, sorted.
    fn collection_names(&self) -> StoreResult<Vec<String>>;

    /// Drop a collection. Returns `true` if it existed.
    fn drop_collection(&self, name: &str) -> StoreResult<bool>;
}

/// Reject documents that still embed unresolved entities.
pub(crate) fn check_storable(doc: &Document) -> StoreResult<()> {
    match doc.iter().find(|(_, v)| v.contains_object()) {
        Some((tag, _)) => Err(StoreError::InvalidDocument(format!(
            "offset {tag} holds an embedded object"
        ))),
        None => Ok(()),
    }
}

/// The native identifier carried by a document, if any.
pub(crate) fn document_id(doc: &Document) -> Option<NativeId> {
    doc.get(tags::NID).and_then(NativeId::from_value)
}

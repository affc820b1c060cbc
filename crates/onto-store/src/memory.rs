use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use onto_types::{tags, Document, IdType, NativeId, Value};

use crate::error::{StoreError, StoreResult};
use crate::query::{compare_values, lookup, Filter, IndexSpec, Matched, ResultShape};
use crate::traits::{check_storable, document_id, Collection, Database, MatchIter};

#[derive(Debug, Default)]
struct CollectionState {
    documents: BTreeMap<NativeId, Document>,
    /// Last integer identifier handed out.
    sequence: i64,
    indexes: Vec<IndexSpec>,
}

/// In-memory, `BTreeMap`-based collection.
///
/// Intended for tests and embedding. Documents are held behind a `RwLock`
/// and cloned on read and write. Index specifications are recorded but do
/// not accelerate matching.
pub struct MemoryCollection {
    name: String,
    id_type: IdType,
    state: RwLock<CollectionState>,
}

impl MemoryCollection {
    /// Create a new empty collection.
    pub fn new(name: impl Into<String>, id_type: IdType) -> Self {
        Self {
            name: name.into(),
            id_type,
            state: RwLock::new(CollectionState::default()),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").documents.len()
    }

    /// Returns `true` if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().expect("lock poisoned").documents.is_empty()
    }

    /// Remove all documents, keeping indexes and the identifier sequence.
    pub fn clear(&self) {
        self.state.write().expect("lock poisoned").documents.clear();
    }

    fn not_found(&self, filter: &Filter) -> StoreError {
        StoreError::NotFound {
            collection: self.name.clone(),
            filter: filter.to_string(),
        }
    }

    fn next_id(&self, state: &mut CollectionState) -> NativeId {
        match self.id_type {
            IdType::Int => {
                state.sequence += 1;
                NativeId::Int(state.sequence)
            }
            IdType::Str => NativeId::Str(uuid::Uuid::now_v7().to_string()),
        }
    }

    fn render(doc: &Document, shape: ResultShape, fields: Option<&[&str]>) -> Matched {
        match shape {
            ResultShape::Identifier => match document_id(doc) {
                Some(id) => Matched::Identifier(id),
                None => Matched::Document(project(doc, fields)),
            },
            _ => Matched::Document(project(doc, fields)),
        }
    }
}

fn project(doc: &Document, fields: Option<&[&str]>) -> Document {
    match fields {
        None => doc.clone(),
        Some(fields) => doc
            .iter()
            .filter(|(tag, _)| tag.as_str() == tags::NID || fields.contains(&tag.as_str()))
            .map(|(tag, value)| (tag.clone(), value.clone()))
            .collect(),
    }
}

fn id_matches(doc: &Document, id_offset: &str, wanted: &[Value]) -> bool {
    lookup(doc, id_offset).iter().any(|v| wanted.contains(v))
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn id_type(&self) -> IdType {
        self.id_type
    }

    fn match_one(
        &self,
        filter: &Filter,
        shape: ResultShape,
        fields: Option<&[&str]>,
        strict: bool,
    ) -> StoreResult<Option<Matched>> {
        let state = self.state.read().expect("lock poisoned");
        if shape == ResultShape::Count {
            let count = match filter {
                Filter::Id(id) => usize::from(state.documents.contains_key(id)),
                _ => state.documents.values().filter(|d| filter.matches(d)).count(),
            };
            if count == 0 && strict {
                return Err(self.not_found(filter));
            }
            return Ok(Some(Matched::Count(count)));
        }
        let found = match filter {
            Filter::Id(id) => state.documents.get(id),
            _ => state.documents.values().find(|d| filter.matches(d)),
        };
        match found {
            Some(doc) => Ok(Some(Self::render(doc, shape, fields))),
            None if strict => Err(self.not_found(filter)),
            None => Ok(None),
        }
    }

    fn match_all(
        &self,
        filter: &Filter,
        shape: ResultShape,
        fields: Option<&[&str]>,
        sort: Option<&str>,
    ) -> StoreResult<MatchIter<'_>> {
        let state = self.state.read().expect("lock poisoned");
        let mut selected: Vec<&Document> =
            state.documents.values().filter(|d| filter.matches(d)).collect();
        if shape == ResultShape::Count {
            return Ok(Box::new(std::iter::once(Matched::Count(selected.len()))));
        }
        if let Some(path) = sort {
            selected.sort_by(|a, b| {
                let ka = lookup(a, path).first().copied().cloned().unwrap_or(Value::Null);
                let kb = lookup(b, path).first().copied().cloned().unwrap_or(Value::Null);
                compare_values(&ka, &kb)
            });
        }
        let results: Vec<Matched> = selected
            .into_iter()
            .map(|doc| Self::render(doc, shape, fields))
            .collect();
        Ok(Box::new(results.into_iter()))
    }

    fn insert(&self, doc: &Document) -> StoreResult<NativeId> {
        check_storable(doc)?;
        let mut state = self.state.write().expect("lock poisoned");
        let id = match doc.get(tags::NID) {
            Some(value) => self
                .id_type
                .cast(value)
                .map_err(|e| StoreError::InvalidDocument(e.to_string()))?,
            None => self.next_id(&mut state),
        };
        if state.documents.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: self.name.clone(),
                id,
            });
        }
        if let NativeId::Int(n) = id {
            state.sequence = state.sequence.max(n);
        }
        let mut stored = doc.clone();
        stored.insert(tags::NID.to_string(), id.to_value());
        state.documents.insert(id.clone(), stored);
        debug!(collection = %self.name, id = %id, "inserted document");
        Ok(id)
    }

    fn replace_offsets(&self, id: &NativeId, offsets: &Document) -> StoreResult<usize> {
        check_storable(offsets)?;
        let mut state = self.state.write().expect("lock poisoned");
        let Some(doc) = state.documents.get_mut(id) else {
            return Ok(0);
        };
        for (tag, value) in offsets {
            if tag != tags::NID {
                doc.insert(tag.clone(), value.clone());
            }
        }
        Ok(1)
    }

    fn delete_offsets(&self, id: &NativeId, names: &[String]) -> StoreResult<usize> {
        let mut state = self.state.write().expect("lock poisoned");
        let Some(doc) = state.documents.get_mut(id) else {
            return Ok(0);
        };
        for name in names {
            if name != tags::NID {
                doc.remove(name);
            }
        }
        Ok(1)
    }

    fn update_reference_count(
        &self,
        ids: &[NativeId],
        id_offset: &str,
        count_offset: &str,
        delta: i64,
    ) -> StoreResult<()> {
        let wanted: Vec<Value> = ids.iter().map(NativeId::to_value).collect();
        let mut state = self.state.write().expect("lock poisoned");
        let mut touched = 0usize;
        for doc in state.documents.values_mut() {
            if !id_matches(doc, id_offset, &wanted) {
                continue;
            }
            let current = doc.get(count_offset).and_then(Value::as_i64).unwrap_or(0);
            doc.insert(count_offset.to_string(), Value::Int(current + delta));
            touched += 1;
        }
        debug!(
            collection = %self.name,
            offset = count_offset,
            delta,
            touched,
            "updated reference counts"
        );
        Ok(())
    }

    fn add_to_set(
        &self,
        id: &NativeId,
        id_offset: &str,
        target: &str,
        values: &[Value],
    ) -> StoreResult<()> {
        let wanted = [id.to_value()];
        let mut state = self.state.write().expect("lock poisoned");
        for doc in state.documents.values_mut() {
            if !id_matches(doc, id_offset, &wanted) {
                continue;
            }
            let set = doc
                .entry(target.to_string())
                .or_insert_with(|| Value::List(Vec::new()));
            let Value::List(items) = set else {
                return Err(StoreError::InvalidDocument(format!(
                    "offset {target} of {id} is not a set"
                )));
            };
            for value in values {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
        }
        Ok(())
    }

    fn create_index(&self, spec: &IndexSpec) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        if !state.indexes.iter().any(|i| i.name == spec.name) {
            debug!(collection = %self.name, index = %spec.name, "created index");
            state.indexes.push(spec.clone());
        }
        Ok(())
    }

    fn drop_indexes(&self) -> StoreResult<()> {
        self.state.write().expect("lock poisoned").indexes.clear();
        Ok(())
    }

    fn indexes(&self) -> StoreResult<Vec<IndexSpec>> {
        Ok(self.state.read().expect("lock poisoned").indexes.clone())
    }

    fn delete(&self, id: &NativeId) -> StoreResult<Option<NativeId>> {
        let mut state = self.state.write().expect("lock poisoned");
        Ok(state.documents.remove(id).map(|_| id.clone()))
    }
}

impl std::fmt::Debug for MemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("name", &self.name)
            .field("document_count", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------
// Database
// ---------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    name: String,
    id_type: IdType,
    sequence: i64,
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    collections: Vec<CollectionSnapshot>,
}

/// In-memory set of collections, optionally persisted as a JSON snapshot.
#[derive(Default)]
pub struct MemoryDatabase {
    collections: RwLock<BTreeMap<String, Arc<MemoryCollection>>>,
}

impl MemoryDatabase {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a database from a JSON snapshot file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut collections = BTreeMap::new();
        for snap in snapshot.collections {
            let mut documents = BTreeMap::new();
            for doc in snap.documents {
                let id = document_id(&doc).ok_or_else(|| {
                    StoreError::InvalidDocument(format!(
                        "document without identifier in {}",
                        snap.name
                    ))
                })?;
                documents.insert(id, doc);
            }
            let collection = MemoryCollection {
                name: snap.name.clone(),
                id_type: snap.id_type,
                state: RwLock::new(CollectionState {
                    documents,
                    sequence: snap.sequence,
                    indexes: snap.indexes,
                }),
            };
            collections.insert(snap.name, Arc::new(collection));
        }
        debug!(path = %path.display(), collections = collections.len(), "opened snapshot");
        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    /// Write every collection to a JSON snapshot file.
    ///
    /// The snapshot is written to a temporary file in the same directory and
    /// renamed over `path`, so readers never observe a partial file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let snapshot = {
            let collections = self.collections.read().expect("lock poisoned");
            Snapshot {
                collections: collections
                    .values()
                    .map(|c| {
                        let state = c.state.read().expect("lock poisoned");
                        CollectionSnapshot {
                            name: c.name.clone(),
                            id_type: c.id_type,
                            sequence: state.sequence,
                            indexes: state.indexes.clone(),
                            documents: state.documents.values().cloned().collect(),
                        }
                    })
                    .collect(),
            }
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&json)?;
        file.persist(path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %path.display(), "saved snapshot");
        Ok(())
    }

    /// Typed access to a memory collection.
    pub fn memory_collection(&self, name: &str) -> Option<Arc<MemoryCollection>> {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
    }
}

impl Database for MemoryDatabase {
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        match self.memory_collection(name) {
            Some(c) => Ok(c as Arc<dyn Collection>),
            None => Err(StoreError::UnknownCollection(name.to_string())),
        }
    }

    fn create_collection(&self, name: &str, id_type: IdType) -> StoreResult<Arc<dyn Collection>> {
        let mut collections = self.collections.write().expect("lock poisoned");
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name, id_type)));
        Ok(collection.clone() as Arc<dyn Collection>)
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .collections
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect())
    }

    fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        Ok(self
            .collections
            .write()
            .expect("lock poisoned")
            .remove(name)
            .is_some())
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.collection_names().unwrap_or_default();
        f.debug_struct("MemoryDatabase")
            .field("collections", &names)
            .finish()
    }
}

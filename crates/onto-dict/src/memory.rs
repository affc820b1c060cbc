//! In-memory dictionary backed by a tag collection.
//!
//! [`MemoryDictionary`] caches descriptors in a `HashMap` behind a `RwLock`.
//! A cache miss falls through to the tag collection of the backing
//! [`Database`], so tags committed by another process are picked up on first
//! use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use onto_store::{Collection, Database, Filter, Matched, ResultShape, StoreError};
use onto_types::{tags, Document, EntityKind, NativeId, TagDescriptor};

use crate::error::{DictError, DictResult};
use crate::traits::Dictionary;

/// A [`Dictionary`] over a [`Database`].
pub struct MemoryDictionary {
    db: Arc<dyn Database>,
    tag_collection: String,
    cache: RwLock<HashMap<String, TagDescriptor>>,
}

impl MemoryDictionary {
    /// Create a dictionary reading tags from the default tag collection.
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self::with_tag_collection(db, EntityKind::Tag.default_collection())
    }

    /// Create a dictionary reading tags from the named collection.
    pub fn with_tag_collection(db: Arc<dyn Database>, name: impl Into<String>) -> Self {
        Self {
            db,
            tag_collection: name.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The backing database.
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.cache.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no descriptor is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.read().expect("lock poisoned").is_empty()
    }

    /// Replace the cache with every tag document in the tag collection.
    ///
    /// Returns the number of descriptors loaded. A missing tag collection
    /// loads nothing.
    pub fn load(&self) -> DictResult<usize> {
        let Some(collection) = self.tag_collection()? else {
            return Ok(0);
        };
        let mut loaded = HashMap::new();
        for matched in collection.match_all(&Filter::All, ResultShape::Document, None, None)? {
            let Matched::Document(doc) = matched else {
                continue;
            };
            if let Some((tag, descriptor)) = parse_tag_document(&doc)? {
                loaded.insert(tag, descriptor);
            }
        }
        let count = loaded.len();
        *self.cache.write().expect("lock poisoned") = loaded;
        debug!(collection = %self.tag_collection, count, "loaded tag descriptors");
        Ok(count)
    }

    fn tag_collection(&self) -> DictResult<Option<Arc<dyn Collection>>> {
        match self.db.collection(&self.tag_collection) {
            Ok(c) => Ok(Some(c)),
            Err(StoreError::UnknownCollection(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_through(&self, tag: &str) -> DictResult<Option<TagDescriptor>> {
        let Some(collection) = self.tag_collection()? else {
            return Ok(None);
        };
        let Some(doc) = collection.find(&NativeId::from(tag))? else {
            return Ok(None);
        };
        let Some((_, descriptor)) = parse_tag_document(&doc)? else {
            return Ok(None);
        };
        self.cache
            .write()
            .expect("lock poisoned")
            .insert(tag.to_string(), descriptor.clone());
        Ok(Some(descriptor))
    }
}

fn parse_tag_document(doc: &Document) -> DictResult<Option<(String, TagDescriptor)>> {
    let Some(tag) = doc.get(tags::NID).and_then(NativeId::from_value) else {
        return Ok(None);
    };
    let tag = tag.to_string();
    match TagDescriptor::from_document(doc) {
        Ok(Some(descriptor)) => Ok(Some((tag, descriptor))),
        Ok(None) => Ok(None),
        Err(source) => Err(DictError::InvalidDescriptor { tag, source }),
    }
}

impl Dictionary for MemoryDictionary {
    fn tag_descriptor(&self, tag: &str) -> DictResult<Option<TagDescriptor>> {
        if let Some(descriptor) = self.cache.read().expect("lock poisoned").get(tag) {
            return Ok(Some(descriptor.clone()));
        }
        self.read_through(tag)
    }

    fn collection(&self, name: &str) -> DictResult<Arc<dyn Collection>> {
        Ok(self.db.collection(name)?)
    }

    fn define_tag(&self, tag: &str, descriptor: TagDescriptor) -> DictResult<()> {
        debug!(tag, "defined tag");
        self.cache
            .write()
            .expect("lock poisoned")
            .insert(tag.to_string(), descriptor);
        Ok(())
    }

    fn forget_tag(&self, tag: &str) -> DictResult<bool> {
        Ok(self
            .cache
            .write()
            .expect("lock poisoned")
            .remove(tag)
            .is_some())
    }
}

impl std::fmt::Debug for MemoryDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDictionary")
            .field("tag_collection", &self.tag_collection)
            .field("cached", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::resolve;
    use onto_store::MemoryDatabase;
    use onto_types::{document_from_json, DataKind, DataType, IdType, ValueShape};
    use serde_json::json;

    fn setup() -> (Arc<MemoryDatabase>, MemoryDictionary) {
        let db = Arc::new(MemoryDatabase::new());
        let dict = MemoryDictionary::new(db.clone());
        (db, dict)
    }

    fn store_tag(db: &MemoryDatabase, doc: serde_json::Value) {
        let tags = db.create_collection("_tags", IdType::Str).unwrap();
        tags.insert(&document_from_json(doc).unwrap()).unwrap();
    }

    // ---------------------------------------------------------------
    // Two-tier resolution
    // ---------------------------------------------------------------

    #[test]
    fn system_table_wins() {
        let (_db, dict) = setup();
        dict.define_tag(tags::LABEL, TagDescriptor::scalar(DataType::Int))
            .unwrap();
        let d = resolve(&dict, tags::LABEL).unwrap();
        assert_eq!(d.single_type(), Some(DataType::LanguageStrings));
    }

    #[test]
    fn unknown_tag_is_unresolved() {
        let (_db, dict) = setup();
        let err = resolve(&dict, "color").unwrap_err();
        assert!(matches!(err, DictError::UnresolvedTag { ref tag } if tag == "color"));
    }

    #[test]
    fn defined_tags_resolve_until_forgotten() {
        let (_db, dict) = setup();
        dict.define_tag("color", TagDescriptor::list(DataType::String))
            .unwrap();
        let d = resolve(&dict, "color").unwrap();
        assert!(d.is_list());
        assert!(dict.forget_tag("color").unwrap());
        assert!(!dict.forget_tag("color").unwrap());
        assert!(resolve(&dict, "color").is_err());
    }

    // ---------------------------------------------------------------
    // Backing store
    // ---------------------------------------------------------------

    #[test]
    fn cache_miss_reads_tag_collection() {
        let (db, dict) = setup();
        store_tag(
            &db,
            json!({
                "_id": "weight",
                "label": [{"lang": "en", "text": "Weight"}],
                "data-type": [":type:float"]
            }),
        );
        assert!(dict.is_empty());
        let d = resolve(&dict, "weight").unwrap();
        assert_eq!(d.shape(), ValueShape::Scalar(DataType::Float));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn load_reads_every_tag() {
        let (db, dict) = setup();
        assert_eq!(dict.load().unwrap(), 0);
        store_tag(
            &db,
            json!({"_id": "a", "data-type": [":type:string"], "data-kind": [":kind:list"]}),
        );
        store_tag(&db, json!({"_id": "b", "data-type": ":type:int"}));
        store_tag(&db, json!({"_id": "c", "label": "untyped"}));
        assert_eq!(dict.load().unwrap(), 2);
        let a = dict.tag_descriptor("a").unwrap().unwrap();
        assert!(a.kinds.contains(&DataKind::List));
    }

    #[test]
    fn bad_codes_are_reported() {
        let (db, dict) = setup();
        store_tag(&db, json!({"_id": "bad", "data-type": [":type:nope"]}));
        let err = dict.tag_descriptor("bad").unwrap_err();
        assert!(matches!(err, DictError::InvalidDescriptor { .. }));
    }

    #[test]
    fn collections_resolve_through_database() {
        let (db, dict) = setup();
        assert!(matches!(
            dict.collection("_units"),
            Err(DictError::Store(StoreError::UnknownCollection(_)))
        ));
        db.create_collection("_units", IdType::Str).unwrap();
        assert_eq!(dict.collection("_units").unwrap().name(), "_units");
    }
}

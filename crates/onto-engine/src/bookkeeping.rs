//! Reference and tag bookkeeping.
//!
//! Runs after the primary document write. Reference deltas go to the
//! count offset of the referenced documents; tag usage goes to the tag
//! documents, which collect the paths they are used at and a usage count
//! per owning collection. None of these writes is transactional with the
//! primary write or with each other.

use std::collections::{BTreeMap, BTreeSet};

use onto_dict::Dictionary;
use onto_store::Collection;
use onto_types::{tags, EntityKind, NativeId, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::diff::UsageDiff;
use crate::error::EngineResult;
use crate::report::ReferenceLedger;

/// Bookkeeping writes on behalf of entities of one kind.
pub struct Bookkeeping<'a> {
    dict: &'a dyn Dictionary,
    config: &'a EngineConfig,
    kind: EntityKind,
}

impl<'a> Bookkeeping<'a> {
    pub fn new(dict: &'a dyn Dictionary, config: &'a EngineConfig, kind: EntityKind) -> Self {
        Self { dict, config, kind }
    }

    /// Apply `sign * delta` for every ledger entry. Returns the number of
    /// batched writes issued.
    pub fn apply_references(&self, ledger: &ReferenceLedger, sign: i64) -> EngineResult<usize> {
        let batches = ledger.batches();
        for batch in &batches {
            let collection = self.dict.collection(&batch.collection)?;
            collection.update_reference_count(
                &batch.ids,
                tags::NID,
                self.kind.count_tag(),
                batch.delta * sign,
            )?;
            debug!(
                collection = %batch.collection,
                delta = batch.delta * sign,
                count = batch.ids.len(),
                "applied reference counts"
            );
        }
        Ok(batches.len())
    }

    /// Union each tag's paths into its registry for this kind's collection.
    pub fn register_paths(&self, usage: &BTreeMap<String, BTreeSet<String>>) -> EngineResult<()> {
        if usage.is_empty() {
            return Ok(());
        }
        let tag_collection = self.tag_collection()?;
        for (tag, paths) in usage {
            let values: Vec<Value> = paths.iter().map(|p| Value::from(p.as_str())).collect();
            tag_collection.add_to_set(
                &NativeId::from(tag.as_str()),
                tags::NID,
                self.kind.offsets_tag(),
                &values,
            )?;
        }
        debug!(tags = usage.len(), registry = self.kind.offsets_tag(), "registered tag paths");
        Ok(())
    }

    /// Add `delta` to the usage count of every tag in `used`.
    pub fn count_tags<'t>(
        &self,
        used: impl IntoIterator<Item = &'t String>,
        delta: i64,
    ) -> EngineResult<()> {
        let ids: Vec<NativeId> = used.into_iter().map(|t| NativeId::from(t.as_str())).collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.tag_collection()?
            .update_reference_count(&ids, tags::NID, self.kind.count_tag(), delta)?;
        Ok(())
    }

    /// Bookkeeping for a freshly committed entity.
    pub fn on_commit(
        &self,
        references: &ReferenceLedger,
        usage: &BTreeMap<String, BTreeSet<String>>,
    ) -> EngineResult<()> {
        self.apply_references(references, 1)?;
        self.register_paths(usage)?;
        self.count_tags(usage.keys(), 1)
    }

    /// Inverse bookkeeping for a deleted entity. Paths stay registered.
    pub fn on_delete(
        &self,
        references: &ReferenceLedger,
        usage: &BTreeMap<String, BTreeSet<String>>,
    ) -> EngineResult<()> {
        self.apply_references(references, -1)?;
        self.count_tags(usage.keys(), -1)
    }

    /// Bookkeeping for an incremental update.
    pub fn on_update(&self, diff: &UsageDiff) -> EngineResult<()> {
        self.apply_references(&diff.references, 1)?;
        self.register_paths(&diff.added_tags)?;
        self.register_paths(&diff.new_paths)?;
        self.count_tags(diff.added_tags.keys(), 1)?;
        self.count_tags(&diff.removed_tags, -1)
    }

    fn tag_collection(&self) -> EngineResult<std::sync::Arc<dyn Collection>> {
        Ok(self
            .dict
            .collection(self.config.collection_for(EntityKind::Tag))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use onto_dict::MemoryDictionary;
    use onto_store::{Database, MemoryDatabase};
    use onto_types::{document_from_json, IdType};
    use serde_json::json;

    fn setup() -> (Arc<MemoryDatabase>, MemoryDictionary, EngineConfig) {
        let db = Arc::new(MemoryDatabase::new());
        let tag_docs = db.create_collection("_tags", IdType::Str).unwrap();
        for id in ["color", "size"] {
            tag_docs
                .insert(&document_from_json(json!({"_id": id})).unwrap())
                .unwrap();
        }
        let terms = db.create_collection("_terms", IdType::Str).unwrap();
        terms
            .insert(&document_from_json(json!({"_id": "t1"})).unwrap())
            .unwrap();
        let dict = MemoryDictionary::new(db.clone());
        (db, dict, EngineConfig::default())
    }

    fn usage(entries: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        entries
            .iter()
            .map(|(tag, paths)| {
                (tag.to_string(), paths.iter().map(|p| p.to_string()).collect())
            })
            .collect()
    }

    #[test]
    fn commit_then_delete_restores_counts() {
        let (db, dict, config) = setup();
        let books = Bookkeeping::new(&dict, &config, EntityKind::Unit);
        let mut refs = ReferenceLedger::new();
        refs.add("_terms", "t1".into(), 2);
        let used = usage(&[("color", &["color", "part.color"])]);

        books.on_commit(&refs, &used).unwrap();
        let terms = db.collection("_terms").unwrap();
        let tag_docs = db.collection("_tags").unwrap();
        assert_eq!(terms.count_of(&"t1".into(), tags::UNIT_COUNT).unwrap(), 2);
        assert_eq!(tag_docs.count_of(&"color".into(), tags::UNIT_COUNT).unwrap(), 1);
        let color = tag_docs.find(&"color".into()).unwrap().unwrap();
        assert_eq!(color[tags::UNIT_OFFSETS].to_json(), json!(["color", "part.color"]));

        books.on_delete(&refs, &used).unwrap();
        assert_eq!(terms.count_of(&"t1".into(), tags::UNIT_COUNT).unwrap(), 0);
        assert_eq!(tag_docs.count_of(&"color".into(), tags::UNIT_COUNT).unwrap(), 0);
        // Paths are never pulled.
        let color = tag_docs.find(&"color".into()).unwrap().unwrap();
        assert!(color.contains_key(tags::UNIT_OFFSETS));
    }

    #[test]
    fn counts_are_per_referencing_kind() {
        let (db, dict, config) = setup();
        let mut refs = ReferenceLedger::new();
        refs.add("_terms", "t1".into(), 1);
        Bookkeeping::new(&dict, &config, EntityKind::Node)
            .apply_references(&refs, 1)
            .unwrap();
        let terms = db.collection("_terms").unwrap();
        assert_eq!(terms.count_of(&"t1".into(), tags::NODE_COUNT).unwrap(), 1);
        assert_eq!(terms.count_of(&"t1".into(), tags::UNIT_COUNT).unwrap(), 0);
    }

    #[test]
    fn update_applies_only_the_diff() {
        let (db, dict, config) = setup();
        let books = Bookkeeping::new(&dict, &config, EntityKind::Unit);
        books.on_commit(&ReferenceLedger::new(), &usage(&[("color", &["color"])])).unwrap();

        let diff = UsageDiff {
            added_tags: usage(&[("size", &["size"])]),
            removed_tags: ["color".to_string()].into_iter().collect(),
            ..Default::default()
        };
        books.on_update(&diff).unwrap();
        let tag_docs = db.collection("_tags").unwrap();
        assert_eq!(tag_docs.count_of(&"color".into(), tags::UNIT_COUNT).unwrap(), 0);
        assert_eq!(tag_docs.count_of(&"size".into(), tags::UNIT_COUNT).unwrap(), 1);
    }

    #[test]
    fn missing_collection_propagates() {
        let (_db, dict, config) = setup();
        let mut refs = ReferenceLedger::new();
        refs.add("_nodes", 1.into(), 1);
        let err = Bookkeeping::new(&dict, &config, EntityKind::Unit)
            .apply_references(&refs, 1)
            .unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Store(_)));
    }
}

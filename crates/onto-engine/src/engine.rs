//! The commit/delete orchestrator.
//!
//! [`Engine::commit`] runs the commit traversal, writes the entity and then
//! its bookkeeping; [`Engine::delete`] does the inverse. Incremental updates
//! go through [`Engine::modify_add`] and [`Engine::modify_del`], which diff
//! the stored snapshot against the merged entity so bookkeeping is applied
//! only for what changed.
//!
//! Bookkeeping always follows the primary write. When it fails the error is
//! returned but the primary write stays in place and the entity keeps the
//! status of the completed write.

use std::sync::Arc;

use onto_dict::Dictionary;
use onto_store::{Collection, Database, StoreError};
use onto_types::{
    tags, Document, Entity, EntityKind, NativeId, SharedEntity, TagDescriptor, Value,
};
use tracing::{debug, info, warn};

use crate::bookkeeping::Bookkeeping;
use crate::config::EngineConfig;
use crate::diff::UsageDiff;
use crate::error::{EngineError, EngineResult};
use crate::exposure::reject_private_input;
use crate::report::TraversalReport;
use crate::traversal::{EmbeddedCommitter, Traversal};

/// Result of [`Engine::delete`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(NativeId),
    /// The entity has no identifier, or its document is already gone.
    NothingToDelete,
    /// The pre-delete hook vetoed the delete.
    Refused(String),
}

/// Veto point run before a document is removed.
pub trait PreDeleteHook: Send + Sync {
    /// Inspect the stored document. `Some(reason)` refuses the delete.
    fn check(&self, kind: EntityKind, stored: &Document) -> Option<String>;
}

/// Refuses to delete documents that are still referenced.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceGuard;

impl PreDeleteHook for ReferenceGuard {
    fn check(&self, _kind: EntityKind, stored: &Document) -> Option<String> {
        tags::REFERENCE_COUNTS.iter().find_map(|tag| {
            let count = stored.get(*tag).and_then(Value::as_i64).unwrap_or(0);
            (count > 0).then(|| format!("still referenced: {tag} = {count}"))
        })
    }
}

/// The persistence engine.
pub struct Engine {
    dict: Arc<dyn Dictionary>,
    config: EngineConfig,
    pre_delete: Box<dyn PreDeleteHook>,
}

impl Engine {
    /// Create an engine with the [`ReferenceGuard`] pre-delete hook.
    pub fn new(dict: Arc<dyn Dictionary>, config: EngineConfig) -> Self {
        Self {
            dict,
            config,
            pre_delete: Box::new(ReferenceGuard),
        }
    }

    pub fn with_pre_delete(mut self, hook: impl PreDeleteHook + 'static) -> Self {
        self.pre_delete = Box::new(hook);
        self
    }

    pub fn dictionary(&self) -> &Arc<dyn Dictionary> {
        &self.dict
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The collection an entity kind is stored in.
    pub fn collection(&self, kind: EntityKind) -> EngineResult<Arc<dyn Collection>> {
        Ok(self.dict.collection(self.config.collection_for(kind))?)
    }

    /// Account for a stored document without writing anything: the tags,
    /// paths and references bookkeeping would apply for it.
    pub fn account(&self, kind: EntityKind, doc: &Document) -> EngineResult<TraversalReport> {
        Traversal::account(self.dict.as_ref(), &self.config, kind).run(doc)
    }

    /// Read a stored entity, committed and clean.
    pub fn load(&self, kind: EntityKind, id: &NativeId) -> EngineResult<Option<Entity>> {
        let doc = self.collection(kind)?.find(id)?;
        Ok(doc.map(|doc| Entity::from_stored(kind, doc)))
    }

    // ---- Commit ----

    /// Commit a new entity and return its native identifier.
    ///
    /// Embedded uncommitted objects are committed first and replaced by
    /// their identifiers.
    pub fn commit(&self, entity: &mut Entity) -> EngineResult<NativeId> {
        self.commit_at(entity, 0)
    }

    fn commit_at(&self, entity: &mut Entity, depth: usize) -> EngineResult<NativeId> {
        let kind = entity.kind();
        if entity.status().is_committed() {
            return Err(EngineError::AlreadyCommitted { kind });
        }
        ensure_inited(entity)?;

        let mut cascade = Cascade { engine: self, depth };
        let report = Traversal::commit(self.dict.as_ref(), &self.config, kind, &mut cascade)
            .run(entity.offsets())?;
        report.apply_replacements(entity.raw_offsets_mut());
        finalise(entity, &report);

        ensure_inited(entity)?;
        let descriptor = match kind {
            EntityKind::Tag => Some(tag_descriptor(entity.offsets())?),
            _ => None,
        };

        let collection = self.collection(kind)?;
        let id = collection.insert(entity.offsets())?;
        let offsets = entity.raw_offsets_mut();
        offsets.insert(tags::NID.into(), id.to_value());
        if kind == EntityKind::Tag && !offsets.contains_key(tags::GID) {
            let gid = Value::String(id.to_string());
            offsets.insert(tags::GID.into(), gid.clone());
            let assigned = Document::from([(tags::GID.to_string(), gid)]);
            collection.replace_offsets(&id, &assigned)?;
        }
        entity.status_mut().committed(Some(true));
        entity.status_mut().dirty(Some(false));

        if self.config.bookkeeping {
            Bookkeeping::new(self.dict.as_ref(), &self.config, kind)
                .on_commit(&report.references, &report.paths())
                .map_err(|e| bookkeeping_failed(kind, &id, e))?;
        }
        if let Some(descriptor) = descriptor {
            self.dict.define_tag(&id.to_string(), descriptor)?;
        }

        info!(
            kind = %kind,
            id = %id,
            tags = report.tags.len(),
            references = report.references.len(),
            "committed entity"
        );
        Ok(id)
    }

    // ---- Delete ----

    /// Delete a committed, clean entity.
    pub fn delete(&self, entity: &mut Entity) -> EngineResult<DeleteOutcome> {
        let kind = entity.kind();
        ensure_clean(entity)?;
        let Some(id) = entity.native_id() else {
            return Ok(DeleteOutcome::NothingToDelete);
        };
        let collection = self.collection(kind)?;
        let Some(stored) = collection.find(&id)? else {
            return Ok(DeleteOutcome::NothingToDelete);
        };
        if let Some(reason) = self.pre_delete.check(kind, &stored) {
            debug!(kind = %kind, id = %id, reason = %reason, "delete refused");
            return Ok(DeleteOutcome::Refused(reason));
        }

        let report = self.account(kind, &stored)?;
        if collection.delete(&id)?.is_none() {
            return Ok(DeleteOutcome::NothingToDelete);
        }
        entity.status_mut().committed(Some(false));
        entity.status_mut().dirty(Some(false));

        if self.config.bookkeeping {
            Bookkeeping::new(self.dict.as_ref(), &self.config, kind)
                .on_delete(&report.references, &report.paths())
                .map_err(|e| bookkeeping_failed(kind, &id, e))?;
        }
        if kind == EntityKind::Tag {
            self.dict.forget_tag(&id.to_string())?;
        }

        info!(kind = %kind, id = %id, "deleted entity");
        Ok(DeleteOutcome::Deleted(id))
    }

    // ---- Incremental updates ----

    /// Set offsets on a committed, clean entity.
    pub fn modify_add(&self, entity: &mut Entity, offsets: Document) -> EngineResult<UsageDiff> {
        let kind = entity.kind();
        ensure_clean(entity)?;
        check_modifiable(kind, offsets.keys())?;
        reject_private_input(self.dict.as_ref(), &offsets)?;
        let (id, stored) = self.stored(entity)?;
        let old = self.account(kind, &stored)?;

        let mut partial = offsets;
        let mut cascade = Cascade {
            engine: self,
            depth: 0,
        };
        let report = Traversal::commit(self.dict.as_ref(), &self.config, kind, &mut cascade)
            .run(&partial)?;
        report.apply_replacements(&mut partial);

        let mut merged = stored;
        merged.extend(partial.iter().map(|(tag, value)| (tag.clone(), value.clone())));
        self.finish_update(entity, &id, &old, merged, Write::Replace(partial))
    }

    /// Remove offsets from a committed, clean entity.
    pub fn modify_del(&self, entity: &mut Entity, names: &[String]) -> EngineResult<UsageDiff> {
        let kind = entity.kind();
        ensure_clean(entity)?;
        check_modifiable(kind, names.iter())?;
        let missing: Vec<String> = names
            .iter()
            .filter(|name| kind.mandatory_offsets().contains(&name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::NotInitialised { kind, missing });
        }
        let (id, stored) = self.stored(entity)?;
        let old = self.account(kind, &stored)?;

        let mut merged = stored;
        for name in names {
            merged.remove(name);
        }
        self.finish_update(entity, &id, &old, merged, Write::Remove(names))
    }

    fn stored(&self, entity: &Entity) -> EngineResult<(NativeId, Document)> {
        let kind = entity.kind();
        let id = entity
            .native_id()
            .ok_or(EngineError::NotCommittedOrDirty { kind })?;
        match self.collection(kind)?.find(&id)? {
            Some(doc) => Ok((id, doc)),
            None => Err(self.vanished(kind, &id)),
        }
    }

    fn finish_update(
        &self,
        entity: &mut Entity,
        id: &NativeId,
        old: &TraversalReport,
        mut merged: Document,
        write: Write<'_>,
    ) -> EngineResult<UsageDiff> {
        let kind = entity.kind();
        let new = self.account(kind, &merged)?;
        let diff = UsageDiff::between(old, &new);
        let descriptor = match kind {
            EntityKind::Tag => Some(tag_descriptor(&merged)?),
            _ => None,
        };

        let mut registries = Document::new();
        registries.insert(tags::OBJECT_TAGS.into(), new.tag_list());
        registries.insert(tags::OBJECT_OFFSETS.into(), new.offsets_map());
        let collection = self.collection(kind)?;
        let affected = match write {
            Write::Replace(mut partial) => {
                partial.extend(registries.clone());
                collection.replace_offsets(id, &partial)?
            }
            Write::Remove(names) => {
                collection.delete_offsets(id, names)?;
                collection.replace_offsets(id, &registries)?
            }
        };
        if affected == 0 {
            return Err(self.vanished(kind, id));
        }
        merged.extend(registries);
        *entity.raw_offsets_mut() = merged;
        entity.refresh_inited();
        entity.status_mut().dirty(Some(false));

        if self.config.bookkeeping && !diff.is_empty() {
            Bookkeeping::new(self.dict.as_ref(), &self.config, kind)
                .on_update(&diff)
                .map_err(|e| bookkeeping_failed(kind, id, e))?;
        }
        if let Some(descriptor) = descriptor {
            self.dict.define_tag(&id.to_string(), descriptor)?;
        }

        info!(
            kind = %kind,
            id = %id,
            added = diff.added_tags.len(),
            removed = diff.removed_tags.len(),
            references = diff.references.len(),
            "updated entity"
        );
        Ok(diff)
    }

    fn vanished(&self, kind: EntityKind, id: &NativeId) -> EngineError {
        EngineError::Store(StoreError::NotFound {
            collection: self.config.collection_for(kind).to_string(),
            filter: format!("{} = {id}", tags::NID),
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Create the collection of every entity kind.
pub fn bootstrap(db: &dyn Database, config: &EngineConfig) -> EngineResult<()> {
    for kind in EntityKind::ALL {
        db.create_collection(config.collection_for(kind), kind.id_type())?;
    }
    info!(collections = EntityKind::ALL.len(), "bootstrapped collections");
    Ok(())
}

enum Write<'n> {
    Replace(Document),
    Remove(&'n [String]),
}

/// Commits embedded objects met by a commit traversal.
struct Cascade<'e> {
    engine: &'e Engine,
    depth: usize,
}

impl EmbeddedCommitter for Cascade<'_> {
    fn commit_embedded(&mut self, object: &SharedEntity, path: &str) -> EngineResult<NativeId> {
        let limit = self.engine.config.max_embedded_depth;
        if self.depth >= limit {
            return Err(EngineError::EmbeddingTooDeep { limit });
        }
        let mut entity = object
            .try_write()
            .ok_or_else(|| EngineError::CyclicEmbedding {
                path: path.to_string(),
            })?;
        debug!(path, kind = %entity.kind(), depth = self.depth + 1, "committing embedded object");
        self.engine.commit_at(&mut entity, self.depth + 1)
    }
}

fn ensure_inited(entity: &mut Entity) -> EngineResult<()> {
    if entity.refresh_inited() {
        return Ok(());
    }
    let kind = entity.kind();
    let missing = kind
        .mandatory_offsets()
        .iter()
        .filter(|tag| entity.get(tag).is_none())
        .map(|tag| tag.to_string())
        .collect();
    Err(EngineError::NotInitialised { kind, missing })
}

fn ensure_clean(entity: &Entity) -> EngineResult<()> {
    let status = entity.status();
    if status.is_committed() && !status.is_dirty() {
        Ok(())
    } else {
        Err(EngineError::NotCommittedOrDirty {
            kind: entity.kind(),
        })
    }
}

fn check_modifiable<'t>(
    kind: EntityKind,
    names: impl IntoIterator<Item = &'t String>,
) -> EngineResult<()> {
    for tag in names {
        if kind.identity_offsets().contains(&tag.as_str()) {
            return Err(EngineError::LockedOffset { tag: tag.clone() });
        }
        if tags::is_internal(tag) {
            return Err(EngineError::PrivateOffset { tag: tag.clone() });
        }
    }
    Ok(())
}

/// Write the tag registries and the derived identifier onto the entity.
fn finalise(entity: &mut Entity, report: &TraversalReport) {
    let kind = entity.kind();
    let derived = kind.derive_id(entity.offsets());
    let offsets = entity.raw_offsets_mut();
    offsets.insert(tags::OBJECT_TAGS.into(), report.tag_list());
    offsets.insert(tags::OBJECT_OFFSETS.into(), report.offsets_map());
    if let Some(id) = derived {
        if kind == EntityKind::Term {
            offsets.insert(tags::GID.into(), id.to_value());
        }
        offsets.insert(tags::NID.into(), id.to_value());
    }
}

fn tag_descriptor(doc: &Document) -> EngineResult<TagDescriptor> {
    match TagDescriptor::from_document(doc) {
        Ok(Some(descriptor)) => Ok(descriptor),
        Ok(None) => Err(EngineError::NotInitialised {
            kind: EntityKind::Tag,
            missing: vec![tags::DATA_TYPE.to_string()],
        }),
        Err(e) => Err(EngineError::InvalidValue {
            path: tags::DATA_TYPE.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn bookkeeping_failed(kind: EntityKind, id: &NativeId, err: EngineError) -> EngineError {
    warn!(kind = %kind, id = %id, error = %err, "bookkeeping failed after primary write");
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    use onto_dict::MemoryDictionary;
    use onto_store::MemoryDatabase;
    use onto_types::{document_from_json, DataType, RefType};
    use serde_json::json;

    fn engine() -> (Arc<MemoryDatabase>, Engine) {
        let db = Arc::new(MemoryDatabase::new());
        let config = EngineConfig::default();
        bootstrap(&*db, &config).unwrap();
        let dict = MemoryDictionary::new(db.clone());
        dict.define_tag("color", TagDescriptor::scalar(DataType::String)).unwrap();
        dict.define_tag("parent", TagDescriptor::scalar(DataType::Ref(RefType::Term)))
            .unwrap();
        (db, Engine::new(Arc::new(dict), config))
    }

    fn unit(extra: serde_json::Value) -> Entity {
        let mut doc = document_from_json(json!({"domain": "acc", "identifier": "u1"})).unwrap();
        doc.extend(document_from_json(extra).unwrap());
        Entity::from_document(EntityKind::Unit, doc)
    }

    fn term(lid: &str) -> Entity {
        let doc = document_from_json(json!({
            "lid": lid,
            "label": [{"lang": "en", "text": lid}]
        }))
        .unwrap();
        Entity::from_document(EntityKind::Term, doc)
    }

    // ---------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------

    #[test]
    fn commit_derives_identifier_and_registries() {
        let (_db, engine) = engine();
        let mut entity = unit(json!({"color": 5}));
        let id = engine.commit(&mut entity).unwrap();
        assert_eq!(id, NativeId::from("acc://u1"));
        assert!(entity.status().is_committed());
        assert!(!entity.status().is_dirty());
        assert_eq!(entity.get("color"), Some(&Value::from("5")));

        let stored = engine.load(EntityKind::Unit, &id).unwrap().unwrap();
        assert_eq!(
            stored.get(tags::OBJECT_TAGS).unwrap().to_json(),
            json!(["color", "domain", "identifier"])
        );
        assert_eq!(stored.get(tags::OBJECT_OFFSETS).unwrap().to_json()["color"], json!(["color"]));
    }

    #[test]
    fn commit_requires_mandatory_offsets() {
        let (_db, engine) = engine();
        let mut entity = Entity::new(EntityKind::Unit);
        entity.set(tags::DOMAIN, "acc").unwrap();
        let err = engine.commit(&mut entity).unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotInitialised { ref missing, .. } if missing == &vec!["identifier".to_string()]
        ));
    }

    #[test]
    fn recommit_is_rejected() {
        let (_db, engine) = engine();
        let mut entity = unit(json!({}));
        engine.commit(&mut entity).unwrap();
        let err = engine.commit(&mut entity).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyCommitted { .. }));
    }

    #[test]
    fn assigned_tag_gid_is_stored() {
        let (_db, engine) = engine();
        let doc = document_from_json(json!({
            "label": [{"lang": "en", "text": "weight"}],
            "data-type": [":type:float"]
        }))
        .unwrap();
        let mut tag = Entity::from_document(EntityKind::Tag, doc);
        let id = engine.commit(&mut tag).unwrap();

        let gid = Value::String(id.to_string());
        assert_eq!(tag.get(tags::GID), Some(&gid));
        let stored = engine.load(EntityKind::Tag, &id).unwrap().unwrap();
        assert_eq!(stored.get(tags::GID), Some(&gid));
        assert_eq!(stored.offsets(), tag.offsets());
    }

    #[test]
    fn bookkeeping_failure_keeps_primary_write() {
        let (db, engine) = engine();
        db.collection("_tags")
            .unwrap()
            .insert(&document_from_json(json!({"_id": "color", "unit-offsets": "oops"})).unwrap())
            .unwrap();

        let mut entity = unit(json!({"color": "red"}));
        let err = engine.commit(&mut entity).unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::InvalidDocument(_))));
        assert!(entity.status().is_committed());
        assert!(!entity.status().is_dirty());

        let id = NativeId::from("acc://u1");
        assert!(engine.load(EntityKind::Unit, &id).unwrap().is_some());
        let err = engine.commit(&mut entity).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyCommitted { .. }));
    }

    #[test]
    fn term_gid_includes_namespace() {
        let (_db, engine) = engine();
        engine.commit(&mut term("crop")).unwrap();
        let mut t = term("color");
        t.set(tags::NS, "crop").unwrap();
        let id = engine.commit(&mut t).unwrap();
        assert_eq!(id, NativeId::from("crop:color"));
        assert_eq!(t.get(tags::GID), Some(&Value::from("crop:color")));
    }

    #[test]
    fn cyclic_embedding_fails() {
        let (_db, engine) = engine();
        let a = term("a").into_shared();
        let b = term("b").into_shared();
        a.write().set("parent", Value::Object(b.clone())).unwrap();
        b.write().set("parent", Value::Object(a.clone())).unwrap();
        let err = engine.commit(&mut a.write()).unwrap_err();
        assert!(matches!(err, EngineError::CyclicEmbedding { ref path } if path == "parent"));
    }

    #[test]
    fn embedding_depth_is_limited() {
        let db = Arc::new(MemoryDatabase::new());
        let config = EngineConfig {
            max_embedded_depth: 1,
            ..Default::default()
        };
        bootstrap(&*db, &config).unwrap();
        let dict = MemoryDictionary::new(db.clone());
        dict.define_tag("parent", TagDescriptor::scalar(DataType::Ref(RefType::Term)))
            .unwrap();
        let engine = Engine::new(Arc::new(dict), config);

        let grandparent = term("g").into_shared();
        let mut parent = term("p");
        parent.set("parent", Value::Object(grandparent)).unwrap();
        let mut child = term("c");
        child.set("parent", Value::Object(parent.into_shared())).unwrap();
        let err = engine.commit(&mut child).unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingTooDeep { limit: 1 }));
    }

    #[test]
    fn disabled_bookkeeping_leaves_counts() {
        let db = Arc::new(MemoryDatabase::new());
        let config = EngineConfig {
            bookkeeping: false,
            ..Default::default()
        };
        bootstrap(&*db, &config).unwrap();
        let dict = MemoryDictionary::new(db.clone());
        dict.define_tag("parent", TagDescriptor::scalar(DataType::Ref(RefType::Term)))
            .unwrap();
        let engine = Engine::new(Arc::new(dict), config);
        engine.commit(&mut term("t1")).unwrap();
        engine.commit(&mut unit(json!({"parent": "t1"}))).unwrap();
        let terms = engine.collection(EntityKind::Term).unwrap();
        assert_eq!(terms.count_of(&"t1".into(), tags::UNIT_COUNT).unwrap(), 0);
    }

    // ---------------------------------------------------------------
    // Delete
    // ---------------------------------------------------------------

    #[test]
    fn delete_requires_clean_committed_entity() {
        let (_db, engine) = engine();
        let mut entity = unit(json!({}));
        let err = engine.delete(&mut entity).unwrap_err();
        assert!(matches!(err, EngineError::NotCommittedOrDirty { .. }));

        engine.commit(&mut entity).unwrap();
        entity.set("color", "red").unwrap();
        let err = engine.delete(&mut entity).unwrap_err();
        assert!(matches!(err, EngineError::NotCommittedOrDirty { .. }));
    }

    #[test]
    fn delete_without_identifier_is_a_no_op() {
        let (_db, engine) = engine();
        let mut entity = Entity::from_stored(EntityKind::Unit, Document::new());
        assert_eq!(engine.delete(&mut entity).unwrap(), DeleteOutcome::NothingToDelete);
    }

    #[test]
    fn referenced_documents_are_not_deleted() {
        let (_db, engine) = engine();
        let mut t1 = term("t1");
        let id = engine.commit(&mut t1).unwrap();
        engine.commit(&mut unit(json!({"parent": "t1"}))).unwrap();

        let mut t1 = engine.load(EntityKind::Term, &id).unwrap().unwrap();
        assert!(matches!(engine.delete(&mut t1).unwrap(), DeleteOutcome::Refused(_)));
        assert!(t1.status().is_committed());
    }

    struct AllowAll;

    impl PreDeleteHook for AllowAll {
        fn check(&self, _kind: EntityKind, _stored: &Document) -> Option<String> {
            None
        }
    }

    #[test]
    fn custom_hook_replaces_guard() {
        let (_db, engine) = engine();
        let engine = engine.with_pre_delete(AllowAll);
        let id = engine.commit(&mut term("t1")).unwrap();
        engine.commit(&mut unit(json!({"parent": "t1"}))).unwrap();
        let mut t1 = engine.load(EntityKind::Term, &id).unwrap().unwrap();
        assert_eq!(engine.delete(&mut t1).unwrap(), DeleteOutcome::Deleted(id));
        assert!(!t1.status().is_committed());
    }

    // ---------------------------------------------------------------
    // Incremental updates
    // ---------------------------------------------------------------

    #[test]
    fn modify_rejects_identity_and_internal_offsets() {
        let (_db, engine) = engine();
        let mut entity = unit(json!({}));
        engine.commit(&mut entity).unwrap();

        let doc = document_from_json(json!({"identifier": "u2"})).unwrap();
        let err = engine.modify_add(&mut entity, doc).unwrap_err();
        assert!(matches!(err, EngineError::LockedOffset { .. }));

        let doc = document_from_json(json!({"unit-count": 3})).unwrap();
        let err = engine.modify_add(&mut entity, doc).unwrap_err();
        assert!(matches!(err, EngineError::PrivateOffset { .. }));

        let err = engine
            .modify_del(&mut entity, &[tags::DOMAIN.to_string()])
            .unwrap_err();
        assert!(matches!(err, EngineError::LockedOffset { .. }));
    }

    #[test]
    fn modify_updates_store_and_entity() {
        let (_db, engine) = engine();
        let mut entity = unit(json!({"color": "red"}));
        let id = engine.commit(&mut entity).unwrap();

        let doc = document_from_json(json!({"color": 7})).unwrap();
        let diff = engine.modify_add(&mut entity, doc).unwrap();
        assert!(diff.is_empty());
        assert_eq!(entity.get("color"), Some(&Value::from("7")));
        assert!(!entity.status().is_dirty());

        let diff = engine.modify_del(&mut entity, &["color".to_string()]).unwrap();
        assert!(diff.removed_tags.contains("color"));
        let stored = engine.load(EntityKind::Unit, &id).unwrap().unwrap();
        assert!(stored.get("color").is_none());
        assert_eq!(
            stored.get(tags::OBJECT_TAGS).unwrap().to_json(),
            json!(["domain", "identifier"])
        );
    }
}

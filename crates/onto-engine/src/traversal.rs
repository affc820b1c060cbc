//! The traversal engine.
//!
//! Walks an entity's offsets depth-first with an explicit work stack. For
//! every offset it resolves the tag's descriptor, checks the structure,
//! and for leaf values verifies, resolves references and casts. Nothing is
//! written back: casts and resolved identifiers come out as
//! [`Replacement`]s in the [`TraversalReport`].
//!
//! In [`Mode::Commit`] embedded uncommitted objects are committed through
//! an [`EmbeddedCommitter`] and bare references are checked for existence.
//! [`Mode::Account`] only collects usage and references from values already
//! stored, for deletes and update diffs.

use onto_dict::{resolve, Dictionary};
use onto_types::{tags, EntityKind, NativeId, RefType, SharedEntity, TagDescriptor, Value, ValueShape};

use crate::cast::{cast_composite, cast_scalar};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::report::{Replacement, Step, TraversalReport};

/// Whether the walk goes on after a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A leaf value about to be verified.
#[derive(Debug)]
pub struct LeafVisit<'v> {
    pub tag: &'v str,
    pub path: &'v str,
    pub value: &'v Value,
    pub descriptor: &'v TagDescriptor,
}

/// Watches leaves as they are visited and may end the walk.
pub trait LeafObserver {
    fn visit(&mut self, leaf: &LeafVisit<'_>) -> Flow;
}

/// Commits embedded objects met during a commit traversal.
pub trait EmbeddedCommitter {
    /// Commit `object`, found at `path`, and return its native identifier.
    fn commit_embedded(&mut self, object: &SharedEntity, path: &str) -> EngineResult<NativeId>;
}

/// What a traversal is for.
pub enum Mode<'a> {
    Commit(&'a mut dyn EmbeddedCommitter),
    Account,
}

struct Frame<'d> {
    tag: &'d str,
    value: &'d Value,
    location: Vec<Step>,
    /// Dotted path of the enclosing structure; empty at the root.
    parent: String,
}

impl<'d> Frame<'d> {
    fn path(&self) -> String {
        if self.parent.is_empty() {
            self.tag.to_string()
        } else {
            format!("{}.{}", self.parent, self.tag)
        }
    }
}

fn elements(value: &Value) -> Vec<(Step, &Value)> {
    match value {
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (Step::Index(i), v))
            .collect(),
        Value::Map(map) => map.iter().map(|(k, v)| (Step::Key(k.clone()), v)).collect(),
        _ => Vec::new(),
    }
}

fn child(location: &[Step], step: Step) -> Vec<Step> {
    let mut location = location.to_vec();
    location.push(step);
    location
}

/// One walk over one entity's offsets.
pub struct Traversal<'a> {
    dict: &'a dyn Dictionary,
    config: &'a EngineConfig,
    kind: EntityKind,
    mode: Mode<'a>,
    observer: Option<&'a mut dyn LeafObserver>,
}

impl<'a> Traversal<'a> {
    /// A traversal that verifies, casts and cascades commits.
    pub fn commit(
        dict: &'a dyn Dictionary,
        config: &'a EngineConfig,
        kind: EntityKind,
        committer: &'a mut dyn EmbeddedCommitter,
    ) -> Self {
        Self {
            dict,
            config,
            kind,
            mode: Mode::Commit(committer),
            observer: None,
        }
    }

    /// A traversal that only accounts for stored values.
    pub fn account(dict: &'a dyn Dictionary, config: &'a EngineConfig, kind: EntityKind) -> Self {
        Self {
            dict,
            config,
            kind,
            mode: Mode::Account,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a mut dyn LeafObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Walk `root` and report what was found.
    pub fn run(mut self, root: &onto_types::Document) -> EngineResult<TraversalReport> {
        let mut report = TraversalReport::default();
        let mut stack: Vec<Frame<'_>> = root
            .iter()
            .rev()
            .map(|(tag, value)| Frame {
                tag,
                value,
                location: vec![Step::Key(tag.clone())],
                parent: String::new(),
            })
            .collect();

        while let Some(frame) = stack.pop() {
            if tags::is_internal(frame.tag) {
                continue;
            }
            let path = frame.path();
            let descriptor = resolve(self.dict, frame.tag)?;
            let structure = descriptor.is_struct();
            let list = descriptor.is_list();
            if !structure {
                report.record_tag(frame.tag, &descriptor, &path);
            }
            if (list || structure) && !frame.value.is_array_like() {
                return Err(EngineError::MalformedStructure {
                    path,
                    found: frame.value.type_name(),
                });
            }

            let flow = match (structure, list) {
                (true, true) => {
                    let mut children = Vec::new();
                    for (step, item) in elements(frame.value) {
                        let Value::Map(fields) = item else {
                            return Err(EngineError::MalformedStructure {
                                path,
                                found: item.type_name(),
                            });
                        };
                        let base = child(&frame.location, step);
                        for (tag, value) in fields {
                            children.push(Frame {
                                tag,
                                value,
                                location: child(&base, Step::Key(tag.clone())),
                                parent: path.clone(),
                            });
                        }
                    }
                    stack.extend(children.into_iter().rev());
                    Flow::Continue
                }
                (true, false) => {
                    let Value::Map(fields) = frame.value else {
                        return Err(EngineError::MalformedStructure {
                            path,
                            found: frame.value.type_name(),
                        });
                    };
                    stack.extend(fields.iter().rev().map(|(tag, value)| Frame {
                        tag,
                        value,
                        location: child(&frame.location, Step::Key(tag.clone())),
                        parent: path.clone(),
                    }));
                    Flow::Continue
                }
                (false, true) => {
                    let mut flow = Flow::Continue;
                    for (step, item) in elements(frame.value) {
                        let location = child(&frame.location, step);
                        flow = self.leaf(&mut report, frame.tag, &path, &descriptor, item, location)?;
                        if flow == Flow::Stop {
                            break;
                        }
                    }
                    flow
                }
                (false, false) => self.leaf(
                    &mut report,
                    frame.tag,
                    &path,
                    &descriptor,
                    frame.value,
                    frame.location.clone(),
                )?,
            };

            if flow == Flow::Stop {
                report.stopped = true;
                break;
            }
        }
        Ok(report)
    }

    fn leaf(
        &mut self,
        report: &mut TraversalReport,
        tag: &str,
        path: &str,
        descriptor: &TagDescriptor,
        value: &Value,
        location: Vec<Step>,
    ) -> EngineResult<Flow> {
        if let Some(observer) = self.observer.as_mut() {
            let visit = LeafVisit {
                tag,
                path,
                value,
                descriptor,
            };
            if observer.visit(&visit) == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        let replacement = match descriptor.shape() {
            ValueShape::Unverified | ValueShape::Structure => None,
            ValueShape::Scalar(data_type) => cast_scalar(value, data_type, path)?,
            ValueShape::Composite(data_type) => cast_composite(value, data_type, path)?,
            ValueShape::Reference(ref_type) => self.reference(report, ref_type, value, path)?,
        };
        if let Some(value) = replacement {
            report.replacements.push(Replacement { location, value });
        }
        Ok(Flow::Continue)
    }

    fn reference(
        &mut self,
        report: &mut TraversalReport,
        ref_type: RefType,
        value: &Value,
        path: &str,
    ) -> EngineResult<Option<Value>> {
        let target = EntityKind::from_ref_type(ref_type).unwrap_or(self.kind);
        let collection = self.config.collection_for(target).to_string();

        let (id, replacement) = match value {
            Value::Object(object) => {
                let (found, committed_id) = {
                    let entity = object.try_read().ok_or_else(|| EngineError::CyclicEmbedding {
                        path: path.to_string(),
                    })?;
                    let committed = entity.status().is_committed();
                    (entity.kind(), entity.native_id().filter(|_| committed))
                };
                if found != target {
                    return Err(EngineError::WrongObjectKind {
                        path: path.to_string(),
                        expected: target,
                        found,
                    });
                }
                let id = match (committed_id, &mut self.mode) {
                    (Some(id), _) => id,
                    (None, Mode::Commit(committer)) => committer.commit_embedded(object, path)?,
                    // An uncommitted object was never counted.
                    (None, Mode::Account) => return Ok(None),
                };
                let resolved = id.to_value();
                (id, Some(resolved))
            }
            other => {
                let id = target
                    .id_type()
                    .cast(other)
                    .map_err(|e| EngineError::InvalidValue {
                        path: path.to_string(),
                        reason: e.to_string(),
                    })?;
                if matches!(self.mode, Mode::Commit(_)) && self.config.verify_references {
                    let handle = self.dict.collection(&collection)?;
                    if !handle.exists(&id)? {
                        return Err(EngineError::UnresolvedReference {
                            collection,
                            id: id.to_string(),
                        });
                    }
                }
                let cast = id.to_value();
                let replacement = if cast == *other { None } else { Some(cast) };
                (id, replacement)
            }
        };
        report.references.add(&collection, id, 1);
        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use onto_dict::MemoryDictionary;
    use onto_store::{Database, MemoryDatabase};
    use onto_types::{document_from_json, DataKind, DataType, Document, Entity, IdType};
    use serde_json::json;

    struct Fixture {
        db: Arc<MemoryDatabase>,
        dict: MemoryDictionary,
        config: EngineConfig,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(MemoryDatabase::new());
        let dict = MemoryDictionary::new(db.clone());
        dict.define_tag("color", TagDescriptor::scalar(DataType::String)).unwrap();
        dict.define_tag("sizes", TagDescriptor::list(DataType::Int)).unwrap();
        dict.define_tag("colors", TagDescriptor::scalar(DataType::Set)).unwrap();
        dict.define_tag("parent", TagDescriptor::scalar(DataType::Ref(RefType::Term)))
            .unwrap();
        dict.define_tag("peer", TagDescriptor::scalar(DataType::Ref(RefType::SelfRef)))
            .unwrap();
        dict.define_tag("part", TagDescriptor::list(DataType::Struct)).unwrap();
        dict.define_tag("detail", TagDescriptor::scalar(DataType::Struct)).unwrap();
        dict.define_tag("any", TagDescriptor::new([DataType::Int, DataType::String], []))
            .unwrap();
        dict.define_tag(
            "secret",
            TagDescriptor::scalar(DataType::String).with_kind(DataKind::PrivateOutput),
        )
        .unwrap();
        let terms = db.create_collection("_terms", IdType::Str).unwrap();
        terms
            .insert(&document_from_json(json!({"_id": "t1"})).unwrap())
            .unwrap();
        db.create_collection("_units", IdType::Str).unwrap();
        Fixture {
            db,
            dict,
            config: EngineConfig::default(),
        }
    }

    fn doc(value: serde_json::Value) -> Document {
        document_from_json(value).unwrap()
    }

    fn account(f: &Fixture, kind: EntityKind, d: &Document) -> EngineResult<TraversalReport> {
        Traversal::account(&f.dict, &f.config, kind).run(d)
    }

    struct Refuse;

    impl EmbeddedCommitter for Refuse {
        fn commit_embedded(&mut self, _object: &SharedEntity, _path: &str) -> EngineResult<NativeId> {
            Err(EngineError::Config("no cascade in this test".into()))
        }
    }

    struct Assign(i64);

    impl EmbeddedCommitter for Assign {
        fn commit_embedded(&mut self, object: &SharedEntity, _path: &str) -> EngineResult<NativeId> {
            self.0 += 1;
            let id = NativeId::Str(format!("new{}", self.0));
            let mut entity = object.write();
            entity.raw_offsets_mut().insert(tags::NID.into(), id.to_value());
            entity.status_mut().committed(Some(true));
            Ok(id)
        }
    }

    // ---------------------------------------------------------------
    // Paths and usage
    // ---------------------------------------------------------------

    #[test]
    fn records_leaf_paths_through_structures() {
        let f = fixture();
        let d = doc(json!({
            "color": "red",
            "detail": {"color": "blue", "sizes": [1, 2]},
            "part": [{"color": "green"}, {"sizes": [3]}],
            "_id": "u1",
            "unit-count": 3
        }));
        let report = account(&f, EntityKind::Unit, &d).unwrap();
        let paths = report.paths();
        assert_eq!(
            paths["color"].iter().cloned().collect::<Vec<_>>(),
            vec!["color", "detail.color", "part.color"]
        );
        assert_eq!(
            paths["sizes"].iter().cloned().collect::<Vec<_>>(),
            vec!["detail.sizes", "part.sizes"]
        );
        // Structures and internal offsets are not leaves.
        assert!(!paths.contains_key("detail"));
        assert!(!paths.contains_key("part"));
        assert!(!paths.contains_key("_id"));
        assert!(!paths.contains_key("unit-count"));
    }

    #[test]
    fn unknown_tag_fails() {
        let f = fixture();
        let err = account(&f, EntityKind::Unit, &doc(json!({"nope": 1}))).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedTag { ref tag } if tag == "nope"));
    }

    #[test]
    fn list_offset_requires_array() {
        let f = fixture();
        let err = account(&f, EntityKind::Unit, &doc(json!({"sizes": 4}))).unwrap_err();
        assert!(matches!(err, EngineError::MalformedStructure { ref path, .. } if path == "sizes"));
        let err = account(&f, EntityKind::Unit, &doc(json!({"part": [1]}))).unwrap_err();
        assert!(matches!(err, EngineError::MalformedStructure { .. }));
    }

    #[test]
    fn set_rejects_scalar() {
        let f = fixture();
        let err = account(&f, EntityKind::Unit, &doc(json!({"colors": "abc"}))).unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue { .. }));
    }

    // ---------------------------------------------------------------
    // Casting and references
    // ---------------------------------------------------------------

    #[test]
    fn casts_become_replacements() {
        let f = fixture();
        let mut d = doc(json!({"color": 7, "sizes": ["1", 2], "any": [1]}));
        let report = account(&f, EntityKind::Unit, &d).unwrap();
        assert_eq!(report.replacements.len(), 2);
        report.apply_replacements(&mut d);
        assert_eq!(
            onto_types::document_to_json(&d),
            json!({"color": "7", "sizes": [1, 2], "any": [1]})
        );
    }

    #[test]
    fn bare_references_are_verified_on_commit() {
        let f = fixture();
        let mut refuse = Refuse;
        let report = Traversal::commit(&f.dict, &f.config, EntityKind::Unit, &mut refuse)
            .run(&doc(json!({"parent": "t1"})))
            .unwrap();
        assert_eq!(report.references.get("_terms", &"t1".into()), 1);

        let err = Traversal::commit(&f.dict, &f.config, EntityKind::Unit, &mut refuse)
            .run(&doc(json!({"parent": "t2"})))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedReference { .. }));

        // Accounting never checks existence.
        let report = account(&f, EntityKind::Unit, &doc(json!({"parent": "t2"}))).unwrap();
        assert_eq!(report.references.get("_terms", &"t2".into()), 1);
    }

    #[test]
    fn self_references_target_own_collection() {
        let f = fixture();
        let report = account(&f, EntityKind::Unit, &doc(json!({"peer": "u9"}))).unwrap();
        assert_eq!(report.references.get("_units", &"u9".into()), 1);
    }

    #[test]
    fn embedded_objects_cascade() {
        let f = fixture();
        let embedded = Entity::new(EntityKind::Term).into_shared();
        let mut d = Document::new();
        d.insert("parent".into(), Value::Object(embedded.clone()));

        let mut assign = Assign(0);
        let report = Traversal::commit(&f.dict, &f.config, EntityKind::Unit, &mut assign)
            .run(&d)
            .unwrap();
        assert_eq!(report.references.get("_terms", &"new1".into()), 1);
        report.apply_replacements(&mut d);
        assert_eq!(d["parent"], Value::from("new1"));

        // Already committed objects are not committed again.
        let mut d = Document::new();
        d.insert("parent".into(), Value::Object(embedded));
        let report = Traversal::commit(&f.dict, &f.config, EntityKind::Unit, &mut assign)
            .run(&d)
            .unwrap();
        assert_eq!(assign.0, 1);
        assert_eq!(report.references.get("_terms", &"new1".into()), 1);
    }

    #[test]
    fn embedded_object_kind_is_checked() {
        let f = fixture();
        let mut d = Document::new();
        d.insert(
            "parent".into(),
            Value::Object(Entity::new(EntityKind::Node).into_shared()),
        );
        let err = account(&f, EntityKind::Unit, &d).unwrap_err();
        assert!(matches!(
            err,
            EngineError::WrongObjectKind {
                expected: EntityKind::Term,
                found: EntityKind::Node,
                ..
            }
        ));
    }

    #[test]
    fn locked_embedded_object_is_cyclic() {
        let f = fixture();
        let shared = Entity::new(EntityKind::Term).into_shared();
        let mut d = Document::new();
        d.insert("parent".into(), Value::Object(shared.clone()));
        let _guard = shared.write();
        let err = account(&f, EntityKind::Unit, &d).unwrap_err();
        assert!(matches!(err, EngineError::CyclicEmbedding { .. }));
    }

    // ---------------------------------------------------------------
    // Observer
    // ---------------------------------------------------------------

    struct StopAfter {
        seen: Vec<String>,
        limit: usize,
    }

    impl LeafObserver for StopAfter {
        fn visit(&mut self, leaf: &LeafVisit<'_>) -> Flow {
            self.seen.push(leaf.path.to_string());
            if self.seen.len() >= self.limit {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }
    }

    #[test]
    fn observer_can_stop() {
        let f = fixture();
        let d = doc(json!({"any": 1, "color": "x", "sizes": [1, 2, 3]}));
        let mut observer = StopAfter {
            seen: Vec::new(),
            limit: 2,
        };
        let report = Traversal::account(&f.dict, &f.config, EntityKind::Unit)
            .with_observer(&mut observer)
            .run(&d)
            .unwrap();
        assert!(report.stopped);
        assert_eq!(observer.seen, vec!["any", "color"]);
        assert!(!report.tags.contains_key("sizes"));
    }

    #[test]
    fn collections_resolve_lazily() {
        let f = fixture();
        f.db.drop_collection("_terms").unwrap();
        let mut refuse = Refuse;
        let err = Traversal::commit(&f.dict, &f.config, EntityKind::Unit, &mut refuse)
            .run(&doc(json!({"parent": "t1"})))
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
    }
}

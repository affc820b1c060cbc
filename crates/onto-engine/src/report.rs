//! Traversal output: tag usage, reference ledger and value replacements.
//!
//! The traversal never mutates the entity it walks. Everything it finds is
//! returned here, so the bookkeeping a commit or delete would run can be
//! inspected before it is applied.

use std::collections::{BTreeMap, BTreeSet};

use onto_types::{Document, NativeId, TagDescriptor, Value};

/// Where a tag is used and what it was resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagUsage {
    pub descriptor: TagDescriptor,
    /// Dotted offset paths the tag occurs at.
    pub paths: BTreeSet<String>,
}

/// Reference count deltas per `(collection, identifier)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceLedger {
    counts: BTreeMap<(String, NativeId), i64>,
}

/// One reference-count write: the same delta for a set of documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceBatch {
    pub collection: String,
    pub delta: i64,
    pub ids: Vec<NativeId>,
}

impl ReferenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collection: &str, id: NativeId, delta: i64) {
        *self
            .counts
            .entry((collection.to_string(), id))
            .or_insert(0) += delta;
    }

    pub fn get(&self, collection: &str, id: &NativeId) -> i64 {
        self.counts
            .get(&(collection.to_string(), id.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NativeId, i64)> {
        self.counts
            .iter()
            .map(|((collection, id), delta)| (collection.as_str(), id, *delta))
    }

    /// `self - old`, without zero entries.
    pub fn difference(&self, old: &ReferenceLedger) -> ReferenceLedger {
        let mut counts = self.counts.clone();
        for (key, delta) in &old.counts {
            *counts.entry(key.clone()).or_insert(0) -= delta;
        }
        counts.retain(|_, delta| *delta != 0);
        ReferenceLedger { counts }
    }

    /// Group identifiers sharing a collection and a delta, so each group is
    /// a single "identifier in set" update. Zero deltas are skipped.
    pub fn batches(&self) -> Vec<ReferenceBatch> {
        let mut grouped: BTreeMap<(&str, i64), Vec<NativeId>> = BTreeMap::new();
        for (collection, id, delta) in self.iter() {
            if delta != 0 {
                grouped.entry((collection, delta)).or_default().push(id.clone());
            }
        }
        grouped
            .into_iter()
            .map(|((collection, delta), ids)| ReferenceBatch {
                collection: collection.to_string(),
                delta,
                ids,
            })
            .collect()
    }
}

/// One step into a document: an offset or map key, or a list index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// A value the traversal wants written back at a location.
#[derive(Clone, Debug, PartialEq)]
pub struct Replacement {
    pub location: Vec<Step>,
    pub value: Value,
}

impl Replacement {
    /// Write the value into `doc`. Returns `false` if the location no longer
    /// exists.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut steps = self.location.iter();
        let Some(Step::Key(first)) = steps.next() else {
            return false;
        };
        let Some(mut slot) = doc.get_mut(first) else {
            return false;
        };
        for step in steps {
            let next = match (step, slot) {
                (Step::Key(key), Value::Map(map)) => map.get_mut(key),
                (Step::Index(i), Value::List(items)) => items.get_mut(*i),
                _ => None,
            };
            match next {
                Some(value) => slot = value,
                None => return false,
            }
        }
        *slot = self.value.clone();
        true
    }
}

/// Everything one traversal found.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TraversalReport {
    /// Leaf tags, keyed by tag identifier.
    pub tags: BTreeMap<String, TagUsage>,
    pub references: ReferenceLedger,
    pub replacements: Vec<Replacement>,
    /// Set when an observer ended the walk early.
    pub stopped: bool,
}

impl TraversalReport {
    pub(crate) fn record_tag(&mut self, tag: &str, descriptor: &TagDescriptor, path: &str) {
        self.tags
            .entry(tag.to_string())
            .or_insert_with(|| TagUsage {
                descriptor: descriptor.clone(),
                paths: BTreeSet::new(),
            })
            .paths
            .insert(path.to_string());
    }

    /// Paths per tag, the shape stored in tag registries.
    pub fn paths(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.tags
            .iter()
            .map(|(tag, usage)| (tag.clone(), usage.paths.clone()))
            .collect()
    }

    /// Apply every replacement to `doc`, returning how many applied.
    pub fn apply_replacements(&self, doc: &mut Document) -> usize {
        self.replacements.iter().filter(|r| r.apply(doc)).count()
    }

    /// The used-tags list carried by the persisted entity.
    pub fn tag_list(&self) -> Value {
        Value::List(self.tags.keys().map(|t| Value::from(t.as_str())).collect())
    }

    /// The tag-to-paths map carried by the persisted entity.
    pub fn offsets_map(&self) -> Value {
        Value::Map(
            self.tags
                .iter()
                .map(|(tag, usage)| {
                    let paths = usage.paths.iter().map(|p| Value::from(p.as_str())).collect();
                    (tag.clone(), Value::List(paths))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onto_types::document_from_json;
    use serde_json::json;

    #[test]
    fn ledger_batches_group_by_delta() {
        let mut ledger = ReferenceLedger::new();
        ledger.add("_terms", "a".into(), 1);
        ledger.add("_terms", "b".into(), 1);
        ledger.add("_terms", "a".into(), 1);
        ledger.add("_nodes", 4.into(), 1);
        ledger.add("_nodes", 5.into(), 0);
        assert_eq!(ledger.get("_terms", &"a".into()), 2);

        let batches = ledger.batches();
        assert_eq!(
            batches,
            vec![
                ReferenceBatch {
                    collection: "_nodes".into(),
                    delta: 1,
                    ids: vec![NativeId::Int(4)],
                },
                ReferenceBatch {
                    collection: "_terms".into(),
                    delta: 1,
                    ids: vec![NativeId::from("b")],
                },
                ReferenceBatch {
                    collection: "_terms".into(),
                    delta: 2,
                    ids: vec![NativeId::from("a")],
                },
            ]
        );
    }

    #[test]
    fn ledger_difference_drops_unchanged() {
        let mut old = ReferenceLedger::new();
        old.add("_terms", "a".into(), 1);
        old.add("_terms", "b".into(), 1);
        let mut new = ReferenceLedger::new();
        new.add("_terms", "b".into(), 1);
        new.add("_terms", "c".into(), 2);

        let diff = new.difference(&old);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff.get("_terms", &"a".into()), -1);
        assert_eq!(diff.get("_terms", &"b".into()), 0);
        assert_eq!(diff.get("_terms", &"c".into()), 2);
    }

    #[test]
    fn replacements_follow_locations() {
        let mut doc = document_from_json(json!({
            "ref": "x",
            "list": [1, 2],
            "nested": {"inner": [{"deep": "old"}]}
        }))
        .unwrap();
        let at = |steps: Vec<Step>, value: Value| Replacement {
            location: steps,
            value,
        };
        let report = TraversalReport {
            replacements: vec![
                at(vec![Step::Key("ref".into())], Value::from("y")),
                at(vec![Step::Key("list".into()), Step::Index(1)], Value::Int(9)),
                at(
                    vec![
                        Step::Key("nested".into()),
                        Step::Key("inner".into()),
                        Step::Index(0),
                        Step::Key("deep".into()),
                    ],
                    Value::from("new"),
                ),
                at(vec![Step::Key("list".into()), Step::Index(5)], Value::Null),
                at(vec![Step::Index(0)], Value::Null),
            ],
            ..Default::default()
        };
        assert_eq!(report.apply_replacements(&mut doc), 3);
        assert_eq!(
            onto_types::document_to_json(&doc),
            json!({
                "ref": "y",
                "list": [1, 9],
                "nested": {"inner": [{"deep": "new"}]}
            })
        );
    }

    #[test]
    fn registry_values() {
        let mut report = TraversalReport::default();
        let d = TagDescriptor::scalar(onto_types::DataType::String);
        report.record_tag("b", &d, "s.b");
        report.record_tag("a", &d, "a");
        report.record_tag("b", &d, "b");
        assert_eq!(report.tag_list(), Value::from(json!(["a", "b"])));
        assert_eq!(
            report.offsets_map(),
            Value::from(json!({"a": ["a"], "b": ["b", "s.b"]}))
        );
    }
}

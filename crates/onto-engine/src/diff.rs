//! Usage diff between two traversals of the same entity.
//!
//! Incremental updates apply bookkeeping only for what changed between the
//! stored snapshot and the merged entity, so repeated partial updates never
//! make reference counts or tag counts drift.

use std::collections::{BTreeMap, BTreeSet};

use crate::report::{ReferenceLedger, TraversalReport};

/// Bookkeeping changes between an old and a new traversal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageDiff {
    /// Reference count deltas, `new - old`, without zero entries.
    pub references: ReferenceLedger,
    /// Tags used only by the new state, with all their paths.
    pub added_tags: BTreeMap<String, BTreeSet<String>>,
    /// Tags used only by the old state.
    pub removed_tags: BTreeSet<String>,
    /// Tags used by both states, with the paths only the new state uses.
    pub new_paths: BTreeMap<String, BTreeSet<String>>,
}

impl UsageDiff {
    /// Compute what changed from `old` to `new`.
    pub fn between(old: &TraversalReport, new: &TraversalReport) -> Self {
        let mut diff = UsageDiff {
            references: new.references.difference(&old.references),
            ..Default::default()
        };
        for (tag, usage) in &new.tags {
            match old.tags.get(tag) {
                None => {
                    diff.added_tags.insert(tag.clone(), usage.paths.clone());
                }
                Some(previous) => {
                    let fresh: BTreeSet<String> =
                        usage.paths.difference(&previous.paths).cloned().collect();
                    if !fresh.is_empty() {
                        diff.new_paths.insert(tag.clone(), fresh);
                    }
                }
            }
        }
        diff.removed_tags = old
            .tags
            .keys()
            .filter(|tag| !new.tags.contains_key(*tag))
            .cloned()
            .collect();
        diff
    }

    /// Returns `true` if no bookkeeping is needed.
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
            && self.added_tags.is_empty()
            && self.removed_tags.is_empty()
            && self.new_paths.is_empty()
    }
}

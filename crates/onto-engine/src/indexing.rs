//! Sparse indexes over registered tag paths.
//!
//! Tag documents record the paths they are used at per owning collection;
//! those paths are exactly the keys worth indexing there.

use onto_store::{Filter, IndexSpec, ResultShape};
use onto_types::{EntityKind, NativeId, Value};
use tracing::info;

use crate::engine::Engine;
use crate::error::EngineResult;

impl Engine {
    /// The paths `tag` is registered at in `kind`'s collection.
    pub fn tag_paths(&self, kind: EntityKind, tag: &str) -> EngineResult<Vec<String>> {
        let doc = self
            .collection(EntityKind::Tag)?
            .find(&NativeId::from(tag))?;
        let paths = doc
            .as_ref()
            .and_then(|d| d.get(kind.offsets_tag()))
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(paths)
    }

    /// Create one sparse index per path `tag` is registered at in `kind`'s
    /// collection. Returns the specs created.
    pub fn index_tag_offsets(&self, kind: EntityKind, tag: &str) -> EngineResult<Vec<IndexSpec>> {
        let collection = self.collection(kind)?;
        let specs: Vec<IndexSpec> = self
            .tag_paths(kind, tag)?
            .into_iter()
            .map(IndexSpec::sparse)
            .collect();
        for spec in &specs {
            collection.create_index(spec)?;
        }
        Ok(specs)
    }

    /// Drop every index of `kind`'s collection and recreate one per
    /// registered tag path. Returns the number of indexes created.
    pub fn rebuild_indexes(&self, kind: EntityKind) -> EngineResult<usize> {
        let collection = self.collection(kind)?;
        collection.drop_indexes()?;

        let tag_docs = self.collection(EntityKind::Tag)?;
        let mut created = 0;
        for matched in tag_docs.match_all(&Filter::All, ResultShape::Identifier, None, None)? {
            let Some(tag) = matched.into_identifier() else {
                continue;
            };
            created += self.index_tag_offsets(kind, &tag.to_string())?.len();
        }
        info!(
            collection = collection.name(),
            indexes = created,
            "rebuilt indexes"
        );
        Ok(created)
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use onto_types::EntityKind;

use crate::error::{EngineError, EngineResult};

/// Collection name per entity kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionNames {
    pub tag: String,
    pub term: String,
    pub node: String,
    pub edge: String,
    pub entity: String,
    pub unit: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            tag: EntityKind::Tag.default_collection().into(),
            term: EntityKind::Term.default_collection().into(),
            node: EntityKind::Node.default_collection().into(),
            edge: EntityKind::Edge.default_collection().into(),
            entity: EntityKind::Entity.default_collection().into(),
            unit: EntityKind::Unit.default_collection().into(),
        }
    }
}

/// Configuration for the commit engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where each entity kind is stored.
    pub collections: CollectionNames,
    /// Whether bare-identifier references must point at existing documents.
    pub verify_references: bool,
    /// Upper bound on nested cascading commits of embedded objects.
    pub max_embedded_depth: usize,
    /// Whether reference counts and tag usage are maintained.
    pub bookkeeping: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collections: CollectionNames::default(),
            verify_references: true,
            max_embedded_depth: 32,
            bookkeeping: true,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML configuration; absent keys take their defaults.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// The collection an entity kind is stored in.
    pub fn collection_for(&self, kind: EntityKind) -> &str {
        let names = &self.collections;
        match kind {
            EntityKind::Tag => &names.tag,
            EntityKind::Term => &names.term,
            EntityKind::Node => &names.node,
            EntityKind::Edge => &names.edge,
            EntityKind::Entity => &names.entity,
            EntityKind::Unit => &names.unit,
        }
    }
}

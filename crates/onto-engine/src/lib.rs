//! Commit engine for the onto persistence engine.
//!
//! Entities carry no schema. When an entity is committed the engine walks
//! its offsets, asks the dictionary for each tag's descriptor, verifies and
//! casts values, resolves references (committing embedded objects first),
//! writes the entity and then maintains reference counts and tag usage on
//! the documents involved.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use onto_dict::{Dictionary, MemoryDictionary};
//! use onto_engine::{bootstrap, Engine, EngineConfig};
//! use onto_store::MemoryDatabase;
//! use onto_types::{document_from_json, DataType, Entity, EntityKind, TagDescriptor};
//!
//! let db = Arc::new(MemoryDatabase::new());
//! let config = EngineConfig::default();
//! bootstrap(&*db, &config).unwrap();
//! let dict = MemoryDictionary::new(db.clone());
//! dict.define_tag("color", TagDescriptor::scalar(DataType::String)).unwrap();
//! let engine = Engine::new(Arc::new(dict), config);
//!
//! let doc = document_from_json(serde_json::json!({
//!     "domain": "accession",
//!     "identifier": "A1",
//!     "color": "red"
//! }))
//! .unwrap();
//! let mut unit = Entity::from_document(EntityKind::Unit, doc);
//! let id = engine.commit(&mut unit).unwrap();
//! assert_eq!(id.to_string(), "accession://A1");
//! ```
//!
//! # Modules
//!
//! - [`traversal`] — The depth-first traversal over an entity's offsets
//! - [`cast`] — Value verification and casting per data type
//! - [`report`] — Tag usage, reference ledger and replacements
//! - [`diff`] — Usage diff for incremental updates
//! - [`bookkeeping`] — Reference counts and tag registries
//! - [`engine`] — Commit, delete and incremental update orchestration
//! - [`exposure`] — Private offset filters
//! - [`indexing`] — Sparse indexes over registered tag paths
//! - [`config`] — Engine configuration
//!
//! # Design Rules
//!
//! - The traversal never mutates the entity; casts and resolved
//!   identifiers are applied from its report afterwards.
//! - The primary write precedes all bookkeeping writes, and bookkeeping
//!   failures never roll the primary write back.
//! - Incremental updates apply bookkeeping only for the diff between the
//!   stored snapshot and the merged entity.

pub mod bookkeeping;
pub mod cast;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod exposure;
pub mod indexing;
pub mod report;
pub mod traversal;

pub use bookkeeping::Bookkeeping;
pub use config::{CollectionNames, EngineConfig};
pub use diff::UsageDiff;
pub use engine::{bootstrap, DeleteOutcome, Engine, PreDeleteHook, ReferenceGuard};
pub use error::{EngineError, EngineResult};
pub use exposure::{reject_private_input, strip_private_output};
pub use report::{ReferenceBatch, ReferenceLedger, Replacement, Step, TagUsage, TraversalReport};
pub use traversal::{EmbeddedCommitter, Flow, LeafObserver, LeafVisit, Mode, Traversal};

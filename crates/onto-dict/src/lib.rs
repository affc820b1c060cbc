//! Tag metadata for the onto persistence engine.
//!
//! Entities do not declare the type of their offsets; the engine asks the
//! dictionary for the `(types, kinds)` descriptor of every tag it meets
//! during a traversal, and for the collection handle of every reference it
//! resolves.
//!
//! # Architecture
//!
//! - **System tags** resolve from a fixed table, so tag and term
//!   definitions can be validated before any dictionary is loaded.
//! - **Dictionary tags** resolve through the [`Dictionary`] trait. The
//!   in-memory implementation caches descriptors read from the tag
//!   collection and learns tags as they are committed.
//!
//! # Modules
//!
//! - [`error`] — Error types for dictionary operations
//! - [`system`] — The system tag table
//! - [`traits`] — The [`Dictionary`] trait and [`resolve`]
//! - [`memory`] — [`MemoryDictionary`] over a [`onto_store::Database`]

pub mod error;
pub mod memory;
pub mod system;
pub mod traits;

pub use error::{DictError, DictResult};
pub use memory::MemoryDictionary;
pub use system::{is_system_tag, system_descriptor};
pub use traits::{resolve, Dictionary};

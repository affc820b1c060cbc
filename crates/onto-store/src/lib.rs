//! Document collection handles for the onto persistence engine.
//!
//! The engine never talks to a storage driver directly; it goes through the
//! [`Collection`] contract: match documents by filter, insert, partially
//! update or delete offsets, atomically adjust reference counts and union
//! values into set-valued offsets.
//!
//! # Storage Backends
//!
//! All backends implement the [`Collection`] and [`Database`] traits:
//!
//! - [`MemoryCollection`] / [`MemoryDatabase`] -- `BTreeMap`-based store for
//!   tests and embedding, persisted as a JSON snapshot
//!
//! # Design Rules
//!
//! 1. Partial updates touch only the offsets they name.
//! 2. Reference count updates are atomic per document.
//! 3. Operations on missing documents are no-ops, not errors.
//! 4. Embedded entities are never persisted; they must be resolved first.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod query;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCollection, MemoryDatabase};
pub use query::{lookup, Filter, IndexSpec, Matched, ResultShape};
pub use traits::{Collection, Database, MatchIter};

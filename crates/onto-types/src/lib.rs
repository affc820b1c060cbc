//! Foundation types for the onto persistence engine.
//!
//! Entities are bags of tag-keyed offsets whose data type and shape are not
//! declared on the entity but looked up from tag metadata when the entity is
//! committed. This crate holds the types every other crate shares.
//!
//! # Key Types
//!
//! - [`Value`] / [`Document`] — dynamically typed offset values
//! - [`NativeId`] — native identifier of a stored document
//! - [`Status`] — inited / dirty / committed / encoded lifecycle flags
//! - [`TagDescriptor`] — declared `(types, kinds)` of a tag
//! - [`Entity`] / [`EntityKind`] — persistable entities and their variants
//! - [`access`] — the offset accessor protocol (scalar, set, map, element lists)

pub mod access;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod ident;
pub mod status;
pub mod tags;
pub mod value;

pub use access::{ListOp, Op, RecordKeys, Report, SetOp};
pub use descriptor::{DataKind, DataType, RefType, TagDescriptor, ValueShape};
pub use entity::{Entity, EntityKind, SharedEntity};
pub use error::{AccessError, AccessResult, TypeError};
pub use ident::{IdType, NativeId};
pub use status::Status;
pub use value::{document_from_json, document_to_json, Document, Value};

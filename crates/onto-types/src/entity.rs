//! Persistent entities.
//!
//! An [`Entity`] is a bag of offsets plus lifecycle [`Status`]. What it is
//! (tag, term, node, edge, entity record, unit record) is carried by its
//! [`EntityKind`], which decides where it is stored, how its identifier is
//! derived, which offsets it needs before it can be committed and which
//! offsets become immutable once it is.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::access::{self, ListOp, Op, RecordKeys, Report, SetOp};
use crate::descriptor::RefType;
use crate::error::{AccessError, AccessResult, TypeError};
use crate::ident::{IdType, NativeId};
use crate::status::Status;
use crate::tags;
use crate::value::{Document, Value};

/// The persistable entity variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Tag,
    Term,
    Node,
    Edge,
    Entity,
    Unit,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Tag,
        EntityKind::Term,
        EntityKind::Node,
        EntityKind::Edge,
        EntityKind::Entity,
        EntityKind::Unit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Tag => "tag",
            EntityKind::Term => "term",
            EntityKind::Node => "node",
            EntityKind::Edge => "edge",
            EntityKind::Entity => "entity",
            EntityKind::Unit => "unit",
        }
    }

    /// Collection name used when no configuration overrides it.
    pub fn default_collection(&self) -> &'static str {
        match self {
            EntityKind::Tag => "_tags",
            EntityKind::Term => "_terms",
            EntityKind::Node => "_nodes",
            EntityKind::Edge => "_edges",
            EntityKind::Entity => "_entities",
            EntityKind::Unit => "_units",
        }
    }

    pub fn id_type(&self) -> IdType {
        match self {
            EntityKind::Node => IdType::Int,
            _ => IdType::Str,
        }
    }

    /// The reference type whose values point at this kind.
    pub fn ref_type(&self) -> RefType {
        match self {
            EntityKind::Tag => RefType::Tag,
            EntityKind::Term => RefType::Term,
            EntityKind::Node => RefType::Node,
            EntityKind::Edge => RefType::Edge,
            EntityKind::Entity => RefType::Entity,
            EntityKind::Unit => RefType::Unit,
        }
    }

    /// The kind a reference type points at; `SelfRef` has no fixed kind.
    pub fn from_ref_type(r: RefType) -> Option<Self> {
        match r {
            RefType::Tag => Some(EntityKind::Tag),
            RefType::Term => Some(EntityKind::Term),
            RefType::Node => Some(EntityKind::Node),
            RefType::Edge => Some(EntityKind::Edge),
            RefType::Entity => Some(EntityKind::Entity),
            RefType::Unit => Some(EntityKind::Unit),
            RefType::SelfRef => None,
        }
    }

    /// The count offset incremented on documents this kind references.
    pub fn count_tag(&self) -> &'static str {
        match self {
            EntityKind::Tag => tags::TAG_COUNT,
            EntityKind::Term => tags::TERM_COUNT,
            EntityKind::Node => tags::NODE_COUNT,
            EntityKind::Edge => tags::EDGE_COUNT,
            EntityKind::Entity => tags::ENTITY_COUNT,
            EntityKind::Unit => tags::UNIT_COUNT,
        }
    }

    /// The tag-document offset that collects the paths tags are used at in
    /// this kind's collection.
    pub fn offsets_tag(&self) -> &'static str {
        match self {
            EntityKind::Tag => tags::TAG_OFFSETS,
            EntityKind::Term => tags::TERM_OFFSETS,
            EntityKind::Node => tags::NODE_OFFSETS,
            EntityKind::Edge => tags::EDGE_OFFSETS,
            EntityKind::Entity => tags::ENTITY_OFFSETS,
            EntityKind::Unit => tags::UNIT_OFFSETS,
        }
    }

    /// Offsets that must be present before the entity counts as inited.
    pub fn mandatory_offsets(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Tag => &[tags::LABEL, tags::DATA_TYPE],
            EntityKind::Term => &[tags::LID, tags::LABEL],
            EntityKind::Node => &[tags::TERM],
            EntityKind::Edge => &[tags::SUBJECT, tags::PREDICATE, tags::OBJECT],
            EntityKind::Entity => &[tags::IDENTIFIER],
            EntityKind::Unit => &[tags::DOMAIN, tags::IDENTIFIER],
        }
    }

    /// Offsets that make up the entity's identity; locked once committed.
    pub fn identity_offsets(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Tag => &[tags::NID, tags::GID],
            EntityKind::Term => &[tags::NID, tags::NS, tags::LID, tags::GID],
            EntityKind::Node => &[tags::NID],
            EntityKind::Edge => &[tags::NID, tags::SUBJECT, tags::PREDICATE, tags::OBJECT],
            EntityKind::Entity => &[tags::NID, tags::AUTHORITY, tags::IDENTIFIER],
            EntityKind::Unit => &[
                tags::NID,
                tags::DOMAIN,
                tags::AUTHORITY,
                tags::COLLECTION,
                tags::IDENTIFIER,
                tags::VERSION,
            ],
        }
    }

    /// Derive the native identifier from identity offsets.
    ///
    /// Returns `None` when the identifier is assigned by the store (nodes,
    /// tags without a global identifier).
    pub fn derive_id(&self, doc: &Document) -> Option<NativeId> {
        let text = |tag: &str| doc.get(tag).and_then(scalar_text);
        match self {
            EntityKind::Tag => text(tags::GID).map(NativeId::Str),
            EntityKind::Term => {
                let lid = text(tags::LID)?;
                let gid = match text(tags::NS) {
                    Some(ns) => format!("{ns}:{lid}"),
                    None => lid,
                };
                Some(NativeId::Str(gid))
            }
            EntityKind::Node => None,
            EntityKind::Edge => {
                let subject = text(tags::SUBJECT)?;
                let predicate = text(tags::PREDICATE)?;
                let object = text(tags::OBJECT)?;
                Some(NativeId::Str(format!("{subject}:{predicate}:{object}")))
            }
            EntityKind::Entity => {
                let identifier = text(tags::IDENTIFIER)?;
                let id = match text(tags::AUTHORITY) {
                    Some(authority) => format!("{authority}://{identifier}"),
                    None => identifier,
                };
                Some(NativeId::Str(id))
            }
            EntityKind::Unit => {
                let domain = text(tags::DOMAIN)?;
                let identifier = text(tags::IDENTIFIER)?;
                let mut id = format!("{domain}://");
                for part in [tags::AUTHORITY, tags::COLLECTION] {
                    if let Some(p) = text(part) {
                        id.push_str(&p);
                        id.push('/');
                    }
                }
                id.push_str(&identifier);
                if let Some(version) = text(tags::VERSION) {
                    id.push(';');
                    id.push_str(&version);
                }
                Some(NativeId::Str(id))
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(x) => Some(x.to_string()),
        Value::Object(obj) => obj.read().native_id().map(|id| id.to_string()),
        _ => None,
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| TypeError::UnknownEntityKind(s.to_string()))
    }
}

/// An in-memory entity: offsets plus lifecycle status.
#[derive(Clone, Debug)]
pub struct Entity {
    kind: EntityKind,
    offsets: Document,
    status: Status,
}

impl Entity {
    /// Create an empty, uncommitted entity.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            offsets: Document::new(),
            status: Status::new(),
        }
    }

    /// Create an uncommitted entity from raw offsets.
    pub fn from_document(kind: EntityKind, offsets: Document) -> Self {
        let mut entity = Self {
            kind,
            offsets,
            status: Status::new(),
        };
        entity.status.dirty(Some(!entity.offsets.is_empty()));
        entity.refresh_inited();
        entity
    }

    /// Wrap a document read back from the store: committed and clean.
    pub fn from_stored(kind: EntityKind, offsets: Document) -> Self {
        let mut entity = Self::from_document(kind, offsets);
        entity.status.committed(Some(true));
        entity.status.dirty(Some(false));
        entity
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn offsets(&self) -> &Document {
        &self.offsets
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Mutable status, for the commit engine.
    pub fn status_mut(&mut self) -> &mut Status {
        &mut self.status
    }

    /// Mutable offsets bypassing identity locks and dirty tracking, for the
    /// commit engine.
    pub fn raw_offsets_mut(&mut self) -> &mut Document {
        &mut self.offsets
    }

    pub fn get(&self, tag: &str) -> Option<&Value> {
        self.offsets.get(tag)
    }

    pub fn native_id(&self) -> Option<NativeId> {
        self.offsets.get(tags::NID).and_then(NativeId::from_value)
    }

    pub fn into_shared(self) -> SharedEntity {
        SharedEntity::new(self)
    }

    /// Recompute `inited` from the kind's mandatory offsets.
    pub fn refresh_inited(&mut self) -> bool {
        let present = self
            .kind
            .mandatory_offsets()
            .iter()
            .all(|tag| self.offsets.contains_key(*tag));
        self.status.inited(Some(present))
    }

    fn check_lock(&self, tag: &str) -> AccessResult<()> {
        if self.status.is_committed() && self.kind.identity_offsets().contains(&tag) {
            return Err(AccessError::LockedOffset {
                tag: tag.to_string(),
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Accessor protocol
    // ---------------------------------------------------------------

    /// Scalar accessor.
    pub fn offset(&mut self, tag: &str, op: Op, mode: Report) -> AccessResult<Option<Value>> {
        let mutates = !matches!(op, Op::Retrieve);
        if mutates {
            self.check_lock(tag)?;
        }
        let result = access::manage_offset(&mut self.offsets, tag, op, mode);
        if mutates {
            self.mark_dirty();
        }
        Ok(result)
    }

    /// Shorthand for setting a scalar offset.
    pub fn set(&mut self, tag: &str, value: impl Into<Value>) -> AccessResult<()> {
        self.offset(tag, Op::Set(value.into()), Report::After)?;
        Ok(())
    }

    /// Value-set accessor.
    pub fn manage_set(
        &mut self,
        tag: &str,
        value: Value,
        op: SetOp,
        mode: Report,
    ) -> AccessResult<Option<Value>> {
        let mutates = op != SetOp::Match;
        if mutates {
            self.check_lock(tag)?;
        }
        let result = access::manage_set(&mut self.offsets, tag, value, op, mode)?;
        if mutates {
            self.mark_dirty();
        }
        Ok(result)
    }

    /// Keyed-map accessor.
    pub fn manage_map(
        &mut self,
        tag: &str,
        key: &str,
        op: Op,
        mode: Report,
    ) -> AccessResult<Option<Value>> {
        let mutates = !matches!(op, Op::Retrieve);
        if mutates {
            self.check_lock(tag)?;
        }
        let result = access::manage_map(&mut self.offsets, tag, key, op, mode)?;
        if mutates {
            self.mark_dirty();
        }
        Ok(result)
    }

    /// Element-match accessor over `{type, text}` records.
    pub fn manage_element(
        &mut self,
        tag: &str,
        discriminator: Option<&Value>,
        op: Op,
        mode: Report,
    ) -> AccessResult<Option<Value>> {
        self.manage_element_with(tag, RecordKeys::new(tags::TYPE, tags::TEXT), discriminator, op, mode)
    }

    /// Element-match accessor with explicit record field names.
    pub fn manage_element_with(
        &mut self,
        tag: &str,
        keys: RecordKeys<'_>,
        discriminator: Option<&Value>,
        op: Op,
        mode: Report,
    ) -> AccessResult<Option<Value>> {
        let mutates = !matches!(op, Op::Retrieve);
        if mutates {
            self.check_lock(tag)?;
        }
        let result = access::manage_element(&mut self.offsets, tag, keys, discriminator, op, mode)?;
        if mutates {
            self.mark_dirty();
        }
        Ok(result)
    }

    /// Element-list accessor over `{type, text[]}` records.
    pub fn manage_element_list(
        &mut self,
        tag: &str,
        discriminator: Option<&Value>,
        op: ListOp,
        mode: Report,
    ) -> AccessResult<Option<Value>> {
        let keys = RecordKeys::new(tags::TYPE, tags::TEXT);
        let mutates = !matches!(op, ListOp::Retrieve | ListOp::MatchItem(_));
        if mutates {
            self.check_lock(tag)?;
        }
        let result =
            access::manage_element_list(&mut self.offsets, tag, keys, discriminator, op, mode)?;
        if mutates {
            self.mark_dirty();
        }
        Ok(result)
    }

    fn mark_dirty(&mut self) {
        self.status.dirty(Some(true));
        self.refresh_inited();
    }
}

/// A shared handle to an entity, used to embed uncommitted entities in
/// another entity's offsets.
#[derive(Clone)]
pub struct SharedEntity(Arc<RwLock<Entity>>);

impl SharedEntity {
    pub fn new(entity: Entity) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.0.read().expect("lock poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Entity> {
        self.0.write().expect("lock poisoned")
    }

    /// Non-blocking read access; `None` while a write guard is held.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, Entity>> {
        self.0.try_read().ok()
    }

    /// Non-blocking write access; `None` while another guard is held.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, Entity>> {
        self.0.try_write().ok()
    }

    pub fn ptr_eq(&self, other: &SharedEntity) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Ok(entity) => write!(f, "Object({}, {:?})", entity.kind, entity.native_id()),
            Err(_) => write!(f, "Object(<locked>)"),
        }
    }
}

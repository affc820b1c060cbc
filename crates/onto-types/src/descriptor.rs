//! Tag metadata: declared data types and data kinds.
//!
//! A [`TagDescriptor`] is the `(type-set, kind-set)` pair registered for a
//! tag. The traversal engine reduces it to a [`ValueShape`] on entry to each
//! offset instead of inspecting the runtime value.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::value::{Document, Value};

/// The collection family a reference type points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RefType {
    Tag,
    Term,
    Node,
    Edge,
    Entity,
    Unit,
    /// Resolves to the referencing entity's own kind.
    SelfRef,
}

/// Declared data type of an offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Mixed,
    String,
    Int,
    Float,
    Bool,
    Url,
    Date,
    Enum,
    /// Unordered collection of enumerated values.
    Set,
    /// Keyed map.
    Map,
    /// List of `{type, data}` records.
    TypedList,
    /// List of `{lang, text}` records.
    LanguageStrings,
    /// Geometry record: `{type, coordinates}`.
    Shape,
    /// Nested entity-shaped mapping.
    Struct,
    Ref(RefType),
}

impl DataType {
    /// Types whose values must already be array-like before casting.
    pub fn is_array_shaped(&self) -> bool {
        matches!(
            self,
            DataType::Set
                | DataType::Map
                | DataType::TypedList
                | DataType::LanguageStrings
                | DataType::Shape
        )
    }

    pub fn reference(&self) -> Option<RefType> {
        match self {
            DataType::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Stable code used when a descriptor is persisted on a tag document.
    pub fn code(&self) -> &'static str {
        match self {
            DataType::Mixed => ":type:mixed",
            DataType::String => ":type:string",
            DataType::Int => ":type:int",
            DataType::Float => ":type:float",
            DataType::Bool => ":type:boolean",
            DataType::Url => ":type:url",
            DataType::Date => ":type:date",
            DataType::Enum => ":type:enum",
            DataType::Set => ":type:set",
            DataType::Map => ":type:array",
            DataType::TypedList => ":type:typed-list",
            DataType::LanguageStrings => ":type:language-strings",
            DataType::Shape => ":type:shape",
            DataType::Struct => ":type:struct",
            DataType::Ref(RefType::Tag) => ":type:ref:tag",
            DataType::Ref(RefType::Term) => ":type:ref:term",
            DataType::Ref(RefType::Node) => ":type:ref:node",
            DataType::Ref(RefType::Edge) => ":type:ref:edge",
            DataType::Ref(RefType::Entity) => ":type:ref:entity",
            DataType::Ref(RefType::Unit) => ":type:ref:unit",
            DataType::Ref(RefType::SelfRef) => ":type:ref:self",
        }
    }
}

impl FromStr for DataType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s {
            ":type:mixed" => DataType::Mixed,
            ":type:string" => DataType::String,
            ":type:int" => DataType::Int,
            ":type:float" => DataType::Float,
            ":type:boolean" => DataType::Bool,
            ":type:url" => DataType::Url,
            ":type:date" => DataType::Date,
            ":type:enum" => DataType::Enum,
            ":type:set" => DataType::Set,
            ":type:array" => DataType::Map,
            ":type:typed-list" => DataType::TypedList,
            ":type:language-strings" => DataType::LanguageStrings,
            ":type:shape" => DataType::Shape,
            ":type:struct" => DataType::Struct,
            ":type:ref:tag" => DataType::Ref(RefType::Tag),
            ":type:ref:term" => DataType::Ref(RefType::Term),
            ":type:ref:node" => DataType::Ref(RefType::Node),
            ":type:ref:edge" => DataType::Ref(RefType::Edge),
            ":type:ref:entity" => DataType::Ref(RefType::Entity),
            ":type:ref:unit" => DataType::Ref(RefType::Unit),
            ":type:ref:self" => DataType::Ref(RefType::SelfRef),
            other => return Err(TypeError::UnknownType(other.to_string())),
        };
        Ok(parsed)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Structural modifier of an offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataKind {
    /// The value is an ordered list of the declared type.
    List,
    /// Internal: may not be set by outside callers.
    PrivateInput,
    /// Internal: never exposed to outside callers.
    PrivateOutput,
}

impl DataKind {
    pub fn code(&self) -> &'static str {
        match self {
            DataKind::List => ":kind:list",
            DataKind::PrivateInput => ":kind:private-input",
            DataKind::PrivateOutput => ":kind:private-output",
        }
    }
}

impl FromStr for DataKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ":kind:list" => Ok(DataKind::List),
            ":kind:private-input" => Ok(DataKind::PrivateInput),
            ":kind:private-output" => Ok(DataKind::PrivateOutput),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}

/// How the traversal engine treats an offset's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueShape {
    /// More than one declared type: neither verified nor cast.
    Unverified,
    /// A primitive cast target.
    Scalar(DataType),
    /// An array-shaped, non-reference type.
    Composite(DataType),
    /// An identifier of a document in another (or the same) collection.
    Reference(RefType),
    /// A nested entity.
    Structure,
}

/// The `(types, kinds)` metadata of one tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDescriptor {
    pub types: BTreeSet<DataType>,
    pub kinds: BTreeSet<DataKind>,
}

impl TagDescriptor {
    pub fn new(
        types: impl IntoIterator<Item = DataType>,
        kinds: impl IntoIterator<Item = DataKind>,
    ) -> Self {
        Self {
            types: types.into_iter().collect(),
            kinds: kinds.into_iter().collect(),
        }
    }

    /// A single-typed, non-list descriptor.
    pub fn scalar(data_type: DataType) -> Self {
        Self::new([data_type], [])
    }

    /// A single-typed list descriptor.
    pub fn list(data_type: DataType) -> Self {
        Self::new([data_type], [DataKind::List])
    }

    pub fn with_kind(mut self, kind: DataKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    /// The declared type when exactly one is declared.
    pub fn single_type(&self) -> Option<DataType> {
        if self.types.len() == 1 {
            self.types.iter().next().copied()
        } else {
            None
        }
    }

    pub fn is_list(&self) -> bool {
        self.kinds.contains(&DataKind::List)
    }

    pub fn is_struct(&self) -> bool {
        self.types.contains(&DataType::Struct)
    }

    pub fn is_private_input(&self) -> bool {
        self.kinds.contains(&DataKind::PrivateInput)
    }

    pub fn is_private_output(&self) -> bool {
        self.kinds.contains(&DataKind::PrivateOutput)
    }

    pub fn shape(&self) -> ValueShape {
        if self.is_struct() {
            return ValueShape::Structure;
        }
        match self.single_type() {
            None => ValueShape::Unverified,
            Some(DataType::Ref(r)) => ValueShape::Reference(r),
            Some(t) if t.is_array_shaped() => ValueShape::Composite(t),
            Some(t) => ValueShape::Scalar(t),
        }
    }

    /// Read the descriptor stored on a tag document, if it declares a type.
    pub fn from_document(doc: &Document) -> Result<Option<Self>, TypeError> {
        let Some(types) = doc.get(crate::tags::DATA_TYPE) else {
            return Ok(None);
        };
        let types = codes(types)?
            .into_iter()
            .map(|c| c.parse::<DataType>())
            .collect::<Result<BTreeSet<_>, _>>()?;
        let kinds = match doc.get(crate::tags::DATA_KIND) {
            Some(kinds) => codes(kinds)?
                .into_iter()
                .map(|c| c.parse::<DataKind>())
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => BTreeSet::new(),
        };
        Ok(Some(Self { types, kinds }))
    }

    /// The `(data-type, data-kind)` offset values for a tag document.
    pub fn to_values(&self) -> (Value, Option<Value>) {
        let types = Value::List(self.types.iter().map(|t| Value::from(t.code())).collect());
        let kinds = if self.kinds.is_empty() {
            None
        } else {
            Some(Value::List(
                self.kinds.iter().map(|k| Value::from(k.code())).collect(),
            ))
        };
        (types, kinds)
    }
}

fn codes(value: &Value) -> Result<Vec<&str>, TypeError> {
    match value {
        Value::String(s) => Ok(vec![s.as_str()]),
        Value::List(items) => items
            .iter()
            .map(|v| {
                v.as_str().ok_or(TypeError::Cast {
                    expected: "type code",
                    found: v.type_name(),
                })
            })
            .collect(),
        other => Err(TypeError::Cast {
            expected: "type code list",
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_of_single_types() {
        assert_eq!(
            TagDescriptor::scalar(DataType::Int).shape(),
            ValueShape::Scalar(DataType::Int)
        );
        assert_eq!(
            TagDescriptor::scalar(DataType::Set).shape(),
            ValueShape::Composite(DataType::Set)
        );
        assert_eq!(
            TagDescriptor::scalar(DataType::Ref(RefType::Term)).shape(),
            ValueShape::Reference(RefType::Term)
        );
        assert_eq!(
            TagDescriptor::list(DataType::Struct).shape(),
            ValueShape::Structure
        );
    }

    #[test]
    fn multi_typed_is_unverified() {
        let desc = TagDescriptor::new([DataType::Int, DataType::String], []);
        assert_eq!(desc.shape(), ValueShape::Unverified);
        assert_eq!(desc.single_type(), None);
    }

    #[test]
    fn codes_roundtrip() {
        for t in [
            DataType::Mixed,
            DataType::Map,
            DataType::LanguageStrings,
            DataType::Ref(RefType::SelfRef),
        ] {
            assert_eq!(t.code().parse::<DataType>().unwrap(), t);
        }
        assert!(":type:nope".parse::<DataType>().is_err());
    }

    #[test]
    fn document_roundtrip() {
        let desc = TagDescriptor::list(DataType::Ref(RefType::Unit))
            .with_kind(DataKind::PrivateOutput);
        let (types, kinds) = desc.to_values();
        let mut doc = Document::new();
        doc.insert(crate::tags::DATA_TYPE.to_string(), types);
        doc.insert(crate::tags::DATA_KIND.to_string(), kinds.unwrap());
        assert_eq!(TagDescriptor::from_document(&doc).unwrap(), Some(desc));
    }

    #[test]
    fn document_without_type_has_no_descriptor() {
        assert_eq!(TagDescriptor::from_document(&Document::new()).unwrap(), None);
    }

    #[test]
    fn kind_flags() {
        let desc = TagDescriptor::scalar(DataType::String).with_kind(DataKind::PrivateInput);
        assert!(desc.is_private_input());
        assert!(!desc.is_private_output());
        assert!(!desc.is_list());
    }
}

//! The fixed table of system tags.
//!
//! System tags resolve without a dictionary so that the bootstrap entities
//! (tag and term definitions) can be validated before any metadata exists.

use onto_types::{tags, DataKind, DataType, RefType, TagDescriptor};

/// Descriptor of a system tag, or `None` if `tag` is not one.
pub fn system_descriptor(tag: &str) -> Option<TagDescriptor> {
    use DataType::*;

    let descriptor = match tag {
        // Native identifiers are integers in node collections and strings
        // elsewhere, so they are left unverified.
        tags::NID => TagDescriptor::new([Int, String], []),

        tags::LID | tags::GID | tags::NAME => TagDescriptor::scalar(String),
        tags::NS => TagDescriptor::scalar(Ref(RefType::Term)),
        tags::DOMAIN => TagDescriptor::scalar(Enum),
        tags::AUTHORITY | tags::COLLECTION | tags::IDENTIFIER | tags::VERSION => {
            TagDescriptor::scalar(String)
        }
        tags::ENTITY_TYPE => TagDescriptor::scalar(Set),

        tags::CONN_PORT => TagDescriptor::scalar(Int),
        tags::CONN_OPTIONS => TagDescriptor::scalar(Map),
        tags::CONN_PROTOCOL
        | tags::CONN_HOST
        | tags::CONN_USER
        | tags::CONN_PASS
        | tags::CONN_BASE
        | tags::CONN_COLL => TagDescriptor::scalar(String),

        tags::LABEL | tags::DEFINITION | tags::DESCRIPTION => {
            TagDescriptor::scalar(LanguageStrings)
        }
        tags::LANGUAGE | tags::TEXT | tags::TYPE => TagDescriptor::scalar(String),

        tags::EMAIL | tags::PHONE | tags::FAX | tags::URL | tags::AFFILIATION => {
            TagDescriptor::scalar(TypedList)
        }
        tags::SHAPE => TagDescriptor::scalar(Shape),

        tags::TERMS => TagDescriptor::list(Ref(RefType::Term)),
        tags::DATA_TYPE | tags::DATA_KIND => TagDescriptor::scalar(Set),

        tags::TERM | tags::PREDICATE => TagDescriptor::scalar(Ref(RefType::Term)),
        tags::SUBJECT | tags::OBJECT => TagDescriptor::scalar(Ref(RefType::Node)),

        tags::OBJECT_TAGS => TagDescriptor::list(String).with_kind(DataKind::PrivateInput),
        tags::OBJECT_OFFSETS => TagDescriptor::scalar(Map).with_kind(DataKind::PrivateInput),

        t if tags::REFERENCE_COUNTS.contains(&t) => {
            TagDescriptor::scalar(Int).with_kind(DataKind::PrivateInput)
        }
        t if tags::OFFSET_REGISTRIES.contains(&t) => {
            TagDescriptor::scalar(Set).with_kind(DataKind::PrivateInput)
        }

        _ => return None,
    };
    Some(descriptor)
}

/// Returns `true` if `tag` is in the system table.
pub fn is_system_tag(tag: &str) -> bool {
    system_descriptor(tag).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use onto_types::ValueShape;

    #[test]
    fn identifiers_are_unverified() {
        let d = system_descriptor(tags::NID).unwrap();
        assert_eq!(d.shape(), ValueShape::Unverified);
    }

    #[test]
    fn language_strings_and_typed_lists() {
        assert_eq!(
            system_descriptor(tags::LABEL).unwrap().shape(),
            ValueShape::Composite(DataType::LanguageStrings)
        );
        assert_eq!(
            system_descriptor(tags::EMAIL).unwrap().shape(),
            ValueShape::Composite(DataType::TypedList)
        );
        assert_eq!(
            system_descriptor(tags::SHAPE).unwrap().shape(),
            ValueShape::Composite(DataType::Shape)
        );
    }

    #[test]
    fn graph_references() {
        assert_eq!(
            system_descriptor(tags::SUBJECT).unwrap().shape(),
            ValueShape::Reference(RefType::Node)
        );
        assert_eq!(
            system_descriptor(tags::PREDICATE).unwrap().shape(),
            ValueShape::Reference(RefType::Term)
        );
        let terms = system_descriptor(tags::TERMS).unwrap();
        assert!(terms.is_list());
        assert_eq!(terms.shape(), ValueShape::Reference(RefType::Term));
    }

    #[test]
    fn bookkeeping_tags_are_private_input() {
        for tag in tags::REFERENCE_COUNTS.iter().chain(tags::OFFSET_REGISTRIES.iter()) {
            assert!(system_descriptor(tag).unwrap().is_private_input(), "{tag}");
        }
    }

    #[test]
    fn unknown_tags_miss() {
        assert!(system_descriptor("100").is_none());
        assert!(!is_system_tag("color"));
        assert!(is_system_tag(tags::CONN_PORT));
    }
}

//! System tag identifiers.
//!
//! These offsets are known to the engine without consulting the dictionary,
//! so that bootstrap entities (tags and terms themselves) can be validated
//! before any metadata is loaded.

/// Native identifier.
pub const NID: &str = "_id";

// Identification.
pub const LID: &str = "lid";
pub const GID: &str = "gid";
pub const NS: &str = "ns";
pub const NAME: &str = "name";
pub const DOMAIN: &str = "domain";
pub const AUTHORITY: &str = "authority";
pub const COLLECTION: &str = "collection";
pub const IDENTIFIER: &str = "identifier";
pub const VERSION: &str = "version";
pub const ENTITY_TYPE: &str = "entity-type";

// Connection parameters.
pub const CONN_PROTOCOL: &str = "conn-protocol";
pub const CONN_HOST: &str = "conn-host";
pub const CONN_PORT: &str = "conn-port";
pub const CONN_USER: &str = "conn-user";
pub const CONN_PASS: &str = "conn-pass";
pub const CONN_BASE: &str = "conn-base";
pub const CONN_COLL: &str = "conn-coll";
pub const CONN_OPTIONS: &str = "conn-options";

// Language strings and their record fields.
pub const LABEL: &str = "label";
pub const DEFINITION: &str = "definition";
pub const DESCRIPTION: &str = "description";
pub const LANGUAGE: &str = "lang";
pub const TEXT: &str = "text";

// Typed lists and their discriminator.
pub const TYPE: &str = "type";
pub const EMAIL: &str = "email";
pub const PHONE: &str = "phone";
pub const FAX: &str = "fax";
pub const URL: &str = "url";
pub const AFFILIATION: &str = "affiliation";

// Geometry. Shape records carry a `type` discriminator and a coordinate array.
pub const SHAPE: &str = "shape";
pub const SHAPE_TYPE: &str = "type";
pub const SHAPE_GEOMETRY: &str = "coordinates";

// Metadata.
pub const TERMS: &str = "terms";
pub const DATA_TYPE: &str = "data-type";
pub const DATA_KIND: &str = "data-kind";

// Graph.
pub const TERM: &str = "term";
pub const SUBJECT: &str = "subject";
pub const PREDICATE: &str = "predicate";
pub const OBJECT: &str = "object";

// Usage registry carried by every persisted entity.
pub const OBJECT_TAGS: &str = "object-tags";
pub const OBJECT_OFFSETS: &str = "object-offsets";

// Reference counts, one per referencing collection.
pub const TAG_COUNT: &str = "tag-count";
pub const TERM_COUNT: &str = "term-count";
pub const NODE_COUNT: &str = "node-count";
pub const EDGE_COUNT: &str = "edge-count";
pub const ENTITY_COUNT: &str = "entity-count";
pub const UNIT_COUNT: &str = "unit-count";

// Paths at which a tag is used, one per owning collection (on tag documents).
pub const TAG_OFFSETS: &str = "tag-offsets";
pub const TERM_OFFSETS: &str = "term-offsets";
pub const NODE_OFFSETS: &str = "node-offsets";
pub const EDGE_OFFSETS: &str = "edge-offsets";
pub const ENTITY_OFFSETS: &str = "entity-offsets";
pub const UNIT_OFFSETS: &str = "unit-offsets";

pub const REFERENCE_COUNTS: [&str; 6] = [
    TAG_COUNT,
    TERM_COUNT,
    NODE_COUNT,
    EDGE_COUNT,
    ENTITY_COUNT,
    UNIT_COUNT,
];

pub const OFFSET_REGISTRIES: [&str; 6] = [
    TAG_OFFSETS,
    TERM_OFFSETS,
    NODE_OFFSETS,
    EDGE_OFFSETS,
    ENTITY_OFFSETS,
    UNIT_OFFSETS,
];

/// Offsets excluded from traversal accounting: they exist on the entity but
/// never show up in its tag/offset registry.
pub fn is_internal(tag: &str) -> bool {
    tag == NID
        || tag == OBJECT_TAGS
        || tag == OBJECT_OFFSETS
        || REFERENCE_COUNTS.contains(&tag)
        || OFFSET_REGISTRIES.contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookkeeping_offsets_are_internal() {
        assert!(is_internal(NID));
        assert!(is_internal(OBJECT_TAGS));
        assert!(is_internal(OBJECT_OFFSETS));
        assert!(is_internal(UNIT_COUNT));
        assert!(is_internal(TERM_OFFSETS));
    }

    #[test]
    fn data_offsets_are_not_internal() {
        assert!(!is_internal(LABEL));
        assert!(!is_internal(EMAIL));
        assert!(!is_internal("100"));
    }
}

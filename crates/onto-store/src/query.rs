//! Match filters, result shapes and index specifications.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use onto_types::{tags, Document, NativeId, Value};

/// A document selector.
///
/// Offset names may be dotted paths; a path step over a list matches if any
/// element matches, and an equality test against a list matches if the list
/// contains the value.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    /// Native identifier equals.
    Id(NativeId),
    /// Offset value is one of the given identifiers.
    In { offset: String, ids: Vec<NativeId> },
    Eq { offset: String, value: Value },
    Exists(String),
    And(Vec<Filter>),
}

impl Filter {
    pub fn id(id: impl Into<NativeId>) -> Self {
        Filter::Id(id.into())
    }

    pub fn eq(offset: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            offset: offset.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => doc.get(tags::NID) == Some(&id.to_value()),
            Filter::In { offset, ids } => {
                let wanted: Vec<Value> = ids.iter().map(NativeId::to_value).collect();
                lookup(doc, offset).iter().any(|v| wanted.contains(v))
            }
            Filter::Eq { offset, value } => lookup(doc, offset).iter().any(|v| {
                *v == value || v.as_list().is_some_and(|items| items.contains(value))
            }),
            Filter::Exists(offset) => !lookup(doc, offset).is_empty(),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "*"),
            Filter::Id(id) => write!(f, "{}={id}", tags::NID),
            Filter::In { offset, ids } => write!(f, "{offset} in {} ids", ids.len()),
            Filter::Eq { offset, value } => write!(f, "{offset}={value:?}"),
            Filter::Exists(offset) => write!(f, "{offset} exists"),
            Filter::And(filters) => {
                let parts: Vec<String> = filters.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join(" and "))
            }
        }
    }
}

/// Resolve a dotted offset path to every value it reaches.
pub fn lookup<'d>(doc: &'d Document, path: &str) -> Vec<&'d Value> {
    let mut steps = path.split('.');
    let Some(first) = steps.next() else {
        return Vec::new();
    };
    let mut current: Vec<&Value> = doc.get(first).into_iter().collect();
    for step in steps {
        let mut next = Vec::new();
        for value in current {
            descend(value, step, &mut next);
        }
        current = next;
    }
    current
}

fn descend<'d>(value: &'d Value, step: &str, out: &mut Vec<&'d Value>) {
    match value {
        Value::Map(map) => out.extend(map.get(step)),
        Value::List(items) => {
            for item in items {
                descend(item, step, out);
            }
        }
        _ => {}
    }
}

/// What a match returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultShape {
    Document,
    Identifier,
    Count,
}

/// One match result, in the requested shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Matched {
    Document(Document),
    Identifier(NativeId),
    Count(usize),
}

impl Matched {
    pub fn into_document(self) -> Option<Document> {
        match self {
            Matched::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_identifier(self) -> Option<NativeId> {
        match self {
            Matched::Identifier(id) => Some(id),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            Matched::Count(n) => Some(*n),
            _ => None,
        }
    }
}

/// A secondary index over one or more offset paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<String>,
    /// Only documents carrying the indexed offsets are indexed.
    pub sparse: bool,
}

impl IndexSpec {
    /// A sparse index on a single offset path.
    pub fn sparse(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("idx:{path}"),
            keys: vec![path],
            sparse: true,
        }
    }
}

/// Total order over values used for sorted matches.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Map(_) => 5,
            Value::Object(_) => 6,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onto_types::document_from_json;
    use serde_json::json;

    fn doc() -> Document {
        document_from_json(json!({
            "_id": "u1",
            "name": "Sample",
            "tags": ["a", "b"],
            "nested": [{"x": 1}, {"x": 2, "y": {"z": "deep"}}]
        }))
        .unwrap()
    }

    #[test]
    fn id_filter() {
        assert!(Filter::id("u1").matches(&doc()));
        assert!(!Filter::id("u2").matches(&doc()));
        assert!(!Filter::id(1).matches(&doc()));
    }

    #[test]
    fn eq_matches_list_members() {
        assert!(Filter::eq("tags", "a").matches(&doc()));
        assert!(!Filter::eq("tags", "c").matches(&doc()));
        assert!(Filter::eq("name", "Sample").matches(&doc()));
    }

    #[test]
    fn dotted_paths_descend_lists() {
        let d = doc();
        assert_eq!(lookup(&d, "nested.x").len(), 2);
        assert_eq!(lookup(&d, "nested.y.z"), vec![&Value::from("deep")]);
        assert!(Filter::Exists("nested.y.z".into()).matches(&d));
        assert!(!Filter::Exists("nested.q".into()).matches(&d));
    }

    #[test]
    fn in_filter_and_conjunction() {
        let d = doc();
        let f = Filter::And(vec![
            Filter::In {
                offset: tags::NID.into(),
                ids: vec!["x".into(), "u1".into()],
            },
            Filter::eq("name", "Sample"),
        ]);
        assert!(f.matches(&d));
    }

    #[test]
    fn value_ordering() {
        assert_eq!(compare_values(&Value::Int(1), &Value::Float(1.5)), Ordering::Less);
        assert_eq!(compare_values(&"b".into(), &"a".into()), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &Value::Int(0)), Ordering::Less);
    }
}

//! The offset accessor protocol.
//!
//! Generic read/write/delete operations over the four shapes of nested
//! property: scalar, unordered value set, keyed map, and element lists
//! (records of `{discriminator, data}`). Every accessor removes the offset
//! once its collection empties, so no empty containers are ever persisted.
//!
//! The [`Report`] argument selects whether the value before or after the
//! mutation is returned.

use std::collections::BTreeMap;

use crate::error::{AccessError, AccessResult};
use crate::value::{Document, Value};

/// Retrieve, delete, or set the addressed value.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Retrieve,
    Delete,
    Set(Value),
}

/// Which state an accessor returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Report {
    /// The value before the operation.
    Before,
    /// The value after the operation.
    #[default]
    After,
}

/// Operation of the set accessor on one element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOp {
    Match,
    Add,
    Remove,
}

/// Operation of the element-list accessor.
///
/// `Retrieve`, `Delete` and `Replace` act on the whole matched record;
/// the `*Item` variants act on single items of the record's data list.
#[derive(Clone, Debug, PartialEq)]
pub enum ListOp {
    Retrieve,
    Delete,
    Replace(Vec<Value>),
    MatchItem(Value),
    AddItem(Value),
    RemoveItem(Value),
}

/// Field names of an element record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordKeys<'a> {
    pub discriminator: &'a str,
    pub data: &'a str,
}

impl<'a> RecordKeys<'a> {
    pub fn new(discriminator: &'a str, data: &'a str) -> Self {
        Self {
            discriminator,
            data,
        }
    }
}

fn report(report: Report, before: Option<Value>, after: Option<Value>) -> Option<Value> {
    match report {
        Report::Before => before,
        Report::After => after,
    }
}

fn mismatch(tag: &str, expected: &'static str, found: &Value) -> AccessError {
    AccessError::TypeMismatch {
        tag: tag.to_string(),
        expected,
        found: found.type_name(),
    }
}

// ---------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------

/// Get, set, or unset one offset.
pub fn manage_offset(doc: &mut Document, tag: &str, op: Op, mode: Report) -> Option<Value> {
    match op {
        Op::Retrieve => doc.get(tag).cloned(),
        Op::Delete => {
            let old = doc.remove(tag);
            report(mode, old, None)
        }
        Op::Set(value) => {
            let old = doc.insert(tag.to_string(), value.clone());
            report(mode, old, Some(value))
        }
    }
}

// ---------------------------------------------------------------
// Value set
// ---------------------------------------------------------------

/// Treat the offset as an unordered collection of values.
///
/// Adding a value already present is a no-op returning the existing value;
/// removing a value that is not present returns `None`.
pub fn manage_set(
    doc: &mut Document,
    tag: &str,
    value: Value,
    op: SetOp,
    mode: Report,
) -> AccessResult<Option<Value>> {
    let Some(existing) = doc.get_mut(tag) else {
        return Ok(match op {
            SetOp::Match | SetOp::Remove => None,
            SetOp::Add => {
                doc.insert(tag.to_string(), Value::List(vec![value.clone()]));
                report(mode, None, Some(value))
            }
        });
    };
    let items = match existing {
        Value::List(items) => items,
        other => return Err(mismatch(tag, "list", other)),
    };

    let position = items.iter().position(|v| v == &value);
    let result = match (op, position) {
        (SetOp::Match, found) => found.map(|i| items[i].clone()),
        (SetOp::Add, Some(i)) => Some(items[i].clone()),
        (SetOp::Add, None) => {
            items.push(value.clone());
            report(mode, None, Some(value))
        }
        (SetOp::Remove, None) => None,
        (SetOp::Remove, Some(i)) => {
            let removed = items.remove(i);
            if items.is_empty() {
                doc.remove(tag);
            }
            report(mode, Some(removed), None)
        }
    };
    Ok(result)
}

// ---------------------------------------------------------------
// Keyed map
// ---------------------------------------------------------------

/// Treat the offset as a keyed map.
pub fn manage_map(
    doc: &mut Document,
    tag: &str,
    key: &str,
    op: Op,
    mode: Report,
) -> AccessResult<Option<Value>> {
    let Some(existing) = doc.get_mut(tag) else {
        return Ok(match op {
            Op::Retrieve | Op::Delete => None,
            Op::Set(value) => {
                let mut map = BTreeMap::new();
                map.insert(key.to_string(), value.clone());
                doc.insert(tag.to_string(), Value::Map(map));
                report(mode, None, Some(value))
            }
        });
    };
    let map = match existing {
        Value::Map(map) => map,
        other => return Err(mismatch(tag, "map", other)),
    };

    let result = match op {
        Op::Retrieve => map.get(key).cloned(),
        Op::Delete => {
            let old = map.remove(key);
            if map.is_empty() {
                doc.remove(tag);
            }
            report(mode, old, None)
        }
        Op::Set(value) => {
            let old = map.insert(key.to_string(), value.clone());
            report(mode, old, Some(value))
        }
    };
    Ok(result)
}

// ---------------------------------------------------------------
// Element records
// ---------------------------------------------------------------

/// Borrow the offset as a list of records, failing on any other shape.
fn records_mut<'d>(doc: &'d mut Document, tag: &str) -> AccessResult<Option<&'d mut Vec<Value>>> {
    match doc.get_mut(tag) {
        None => Ok(None),
        Some(Value::List(items)) => {
            if let Some(bad) = items.iter().find(|v| !matches!(v, Value::Map(_))) {
                return Err(mismatch(tag, "record", bad));
            }
            Ok(Some(items))
        }
        Some(other) => Err(mismatch(tag, "list", other)),
    }
}

/// Records without a discriminator field match `None`.
fn find_record(records: &[Value], keys: RecordKeys<'_>, discriminator: Option<&Value>) -> Option<usize> {
    records.iter().position(|record| {
        let field = record.as_map().and_then(|m| m.get(keys.discriminator));
        field == discriminator
    })
}

fn new_record(keys: RecordKeys<'_>, discriminator: Option<&Value>, data: Value) -> Value {
    let mut map = BTreeMap::new();
    if let Some(d) = discriminator {
        map.insert(keys.discriminator.to_string(), d.clone());
    }
    map.insert(keys.data.to_string(), data);
    Value::Map(map)
}

fn record_data_mut<'r>(record: &'r mut Value, keys: RecordKeys<'_>) -> Option<&'r mut Value> {
    match record {
        Value::Map(map) => map.get_mut(keys.data),
        _ => None,
    }
}

/// Remove the record at `index`, dropping the offset if none remain.
fn remove_record(doc: &mut Document, tag: &str, index: usize, keys: RecordKeys<'_>) -> Option<Value> {
    let mut removed = None;
    let mut empty = false;
    if let Some(Value::List(records)) = doc.get_mut(tag) {
        removed = match records.remove(index) {
            Value::Map(mut map) => map.remove(keys.data),
            _ => None,
        };
        empty = records.is_empty();
    }
    if empty {
        doc.remove(tag);
    }
    removed
}

/// Treat the offset as a list of `{discriminator, data}` records, matching
/// one record by discriminator.
pub fn manage_element(
    doc: &mut Document,
    tag: &str,
    keys: RecordKeys<'_>,
    discriminator: Option<&Value>,
    op: Op,
    mode: Report,
) -> AccessResult<Option<Value>> {
    let Some(records) = records_mut(doc, tag)? else {
        return Ok(match op {
            Op::Retrieve | Op::Delete => None,
            Op::Set(value) => {
                let record = new_record(keys, discriminator, value.clone());
                doc.insert(tag.to_string(), Value::List(vec![record]));
                report(mode, None, Some(value))
            }
        });
    };

    let index = find_record(records, keys, discriminator);
    let result = match (op, index) {
        (Op::Retrieve, found) => {
            found.and_then(|i| records[i].as_map().and_then(|m| m.get(keys.data)).cloned())
        }
        (Op::Delete, None) => None,
        (Op::Delete, Some(i)) => {
            let old = remove_record(doc, tag, i, keys);
            report(mode, old, None)
        }
        (Op::Set(value), None) => {
            records.push(new_record(keys, discriminator, value.clone()));
            report(mode, None, Some(value))
        }
        (Op::Set(value), Some(i)) => {
            let old = match &mut records[i] {
                Value::Map(map) => map.insert(keys.data.to_string(), value.clone()),
                _ => None,
            };
            report(mode, old, Some(value))
        }
    };
    Ok(result)
}

/// Treat the offset as a list of `{discriminator, data[]}` records.
///
/// Whole records can be retrieved, replaced or deleted; single items of the
/// matched record's data list can be matched, added or removed. Emptying the
/// data list removes the record, and removing the last record removes the
/// offset.
pub fn manage_element_list(
    doc: &mut Document,
    tag: &str,
    keys: RecordKeys<'_>,
    discriminator: Option<&Value>,
    op: ListOp,
    mode: Report,
) -> AccessResult<Option<Value>> {
    let Some(records) = records_mut(doc, tag)? else {
        return Ok(match op {
            ListOp::Retrieve | ListOp::Delete | ListOp::MatchItem(_) | ListOp::RemoveItem(_) => {
                None
            }
            ListOp::Replace(items) if items.is_empty() => None,
            ListOp::Replace(items) => {
                let list = Value::List(items);
                let record = new_record(keys, discriminator, list.clone());
                doc.insert(tag.to_string(), Value::List(vec![record]));
                report(mode, None, Some(list))
            }
            ListOp::AddItem(item) => {
                let record = new_record(keys, discriminator, Value::List(vec![item.clone()]));
                doc.insert(tag.to_string(), Value::List(vec![record]));
                report(mode, None, Some(item))
            }
        });
    };

    let index = find_record(records, keys, discriminator);
    if let Some(i) = index {
        match records[i].as_map().and_then(|m| m.get(keys.data)) {
            Some(Value::List(_)) => {}
            Some(other) => return Err(mismatch(tag, "list", other)),
            None => return Err(mismatch(tag, "list", &Value::Null)),
        }
    }

    let result = match (op, index) {
        (ListOp::Retrieve, found) => {
            found.and_then(|i| records[i].as_map().and_then(|m| m.get(keys.data)).cloned())
        }
        (ListOp::Delete, None) => None,
        (ListOp::Delete, Some(i)) => {
            let old = remove_record(doc, tag, i, keys);
            report(mode, old, None)
        }
        (ListOp::Replace(items), None) => {
            if items.is_empty() {
                None
            } else {
                let list = Value::List(items);
                records.push(new_record(keys, discriminator, list.clone()));
                report(mode, None, Some(list))
            }
        }
        (ListOp::Replace(items), Some(i)) => {
            if items.is_empty() {
                let old = remove_record(doc, tag, i, keys);
                report(mode, old, None)
            } else {
                let list = Value::List(items);
                let old = record_data_mut(&mut records[i], keys)
                    .map(|data| std::mem::replace(data, list.clone()));
                report(mode, old, Some(list))
            }
        }
        (ListOp::MatchItem(_), None) | (ListOp::RemoveItem(_), None) => None,
        (ListOp::MatchItem(item), Some(i)) => match record_data_mut(&mut records[i], keys) {
            Some(Value::List(data)) => data.iter().find(|v| **v == item).cloned(),
            _ => None,
        },
        (ListOp::AddItem(item), None) => {
            records.push(new_record(keys, discriminator, Value::List(vec![item.clone()])));
            report(mode, None, Some(item))
        }
        (ListOp::AddItem(item), Some(i)) => match record_data_mut(&mut records[i], keys) {
            Some(Value::List(data)) => match data.iter().find(|v| **v == item) {
                Some(existing) => Some(existing.clone()),
                None => {
                    data.push(item.clone());
                    report(mode, None, Some(item))
                }
            },
            _ => None,
        },
        (ListOp::RemoveItem(item), Some(i)) => {
            let (removed, now_empty) = match record_data_mut(&mut records[i], keys) {
                Some(Value::List(data)) => match data.iter().position(|v| *v == item) {
                    Some(p) => (Some(data.remove(p)), data.is_empty()),
                    None => (None, false),
                },
                _ => (None, false),
            };
            if now_empty {
                remove_record(doc, tag, i, keys);
            }
            match removed {
                Some(old) => report(mode, Some(old), None),
                None => None,
            }
        }
    };
    Ok(result)
}

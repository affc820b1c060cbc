//! Value verification and casting against a declared data type.
//!
//! Every function returns `Ok(None)` when the value already has its declared
//! form and `Ok(Some(cast))` when the traversal must replace it.

use onto_types::{tags, DataType, Value};

use crate::error::{EngineError, EngineResult};

fn invalid(path: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidValue {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn changed(original: &Value, cast: Value) -> Option<Value> {
    if *original == cast {
        None
    } else {
        Some(cast)
    }
}

/// Cast a scalar value to a primitive data type.
pub fn cast_scalar(value: &Value, data_type: DataType, path: &str) -> EngineResult<Option<Value>> {
    let cast = match data_type {
        DataType::Mixed => return Ok(None),
        DataType::String | DataType::Url | DataType::Date | DataType::Enum => {
            Value::String(to_text(value, path)?)
        }
        DataType::Int => Value::Int(to_int(value, path)?),
        DataType::Float => Value::Float(to_float(value, path)?),
        DataType::Bool => Value::Bool(to_bool(value, path)?),
        other => return Err(invalid(path, format!("{other} is not a scalar type"))),
    };
    Ok(changed(value, cast))
}

fn to_text(value: &Value, path: &str) -> EngineResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(x) => Ok(x.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid(path, format!("cannot cast {} to string", other.type_name()))),
    }
}

fn to_int(value: &Value, path: &str) -> EngineResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(x) => {
            integral(*x).ok_or_else(|| invalid(path, format!("{x} is not an integer in range")))
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .ok_or_else(|| invalid(path, format!("{s:?} is not an integer")))
        }
        other => Err(invalid(path, format!("cannot cast {} to int", other.type_name()))),
    }
}

/// An integral float that fits in `i64`.
fn integral(x: f64) -> Option<i64> {
    (x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64).then_some(x as i64)
}

fn to_float(value: &Value, path: &str) -> EngineResult<f64> {
    match value {
        Value::Float(x) => Ok(*x),
        Value::Int(i) => Ok(*i as f64),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(path, format!("{s:?} is not a number"))),
        other => Err(invalid(path, format!("cannot cast {} to float", other.type_name()))),
    }
}

fn to_bool(value: &Value, path: &str) -> EngineResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(0) => Ok(false),
        Value::Int(1) => Ok(true),
        Value::String(s) => match s.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(invalid(path, format!("{other:?} is not a boolean"))),
        },
        other => Err(invalid(path, format!("cannot cast {} to boolean", other.type_name()))),
    }
}

/// Verify and cast an array-shaped value.
pub fn cast_composite(
    value: &Value,
    data_type: DataType,
    path: &str,
) -> EngineResult<Option<Value>> {
    if !value.is_array_like() {
        return Err(invalid(
            path,
            format!("{data_type} requires a list or map, found {}", value.type_name()),
        ));
    }
    match data_type {
        DataType::Set => cast_set(value, path),
        DataType::LanguageStrings => cast_language_strings(value, path),
        DataType::TypedList => verify_records(value, path).map(|_| None),
        DataType::Shape => verify_shape(value, path).map(|_| None),
        _ => Ok(None),
    }
}

fn items(value: &Value) -> Vec<&Value> {
    match value {
        Value::List(items) => items.iter().collect(),
        Value::Map(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

fn cast_set(value: &Value, path: &str) -> EngineResult<Option<Value>> {
    let mut members: Vec<Value> = Vec::new();
    for item in items(value) {
        let member = Value::String(to_text(item, path)?);
        if !members.contains(&member) {
            members.push(member);
        }
    }
    Ok(changed(value, Value::List(members)))
}

fn cast_language_strings(value: &Value, path: &str) -> EngineResult<Option<Value>> {
    let Value::List(records) = value else {
        return Err(invalid(path, "language strings must be a list of records"));
    };
    let mut cast = Vec::with_capacity(records.len());
    for record in records {
        let Value::Map(record) = record else {
            return Err(invalid(path, "language string entry is not a record"));
        };
        let text = record.get(tags::TEXT).ok_or_else(|| EngineError::MissingField {
            path: path.to_string(),
            field: tags::TEXT,
        })?;
        let mut entry = record.clone();
        entry.insert(tags::TEXT.into(), Value::String(to_text(text, path)?));
        if let Some(lang) = record.get(tags::LANGUAGE) {
            entry.insert(tags::LANGUAGE.into(), Value::String(to_text(lang, path)?));
        }
        cast.push(Value::Map(entry));
    }
    Ok(changed(value, Value::List(cast)))
}

fn verify_records(value: &Value, path: &str) -> EngineResult<()> {
    for item in items(value) {
        if !matches!(item, Value::Map(_)) {
            return Err(invalid(
                path,
                format!("typed list entry must be a record, found {}", item.type_name()),
            ));
        }
    }
    Ok(())
}

fn verify_shape(value: &Value, path: &str) -> EngineResult<()> {
    let Value::Map(shape) = value else {
        return Err(invalid(path, "shape must be a record"));
    };
    if !shape.contains_key(tags::SHAPE_TYPE) {
        return Err(invalid(path, "shape has no geometry type"));
    }
    match shape.get(tags::SHAPE_GEOMETRY) {
        Some(Value::List(_)) => Ok(()),
        Some(other) => Err(invalid(
            path,
            format!("shape geometry must be a list, found {}", other.type_name()),
        )),
        None => Err(invalid(path, "shape has no geometry")),
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::value::Value;

/// Native identifier of a stored document.
///
/// Node collections key their documents by integer; every other collection
/// uses string identifiers.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NativeId {
    Int(i64),
    Str(String),
}

impl NativeId {
    /// Read an identifier from a value that already has identifier shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(NativeId::Int(*i)),
            Value::String(s) => Some(NativeId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            NativeId::Int(i) => Value::Int(*i),
            NativeId::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn id_type(&self) -> IdType {
        match self {
            NativeId::Int(_) => IdType::Int,
            NativeId::Str(_) => IdType::Str,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NativeId::Int(i) => Some(*i),
            NativeId::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeId::Str(s) => Some(s),
            NativeId::Int(_) => None,
        }
    }
}

impl fmt::Debug for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeId::Int(i) => write!(f, "NativeId({i})"),
            NativeId::Str(s) => write!(f, "NativeId({s:?})"),
        }
    }
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeId::Int(i) => write!(f, "{i}"),
            NativeId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for NativeId {
    fn from(i: i64) -> Self {
        NativeId::Int(i)
    }
}

impl From<i32> for NativeId {
    fn from(i: i32) -> Self {
        NativeId::Int(i64::from(i))
    }
}

impl From<&str> for NativeId {
    fn from(s: &str) -> Self {
        NativeId::Str(s.to_string())
    }
}

impl From<String> for NativeId {
    fn from(s: String) -> Self {
        NativeId::Str(s)
    }
}

/// The identifier type a collection keys its documents by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    Int,
    Str,
}

impl IdType {
    /// Cast a scalar value to this identifier type.
    ///
    /// Strings accept ints and floats (rendered in decimal); ints accept
    /// numeric strings and integral floats.
    pub fn cast(&self, value: &Value) -> Result<NativeId, TypeError> {
        match (self, value) {
            (IdType::Str, Value::String(s)) => Ok(NativeId::Str(s.clone())),
            (IdType::Str, Value::Int(i)) => Ok(NativeId::Str(i.to_string())),
            (IdType::Str, Value::Float(x)) => Ok(NativeId::Str(x.to_string())),
            (IdType::Int, Value::Int(i)) => Ok(NativeId::Int(*i)),
            (IdType::Int, Value::String(s)) => {
                s.trim().parse::<i64>().map(NativeId::Int).map_err(|_| TypeError::Cast {
                    expected: "int identifier",
                    found: "string",
                })
            }
            (IdType::Int, Value::Float(x))
                if x.fract() == 0.0 && *x >= i64::MIN as f64 && *x < i64::MAX as f64 =>
            {
                Ok(NativeId::Int(*x as i64))
            }
            (IdType::Int, other) => Err(TypeError::Cast {
                expected: "int identifier",
                found: other.type_name(),
            }),
            (IdType::Str, other) => Err(TypeError::Cast {
                expected: "string identifier",
                found: other.type_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrip() {
        let id = NativeId::from("term:1");
        assert_eq!(NativeId::from_value(&id.to_value()), Some(id));
        let id = NativeId::from(42);
        assert_eq!(NativeId::from_value(&id.to_value()), Some(id));
    }

    #[test]
    fn non_scalar_values_are_not_identifiers() {
        assert_eq!(NativeId::from_value(&Value::List(vec![])), None);
        assert_eq!(NativeId::from_value(&Value::Float(1.5)), None);
    }

    #[test]
    fn cast_to_string_identifier() {
        assert_eq!(IdType::Str.cast(&Value::Int(7)), Ok(NativeId::from("7")));
        assert_eq!(IdType::Str.cast(&"x".into()), Ok(NativeId::from("x")));
        assert!(IdType::Str.cast(&Value::Bool(true)).is_err());
    }

    #[test]
    fn cast_to_int_identifier() {
        assert_eq!(IdType::Int.cast(&" 12 ".into()), Ok(NativeId::Int(12)));
        assert_eq!(IdType::Int.cast(&Value::Float(3.0)), Ok(NativeId::Int(3)));
        assert!(IdType::Int.cast(&Value::Float(3.5)).is_err());
        assert!(IdType::Int.cast(&Value::Float(1e300)).is_err());
        assert!(IdType::Int.cast(&"abc".into()).is_err());
    }

    #[test]
    fn display_is_bare() {
        assert_eq!(NativeId::from(5).to_string(), "5");
        assert_eq!(NativeId::from("abc").to_string(), "abc");
    }

    #[test]
    fn serde_roundtrip() {
        let ids = vec![NativeId::from(3), NativeId::from("a")];
        let json = serde_json::to_string(&ids).unwrap();
        assert_eq!(json, r#"[3,"a"]"#);
        let parsed: Vec<NativeId> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ids);
    }
}

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};
use crate::core::{DbError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    /// Only produced by condition values (`in` / `not in` operands).
    List(Vec<Value>),
}

impl Value {
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            // ========================================
            // NULL handling: NULL is "greater" than all values (NULL LAST)
            // ========================================
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Greater),
            (_, Value::Null) => Ok(Ordering::Less),

            // ========================================
            // Same type comparisons
            // ========================================
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(compare_floats(*a, *b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),

            // ========================================
            // Mixed numeric types (implicit coercion)
            // ========================================
            (Value::Integer(a), Value::Float(b)) => Ok(compare_floats(*a as f64, *b)),
            (Value::Float(a), Value::Integer(b)) => Ok(compare_floats(*a, *b as f64)),

            _ => Err(DbError::TypeMismatch(format!(
                "Cannot compare incompatible types: {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::List(_) => "LIST",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts a value to the representation a column of `data_type` stores.
    ///
    /// Text input is parsed, so condition literals written as strings
    /// (`"42"`, `"true"`) land as the field's declared type.
    pub fn cast_to(&self, data_type: &DataType) -> Result<Value> {
        let mismatch = || {
            DbError::TypeMismatch(format!("Cannot cast {} '{}' to {}", self.type_name(), self, data_type))
        };

        match (self, data_type) {
            (Self::Null, _) => Ok(Self::Null),
            (Self::List(items), _) => items
                .iter()
                .map(|item| item.cast_to(data_type))
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            (value, target) if target.is_compatible(value) => match (value, target) {
                (Self::Integer(i), DataType::Float) => Ok(Self::Float(*i as f64)),
                _ => Ok(value.clone()),
            },
            (value, DataType::Text) => Ok(Self::Text(value.to_string())),
            (Self::Float(_), DataType::Integer) => self.as_i64().map(Self::Integer).ok_or_else(mismatch),
            (Self::Integer(i), DataType::Boolean) => match i {
                0 => Ok(Self::Boolean(false)),
                1 => Ok(Self::Boolean(true)),
                _ => Err(mismatch()),
            },
            (Self::Text(s), target) => {
                let parsed: serde_json::Value = serde_json::from_str(s.trim()).map_err(|_| mismatch())?;
                let parsed = Self::from_json(parsed);
                if parsed.is_null() || matches!(parsed, Self::Text(_)) {
                    return Err(mismatch());
                }
                parsed.cast_to(target)
            }
            _ => Err(mismatch()),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            // nested documents are stored as their JSON text
            other @ serde_json::Value::Object(_) => Self::Text(other.to_string()),
        }
    }
}

fn compare_floats(a: f64, b: f64) -> Ordering {
    // NaN is considered equal to NaN, greater than all other values
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                (a - b).abs() < f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                (*i as f64 - f).abs() < f64::EPSILON
            }
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (Self::List(_), _) | (_, Self::List(_)) => None,
            _ => self.compare(other).ok(),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Self::Text(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Self::Boolean(b) => {
                4u8.hash(state);
                b.hash(state);
            }
            Self::List(items) => {
                5u8.hash(state);
                items.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Float, Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

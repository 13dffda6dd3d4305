use rustc_hash::FxHashMap;
use strum_macros::Display;

use crate::diagnostics::{BuildError, ResultExt};

/// Discriminant of a [`Value`], used in type assertions and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ValueType {
    Integer,
    String,
    List,
    ScopedEnum,
    Dictionary,
    None,
}

/// The runtime datum produced by evaluating a Buildfile expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    String(String),
    List(Vec<Value>),
    ScopedEnum { scope: String, name: String },
    Dictionary(Dictionary),
    None,
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::ScopedEnum { .. } => ValueType::ScopedEnum,
            Value::Dictionary(_) => ValueType::Dictionary,
            Value::None => ValueType::None,
        }
    }

    pub fn assert_type(&self, expected: ValueType) -> Result<(), BuildError> {
        if self.value_type() == expected {
            Ok(())
        } else {
            Err(BuildError::type_error(format!(
                "Expected type '{expected}' but found '{}'",
                self.value_type()
            )))
        }
    }

    pub fn assert_types(pairs: &[(&Value, ValueType)]) -> Result<(), BuildError> {
        for (value, expected) in pairs {
            value.assert_type(*expected)?;
        }
        Ok(())
    }

    pub fn as_string(&self) -> Result<&str, BuildError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(type_mismatch(ValueType::String, other)),
        }
    }

    pub fn as_integer(&self) -> Result<i64, BuildError> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(type_mismatch(ValueType::Integer, other)),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], BuildError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(type_mismatch(ValueType::List, other)),
        }
    }

    pub fn as_dictionary(&self) -> Result<&Dictionary, BuildError> {
        match self {
            Value::Dictionary(dict) => Ok(dict),
            other => Err(type_mismatch(ValueType::Dictionary, other)),
        }
    }

    pub fn as_scoped_enum(&self) -> Result<(&str, &str), BuildError> {
        match self {
            Value::ScopedEnum { scope, name } => Ok((scope, name)),
            other => Err(type_mismatch(ValueType::ScopedEnum, other)),
        }
    }

    /// The `+=` of the Buildfile language: concatenation for strings and
    /// lists, addition for integers, a type error for everything else.
    pub fn add_assign(&mut self, other: Value) -> Result<(), BuildError> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => {
                *a += b;
                Ok(())
            }
            (Value::String(a), Value::String(b)) => {
                a.push_str(&b);
                Ok(())
            }
            (Value::List(a), Value::List(mut b)) => {
                a.append(&mut b);
                Ok(())
            }
            (lhs, rhs) => Err(BuildError::type_error(format!(
                "Cannot add values of types '{}' and '{}'",
                lhs.value_type(),
                rhs.value_type()
            ))),
        }
    }
}

fn type_mismatch(expected: ValueType, found: &Value) -> BuildError {
    BuildError::type_error(format!(
        "Expected type '{expected}' but found '{}'",
        found.value_type()
    ))
}

/// An unordered string-keyed map of [`Value`]s. Duplicate inserts overwrite.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: FxHashMap<String, Value>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Like [`Dictionary::get`], but a missing field is a `ValueError`.
    pub fn expect(&self, key: &str) -> Result<&Value, BuildError> {
        self.entries
            .get(key)
            .ok_or_else(|| BuildError::value(format!("Missing field '{key}'")))
    }

    /// Assert that every listed field is present with the expected type.
    /// Missing fields are `ValueError`s; shape mismatches are `TypeError`s
    /// nested under the offending field.
    pub fn assert_contains(&self, fields: &[(&str, ValueType)]) -> Result<(), BuildError> {
        for (field, expected) in fields {
            self.expect(field)?
                .assert_type(*expected)
                .during(format!("Checking field '{field}'"))?;
        }
        Ok(())
    }
}

/// Flatten a list of values into the underlying strings, asserting each
/// element along the way.
pub fn vectorise(values: &[Value]) -> Result<Vec<String>, BuildError> {
    values
        .iter()
        .map(|value| value.as_string().map(str::to_string))
        .collect()
}

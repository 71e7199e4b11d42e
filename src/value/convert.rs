//! Conversion of reconstructed values into Rust types

use std::collections::BTreeSet;

use super::types::{EmbeddedValue, EntityRef, Value};

/// Types a reconstructed argument can be converted into.
///
/// On mismatch the original value is handed back so the caller can report
/// what was actually found.
pub trait FromValue: Sized {
    /// Name of the expected shape, for error messages
    fn expected() -> String;

    fn from_value(value: Value) -> Result<Self, Value>;
}

impl FromValue for Value {
    fn expected() -> String {
        "Value".into()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn expected() -> String {
        "Bool".into()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other),
        }
    }
}

impl FromValue for i64 {
    fn expected() -> String {
        "Int".into()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(other),
        }
    }
}

impl FromValue for i32 {
    fn expected() -> String {
        "Int (i32)".into()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|_| Value::Int(i)),
            other => Err(other),
        }
    }
}

impl FromValue for String {
    fn expected() -> String {
        "Text".into()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FromValue for EntityRef {
    fn expected() -> String {
        "Entity".into()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Entity(e) => Ok(e),
            other => Err(other),
        }
    }
}

impl FromValue for EmbeddedValue {
    fn expected() -> String {
        "Embedded".into()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Embedded(e) => Ok(e),
            other => Err(other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn expected() -> String {
        format!("Option<{}>", T::expected())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Optional(None) => Ok(None),
            Value::Optional(Some(inner)) => T::from_value(*inner).map(Some),
            other => Err(other),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn expected() -> String {
        format!("Vec<{}>", T::expected())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        let items: Vec<Value> = match value {
            Value::List(items) | Value::Set(items) => items,
            Value::SortedSet(items) => items.into_iter().collect(),
            other => return Err(other),
        };
        items.into_iter().map(T::from_value).collect()
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn expected() -> String {
        format!("BTreeSet<{}>", T::expected())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        let items: Vec<Value> = match value {
            Value::List(items) | Value::Set(items) => items,
            Value::SortedSet(items) => items.into_iter().collect(),
            other => return Err(other),
        };
        items.into_iter().map(T::from_value).collect()
    }
}

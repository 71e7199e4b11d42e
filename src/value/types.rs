//! Row cell values
//!
//! A storage session returns rows as flat sequences of [`Value`]s. The same
//! type carries reconstructed arguments: optional wrappers, collections,
//! recomposed embeddables and nested projected objects.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One result row, one cell per plan selection
pub type Row = Vec<Value>;

/// Dynamically typed value.
///
/// Ordering is total (variant first, then content) so values can key sets and
/// sort deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// SQL-style null
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    /// Reference to a whole record
    Entity(EntityRef),
    /// Recomposed embedded value
    Embedded(EmbeddedValue),
    /// Reconstructed optional argument
    Optional(Option<Box<Value>>),
    /// Ordered collection
    List(Vec<Value>),
    /// De-duplicated collection in first-seen order
    Set(Vec<Value>),
    /// De-duplicated collection in natural order
    SortedSet(BTreeSet<Value>),
    /// Object produced by a nested constructor
    Object(ObjectValue),
}

impl Value {
    /// Present optional
    pub fn some(value: Value) -> Self {
        Value::Optional(Some(Box::new(value)))
    }

    /// Absent optional
    pub fn none() -> Self {
        Value::Optional(None)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Value::Optional(_))
    }

    /// Returns the variant name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Text(_) => "Text",
            Value::Entity(_) => "Entity",
            Value::Embedded(_) => "Embedded",
            Value::Optional(_) => "Optional",
            Value::List(_) => "List",
            Value::Set(_) => "Set",
            Value::SortedSet(_) => "SortedSet",
            Value::Object(_) => "Object",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_embedded(&self) -> Option<&EmbeddedValue> {
        match self {
            Value::Embedded(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<EntityRef> for Value {
    fn from(e: EntityRef) -> Self {
        Value::Entity(e)
    }
}

impl From<EmbeddedValue> for Value {
    fn from(e: EmbeddedValue) -> Self {
        Value::Embedded(e)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Entity(e) => write!(f, "{}#{}", e.entity, e.id),
            Value::Embedded(e) => write!(f, "{}{:?}", e.type_name, e.fields),
            Value::Optional(None) => write!(f, "None"),
            Value::Optional(Some(v)) => write!(f, "Some({})", v),
            Value::List(items) | Value::Set(items) => write!(f, "{:?}", items),
            Value::SortedSet(items) => write!(f, "{:?}", items),
            Value::Object(o) => write!(f, "{}{:?}", o.target, o.args),
        }
    }
}

/// Reference to a record: entity name plus identity value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef {
    pub entity: String,
    pub id: Box<Value>,
}

impl EntityRef {
    pub fn new(entity: impl Into<String>, id: impl Into<Value>) -> Self {
        Self {
            entity: entity.into(),
            id: Box::new(id.into()),
        }
    }
}

/// Embedded value built leaf by leaf
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmbeddedValue {
    pub type_name: String,
    pub fields: BTreeMap<String, Value>,
}

impl EmbeddedValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// True when no leaf carries a value
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Value::is_null)
    }
}

/// Result of a nested constructor.
///
/// The object itself is opaque; equality, ordering and hashing use the
/// constructor name and the argument tuple it was built from.
#[derive(Clone)]
pub struct ObjectValue {
    target: Arc<str>,
    args: Arc<[Value]>,
    object: Arc<dyn Any + Send + Sync>,
}

impl ObjectValue {
    pub fn new<T: Any + Send + Sync>(target: &str, args: Vec<Value>, object: T) -> Self {
        Self {
            target: Arc::from(target),
            args: Arc::from(args),
            object: Arc::new(object),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    fn key(&self) -> (&str, &[Value]) {
        (&self.target, &self.args)
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("target", &self.target)
            .field("args", &self.args)
            .finish()
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ObjectValue {}

impl PartialOrd for ObjectValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for ObjectValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_ordering_by_variant() {
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Int(5) < Value::Text("a".into()));
        assert!(Value::Int(1) < Value::Int(2));
    }

    #[test]
    fn test_embedded_is_empty() {
        let empty = EmbeddedValue::new("Address")
            .with("city", Value::Null)
            .with("street", Value::Null);
        assert!(empty.is_empty());

        let filled = empty.with("city", "Oulu");
        assert!(!filled.is_empty());
    }

    #[test]
    fn test_object_equality_uses_args() {
        let a = ObjectValue::new("Dept", vec![Value::from("R&D")], 1u8);
        let b = ObjectValue::new("Dept", vec![Value::from("R&D")], 2u8);
        let c = ObjectValue::new("Dept", vec![Value::from("Sales")], 1u8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<u8>(), Some(&1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::some(Value::Int(3)).to_string(), "Some(3)");
        assert_eq!(Value::none().to_string(), "None");
        assert_eq!(
            Value::Entity(EntityRef::new("Employee", 7)).to_string(),
            "Employee#7"
        );
    }
}

//! Attribute metadata
//!
//! Storage-side facts about a field: its value type, whether it may be
//! null, and whether it is a collection.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Storage type of an attribute (element type for collections)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    Text,
    /// Association to another entity type
    Entity(String),
    /// Structural value stored as several columns
    Embeddable(String),
}

impl ValueType {
    pub fn type_name(&self) -> String {
        match self {
            ValueType::Bool => "Bool".into(),
            ValueType::Int => "Int".into(),
            ValueType::Text => "Text".into(),
            ValueType::Entity(e) => e.clone(),
            ValueType::Embeddable(e) => e.clone(),
        }
    }
}

/// Collection kind of a plural attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Ordered, carries a positional index column
    List,
    Set,
    /// Unordered, duplicates allowed
    Bag,
}

/// Metadata for one attribute of an entity or embeddable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMeta {
    /// Filled in when the attribute is registered on its owner
    #[serde(default)]
    pub declaring_type: String,
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Singular attribute may be null
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub collection: Option<CollectionKind>,
}

impl AttributeMeta {
    pub fn basic(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            declaring_type: String::new(),
            name: name.into(),
            value_type,
            optional: false,
            collection: None,
        }
    }

    pub fn embedded(name: impl Into<String>, embeddable: impl Into<String>) -> Self {
        Self::basic(name, ValueType::Embeddable(embeddable.into()))
    }

    pub fn association(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::basic(name, ValueType::Entity(target.into()))
    }

    pub fn plural(name: impl Into<String>, element: ValueType, kind: CollectionKind) -> Self {
        Self {
            collection: Some(kind),
            ..Self::basic(name, element)
        }
    }

    /// Marks the attribute nullable
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    pub fn is_list(&self) -> bool {
        self.collection == Some(CollectionKind::List)
    }

    pub fn is_association(&self) -> bool {
        matches!(self.value_type, ValueType::Entity(_))
    }

    /// Singular embedded attribute
    pub fn is_embedded(&self) -> bool {
        !self.is_collection() && matches!(self.value_type, ValueType::Embeddable(_))
    }

    /// Name of the embeddable type of this attribute or of its elements
    pub fn embeddable(&self) -> Option<&str> {
        match &self.value_type {
            ValueType::Embeddable(e) => Some(e),
            _ => None,
        }
    }

    /// Target entity of an association
    pub fn target_entity(&self) -> Option<&str> {
        match &self.value_type {
            ValueType::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Required by storage: collections and embedded fields always are,
    /// other singular fields unless marked optional
    pub fn is_required(&self) -> bool {
        self.is_collection() || self.is_embedded() || !self.optional
    }
}

/// Shared handle to attribute metadata.
///
/// Identity is the declaring type plus the attribute name.
#[derive(Debug, Clone)]
pub struct Attribute(Arc<AttributeMeta>);

impl Attribute {
    pub fn new(meta: AttributeMeta) -> Self {
        Self(Arc::new(meta))
    }

    pub fn meta(&self) -> &AttributeMeta {
        &self.0
    }
}

impl Deref for Attribute {
    type Target = AttributeMeta;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.declaring_type == other.declaring_type && self.name == other.name
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.declaring_type.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

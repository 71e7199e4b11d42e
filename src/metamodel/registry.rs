//! Metamodel registry
//!
//! Holds the entity and embeddable types known to a storage session. Built
//! once at startup, read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use super::types::{Attribute, AttributeMeta};
use crate::errors::{QueryError, QueryResult};
use crate::value::{EmbeddedValue, Value};

/// Builds the value handed back for a recomposed embeddable.
///
/// Registered per embeddable type; the default keeps the
/// [`EmbeddedValue`] as is.
pub type EmbeddableFactory = Arc<dyn Fn(EmbeddedValue) -> Value + Send + Sync>;

/// An entity type: identity attribute plus named attributes
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    id_attribute: String,
    attributes: BTreeMap<String, Attribute>,
}

impl EntityType {
    /// Creates an entity type whose identity attribute is an `Int` named `id_attribute`
    pub fn new(name: impl Into<String>, id_attribute: impl Into<String>) -> Self {
        Self::with_id(
            name,
            AttributeMeta::basic(id_attribute, super::types::ValueType::Int),
        )
    }

    /// Creates an entity type with an explicit identity attribute
    pub fn with_id(name: impl Into<String>, id: AttributeMeta) -> Self {
        let id_name = id.name.clone();
        let entity = Self {
            name: name.into(),
            id_attribute: id_name,
            attributes: BTreeMap::new(),
        };
        entity.attribute(id)
    }

    /// Adds an attribute, stamping this type as its declaring type
    pub fn attribute(mut self, mut meta: AttributeMeta) -> Self {
        meta.declaring_type = self.name.clone();
        self.attributes
            .insert(meta.name.clone(), Attribute::new(meta));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_attribute(&self) -> &Attribute {
        // inserted by the constructor and never removed
        &self.attributes[&self.id_attribute]
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }
}

/// An embeddable type: attributes sorted by name plus its factory
#[derive(Clone)]
pub struct EmbeddableType {
    name: String,
    attributes: BTreeMap<String, Attribute>,
    factory: EmbeddableFactory,
}

impl EmbeddableType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            factory: Arc::new(Value::Embedded),
        }
    }

    pub fn attribute(mut self, mut meta: AttributeMeta) -> Self {
        meta.declaring_type = self.name.clone();
        self.attributes
            .insert(meta.name.clone(), Attribute::new(meta));
        self
    }

    /// Registers the function building the final value from its leaves
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(EmbeddedValue) -> Value + Send + Sync + 'static,
    {
        self.factory = Arc::new(factory);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in name order
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    fn build(&self, value: EmbeddedValue) -> Value {
        (self.factory)(value)
    }
}

impl fmt::Debug for EmbeddableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddableType")
            .field("name", &self.name)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Registry of entity and embeddable types
#[derive(Debug, Clone, Default)]
pub struct Metamodel {
    entities: BTreeMap<String, EntityType>,
    embeddables: BTreeMap<String, EmbeddableType>,
}

impl Metamodel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn with_embeddable(mut self, embeddable: EmbeddableType) -> Self {
        self.embeddables.insert(embeddable.name.clone(), embeddable);
        self
    }

    /// Loads entity and embeddable definitions from JSON.
    ///
    /// Embeddables loaded this way use the default factory.
    pub fn from_json(json: &str) -> QueryResult<Self> {
        let doc: MetamodelDoc =
            serde_json::from_str(json).map_err(|e| QueryError::InvalidConfig(e.to_string()))?;

        let mut metamodel = Metamodel::new();
        for e in doc.entities {
            let mut entity = EntityType::with_id(e.name, e.id);
            for a in e.attributes {
                entity = entity.attribute(a);
            }
            metamodel = metamodel.with_entity(entity);
        }
        for e in doc.embeddables {
            let mut embeddable = EmbeddableType::new(e.name);
            for a in e.attributes {
                embeddable = embeddable.attribute(a);
            }
            metamodel = metamodel.with_embeddable(embeddable);
        }
        Ok(metamodel)
    }

    pub fn entity(&self, name: &str) -> QueryResult<&EntityType> {
        self.entities
            .get(name)
            .ok_or_else(|| QueryError::UnknownEntity(name.to_string()))
    }

    pub fn embeddable(&self, name: &str) -> QueryResult<&EmbeddableType> {
        self.embeddables
            .get(name)
            .ok_or_else(|| QueryError::UnknownEmbeddable(name.to_string()))
    }

    /// Identity attribute of an entity type
    pub fn id_attribute(&self, entity: &str) -> QueryResult<Attribute> {
        Ok(self.entity(entity)?.id_attribute().clone())
    }

    /// Looks up an attribute on an entity or embeddable type
    pub fn attribute(&self, declaring: &str, name: &str) -> QueryResult<Attribute> {
        let found = match self.entities.get(declaring) {
            Some(entity) => entity.get(name),
            None => self.embeddable(declaring)?.get(name),
        };
        found.cloned().ok_or_else(|| QueryError::UnknownAttribute {
            declaring: declaring.to_string(),
            attribute: name.to_string(),
        })
    }

    /// Leaf paths of an embeddable, recursively, each level sorted by name
    pub fn leaf_paths(&self, embeddable: &str) -> QueryResult<Vec<Vec<String>>> {
        let mut out = Vec::new();
        self.collect_leaves(embeddable, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    fn collect_leaves(
        &self,
        embeddable: &str,
        prefix: &mut Vec<String>,
        out: &mut Vec<Vec<String>>,
    ) -> QueryResult<()> {
        for attr in self.embeddable(embeddable)?.attributes() {
            prefix.push(attr.name.clone());
            match attr.embeddable() {
                Some(nested) if attr.is_embedded() => self.collect_leaves(nested, prefix, out)?,
                _ => out.push(prefix.clone()),
            }
            prefix.pop();
        }
        Ok(())
    }

    /// Recomposes an embeddable from leaf values given in [`leaf_paths`] order.
    ///
    /// All-null leaves yield `Value::Null`; storage cannot tell a missing
    /// embeddable from one whose columns are all null.
    ///
    /// [`leaf_paths`]: Metamodel::leaf_paths
    pub fn compose_embedded(&self, embeddable: &str, leaves: Vec<Value>) -> QueryResult<Value> {
        let expected = self.leaf_paths(embeddable)?.len();
        if expected != leaves.len() {
            return Err(QueryError::InternalConsistency(format!(
                "Expected {} leaf values for {}, got {}",
                expected,
                embeddable,
                leaves.len()
            )));
        }
        if leaves.iter().all(Value::is_null) {
            return Ok(Value::Null);
        }
        let mut iter = leaves.into_iter();
        self.compose_level(embeddable, &mut iter)
    }

    fn compose_level(
        &self,
        embeddable: &str,
        leaves: &mut std::vec::IntoIter<Value>,
    ) -> QueryResult<Value> {
        let ty = self.embeddable(embeddable)?;
        let mut value = EmbeddedValue::new(embeddable);
        for attr in ty.attributes() {
            let v = match attr.embeddable() {
                Some(nested) if attr.is_embedded() => self.compose_level(nested, leaves)?,
                _ => leaves.next().ok_or_else(|| {
                    QueryError::InternalConsistency(format!("Ran out of leaves at {}", attr))
                })?,
            };
            value.fields.insert(attr.name.clone(), v);
        }
        Ok(ty.build(value))
    }

    /// Empty instance: every leaf null
    pub fn empty_embedded(&self, embeddable: &str) -> QueryResult<Value> {
        let count = self.leaf_paths(embeddable)?.len();
        let mut iter = vec![Value::Null; count].into_iter();
        self.compose_level(embeddable, &mut iter)
    }
}

#[derive(Deserialize)]
struct MetamodelDoc {
    #[serde(default)]
    entities: Vec<EntityDoc>,
    #[serde(default)]
    embeddables: Vec<EmbeddableDoc>,
}

#[derive(Deserialize)]
struct EntityDoc {
    name: String,
    id: AttributeMeta,
    #[serde(default)]
    attributes: Vec<AttributeMeta>,
}

#[derive(Deserialize)]
struct EmbeddableDoc {
    name: String,
    #[serde(default)]
    attributes: Vec<AttributeMeta>,
}

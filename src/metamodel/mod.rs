//! Storage metamodel
//!
//! Read-only description of entity types, their attributes and the
//! embeddable types stored inline. Field descriptors are built on top of the
//! attribute handles exposed here.

mod registry;
mod types;

pub use registry::{EmbeddableFactory, EmbeddableType, EntityType, Metamodel};
pub use types::{Attribute, AttributeMeta, CollectionKind, ValueType};

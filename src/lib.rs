//! querylens - typed field descriptors, query plan composition and row
//! projection for relational entity stores
//!
//! Declare [`Field`]s over a [`Metamodel`], combine them into
//! [`Constructor`]s and run any [`QueryPlan`] through a constructor with
//! [`ProjectionQueries`].

pub mod attributes;
pub mod bulk;
pub mod config;
pub mod errors;
pub mod execution;
pub mod metamodel;
pub mod plan;
pub mod projection;
pub mod session;
pub mod value;

pub use attributes::{Constructor, ConstructorBuilder, Field};
pub use config::{EmptyRelationPolicy, QueryConfig};
pub use errors::{QueryError, QueryResult};
pub use execution::{ProjectionQueries, QueryFactory};
pub use metamodel::Metamodel;
pub use plan::{FieldOrder, Page, QueryPlan};
pub use session::{MemoryStore, StorageSession};
pub use value::Value;

//! Storage sessions
//!
//! A session owns the metamodel and executes plans. The composition and
//! projection code only ever talks to this trait.

mod filters;
mod memory;

pub use filters::{BindingSorter, PredicateFilter};
pub use memory::{Binding, MemoryStore};

use crate::errors::QueryResult;
use crate::metamodel::Metamodel;
use crate::plan::{Page, QueryPlan};
use crate::value::Row;

/// Executes query plans against a store
pub trait StorageSession {
    fn metamodel(&self) -> &Metamodel;

    /// Runs `plan` and returns one row per result, one cell per selection
    fn execute(&self, plan: &QueryPlan, page: Page) -> QueryResult<Vec<Row>>;
}

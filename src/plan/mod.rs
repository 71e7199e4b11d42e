//! Query plans
//!
//! A [`QueryPlan`] is the store-agnostic description of a query: roots,
//! joins, predicates, selection and ordering. The functions in this module
//! copy, re-anchor and augment plans; a [`StorageSession`] executes them.
//!
//! [`StorageSession`]: crate::session::StorageSession

mod ast;
mod compose;
mod page;
mod query;

pub use ast::{Expr, FieldOrder, JoinKind, Order, Predicate, Selection, SortDirection};
pub use compose::{
    add_list_ordering, apply_order, check_ordering, copy_without_projection, in_filter, in_values,
    resolve_selection, resolve_selection_into,
};
pub use page::Page;
pub use query::{AllJoins, QueryPlan, ScopeId, ScopeKind, ScopeNode};

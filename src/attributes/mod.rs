//! Field descriptor model
//!
//! Typed handles over storage attributes ([`Field`]) and the projection
//! targets built from them ([`Constructor`]). Both are immutable once built
//! and can be shared freely across threads and queries.

mod constructor;
mod field;

pub use constructor::{Args, Constructor, ConstructorBuilder, NestedProjection, Param, ParamShape};
pub use field::{Field, JoinedField, PseudoField, RelationField, Substitute};

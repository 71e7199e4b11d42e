//! Query execution facade
//!
//! [`QueryFactory`] builds the common plan shapes; [`ProjectionQueries`]
//! runs any plan through a constructor against a storage session.

mod generation;
mod queries;

pub use generation::QueryFactory;
pub use queries::ProjectionQueries;

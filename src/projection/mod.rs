//! Projection
//!
//! [`prepare`] lays a constructor out as plan selections; [`reconstruct_rows`]
//! turns the rows a session returns back into constructed values.

mod builder;
mod reconstruct;

pub use builder::{prepare, PreparedProjection, Slot};
pub use reconstruct::{reconstruct_page, reconstruct_row, reconstruct_rows};

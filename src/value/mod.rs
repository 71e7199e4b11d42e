//! Value model
//!
//! Flat row cells coming back from a storage session and the reconstructed
//! arguments handed to projection constructors share one value type.

mod convert;
mod types;

pub use convert::FromValue;
pub use types::{EmbeddedValue, EntityRef, ObjectValue, Row, Value};

//! Bulk value-set binding

mod table_value;

pub use table_value::{
    ArrayBinding, ElementConverter, TableTypeRule, TableValueSupport, NUMBER_LIST_TYPE,
    TEXT_LIST_TYPE,
};

//! Membership Filter Tests
//!
//! Large value sets are split into bounded `IN` groups:
//! - No group exceeds the configured chunk size
//! - The groups together hold exactly the input values, in order
//! - An empty value set matches nothing
//! - Array binding replaces the groups when enabled and supported

use proptest::prelude::*;
use querylens::bulk::{TableTypeRule, TableValueSupport, NUMBER_LIST_TYPE, TEXT_LIST_TYPE};
use querylens::plan::{in_filter, in_values, Expr, Predicate, ScopeId};
use querylens::{QueryConfig, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn id_path() -> Expr {
    Expr::path(ScopeId::new(0), "id")
}

fn ints(n: usize) -> Vec<Value> {
    (0..n as i64).map(Value::Int).collect()
}

/// Group sizes of an `Or` of `In` predicates
fn group_sizes(predicate: &Predicate) -> Vec<usize> {
    match predicate {
        Predicate::Or(groups) => groups
            .iter()
            .map(|g| match g {
                Predicate::In(_, values) => values.len(),
                other => panic!("unexpected group {:?}", other),
            })
            .collect(),
        other => panic!("expected a disjunction, got {:?}", other),
    }
}

fn flatten(predicate: &Predicate) -> Vec<Value> {
    match predicate {
        Predicate::Or(groups) => groups
            .iter()
            .flat_map(|g| match g {
                Predicate::In(_, values) => values.clone(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Chunking Property Tests
// =============================================================================

proptest! {
    /// Groups are bounded and their union is the input
    #[test]
    fn test_chunks_bounded_and_complete(
        values in prop::collection::vec(any::<i64>(), 0..300),
        chunk in 1usize..50,
    ) {
        let values: Vec<Value> = values.into_iter().map(Value::Int).collect();
        let predicate = in_filter(&id_path(), &values, chunk);

        let sizes = group_sizes(&predicate);
        prop_assert!(sizes.iter().all(|s| *s >= 1 && *s <= chunk));
        prop_assert_eq!(sizes.len(), values.len().div_ceil(chunk));
        prop_assert_eq!(flatten(&predicate), values);
    }
}

/// Boundaries around the default chunk size
#[test]
fn test_default_chunk_boundaries() {
    let chunk = QueryConfig::default().in_chunk_size;
    assert_eq!(chunk, 1000);

    assert_eq!(group_sizes(&in_filter(&id_path(), &ints(1000), chunk)), vec![1000]);
    assert_eq!(
        group_sizes(&in_filter(&id_path(), &ints(1001), chunk)),
        vec![1000, 1]
    );
    assert_eq!(
        group_sizes(&in_filter(&id_path(), &ints(2500), chunk)),
        vec![1000, 1000, 500]
    );
}

/// No values yields the unsatisfiable empty disjunction
#[test]
fn test_empty_values_match_nothing() {
    let predicate = in_filter(&id_path(), &[], 1000);
    assert_eq!(predicate, Predicate::disjunction());
    assert!(group_sizes(&predicate).is_empty());
}

/// A zero chunk size still makes progress
#[test]
fn test_zero_chunk_size_treated_as_one() {
    assert_eq!(group_sizes(&in_filter(&id_path(), &ints(3), 0)), vec![1, 1, 1]);
}

// =============================================================================
// Array Binding Tests
// =============================================================================

fn binding_config() -> QueryConfig {
    QueryConfig {
        table_value_binding: true,
        ..QueryConfig::default()
    }
}

/// Enabled and supported: one array parameter
#[test]
fn test_binds_array_when_supported() {
    let bulk = TableValueSupport::new(true, true);
    match in_values(&id_path(), &ints(5000), &binding_config(), &bulk) {
        Predicate::InArray(expr, binding) => {
            assert_eq!(expr, id_path());
            assert_eq!(binding.type_name, NUMBER_LIST_TYPE);
            assert_eq!(binding.values.len(), 5000);
            assert!(binding.contains(&Value::Int(4999)));
        }
        other => panic!("expected an array binding, got {:?}", other),
    }

    let texts = vec![Value::from("a"), Value::from("b")];
    match in_values(&id_path(), &texts, &binding_config(), &bulk) {
        Predicate::InArray(_, binding) => assert_eq!(binding.type_name, TEXT_LIST_TYPE),
        other => panic!("expected an array binding, got {:?}", other),
    }
}

/// Disabled in either place, or unsupported values: chunked groups
#[test]
fn test_falls_back_to_chunks() {
    let values = ints(1500);

    let off = in_values(
        &id_path(),
        &values,
        &QueryConfig::default(),
        &TableValueSupport::new(true, true),
    );
    assert_eq!(group_sizes(&off), vec![1000, 500]);

    let unavailable = in_values(
        &id_path(),
        &values,
        &binding_config(),
        &TableValueSupport::new(true, false),
    );
    assert_eq!(group_sizes(&unavailable), vec![1000, 500]);

    // the first value decides the array type
    let flags = vec![Value::Bool(true), Value::Int(1)];
    let unsupported = in_values(
        &id_path(),
        &flags,
        &binding_config(),
        &TableValueSupport::new(true, true),
    );
    assert_eq!(group_sizes(&unsupported), vec![2]);
}

/// Registered rules take precedence over the built-in types
#[test]
fn test_registered_rule() {
    let bulk = TableValueSupport::new(true, true)
        .register(TableTypeRule::for_kind("Int", "APP.ID_LIST").descriptor("ids"));
    match in_values(&id_path(), &ints(3), &binding_config(), &bulk) {
        Predicate::InArray(_, binding) => {
            assert_eq!(binding.type_name, "APP.ID_LIST");
            assert_eq!(binding.descriptor.as_deref(), Some("ids"));
        }
        other => panic!("expected an array binding, got {:?}", other),
    }
}

//! Predicate filtering and ordering over bound scopes

use std::cmp::Ordering;

use super::memory::Binding;
use crate::plan::{Order, Predicate, SortDirection};

/// Evaluates plan predicates against a binding
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a binding matches all predicates
    pub fn matches(binding: &Binding<'_>, predicates: &[Predicate]) -> bool {
        predicates
            .iter()
            .all(|pred| Self::matches_predicate(binding, pred))
    }

    fn matches_predicate(binding: &Binding<'_>, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Eq(expr, expected) => {
                let actual = binding.eval(expr);
                // Null never equals anything
                !actual.is_null() && &actual == expected
            }
            Predicate::In(expr, values) => {
                let actual = binding.eval(expr);
                !actual.is_null() && values.contains(&actual)
            }
            Predicate::InArray(expr, array) => {
                let actual = binding.eval(expr);
                !actual.is_null() && array.contains(&actual)
            }
            Predicate::IsNull(expr) => binding.eval(expr).is_null(),
            Predicate::IsNotNull(expr) => !binding.eval(expr).is_null(),
            Predicate::And(preds) => preds.iter().all(|p| Self::matches_predicate(binding, p)),
            Predicate::Or(preds) => preds.iter().any(|p| Self::matches_predicate(binding, p)),
            Predicate::Not(pred) => !Self::matches_predicate(binding, pred),
        }
    }
}

/// Sorts bindings by plan ordering terms
pub struct BindingSorter;

impl BindingSorter {
    /// Sorts bindings according to the ordering terms, in sequence.
    ///
    /// Sort is stable; nulls sort first ascending.
    pub fn sort(bindings: &mut [Binding<'_>], orders: &[Order]) {
        if orders.is_empty() {
            return;
        }
        bindings.sort_by(|a, b| {
            for order in orders {
                let ordering = a.eval(&order.expr).cmp(&b.eval(&order.expr));
                let ordering = match order.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

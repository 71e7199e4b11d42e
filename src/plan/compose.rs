//! Plan composition
//!
//! Copying plans, re-anchoring selections, ordering and membership filters.
//! Everything here inspects or augments a plan; nothing executes it.

use super::ast::{Expr, FieldOrder, JoinKind, Order, Predicate, Selection};
use super::page::Page;
use super::query::{QueryPlan, ScopeId, ScopeKind};
use crate::attributes::Field;
use crate::bulk::TableValueSupport;
use crate::config::QueryConfig;
use crate::errors::{QueryError, QueryResult};
use crate::value::Value;

/// The plan's explicit single selection, or its single root when that root's
/// entity is the declared result type
pub fn resolve_selection(plan: &QueryPlan) -> QueryResult<Expr> {
    match plan.selection() {
        Some(Selection::One(expr)) => return Ok(expr.clone()),
        Some(Selection::Many(_)) => return Err(QueryError::AmbiguousSelection),
        None => {}
    }
    match (plan.roots(), plan.result_type()) {
        ([root], Some(result_type)) if plan.scope_entity(*root) == Some(result_type) => {
            Ok(Expr::Scope(*root))
        }
        _ => Err(QueryError::AmbiguousSelection),
    }
}

/// Scope of `into` equivalent to the selection of `from`.
///
/// Roots match by entity, joins by association anywhere under `into`'s
/// roots. Falls back to `into`'s single root.
pub fn resolve_selection_into(from: &QueryPlan, into: &QueryPlan) -> QueryResult<ScopeId> {
    if let Some(Selection::One(Expr::Scope(selected))) = from.selection() {
        match &from.scope(*selected).kind {
            ScopeKind::Root { entity } => {
                if let Some(root) = into
                    .roots()
                    .iter()
                    .find(|r| into.scope_entity(**r) == Some(entity.as_str()))
                {
                    return Ok(*root);
                }
            }
            ScopeKind::Join { association, .. } => {
                for root in into.roots() {
                    if let Some(join) = into
                        .all_joins(*root)
                        .find(|j| into.scope(*j).association() == Some(association))
                    {
                        return Ok(join);
                    }
                }
            }
        }
    }
    match into.roots() {
        [root] => Ok(*root),
        _ => Err(QueryError::SelectionNotResolvable),
    }
}

/// Copies roots, joins, predicates, grouping, ordering and distinctness of
/// `source` into `target`, leaving the selection out.
///
/// Returns the scope mapping indexed by `source` scope id.
pub fn copy_without_projection(source: &QueryPlan, target: &mut QueryPlan) -> Vec<ScopeId> {
    let mut map: Vec<ScopeId> = Vec::with_capacity(source.scope_count());
    for index in 0..source.scope_count() {
        // parents are always allocated before their joins
        let copied = match &source.scope(ScopeId::new(index)).kind {
            ScopeKind::Root { entity } => target.from(entity.clone()),
            ScopeKind::Join {
                parent,
                association,
                kind,
            } => target.join(map[parent.index()], association, *kind),
        };
        map.push(copied);
    }
    for predicate in source.predicates() {
        target.filter(predicate.remap(&map));
    }
    for expr in source.grouping() {
        target.group_by(expr.remap(&map));
    }
    for order in source.orders() {
        target.add_order(order.remap(&map));
    }
    target.set_distinct(source.is_distinct());
    map
}

/// Joins each association hop off `scope` and returns the final scope.
///
/// Required singular hops are inner joins; optional or plural hops are left
/// joins. List-valued joins are pushed to `lists`.
fn join_hops(
    plan: &mut QueryPlan,
    scope: ScopeId,
    hops: &[Field],
    lists: &mut Vec<ScopeId>,
) -> QueryResult<ScopeId> {
    let mut current = scope;
    for hop in hops {
        let (association, kind) = match hop {
            Field::Plain(a) if !a.is_collection() => (a, JoinKind::Inner),
            Field::Plain(a) | Field::Optional(a) => (a, JoinKind::Left),
            other => {
                return Err(QueryError::IllegalDescriptorComposition(format!(
                    "{} cannot be joined through",
                    other
                )))
            }
        };
        current = plan.join(current, association, kind);
        if association.is_list() {
            lists.push(current);
        }
    }
    Ok(current)
}

fn order_exprs(
    plan: &mut QueryPlan,
    scope: ScopeId,
    field: &Field,
    lists: &mut Vec<ScopeId>,
) -> QueryResult<Vec<Expr>> {
    let exprs = match field {
        Field::SelfRef => vec![Expr::Scope(scope)],
        Field::Pseudo(p) => vec![Expr::Literal(p.placeholder.clone())],
        Field::Plain(a) | Field::Optional(a) if a.is_collection() => {
            let joined = plan.join(scope, a, JoinKind::Left);
            if a.is_list() {
                lists.push(joined);
            }
            vec![Expr::Scope(joined)]
        }
        Field::Plain(a) | Field::Optional(a) => vec![Expr::path(scope, a.name.clone())],
        Field::Relation(r) => {
            let kind = if r.optional || r.association.is_collection() {
                JoinKind::Left
            } else {
                JoinKind::Inner
            };
            let joined = plan.join(scope, &r.association, kind);
            if r.association.is_list() {
                lists.push(joined);
            }
            vec![Expr::Scope(joined)]
        }
        Field::Joined(j) => {
            let last = join_hops(plan, scope, j.hops(), lists)?;
            order_exprs(plan, last, j.last(), lists)?
        }
    };
    Ok(exprs)
}

/// Appends an ascending positional-index term for a list-valued scope,
/// unless one is already present
pub fn add_list_ordering(plan: &mut QueryPlan, scope: ScopeId) {
    let index = Expr::ListIndex(scope);
    if !plan.has_order(&index) {
        plan.add_order(Order::asc(index));
    }
}

/// Appends `orders`, resolved relative to `selection`, followed by the
/// positional-index terms of every list-valued scope involved
pub fn apply_order(
    plan: &mut QueryPlan,
    selection: ScopeId,
    orders: &[FieldOrder],
) -> QueryResult<()> {
    let mut lists = Vec::new();
    if plan.scope(selection).is_list_join() {
        lists.push(selection);
    }
    for order in orders {
        for expr in order_exprs(plan, selection, &order.field, &mut lists)? {
            plan.add_order(Order {
                expr,
                direction: order.direction,
            });
        }
    }
    for scope in lists {
        add_list_ordering(plan, scope);
    }
    tracing::trace!(orders = plan.orders().len(), "applied ordering");
    Ok(())
}

/// A bounded page needs an ordering
pub fn check_ordering(plan: &QueryPlan, page: Page) -> QueryResult<()> {
    if page.is_bounded() && plan.orders().is_empty() {
        return Err(QueryError::NoOrderingSpecified);
    }
    Ok(())
}

/// Disjunction of `IN` groups holding at most `chunk_size` values each.
///
/// No values yields the empty disjunction, which matches nothing.
pub fn in_filter(expr: &Expr, values: &[Value], chunk_size: usize) -> Predicate {
    let groups = values
        .chunks(chunk_size.max(1))
        .map(|group| Predicate::In(expr.clone(), group.to_vec()))
        .collect();
    Predicate::Or(groups)
}

/// Membership filter; binds `values` as one array parameter when enabled and
/// supported, otherwise falls back to [`in_filter`]
pub fn in_values(
    expr: &Expr,
    values: &[Value],
    config: &QueryConfig,
    bulk: &TableValueSupport,
) -> Predicate {
    if config.table_value_binding {
        if let Some(binding) = bulk.bind(values) {
            tracing::debug!(
                type_name = %binding.type_name,
                count = binding.values.len(),
                "binding value set as array"
            );
            return Predicate::InArray(expr.clone(), binding);
        }
    }
    in_filter(expr, values, config.in_chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Constructor;
    use crate::metamodel::{AttributeMeta, CollectionKind, EntityType, Metamodel, ValueType};

    fn metamodel() -> Metamodel {
        Metamodel::new()
            .with_entity(
                EntityType::new("Employee", "id")
                    .attribute(AttributeMeta::basic("name", ValueType::Text))
                    .attribute(AttributeMeta::association("department", "Department"))
                    .attribute(AttributeMeta::plural(
                        "phones",
                        ValueType::Text,
                        CollectionKind::List,
                    )),
            )
            .with_entity(
                EntityType::new("Department", "id")
                    .attribute(AttributeMeta::basic("name", ValueType::Text))
                    .attribute(AttributeMeta::plural(
                        "employees",
                        ValueType::Entity("Employee".into()),
                        CollectionKind::List,
                    )),
            )
    }

    #[test]
    fn test_resolve_selection_by_result_type() {
        let mut plan = QueryPlan::for_entity("Employee");
        let root = plan.from("Employee");
        assert_eq!(resolve_selection(&plan).unwrap(), Expr::Scope(root));

        let mut other = QueryPlan::for_entity("Department");
        other.from("Employee");
        assert_eq!(resolve_selection(&other), Err(QueryError::AmbiguousSelection));

        let mut two = QueryPlan::for_entity("Employee");
        two.from("Employee");
        two.from("Employee");
        assert_eq!(resolve_selection(&two), Err(QueryError::AmbiguousSelection));
    }

    #[test]
    fn test_explicit_selection_wins() {
        let mut plan = QueryPlan::untyped();
        let root = plan.from("Employee");
        plan.select(Expr::path(root, "name"));
        assert_eq!(resolve_selection(&plan).unwrap(), Expr::path(root, "name"));
    }

    #[test]
    fn test_copy_and_resolve_join_selection() {
        let mm = metamodel();
        let employees = mm.attribute("Department", "employees").unwrap();

        let mut source = QueryPlan::untyped();
        let dept = source.from("Department");
        let emp = source.join(dept, &employees, JoinKind::Inner);
        source.select(Expr::Scope(emp));
        source.filter(Predicate::eq(Expr::path(dept, "name"), "R&D"));
        source.add_order(Order::asc(Expr::path(emp, "name")));
        source.set_distinct(true);

        let mut target = QueryPlan::for_entity("Employee");
        let map = copy_without_projection(&source, &mut target);
        assert!(target.selection().is_none());
        assert!(target.is_distinct());
        assert_eq!(target.predicates().len(), 1);
        assert_eq!(target.orders()[0].expr, Expr::path(map[emp.index()], "name"));

        let anchored = resolve_selection_into(&source, &target).unwrap();
        assert_eq!(anchored, map[emp.index()]);
    }

    #[test]
    fn test_resolve_into_falls_back_to_single_root() {
        let source = QueryPlan::untyped();
        let mut target = QueryPlan::untyped();
        let root = target.from("Employee");
        assert_eq!(resolve_selection_into(&source, &target).unwrap(), root);

        target.from("Department");
        assert_eq!(
            resolve_selection_into(&source, &target),
            Err(QueryError::SelectionNotResolvable)
        );
    }

    #[test]
    fn test_apply_order_appends_list_index_after_user_terms() {
        let mm = metamodel();
        let employees = mm.attribute("Department", "employees").unwrap();
        let name = Field::plain(mm.attribute("Employee", "name").unwrap()).unwrap();

        let mut plan = QueryPlan::untyped();
        let dept = plan.from("Department");
        let emp = plan.join(dept, &employees, JoinKind::Inner);
        apply_order(&mut plan, emp, &[FieldOrder::desc(name)]).unwrap();

        assert_eq!(
            plan.orders(),
            &[
                Order::desc(Expr::path(emp, "name")),
                Order::asc(Expr::ListIndex(emp)),
            ]
        );

        // applying again does not duplicate the index term
        apply_order(&mut plan, emp, &[]).unwrap();
        assert_eq!(plan.orders().len(), 2);
    }

    #[test]
    fn test_apply_order_through_joined_path() {
        let mm = metamodel();
        let path = Field::plain(mm.attribute("Employee", "department").unwrap())
            .unwrap()
            .join(Field::plain(mm.attribute("Department", "name").unwrap()).unwrap())
            .unwrap();
        let phones = Field::plain(mm.attribute("Employee", "phones").unwrap()).unwrap();

        let mut plan = QueryPlan::for_entity("Employee");
        let root = plan.from("Employee");
        apply_order(
            &mut plan,
            root,
            &[FieldOrder::asc(path), FieldOrder::asc(phones)],
        )
        .unwrap();

        let joins: Vec<ScopeId> = plan.all_joins(root).collect();
        assert_eq!(joins.len(), 2);
        assert_eq!(plan.orders()[0], Order::asc(Expr::path(joins[0], "name")));
        assert_eq!(plan.orders()[1], Order::asc(Expr::Scope(joins[1])));
        assert_eq!(plan.orders()[2], Order::asc(Expr::ListIndex(joins[1])));
    }

    #[test]
    fn test_order_by_relation_joins_association() {
        let mm = metamodel();
        let dept_name = Field::plain(mm.attribute("Department", "name").unwrap()).unwrap();
        let dept = Constructor::value(dept_name);
        let relation =
            Field::relation(mm.attribute("Employee", "department").unwrap(), dept).unwrap();

        let mut plan = QueryPlan::for_entity("Employee");
        let root = plan.from("Employee");
        apply_order(&mut plan, root, &[FieldOrder::asc(relation)]).unwrap();
        let join = plan.all_joins(root).next().unwrap();
        assert_eq!(plan.orders(), &[Order::asc(Expr::Scope(join))]);
    }

    #[test]
    fn test_check_ordering() {
        let mut plan = QueryPlan::for_entity("Employee");
        let root = plan.from("Employee");
        assert!(check_ordering(&plan, Page::NoPaging).is_ok());
        assert_eq!(
            check_ordering(&plan, Page::first(10)),
            Err(QueryError::NoOrderingSpecified)
        );
        plan.add_order(Order::asc(Expr::path(root, "id")));
        assert!(check_ordering(&plan, Page::first(10)).is_ok());
    }

    #[test]
    fn test_in_filter_chunks() {
        let expr = Expr::path(ScopeId::new(0), "id");
        let values: Vec<Value> = (0..2001).map(Value::Int).collect();
        match in_filter(&expr, &values, 1000) {
            Predicate::Or(groups) => {
                let sizes: Vec<usize> = groups
                    .iter()
                    .map(|g| match g {
                        Predicate::In(_, vs) => vs.len(),
                        _ => 0,
                    })
                    .collect();
                assert_eq!(sizes, vec![1000, 1000, 1]);
            }
            other => panic!("unexpected predicate {:?}", other),
        }
        assert_eq!(in_filter(&expr, &[], 1000), Predicate::disjunction());
    }

    #[test]
    fn test_in_values_uses_bulk_binding_when_enabled() {
        let expr = Expr::path(ScopeId::new(0), "id");
        let values = vec![Value::Int(1), Value::Int(2)];
        let bulk = TableValueSupport::new(true, true);

        let disabled = QueryConfig::default();
        assert!(matches!(
            in_values(&expr, &values, &disabled, &bulk),
            Predicate::Or(_)
        ));

        let enabled = QueryConfig {
            table_value_binding: true,
            ..QueryConfig::default()
        };
        match in_values(&expr, &values, &enabled, &bulk) {
            Predicate::InArray(_, binding) => assert_eq!(binding.values, values),
            other => panic!("unexpected predicate {:?}", other),
        }

        // empty sets never bind and stay unsatisfiable
        assert_eq!(
            in_values(&expr, &[], &enabled, &bulk),
            Predicate::disjunction()
        );
    }
}

//! In-memory storage session
//!
//! Holds records per entity type and evaluates query plans against them:
//! roots are cross-joined, joins expanded depth first, then filtering,
//! ordering, projection, distinctness and paging are applied in that order.

use std::collections::BTreeMap;

use super::filters::{BindingSorter, PredicateFilter};
use super::StorageSession;
use crate::errors::{QueryError, QueryResult};
use crate::metamodel::{Attribute, Metamodel, ValueType};
use crate::plan::{
    resolve_selection, Expr, JoinKind, Page, QueryPlan, ScopeId, ScopeKind, Selection,
};
use crate::value::{EntityRef, Row, Value};

type Fields = BTreeMap<String, Value>;

/// In-memory store keyed by entity type and identity
#[derive(Debug, Clone)]
pub struct MemoryStore {
    metamodel: Metamodel,
    records: BTreeMap<String, BTreeMap<Value, Fields>>,
}

impl MemoryStore {
    pub fn new(metamodel: Metamodel) -> Self {
        Self {
            metamodel,
            records: BTreeMap::new(),
        }
    }

    /// Inserts (or replaces) a record.
    ///
    /// Association values may be given as bare identities; they are stored
    /// as entity references. Plural attributes take a `Value::List`.
    pub fn insert<I, K>(&mut self, entity: &str, id: impl Into<Value>, fields: I) -> QueryResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entity_type = self.metamodel.entity(entity)?;
        let id = id.into();
        let mut stored = Fields::new();
        stored.insert(entity_type.id_attribute().name.clone(), id.clone());

        for (name, value) in fields {
            let name = name.into();
            let attribute = entity_type
                .get(&name)
                .ok_or_else(|| QueryError::UnknownAttribute {
                    declaring: entity.to_string(),
                    attribute: name.clone(),
                })?;
            stored.insert(name, normalize(attribute, value));
        }

        tracing::trace!(entity, id = %id, "inserted record");
        self.records
            .entry(entity.to_string())
            .or_default()
            .insert(id, stored);
        Ok(())
    }

    pub fn len(&self, entity: &str) -> usize {
        self.records.get(entity).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(BTreeMap::is_empty)
    }

    fn record(&self, reference: &EntityRef) -> Option<&Fields> {
        self.records.get(&reference.entity)?.get(&reference.id)
    }

    fn ids(&self, entity: &str) -> impl Iterator<Item = &Value> {
        self.records.get(entity).into_iter().flat_map(|r| r.keys())
    }

    /// Candidates for a join off `parent`, with list positions
    fn expand(&self, parent: &Value, association: &Attribute) -> Vec<(Value, Option<i64>)> {
        let value = match parent {
            Value::Entity(reference) => self
                .record(reference)
                .and_then(|fields| fields.get(&association.name))
                .cloned(),
            Value::Embedded(embedded) => embedded.get(&association.name).cloned(),
            _ => None,
        };
        match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::List(items)) | Some(Value::Set(items)) => {
                let list = association.is_list();
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (item, list.then_some(i as i64)))
                    .collect()
            }
            Some(single) => vec![(single, None)],
        }
    }

    fn bind_roots<'a>(&'a self, plan: &QueryPlan) -> Vec<Binding<'a>> {
        let mut bindings = vec![Binding::new(self, plan.scope_count())];
        for root in plan.roots() {
            let entity = plan.scope_entity(*root).unwrap_or_default().to_string();
            let mut next = Vec::new();
            for binding in &bindings {
                for id in self.ids(&entity) {
                    let mut b = binding.clone();
                    b.values[root.index()] =
                        Some(Value::Entity(EntityRef::new(entity.clone(), id.clone())));
                    next.push(b);
                }
            }
            bindings = next;
            for join in plan.all_joins(*root) {
                bindings = self.bind_join(plan, join, bindings);
            }
        }
        bindings
    }

    fn bind_join<'a>(
        &'a self,
        plan: &QueryPlan,
        join: ScopeId,
        bindings: Vec<Binding<'a>>,
    ) -> Vec<Binding<'a>> {
        let ScopeKind::Join {
            parent,
            association,
            kind,
        } = &plan.scope(join).kind
        else {
            return bindings;
        };
        let mut out = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let candidates = match &binding.values[parent.index()] {
                Some(value) => self.expand(value, association),
                None => Vec::new(),
            };
            if candidates.is_empty() {
                if *kind == JoinKind::Left {
                    out.push(binding);
                }
                continue;
            }
            for (value, index) in candidates {
                let mut b = binding.clone();
                b.values[join.index()] = Some(value);
                b.indexes[join.index()] = index;
                out.push(b);
            }
        }
        out
    }
}

/// Rejects expressions reading a scope the plan does not declare
fn check_scope(plan: &QueryPlan, expr: &Expr) -> QueryResult<()> {
    match expr.scope() {
        Some(scope) if scope.index() >= plan.scope_count() => Err(QueryError::Storage(format!(
            "{} reads scope {} but the plan declares {} scopes",
            expr,
            scope,
            plan.scope_count()
        ))),
        _ => Ok(()),
    }
}

/// Stores association values as entity references
fn normalize(attribute: &Attribute, value: Value) -> Value {
    let ValueType::Entity(target) = &attribute.value_type else {
        return value;
    };
    let to_ref = |v: Value| match v {
        Value::Null | Value::Entity(_) => v,
        id => Value::Entity(EntityRef::new(target.clone(), id)),
    };
    match value {
        Value::List(items) => Value::List(items.into_iter().map(to_ref).collect()),
        Value::Set(items) => Value::Set(items.into_iter().map(to_ref).collect()),
        other => to_ref(other),
    }
}

impl StorageSession for MemoryStore {
    fn metamodel(&self) -> &Metamodel {
        &self.metamodel
    }

    fn execute(&self, plan: &QueryPlan, page: Page) -> QueryResult<Vec<Row>> {
        let selections: Vec<Expr> = match plan.selection() {
            Some(Selection::Many(exprs)) => exprs.clone(),
            Some(Selection::One(expr)) => vec![expr.clone()],
            None => vec![resolve_selection(plan)?],
        };
        for root in plan.roots() {
            if let Some(entity) = plan.scope_entity(*root) {
                self.metamodel.entity(entity)?;
            }
        }
        let orders = plan.orders().iter().map(|o| &o.expr);
        for expr in selections.iter().chain(orders) {
            check_scope(plan, expr)?;
        }

        let mut bindings: Vec<Binding<'_>> = self
            .bind_roots(plan)
            .into_iter()
            .filter(|b| PredicateFilter::matches(b, plan.predicates()))
            .collect();
        BindingSorter::sort(&mut bindings, plan.orders());

        let mut rows: Vec<Row> = bindings
            .iter()
            .map(|b| selections.iter().map(|e| b.eval(e)).collect())
            .collect();
        if plan.is_distinct() {
            let mut seen = std::collections::HashSet::new();
            rows.retain(|row| seen.insert(row.clone()));
        }

        let rows: Vec<Row> = match page.limit() {
            Some(limit) => rows.into_iter().skip(page.offset()).take(limit).collect(),
            None => rows,
        };
        tracing::debug!(
            roots = plan.roots().len(),
            columns = selections.len(),
            rows = rows.len(),
            "executed plan"
        );
        Ok(rows)
    }
}

/// Values bound to each scope of a plan for one candidate row
#[derive(Debug, Clone)]
pub struct Binding<'a> {
    store: &'a MemoryStore,
    values: Vec<Option<Value>>,
    indexes: Vec<Option<i64>>,
}

impl<'a> Binding<'a> {
    fn new(store: &'a MemoryStore, scopes: usize) -> Self {
        Self {
            store,
            values: vec![None; scopes],
            indexes: vec![None; scopes],
        }
    }

    /// Evaluates an expression; unbound scopes and missing fields are null
    pub fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Scope(s) => self.values[s.index()].clone().unwrap_or(Value::Null),
            Expr::Literal(v) => v.clone(),
            Expr::ListIndex(s) => self.indexes[s.index()].map_or(Value::Null, Value::Int),
            Expr::Path { scope, path } => {
                let Some(mut current) = self.values[scope.index()].clone() else {
                    return Value::Null;
                };
                for segment in path {
                    current = match &current {
                        Value::Entity(reference) => self
                            .store
                            .record(reference)
                            .and_then(|fields| fields.get(segment))
                            .cloned()
                            .unwrap_or(Value::Null),
                        Value::Embedded(embedded) => {
                            embedded.get(segment).cloned().unwrap_or(Value::Null)
                        }
                        _ => Value::Null,
                    };
                }
                current
            }
        }
    }
}

//! Plan generation
//!
//! Builds the common query shapes: every record of a type, a record by
//! identity, records by a set of identities and records related to a query.

use crate::bulk::TableValueSupport;
use crate::config::QueryConfig;
use crate::errors::{QueryError, QueryResult};
use crate::metamodel::{Attribute, Metamodel};
use crate::plan::{
    copy_without_projection, in_values, resolve_selection_into, Expr, JoinKind, Predicate,
    QueryPlan, ScopeId,
};
use crate::value::{EntityRef, Value};

/// Builds query plans against a metamodel
#[derive(Debug, Clone, Copy)]
pub struct QueryFactory<'a> {
    metamodel: &'a Metamodel,
    config: &'a QueryConfig,
    bulk: &'a TableValueSupport,
}

impl<'a> QueryFactory<'a> {
    pub fn new(
        metamodel: &'a Metamodel,
        config: &'a QueryConfig,
        bulk: &'a TableValueSupport,
    ) -> Self {
        Self {
            metamodel,
            config,
            bulk,
        }
    }

    /// Every record of `entity`
    pub fn all(&self, entity: &str) -> QueryResult<QueryPlan> {
        self.metamodel.entity(entity)?;
        let mut plan = QueryPlan::for_entity(entity);
        let root = plan.from(entity);
        plan.select(Expr::Scope(root));
        Ok(plan)
    }

    /// The record of `entity` with identity `id`
    pub fn single(&self, entity: &str, id: impl Into<Value>) -> QueryResult<QueryPlan> {
        let id_attribute = self.metamodel.id_attribute(entity)?;
        let mut plan = QueryPlan::for_entity(entity);
        let root = plan.from(entity);
        plan.filter(Predicate::Eq(
            Expr::path(root, id_attribute.name.clone()),
            id.into(),
        ));
        Ok(plan)
    }

    /// Records of `entity` whose identity is in `ids`; no ids match nothing
    pub fn of_ids(&self, entity: &str, ids: &[Value]) -> QueryResult<QueryPlan> {
        let id_attribute = self.metamodel.id_attribute(entity)?;
        let mut plan = QueryPlan::untyped();
        let root = plan.from(entity);
        let filter = if ids.is_empty() {
            Predicate::disjunction()
        } else {
            in_values(
                &Expr::path(root, id_attribute.name.clone()),
                ids,
                self.config,
                self.bulk,
            )
        };
        plan.filter(filter);
        plan.select(Expr::Scope(root));
        Ok(plan)
    }

    /// Records reached from the selection of `query` through `path`
    pub fn related(&self, query: &QueryPlan, path: &[Attribute]) -> QueryResult<QueryPlan> {
        let mut plan = QueryPlan::untyped();
        copy_without_projection(query, &mut plan);
        let start = resolve_selection_into(query, &plan)?;
        let end = self.join_path(&mut plan, start, path)?;
        plan.select(Expr::Scope(end));
        Ok(plan)
    }

    /// Records reached from `entity` through `path`
    pub fn related_to(&self, entity: &EntityRef, path: &[Attribute]) -> QueryResult<QueryPlan> {
        let mut plan = self.single(&entity.entity, (*entity.id).clone())?;
        let root = plan.roots()[0];
        let end = self.join_path(&mut plan, root, path)?;
        plan.select(Expr::Scope(end));
        Ok(plan)
    }

    fn join_path(
        &self,
        plan: &mut QueryPlan,
        start: ScopeId,
        path: &[Attribute],
    ) -> QueryResult<ScopeId> {
        let mut current = start;
        for attribute in path {
            if !attribute.is_association() && !attribute.is_collection() {
                return Err(QueryError::IllegalDescriptorComposition(format!(
                    "{} is neither an association nor a collection",
                    attribute
                )));
            }
            if let Some(owner) = plan.scope_entity(current) {
                if owner != attribute.declaring_type {
                    return Err(QueryError::IllegalDescriptorComposition(format!(
                        "{} is not declared by {}",
                        attribute, owner
                    )));
                }
            }
            current = plan.join(current, attribute, JoinKind::Inner);
        }
        Ok(current)
    }
}

//! Query plan builder
//!
//! Scopes (roots and joins) live in an arena addressed by [`ScopeId`]. A plan
//! is single-writer: every mutation goes through `&mut QueryPlan`.

use std::fmt;

use super::ast::{Expr, JoinKind, Order, Predicate, Selection};
use crate::metamodel::Attribute;

/// Index of a scope node inside its plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn new(index: usize) -> Self {
        ScopeId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// What a scope binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Root {
        entity: String,
    },
    Join {
        parent: ScopeId,
        association: Attribute,
        kind: JoinKind,
    },
}

/// Scope node plus the joins hanging off it, in creation order
#[derive(Debug, Clone)]
pub struct ScopeNode {
    pub kind: ScopeKind,
    joins: Vec<ScopeId>,
}

impl ScopeNode {
    pub fn joins(&self) -> &[ScopeId] {
        &self.joins
    }

    pub fn association(&self) -> Option<&Attribute> {
        match &self.kind {
            ScopeKind::Join { association, .. } => Some(association),
            ScopeKind::Root { .. } => None,
        }
    }

    pub fn parent(&self) -> Option<ScopeId> {
        match &self.kind {
            ScopeKind::Join { parent, .. } => Some(*parent),
            ScopeKind::Root { .. } => None,
        }
    }

    /// True for joins over a list-valued association
    pub fn is_list_join(&self) -> bool {
        self.association().is_some_and(|a| a.is_list())
    }
}

/// Mutable query plan
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    result_type: Option<String>,
    scopes: Vec<ScopeNode>,
    roots: Vec<ScopeId>,
    selection: Option<Selection>,
    predicates: Vec<Predicate>,
    group_by: Vec<Expr>,
    order: Vec<Order>,
    distinct: bool,
}

impl QueryPlan {
    /// Plan whose result type is the given entity
    pub fn for_entity(result_type: impl Into<String>) -> Self {
        Self {
            result_type: Some(result_type.into()),
            ..Self::default()
        }
    }

    /// Plan without a declared result type
    pub fn untyped() -> Self {
        Self::default()
    }

    pub fn result_type(&self) -> Option<&str> {
        self.result_type.as_deref()
    }

    /// Adds a root over `entity`
    pub fn from(&mut self, entity: impl Into<String>) -> ScopeId {
        let id = self.push(ScopeKind::Root {
            entity: entity.into(),
        });
        self.roots.push(id);
        id
    }

    /// Joins `association` off `scope`, reusing an existing join over the
    /// same association
    pub fn join(&mut self, scope: ScopeId, association: &Attribute, kind: JoinKind) -> ScopeId {
        if let Some(existing) = self.find_join(scope, association) {
            return existing;
        }
        let id = self.push(ScopeKind::Join {
            parent: scope,
            association: association.clone(),
            kind,
        });
        self.scopes[scope.0].joins.push(id);
        tracing::trace!(parent = %scope, join = %id, association = %association, "created join");
        id
    }

    /// Direct join over `association` under `scope`
    pub fn find_join(&self, scope: ScopeId, association: &Attribute) -> Option<ScopeId> {
        self.scopes[scope.0]
            .joins
            .iter()
            .copied()
            .find(|j| self.scopes[j.0].association() == Some(association))
    }

    fn push(&mut self, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeNode {
            kind,
            joins: Vec::new(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeNode {
        &self.scopes[id.0]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn roots(&self) -> &[ScopeId] {
        &self.roots
    }

    /// Entity bound by a root, or by a join over an entity association
    pub fn scope_entity(&self, id: ScopeId) -> Option<&str> {
        match &self.scopes[id.0].kind {
            ScopeKind::Root { entity } => Some(entity),
            ScopeKind::Join { association, .. } => association.target_entity(),
        }
    }

    /// Every join reachable from `scope`, depth first.
    ///
    /// Each call walks the current graph, so joins added since an earlier
    /// walk are included.
    pub fn all_joins(&self, scope: ScopeId) -> AllJoins<'_> {
        let mut stack: Vec<ScopeId> = self.scopes[scope.0].joins.clone();
        stack.reverse();
        AllJoins { plan: self, stack }
    }

    // ==================
    // Clauses
    // ==================

    pub fn select(&mut self, expr: Expr) {
        self.selection = Some(Selection::One(expr));
    }

    pub fn multiselect(&mut self, exprs: Vec<Expr>) {
        self.selection = Some(Selection::Many(exprs));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Adds a predicate to the conjunction
    pub fn filter(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn group_by(&mut self, expr: Expr) {
        self.group_by.push(expr);
    }

    pub fn grouping(&self) -> &[Expr] {
        &self.group_by
    }

    pub fn add_order(&mut self, order: Order) {
        self.order.push(order);
    }

    pub fn set_order(&mut self, order: Vec<Order>) {
        self.order = order;
    }

    pub fn orders(&self) -> &[Order] {
        &self.order
    }

    pub fn has_order(&self, expr: &Expr) -> bool {
        self.order.iter().any(|o| &o.expr == expr)
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }
}

/// Depth-first iterator over joins, see [`QueryPlan::all_joins`]
pub struct AllJoins<'a> {
    plan: &'a QueryPlan,
    stack: Vec<ScopeId>,
}

impl Iterator for AllJoins<'_> {
    type Item = ScopeId;

    fn next(&mut self) -> Option<ScopeId> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.plan.scopes[next.0].joins.iter().rev().copied());
        Some(next)
    }
}

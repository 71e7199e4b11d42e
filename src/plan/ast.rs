//! Plan expressions, predicates and ordering terms

use std::fmt;

use super::query::ScopeId;
use crate::attributes::Field;
use crate::bulk::ArrayBinding;
use crate::value::Value;

/// Join kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
        }
    }
}

/// Selectable expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// The record (or collection element) bound to a scope
    Scope(ScopeId),
    /// Attribute path off a scope; more than one segment walks into embeddables
    Path { scope: ScopeId, path: Vec<String> },
    /// Constant
    Literal(Value),
    /// Positional index of the element bound to a list join
    ListIndex(ScopeId),
}

impl Expr {
    pub fn path(scope: ScopeId, attribute: impl Into<String>) -> Self {
        Expr::Path {
            scope,
            path: vec![attribute.into()],
        }
    }

    /// Scope the expression reads from, if any
    pub fn scope(&self) -> Option<ScopeId> {
        match self {
            Expr::Scope(s) | Expr::ListIndex(s) => Some(*s),
            Expr::Path { scope, .. } => Some(*scope),
            Expr::Literal(_) => None,
        }
    }

    /// Rewrites scope ids through `map` (indexed by the old id)
    pub fn remap(&self, map: &[ScopeId]) -> Expr {
        match self {
            Expr::Scope(s) => Expr::Scope(map[s.index()]),
            Expr::Path { scope, path } => Expr::Path {
                scope: map[scope.index()],
                path: path.clone(),
            },
            Expr::Literal(v) => Expr::Literal(v.clone()),
            Expr::ListIndex(s) => Expr::ListIndex(map[s.index()]),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Scope(s) => write!(f, "{}", s),
            Expr::Path { scope, path } => write!(f, "{}.{}", scope, path.join(".")),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::ListIndex(s) => write!(f, "index({})", s),
        }
    }
}

/// Filter predicate; a plan's predicates are combined with AND
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq(Expr, Value),
    In(Expr, Vec<Value>),
    /// Membership in a set bound as one store-side array parameter
    InArray(Expr, ArrayBinding),
    IsNull(Expr),
    IsNotNull(Expr),
    And(Vec<Predicate>),
    /// Empty disjunction matches nothing
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Predicate that matches nothing
    pub fn disjunction() -> Self {
        Predicate::Or(Vec::new())
    }

    /// Predicate that matches everything
    pub fn conjunction() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn eq(expr: Expr, value: impl Into<Value>) -> Self {
        Predicate::Eq(expr, value.into())
    }

    pub fn remap(&self, map: &[ScopeId]) -> Predicate {
        match self {
            Predicate::Eq(e, v) => Predicate::Eq(e.remap(map), v.clone()),
            Predicate::In(e, vs) => Predicate::In(e.remap(map), vs.clone()),
            Predicate::InArray(e, b) => Predicate::InArray(e.remap(map), b.clone()),
            Predicate::IsNull(e) => Predicate::IsNull(e.remap(map)),
            Predicate::IsNotNull(e) => Predicate::IsNotNull(e.remap(map)),
            Predicate::And(ps) => Predicate::And(ps.iter().map(|p| p.remap(map)).collect()),
            Predicate::Or(ps) => Predicate::Or(ps.iter().map(|p| p.remap(map)).collect()),
            Predicate::Not(p) => Predicate::Not(Box::new(p.remap(map))),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Plan-level ordering term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl Order {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Desc,
        }
    }

    pub fn remap(&self, map: &[ScopeId]) -> Order {
        Order {
            expr: self.expr.remap(map),
            direction: self.direction,
        }
    }
}

/// Ordering by field descriptor, resolved against the selection when applied
#[derive(Debug, Clone)]
pub struct FieldOrder {
    pub field: Field,
    pub direction: SortDirection,
}

impl FieldOrder {
    pub fn asc(field: Field) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: Field) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Projection clause of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    One(Expr),
    Many(Vec<Expr>),
}

impl Selection {
    pub fn exprs(&self) -> &[Expr] {
        match self {
            Selection::One(e) => std::slice::from_ref(e),
            Selection::Many(es) => es,
        }
    }
}

//! Projection builder
//!
//! Turns a constructor's parameters into a flat list of plan selections and
//! the slot layout used to read them back.

use std::sync::Arc;

use crate::attributes::{Constructor, Field, NestedProjection, Param, ParamShape};
use crate::config::{EmptyRelationPolicy, QueryConfig};
use crate::errors::{QueryError, QueryResult};
use crate::metamodel::{Attribute, Metamodel, ValueType};
use crate::plan::{Expr, JoinKind, QueryPlan, ScopeId};

/// Where one parameter's value lives in a result row
#[derive(Clone)]
pub enum Slot {
    /// Single column
    Column(usize),
    /// Leaf columns of an embedded value, in leaf path order
    Embedded {
        embeddable: String,
        columns: Vec<usize>,
    },
    /// Related record: presence key column plus the nested parameters
    Nested {
        key: usize,
        target: Arc<dyn NestedProjection>,
        slots: Vec<Slot>,
    },
    /// Elements gathered across the rows of a group
    Collection {
        shape: ParamShape,
        index: Option<usize>,
        element: Box<Slot>,
    },
}

impl Slot {
    /// Columns that identify the group a row belongs to
    pub(crate) fn group_columns(&self, out: &mut Vec<usize>) {
        match self {
            Slot::Column(c) => out.push(*c),
            Slot::Embedded { columns, .. } => out.extend(columns),
            Slot::Nested { key, slots, .. } => {
                out.push(*key);
                for slot in slots {
                    slot.group_columns(out);
                }
            }
            Slot::Collection { .. } => {}
        }
    }

    pub fn is_collection(&self) -> bool {
        match self {
            Slot::Collection { .. } => true,
            Slot::Nested { slots, .. } => slots.iter().any(Slot::is_collection),
            Slot::Column(_) | Slot::Embedded { .. } => false,
        }
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Column(c) => write!(f, "Column({})", c),
            Slot::Embedded {
                embeddable,
                columns,
            } => write!(f, "Embedded({}, {:?})", embeddable, columns),
            Slot::Nested { key, target, slots } => f
                .debug_struct("Nested")
                .field("key", key)
                .field("target", &target.name())
                .field("slots", slots)
                .finish(),
            Slot::Collection {
                shape,
                index,
                element,
            } => f
                .debug_struct("Collection")
                .field("shape", shape)
                .field("index", index)
                .field("element", element)
                .finish(),
        }
    }
}

/// Selections plus slot layout for one constructor
#[derive(Debug, Clone)]
pub struct PreparedProjection {
    scope: ScopeId,
    selections: Vec<Expr>,
    slots: Vec<Slot>,
    list_scopes: Vec<ScopeId>,
    /// Identity column of the projected scope, selected when grouping
    group_key: Option<usize>,
}

impl PreparedProjection {
    /// Scope the projection was prepared against
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn selections(&self) -> &[Expr] {
        &self.selections
    }

    /// One slot per constructor parameter
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// List-valued joins whose positional index must be ordered on
    pub fn list_scopes(&self) -> &[ScopeId] {
        &self.list_scopes
    }

    /// True when rows must be grouped to assemble collections
    pub fn has_collections(&self) -> bool {
        self.slots.iter().any(Slot::is_collection)
    }

    pub(crate) fn group_columns(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.group_key.into_iter().collect();
        for slot in &self.slots {
            slot.group_columns(&mut out);
        }
        out
    }
}

/// Prepares `constructor` against `scope` of `plan`.
///
/// Joins are added to `plan` as needed (reusing existing ones) and the
/// resulting selections are installed as its multiselect.
pub fn prepare<R>(
    constructor: &Constructor<R>,
    plan: &mut QueryPlan,
    scope: ScopeId,
    metamodel: &Metamodel,
    config: &QueryConfig,
) -> QueryResult<PreparedProjection> {
    let mut builder = Builder {
        plan,
        metamodel,
        config,
        selections: Vec::new(),
        list_scopes: Vec::new(),
    };
    let slots = builder.params(constructor.params(), scope, false, false)?;
    let group_key = slots
        .iter()
        .any(Slot::is_collection)
        .then(|| builder.column(Expr::Scope(scope)));
    let Builder {
        plan,
        selections,
        list_scopes,
        ..
    } = builder;

    tracing::debug!(
        constructor = constructor.name(),
        columns = selections.len(),
        lists = list_scopes.len(),
        "prepared projection"
    );
    plan.multiselect(selections.clone());
    Ok(PreparedProjection {
        scope,
        selections,
        slots,
        list_scopes,
        group_key,
    })
}

struct Builder<'a> {
    plan: &'a mut QueryPlan,
    metamodel: &'a Metamodel,
    config: &'a QueryConfig,
    selections: Vec<Expr>,
    list_scopes: Vec<ScopeId>,
}

impl Builder<'_> {
    fn column(&mut self, expr: Expr) -> usize {
        self.selections.push(expr);
        self.selections.len() - 1
    }

    fn params(
        &mut self,
        params: &[Param],
        scope: ScopeId,
        in_collection: bool,
        force_left: bool,
    ) -> QueryResult<Vec<Slot>> {
        params
            .iter()
            .map(|p| self.param(p, scope, in_collection, force_left))
            .collect()
    }

    fn param(
        &mut self,
        param: &Param,
        scope: ScopeId,
        in_collection: bool,
        force_left: bool,
    ) -> QueryResult<Slot> {
        let field = &param.field;
        match (param.shape.is_collection(), field.is_collection()) {
            (false, false) => self.field(field, scope, in_collection, force_left, &mut None),
            (false, true) => Err(QueryError::IllegalDescriptorComposition(format!(
                "{} is a collection and needs a collection-shaped parameter",
                field
            ))),
            (true, false) => Err(QueryError::IllegalDescriptorComposition(format!(
                "{} is not a collection but the parameter is declared {:?}",
                field, param.shape
            ))),
            (true, true) if in_collection => Err(QueryError::IllegalDescriptorComposition(
                format!("{} is a collection nested inside a collection", field),
            )),
            (true, true) if param.shape == ParamShape::List && !field.is_list() => {
                Err(QueryError::IllegalDescriptorComposition(format!(
                    "{} has no element positions and cannot fill a list parameter",
                    field
                )))
            }
            (true, true) => {
                let mut list = None;
                let element = self.field(field, scope, true, true, &mut list)?;
                let index = list.map(|s| {
                    self.list_scopes.push(s);
                    self.column(Expr::ListIndex(s))
                });
                Ok(Slot::Collection {
                    shape: param.shape,
                    index,
                    element: Box::new(element),
                })
            }
        }
    }

    fn field(
        &mut self,
        field: &Field,
        scope: ScopeId,
        in_collection: bool,
        force_left: bool,
        list: &mut Option<ScopeId>,
    ) -> QueryResult<Slot> {
        match field {
            Field::SelfRef => Ok(Slot::Column(self.column(Expr::Scope(scope)))),
            Field::Pseudo(p) => Ok(Slot::Column(self.column(Expr::Literal(p.placeholder.clone())))),
            Field::Plain(a) | Field::Optional(a) if a.is_collection() => {
                let joined = self.plan.join(scope, a, JoinKind::Left);
                if a.is_list() {
                    *list = Some(joined);
                }
                self.element(a, joined)
            }
            Field::Plain(a) | Field::Optional(a) => match a.embeddable() {
                Some(embeddable) if a.is_embedded() => {
                    self.embedded(embeddable, scope, vec![a.name.clone()])
                }
                _ => Ok(Slot::Column(self.column(Expr::path(scope, a.name.clone())))),
            },
            Field::Relation(r) => {
                let association = &r.association;
                let left = force_left
                    || association.is_collection()
                    || (r.optional
                        && self.config.empty_optional_relation == EmptyRelationPolicy::Absent);
                let kind = if left { JoinKind::Left } else { JoinKind::Inner };
                let joined = self.plan.join(scope, association, kind);
                if association.is_list() {
                    *list = Some(joined);
                }
                let key = self.column(Expr::Scope(joined));
                let slots = self.params(
                    r.target.params(),
                    joined,
                    in_collection || association.is_collection(),
                    left,
                )?;
                Ok(Slot::Nested {
                    key,
                    target: r.target.clone(),
                    slots,
                })
            }
            Field::Joined(j) => {
                let mut current = scope;
                let mut left = force_left;
                for hop in j.hops() {
                    let association = hop.attribute().ok_or_else(|| {
                        QueryError::IllegalDescriptorComposition(format!(
                            "{} cannot be joined through",
                            hop
                        ))
                    })?;
                    left = left || !matches!(hop, Field::Plain(_)) || association.is_collection();
                    let kind = if left { JoinKind::Left } else { JoinKind::Inner };
                    current = self.plan.join(current, association, kind);
                    if association.is_list() {
                        *list = Some(current);
                    }
                }
                self.field(j.last(), current, in_collection, left, list)
            }
        }
    }

    /// Element of a plural attribute bound to `joined`
    fn element(&mut self, attribute: &Attribute, joined: ScopeId) -> QueryResult<Slot> {
        match &attribute.value_type {
            ValueType::Embeddable(embeddable) => self.embedded(embeddable, joined, Vec::new()),
            _ => Ok(Slot::Column(self.column(Expr::Scope(joined)))),
        }
    }

    fn embedded(
        &mut self,
        embeddable: &str,
        scope: ScopeId,
        prefix: Vec<String>,
    ) -> QueryResult<Slot> {
        let leaves = self.metamodel.leaf_paths(embeddable)?;
        let columns = leaves
            .into_iter()
            .map(|leaf| {
                let mut path = prefix.clone();
                path.extend(leaf);
                self.column(Expr::Path { scope, path })
            })
            .collect();
        Ok(Slot::Embedded {
            embeddable: embeddable.to_string(),
            columns,
        })
    }
}

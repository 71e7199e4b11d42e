//! Row reconstruction
//!
//! Reads prepared slots back out of result rows and applies the per-value
//! post-processing chain before handing the arguments to the constructor:
//!
//! 1. pseudo substitution
//! 2. optional wrapping
//! 3. empty embedded instance for required embedded values
//!
//! A null left at a required position after step 3 is an error.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::builder::{PreparedProjection, Slot};
use crate::attributes::{Constructor, Field, NestedProjection, Param, ParamShape};
use crate::errors::{QueryError, QueryResult};
use crate::metamodel::Metamodel;
use crate::plan::Page;
use crate::value::{Row, Value};

/// Reconstructs one row; collection parameters see a single-row group
pub fn reconstruct_row<R>(
    constructor: &Constructor<R>,
    prepared: &PreparedProjection,
    row: Row,
    metamodel: &Metamodel,
) -> QueryResult<R> {
    check_width(prepared, &row)?;
    let reader = Reader { metamodel };
    let rows = [row];
    let args = reader.arguments(
        constructor.name(),
        constructor.params(),
        prepared.slots(),
        &rows,
    )?;
    constructor.apply(args)
}

/// Reconstructs all rows.
///
/// With collection parameters, rows agreeing on the identity key and every
/// non-collection column form one result, in order of first appearance.
pub fn reconstruct_rows<R>(
    constructor: &Constructor<R>,
    prepared: &PreparedProjection,
    rows: Vec<Row>,
    metamodel: &Metamodel,
) -> QueryResult<Vec<R>> {
    reconstruct_page(constructor, prepared, rows, Page::NoPaging, metamodel)
}

/// Reconstructs the results of `page`, counted after grouping
pub fn reconstruct_page<R>(
    constructor: &Constructor<R>,
    prepared: &PreparedProjection,
    rows: Vec<Row>,
    page: Page,
    metamodel: &Metamodel,
) -> QueryResult<Vec<R>> {
    for row in &rows {
        check_width(prepared, row)?;
    }
    let reader = Reader { metamodel };
    let total = rows.len();

    let groups = if prepared.has_collections() {
        group_rows(rows, &prepared.group_columns())
    } else {
        rows.into_iter().map(|r| vec![r]).collect()
    };
    let grouped = groups.len();
    let groups: Vec<Vec<Row>> = match page.limit() {
        Some(limit) => groups.into_iter().skip(page.offset()).take(limit).collect(),
        None => groups,
    };
    tracing::debug!(
        constructor = constructor.name(),
        rows = total,
        grouped,
        results = groups.len(),
        "reconstructing rows"
    );

    groups
        .iter()
        .map(|group| {
            let args = reader.arguments(
                constructor.name(),
                constructor.params(),
                prepared.slots(),
                group,
            )?;
            constructor.apply(args)
        })
        .collect()
}

fn check_width(prepared: &PreparedProjection, row: &Row) -> QueryResult<()> {
    if row.len() != prepared.selections().len() {
        return Err(QueryError::InternalConsistency(format!(
            "Row has {} columns but the projection selected {}",
            row.len(),
            prepared.selections().len()
        )));
    }
    Ok(())
}

/// Groups rows by key, whether or not a group's rows are contiguous
fn group_rows(rows: Vec<Row>, key_columns: &[usize]) -> Vec<Vec<Row>> {
    let mut groups: Vec<Vec<Row>> = Vec::new();
    let mut by_key: HashMap<Vec<Value>, usize> = HashMap::new();
    for row in rows {
        let key: Vec<Value> = key_columns.iter().map(|c| row[*c].clone()).collect();
        let group = *by_key.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(row);
    }
    groups
}

struct Reader<'a> {
    metamodel: &'a Metamodel,
}

impl Reader<'_> {
    /// Argument tuple for `params`, read from a non-empty group of rows
    fn arguments(
        &self,
        target: &str,
        params: &[Param],
        slots: &[Slot],
        rows: &[Row],
    ) -> QueryResult<Vec<Value>> {
        if params.len() != slots.len() {
            return Err(QueryError::InternalConsistency(format!(
                "{} declares {} parameters but {} slots were prepared",
                target,
                params.len(),
                slots.len()
            )));
        }
        let mut values = Vec::with_capacity(params.len());
        for (position, (param, slot)) in params.iter().zip(slots).enumerate() {
            let value = match slot {
                Slot::Collection {
                    shape,
                    index,
                    element,
                } => self.collect(*shape, *index, element, rows)?,
                single => {
                    let raw = self.read(single, rows)?;
                    self.post_process(&param.field, raw)?
                }
            };
            if value.is_null() && param.shape == ParamShape::Single && param.field.is_required() {
                return Err(QueryError::NullValueForRequiredArgument {
                    target: target.to_string(),
                    position,
                    declared: param.declared_type(),
                });
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Raw value of a non-collection slot
    fn read(&self, slot: &Slot, rows: &[Row]) -> QueryResult<Value> {
        let row = rows.first().ok_or_else(|| {
            QueryError::InternalConsistency("cannot read from an empty row group".into())
        })?;
        match slot {
            Slot::Column(c) => Ok(row[*c].clone()),
            Slot::Embedded {
                embeddable,
                columns,
            } => {
                let leaves = columns.iter().map(|c| row[*c].clone()).collect();
                self.metamodel.compose_embedded(embeddable, leaves)
            }
            Slot::Nested { key, target, slots } => {
                if row[*key].is_null() {
                    return Ok(Value::Null);
                }
                let args = self.arguments(target.name(), target.params(), slots, rows)?;
                target.assemble(args)
            }
            Slot::Collection { .. } => Err(QueryError::InternalConsistency(
                "collection slot read as a single value".into(),
            )),
        }
    }

    fn collect(
        &self,
        shape: ParamShape,
        index: Option<usize>,
        element: &Slot,
        rows: &[Row],
    ) -> QueryResult<Value> {
        let mut positions = HashSet::new();
        let mut items = Vec::new();
        for row in rows {
            if is_absent(element, row) {
                continue;
            }
            let position = index.map(|i| row[i].clone());
            if let Some(p) = &position {
                if !positions.insert(p.clone()) {
                    continue;
                }
            }
            items.push((position, self.read(element, std::slice::from_ref(row))?));
        }
        // user orderings may deliver list elements out of position
        items.sort_by(|a, b| a.0.cmp(&b.0));
        let items: Vec<Value> = items.into_iter().map(|(_, item)| item).collect();

        let value = match shape {
            ParamShape::List => Value::List(items),
            ParamShape::Set => Value::Set(first_seen(items)),
            ParamShape::SortedSet => Value::SortedSet(items.into_iter().collect::<BTreeSet<_>>()),
            ParamShape::Single => {
                return Err(QueryError::InternalConsistency(
                    "single-valued parameter prepared as a collection".into(),
                ))
            }
        };
        Ok(value)
    }

    fn post_process(&self, field: &Field, raw: Value) -> QueryResult<Value> {
        let pseudo = match field {
            Field::Pseudo(p) => Some(p),
            Field::Joined(j) => match j.last() {
                Field::Pseudo(p) => Some(p),
                _ => None,
            },
            _ => None,
        };
        let mut value = match pseudo {
            Some(p) => {
                let substituted = (p.substitute)(&raw);
                tracing::trace!(pseudo = %p.name, "substituted pseudo value");
                substituted
            }
            None => raw,
        };

        let marker = field.is_marker() || pseudo.is_some();
        if !marker && !field.is_required() && !value.is_optional() {
            value = if value.is_null() {
                Value::none()
            } else {
                Value::some(value)
            };
        }

        if value.is_null() && field.is_required_by_storage() {
            if let Some(embeddable) = field.embeddable_type() {
                tracing::trace!(field = %field, "materializing empty embedded value");
                let empty = self.metamodel.empty_embedded(embeddable)?;
                value = match field.nested() {
                    Some(target) => target.assemble(vec![empty])?,
                    None => empty,
                };
            }
        }
        Ok(value)
    }
}

/// True when a left join found nothing for this element
fn is_absent(element: &Slot, row: &Row) -> bool {
    match element {
        Slot::Column(c) => row[*c].is_null(),
        Slot::Embedded { columns, .. } => columns.iter().all(|c| row[*c].is_null()),
        Slot::Nested { key, .. } => row[*key].is_null(),
        Slot::Collection { .. } => true,
    }
}

fn first_seen(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

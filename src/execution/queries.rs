//! Projection queries
//!
//! Runs a query plan through a constructor: the plan is copied without its
//! selection, re-anchored, ordered, prepared, executed and reconstructed.
//! The caller's plan is never modified.

use super::generation::QueryFactory;
use crate::attributes::Constructor;
use crate::bulk::TableValueSupport;
use crate::config::QueryConfig;
use crate::errors::{QueryError, QueryResult};
use crate::plan::{
    add_list_ordering, apply_order, check_ordering, copy_without_projection, resolve_selection,
    resolve_selection_into, Expr, FieldOrder, Order, Page, QueryPlan,
};
use crate::projection::{prepare, reconstruct_page};
use crate::session::StorageSession;

/// Projection query entry point over a storage session
#[derive(Debug, Clone)]
pub struct ProjectionQueries<S> {
    session: S,
    config: QueryConfig,
    bulk: TableValueSupport,
}

impl<S: StorageSession> ProjectionQueries<S> {
    pub fn new(session: S, config: QueryConfig) -> Self {
        Self {
            session,
            config,
            bulk: TableValueSupport::disabled(),
        }
    }

    /// Uses `bulk` for membership filters built by [`queries`](Self::queries)
    pub fn with_bulk(mut self, bulk: TableValueSupport) -> Self {
        self.bulk = bulk;
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Plan factory sharing this instance's metamodel and configuration
    pub fn queries(&self) -> QueryFactory<'_> {
        QueryFactory::new(self.session.metamodel(), &self.config, &self.bulk)
    }

    /// Exactly one result
    pub fn get<R>(&self, query: &QueryPlan, constructor: &Constructor<R>) -> QueryResult<R> {
        let results = self.run(query, constructor, Page::NoPaging, &[])?;
        let count = results.len();
        let mut results = results.into_iter();
        match (results.next(), count) {
            (Some(result), 1) => Ok(result),
            (None, _) => Err(QueryError::NoResult),
            _ => Err(QueryError::NonUniqueResult(count)),
        }
    }

    /// At most one result
    pub fn find<R>(
        &self,
        query: &QueryPlan,
        constructor: &Constructor<R>,
    ) -> QueryResult<Option<R>> {
        match self.get(query, constructor) {
            Ok(result) => Ok(Some(result)),
            Err(QueryError::NoResult) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// First result of the first page of size one
    pub fn find_first<R>(
        &self,
        query: &QueryPlan,
        constructor: &Constructor<R>,
        orders: &[FieldOrder],
    ) -> QueryResult<Option<R>> {
        let results = self.get_many(query, constructor, Page::first(1), orders)?;
        Ok(results.into_iter().next())
    }

    /// All results of `page`.
    ///
    /// Without `orders` the query must order itself when `page` is bounded.
    pub fn get_many<R>(
        &self,
        query: &QueryPlan,
        constructor: &Constructor<R>,
        page: Page,
        orders: &[FieldOrder],
    ) -> QueryResult<Vec<R>> {
        if !orders.is_empty() {
            return self.run(query, constructor, page, orders);
        }
        let mut query = query.clone();
        if let Expr::Scope(selection) = resolve_selection(&query)? {
            apply_order(&mut query, selection, &[])?;
        }
        check_ordering(&query, page)?;
        self.run(&query, constructor, page, &[])
    }

    fn run<R>(
        &self,
        query: &QueryPlan,
        constructor: &Constructor<R>,
        page: Page,
        orders: &[FieldOrder],
    ) -> QueryResult<Vec<R>> {
        self.project(query, constructor, page, orders)
            .inspect_err(|e| {
                tracing::debug!(
                    constructor = constructor.name(),
                    code = e.code(),
                    build_time = e.is_build_time(),
                    "projection query failed"
                )
            })
    }

    fn project<R>(
        &self,
        query: &QueryPlan,
        constructor: &Constructor<R>,
        page: Page,
        orders: &[FieldOrder],
    ) -> QueryResult<Vec<R>> {
        let metamodel = self.session.metamodel();
        let mut plan = QueryPlan::untyped();
        copy_without_projection(query, &mut plan);
        let selection = resolve_selection_into(query, &plan)?;

        apply_order(&mut plan, selection, orders)?;
        let prepared = prepare(constructor, &mut plan, selection, metamodel, &self.config)?;
        if prepared.has_collections() {
            // ties between results break on identity
            let identity = Expr::Scope(selection);
            if !plan.has_order(&identity) {
                plan.add_order(Order::asc(identity));
            }
        }
        for scope in prepared.list_scopes() {
            add_list_ordering(&mut plan, *scope);
        }

        // with collections a page counts results, not rows
        let (row_page, result_page) = if prepared.has_collections() {
            (Page::NoPaging, page)
        } else {
            (page, Page::NoPaging)
        };
        let rows = self.session.execute(&plan, row_page)?;
        tracing::debug!(
            constructor = constructor.name(),
            rows = rows.len(),
            page = ?page,
            "executed projection query"
        );
        reconstruct_page(constructor, &prepared, rows, result_page, metamodel)
    }
}

use std::time::Duration;

use serde_json::Value;

use crate::{
    models::{
        pagination::{PaginatedResponse, PaginationParams, PaginationQuery},
        sort::SortOrder,
    },
    services::executor::Executor,
    store::Store,
    validators::paging_validator::PagingValidator,
    Result,
};

/// Fluent configuration of one paginated query against a collection.
///
/// Setters only record values; nothing touches the store until [`find`] or
/// [`aggregate`] consumes the builder, so a configured query runs once.
///
/// The count and the page are two separate reads. Writes that land between
/// them can make `total` disagree with what the page shows.
///
/// [`find`]: PagingQuery::find
/// [`aggregate`]: PagingQuery::aggregate
#[must_use = "a PagingQuery does nothing until find() or aggregate() is awaited"]
pub struct PagingQuery<'a, S: Store + ?Sized> {
    store: &'a S,
    collection: String,
    params: PaginationParams,
}

impl<'a, S: Store + ?Sized> PagingQuery<'a, S> {
    pub fn new(store: &'a S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            params: PaginationParams::default(),
        }
    }

    /// Page size; `<= 0` means the default of 10.
    pub fn limit(mut self, limit: i64) -> Self {
        self.params.limit = Some(limit);
        self
    }

    /// 1-based page number; `<= 0` means the first page.
    pub fn page(mut self, page: i64) -> Self {
        self.params.page = Some(page);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: impl Into<SortOrder>) -> Self {
        self.params.sort = Some((field.into(), order.into()));
        self
    }

    /// `{"field": 1}` to include, `{"field": 0}` to exclude.
    pub fn select(mut self, projection: Value) -> Self {
        self.params.projection = Some(projection);
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.params.filter = Some(filter);
        self
    }

    /// Deadline shared by the count and the fetch.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.params.timeout = Some(timeout);
        self
    }

    /// Applies HTTP query parameters; absent values are left unset.
    pub fn with_query(mut self, query: &PaginationQuery) -> Self {
        if let Some(limit) = query.limit {
            self = self.limit(limit);
        }
        if let Some(page) = query.page {
            self = self.page(page);
        }
        if let Some(field) = &query.sort_by {
            self = self.sort(field.clone(), query.sort_direction.unwrap_or(SortOrder::Asc));
        }
        self
    }

    pub fn params(&self) -> &PaginationParams {
        &self.params
    }

    /// Filtered fetch. Needs [`filter`](Self::filter), [`limit`](Self::limit)
    /// and [`page`](Self::page).
    pub async fn find(self) -> Result<PaginatedResponse> {
        let filter = PagingValidator::require_filter(&self.params)
            .inspect_err(|e| tracing::warn!(collection = %self.collection, "find rejected: {e}"))?
            .clone();
        let paging = PagingValidator::resolve_paging(&self.params)
            .inspect_err(|e| tracing::warn!(collection = %self.collection, "find rejected: {e}"))?;

        Executor::new(self.store, &self.collection, &self.params, paging)
            .find(filter)
            .await
    }

    /// Pipeline fetch. The window, sort and projection are appended after
    /// `stages`; setting a filter as well is an error.
    pub async fn aggregate(self, stages: Vec<Value>) -> Result<PaginatedResponse> {
        PagingValidator::reject_filter(&self.params).inspect_err(|e| {
            tracing::warn!(collection = %self.collection, "aggregate rejected: {e}")
        })?;
        let paging = PagingValidator::resolve_paging(&self.params).inspect_err(|e| {
            tracing::warn!(collection = %self.collection, "aggregate rejected: {e}")
        })?;

        Executor::new(self.store, &self.collection, &self.params, paging)
            .aggregate(stages)
            .await
    }
}

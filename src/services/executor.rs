use std::future::Future;

use serde_json::{json, Value};
use tokio::time::{timeout_at, Instant};

use crate::{
    error::{Phase, StoreResult},
    helpers::pagination_helpers::compute_pagination,
    models::pagination::{PaginatedResponse, PaginationParams},
    store::{FindOptions, Store},
    validators::paging_validator::ResolvedPaging,
    Error, Result, StoreError,
};

/// Field the counting pipeline writes its result to.
const COUNT_FIELD: &str = "total";

/// Runs the count and the windowed fetch of one validated query.
pub struct Executor<'a, S: Store + ?Sized> {
    store: &'a S,
    collection: &'a str,
    params: &'a PaginationParams,
    paging: ResolvedPaging,
    deadline: Option<Instant>,
}

impl<'a, S: Store + ?Sized> Executor<'a, S> {
    pub fn new(
        store: &'a S,
        collection: &'a str,
        params: &'a PaginationParams,
        paging: ResolvedPaging,
    ) -> Self {
        Self {
            store,
            collection,
            params,
            paging,
            deadline: params.timeout.map(|t| Instant::now() + t),
        }
    }

    /// Count and fetch run concurrently; the first failure aborts both.
    pub async fn find(self, filter: Value) -> Result<PaginatedResponse> {
        let ResolvedPaging { window, .. } = self.paging;
        tracing::debug!(
            collection = self.collection,
            skip = window.skip,
            limit = window.limit,
            "paginated find"
        );

        let options = FindOptions {
            filter,
            sort: self.params.sort.clone(),
            projection: self.params.projection.clone(),
            skip: window.skip,
            limit: window.limit,
        };

        let (total, data) = tokio::try_join!(
            self.guarded(Phase::Count, self.store.count(self.collection, &options.filter)),
            self.guarded(Phase::Fetch, self.store.find(self.collection, &options)),
        )?;

        Ok(self.assemble(total, data))
    }

    /// Counts first; an empty result set skips the fetch.
    pub async fn aggregate(self, stages: Vec<Value>) -> Result<PaginatedResponse> {
        let ResolvedPaging { window, .. } = self.paging;
        tracing::debug!(
            collection = self.collection,
            stages = stages.len(),
            skip = window.skip,
            limit = window.limit,
            "paginated aggregate"
        );

        let mut count_pipeline = stages.clone();
        count_pipeline.push(json!({ "$count": COUNT_FIELD }));
        let counted = self
            .guarded(
                Phase::Count,
                self.store.aggregate(self.collection, &count_pipeline),
            )
            .await?;
        let total = match counted.first() {
            None => 0,
            Some(row) => row
                .get(COUNT_FIELD)
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    tracing::error!(collection = self.collection, %row, "unreadable count row");
                    Error::Upstream {
                        phase: Phase::Count,
                        source: StoreError::MalformedResult(row.to_string()),
                    }
                })?,
        };

        if total == 0 {
            return Ok(self.assemble(0, Vec::new()));
        }

        let data_pipeline = self.windowed_pipeline(stages);
        let data = self
            .guarded(
                Phase::Fetch,
                self.store.aggregate(self.collection, &data_pipeline),
            )
            .await?;

        Ok(self.assemble(total, data))
    }

    /// Caller stages, then sort, skip, limit and projection.
    pub fn windowed_pipeline(&self, mut stages: Vec<Value>) -> Vec<Value> {
        let window = self.paging.window;
        if let Some((field, order)) = &self.params.sort {
            stages.push(json!({ "$sort": { field.as_str(): order.as_sign() } }));
        }
        stages.push(json!({ "$skip": window.skip }));
        stages.push(json!({ "$limit": window.limit }));
        if let Some(projection) = &self.params.projection {
            stages.push(json!({ "$project": projection }));
        }
        stages
    }

    async fn guarded<T>(
        &self,
        phase: Phase,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T> {
        let outcome = match self.deadline {
            Some(deadline) => timeout_at(deadline, call)
                .await
                .unwrap_or(Err(StoreError::Timeout)),
            None => call.await,
        };

        outcome.map_err(|source| {
            tracing::error!(collection = self.collection, %phase, "store call failed: {source}");
            Error::Upstream { phase, source }
        })
    }

    fn assemble(&self, total: u64, data: Vec<Value>) -> PaginatedResponse {
        let pagination = compute_pagination(total, self.paging.per_page, self.paging.page);
        tracing::debug!(
            collection = self.collection,
            total,
            returned = data.len(),
            page = pagination.page,
            total_page = pagination.total_page,
            "page assembled"
        );
        PaginatedResponse::new(data, pagination)
    }
}

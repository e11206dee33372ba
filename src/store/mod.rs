//! The database-client seam the paging core runs against.
//!
//! A store answers three questions about a named collection: how many
//! documents match a filter, which documents fall in a sorted/projected
//! window, and what an aggregation pipeline yields. Cursors are drained by
//! the store, so every call hands back an ordered `Vec` of raw documents.

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::StoreResult, models::sort::SortOrder};

pub mod memory_store;
pub mod surreal_store;

/// Arguments of a windowed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    pub filter: Value,
    pub sort: Option<(String, SortOrder)>,
    pub projection: Option<Value>,
    pub skip: u64,
    pub limit: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Number of documents matching `filter`, ignoring any windowing.
    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<u64>;

    async fn find(&self, collection: &str, options: &FindOptions) -> StoreResult<Vec<Value>>;

    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> StoreResult<Vec<Value>>;
}

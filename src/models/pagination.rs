use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{models::sort::SortOrder, Error, Result};

/// Page size used when the caller asks for `limit <= 0`.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Everything a caller configured on a [`PagingQuery`](crate::PagingQuery).
///
/// `limit` and `page` stay `None` until their setter is called, which is how
/// a terminal call tells "never set" apart from "explicitly set to zero".
#[derive(Debug, Clone, Default)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub page: Option<i64>,
    pub sort: Option<(String, SortOrder)>,
    pub projection: Option<Value>,
    pub filter: Option<Value>,
    pub timeout: Option<Duration>,
}

/// Slice of the matching result set materialized for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

/// Position of a page within the full match count, with its neighbours.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub total: u64,
    pub page: u64, // (1-based)
    pub per_page: u64,
    pub prev: Option<u64>,
    pub next: Option<u64>,
    pub total_page: u64,
}

/// One page of raw documents plus its pagination metadata.
///
/// `total` comes from a separate count round-trip, so under concurrent writes
/// it is not guaranteed to agree with the documents of the page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaginatedResponse {
    data: Vec<Value>,
    pagination: PaginationInfo,
}

impl PaginatedResponse {
    pub fn new(data: Vec<Value>, pagination: PaginationInfo) -> Self {
        Self { data, pagination }
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn pagination(&self) -> &PaginationInfo {
        &self.pagination
    }

    pub fn into_parts(self) -> (Vec<Value>, PaginationInfo) {
        (self.data, self.pagination)
    }

    /// Deserializes every document of the page into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.data
            .iter()
            .map(|doc| T::deserialize(doc).map_err(|e| Error::Decode(e.to_string())))
            .collect()
    }
}

/// Paging parameters as they arrive in an HTTP query string.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PaginationQuery {
    pub page: Option<i64>, // 1-based
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<SortOrder>,
}

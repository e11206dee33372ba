//! Page-number pagination over a document store.
//!
//! ```ignore
//! let page = PagingQuery::new(&store, "todo")
//!     .limit(10)
//!     .page(2)
//!     .sort("created_at", SortOrder::Desc)
//!     .filter(json!({ "status": "active" }))
//!     .find()
//!     .await?;
//! ```

pub use self::error::{Error, Phase, Result, StoreError};

pub use self::models::{
    pagination::{PaginatedResponse, PaginationInfo, PaginationQuery, DEFAULT_PAGE_SIZE},
    sort::SortOrder,
};
pub use self::services::paging_query::PagingQuery;
pub use self::store::{memory_store::MemoryStore, surreal_store::SurrealStore, FindOptions, Store};

pub mod config;
pub mod error;
pub mod helpers;
pub mod models;
pub mod services;
pub mod store;
pub mod validators;

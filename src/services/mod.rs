pub mod executor;
pub mod paging_query;

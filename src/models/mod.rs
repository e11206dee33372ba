pub mod database_helpers;
pub mod pagination;
pub mod sort;

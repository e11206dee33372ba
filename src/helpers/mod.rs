pub mod filter_helpers;
pub mod pagination_helpers;
pub mod pipeline_helpers;
pub mod projection_helpers;
pub mod surql_helpers;

pub mod field_validator;
pub mod paging_validator;

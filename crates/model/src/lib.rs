pub mod pagination;
pub mod records;

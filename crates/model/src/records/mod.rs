pub mod row;
pub mod skipped;

pub mod error;
pub mod http;
pub mod retry;
pub mod servicenow;

pub mod coordinator;
pub mod envelope;

pub use coordinator::BatchWriteCoordinator;
pub use envelope::{BatchEnvelope, BatchOutcome, BatchReport, ServicedRequest};

pub mod processor;
pub mod retry;

pub use processor::{BatchFailure, BatchOutcome, BatchProcessor};
pub use retry::{retry, RetryPolicy};

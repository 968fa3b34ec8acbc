pub mod accumulator;
pub mod batch;
pub mod config;
pub mod error;
pub mod models;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod traits;
pub mod worker;

pub use accumulator::ResultAccumulator;
pub use batch::BatchFetcher;
pub use config::BatchConfig;
pub use error::AppError;
pub use models::{FetchJob, FetchResult, FetchResults};
pub use traits::Fetcher;
pub use worker::{TracingWorkerReporter, WorkerEvent, WorkerReporter};

use std::future::Future;

use crate::error::AppError;

/// Fetches the body of a single URL.
///
/// One attempt per call, no retries. Implementations only need to "GET this
/// URL and return the body or fail"; deadlines and cancellation are applied
/// by the caller.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

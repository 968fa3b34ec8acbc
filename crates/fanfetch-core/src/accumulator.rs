//! Thread-safe collection of fetch results shared by the workers of a batch.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::FetchResult;

/// Append-only store of successful fetches.
///
/// Workers append as soon as a fetch completes so they can exit without
/// waiting on each other. The lock is only held for the `Vec` operation,
/// never across an `.await`.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    results: Mutex<Vec<FetchResult>>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append results. All of them land under one lock acquisition, so
    /// concurrent appends never interleave.
    pub fn append(&self, results: impl IntoIterator<Item = FetchResult>) {
        self.lock().extend(results);
    }

    pub fn push(&self, result: FetchResult) {
        self.lock().push(result);
    }

    /// Point-in-time copy of everything appended so far.
    pub fn snapshot(&self) -> Vec<FetchResult> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn into_results(self) -> Vec<FetchResult> {
        self.results
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // A panicking worker cannot leave a half-written Vec behind, so a
    // poisoned lock still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<FetchResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. Clones share
//! state, so a test keeps one handle for assertions while the batch under
//! test uses another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::traits::Fetcher;
use crate::worker::{WorkerEvent, WorkerReporter};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct MockRoute {
    delay: Option<Duration>,
    outcome: MockOutcome,
}

#[derive(Debug, Clone, Default)]
enum MockOutcome {
    /// Respond with the requested URL as the body.
    #[default]
    Echo,
    Fail(String),
    Panic,
}

/// Mock fetcher with per-URL behaviour.
///
/// URLs without a route answer with their own URL as the body. Records
/// every call and how many fetches are running at once.
#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<HashMap<String, MockRoute>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    /// Every URL answers with itself, immediately.
    pub fn echo() -> Self {
        Self::default()
    }

    /// Delay applied to every URL without its own delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail `url` with a network error.
    pub fn failing_on(mut self, url: &str, message: &str) -> Self {
        self.route(url).outcome = MockOutcome::Fail(message.to_string());
        self
    }

    pub fn panicking_on(mut self, url: &str) -> Self {
        self.route(url).outcome = MockOutcome::Panic;
        self
    }

    pub fn delay_for(mut self, url: &str, delay: Duration) -> Self {
        self.route(url).delay = Some(delay);
        self
    }

    /// URLs requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    /// Fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that ran at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn route(&mut self, url: &str) -> &mut MockRoute {
        Arc::make_mut(&mut self.routes)
            .entry(url.to_string())
            .or_default()
    }
}

/// Counts a fetch as running until dropped, so aborted fetches are counted
/// out too.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let route = self.routes.get(url);
        let delay = route.and_then(|r| r.delay).unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match route.map(|r| &r.outcome) {
            None | Some(MockOutcome::Echo) => Ok(url.to_string()),
            Some(MockOutcome::Fail(message)) => Err(AppError::NetworkError(message.clone())),
            Some(MockOutcome::Panic) => panic!("mock fetcher panicked on {url}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Owned copy of a [`WorkerEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedEvent {
    Started { worker_id: usize },
    JobStarted { worker_id: usize, url: String },
    JobCompleted { worker_id: usize, url: String },
    JobFailed { worker_id: usize, url: String },
    Cancelled { worker_id: usize },
    Stopped { worker_id: usize, completed: usize },
}

/// Reporter that records every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportedEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl WorkerReporter for RecordingReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let event = match event {
            WorkerEvent::Started { worker_id } => ReportedEvent::Started { worker_id },
            WorkerEvent::JobStarted { worker_id, url } => ReportedEvent::JobStarted {
                worker_id,
                url: url.to_string(),
            },
            WorkerEvent::JobCompleted { worker_id, url, .. } => ReportedEvent::JobCompleted {
                worker_id,
                url: url.to_string(),
            },
            WorkerEvent::JobFailed { worker_id, url, .. } => ReportedEvent::JobFailed {
                worker_id,
                url: url.to_string(),
            },
            WorkerEvent::Cancelled { worker_id } => ReportedEvent::Cancelled { worker_id },
            WorkerEvent::Stopped {
                worker_id,
                completed,
            } => ReportedEvent::Stopped {
                worker_id,
                completed,
            },
        };
        self.events.lock().unwrap().push(event);
    }
}

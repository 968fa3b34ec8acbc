//! Admission control: caps the number of requests in flight.
//!
//! A single atomic counter stands in for a semaphore. Requests over the
//! ceiling are rejected with 429 straight away, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use fanfetch_core::AppError;

use crate::error::ApiError;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;

/// Process-wide in-flight request counter with a fixed ceiling.
#[derive(Debug)]
pub struct AdmissionGate {
    in_flight: AtomicUsize,
    ceiling: usize,
}

impl AdmissionGate {
    pub fn new(ceiling: usize) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Requests currently holding (or momentarily probing for) a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Count the caller in and decide admission on the new total.
    ///
    /// The returned permit counts the caller out when dropped, whether the
    /// request finished, failed, panicked or was abandoned.
    pub fn try_admit(self: &Arc<Self>) -> Result<AdmissionPermit, AppError> {
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        let permit = AdmissionPermit {
            gate: Arc::clone(self),
        };

        if current > self.ceiling {
            drop(permit);
            return Err(AppError::RateLimitExceeded);
        }
        Ok(permit)
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

/// Proof of admission. Releases its slot on drop.
#[must_use = "dropping the permit releases the slot immediately"]
#[derive(Debug)]
pub struct AdmissionPermit {
    gate: Arc<AdmissionGate>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Middleware that rejects requests once the gate's ceiling is reached.
pub async fn limit_in_flight(
    State(gate): State<Arc<AdmissionGate>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let _permit = match gate.try_admit() {
        Ok(permit) => permit,
        Err(e) => {
            tracing::debug!(ceiling = gate.ceiling(), "Rejecting request over in-flight ceiling");
            return ApiError::from(e).into_response();
        }
    };

    next.run(request).await
}

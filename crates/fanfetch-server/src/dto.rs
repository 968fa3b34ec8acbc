use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use fanfetch_core::{AppError, FetchResults};

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct FetchRequest {
    /// Absolute URLs to fetch. Duplicates are fetched once.
    pub urls: Vec<String>,
}

impl FetchRequest {
    /// Reject oversized batches and unparsable URLs before anything is fetched.
    pub fn validate(&self, max_urls: usize) -> Result<(), AppError> {
        if self.urls.len() > max_urls {
            return Err(AppError::ValidationError(format!(
                "max number of urls is {max_urls}"
            )));
        }

        if let Some(raw) = self.urls.iter().find(|raw| Url::parse(raw).is_err()) {
            return Err(AppError::ValidationError(format!("url {raw:?} is invalid")));
        }

        Ok(())
    }
}

/// Response body: each requested URL mapped to its body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct FetchResponse(pub BTreeMap<String, String>);

impl From<FetchResults> for FetchResponse {
    fn from(results: FetchResults) -> Self {
        Self(results.into_map())
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub in_flight: usize,
    pub max_in_flight: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

/// A single URL waiting in the work queue.
///
/// Consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub url: String,
}

impl FetchJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// The body fetched for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub body: String,
}

impl FetchResult {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

/// Outcome of a successful batch: URL → body.
///
/// Keyed by URL, so callers look bodies up rather than relying on order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchResults(BTreeMap<String, String>);

impl FetchResults {
    /// Collapse results into a map. When a URL appears more than once the
    /// first result wins.
    pub fn from_results(results: impl IntoIterator<Item = FetchResult>) -> Self {
        let mut map = BTreeMap::new();
        for result in results {
            if let Entry::Vacant(slot) = map.entry(result.url) {
                slot.insert(result.body);
            }
        }
        Self(map)
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.0.get(url).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl IntoIterator for FetchResults {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

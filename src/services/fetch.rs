// SPDX-License-Identifier: MIT

//! Generation-guarded fetch state.
//!
//! Every data fetch exposes the same `{data, is_loading, error}` snapshot
//! to its consumer. Fetches carry a generation id: starting a new fetch
//! supersedes all earlier ones, and a completion whose generation is stale
//! is discarded, so a slow old response can never overwrite a newer one.
//! On failure `error` is set and `data` keeps its previous value.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Snapshot of a fetch in progress or completed.
#[derive(Debug, Clone, Serialize)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

/// Shared controller for one logical fetch target.
pub struct FetchController<T> {
    state: Mutex<FetchState<T>>,
    generation: AtomicU64,
}

impl<T: Clone> Default for FetchController<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FetchController<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FetchState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> FetchState<T> {
        self.state.lock().expect("fetch state poisoned").clone()
    }

    /// Begin a fetch: marks loading and returns the generation the caller
    /// must present on completion. Any earlier in-flight fetch is
    /// superseded.
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().expect("fetch state poisoned");
        state.is_loading = true;
        generation
    }

    /// Complete a fetch. Returns false when the result was discarded
    /// because a newer fetch has begun since.
    pub fn complete(&self, generation: u64, result: Result<T, String>) -> bool {
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(generation, "Discarding stale fetch result");
            return false;
        }

        let mut state = self.state.lock().expect("fetch state poisoned");
        // Re-check under the lock; begin() may have raced us.
        if generation != self.generation.load(Ordering::SeqCst) {
            return false;
        }

        state.is_loading = false;
        match result {
            Ok(data) => {
                state.data = Some(data);
                state.error = None;
            }
            Err(message) => {
                // data keeps its previous value
                state.error = Some(message);
            }
        }
        true
    }

    /// True if a fetch is currently marked in flight.
    pub fn is_loading(&self) -> bool {
        self.state.lock().expect("fetch state poisoned").is_loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_completion_is_discarded() {
        let controller = FetchController::<u32>::new();

        let slow = controller.begin();
        let fast = controller.begin();

        assert!(controller.complete(fast, Ok(2)));
        // The slower, older fetch finishes afterwards and must not win.
        assert!(!controller.complete(slow, Ok(1)));

        let state = controller.snapshot();
        assert_eq!(state.data, Some(2));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn error_preserves_previous_data() {
        let controller = FetchController::<u32>::new();

        let first = controller.begin();
        assert!(controller.complete(first, Ok(7)));

        let second = controller.begin();
        assert!(controller.complete(second, Err("network down".to_string())));

        let state = controller.snapshot();
        assert_eq!(state.data, Some(7));
        assert_eq!(state.error.as_deref(), Some("network down"));
        assert!(!state.is_loading);
    }

    #[test]
    fn begin_marks_loading() {
        let controller = FetchController::<u32>::new();
        assert!(!controller.is_loading());
        controller.begin();
        assert!(controller.is_loading());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Home feed - the one server-side consumer of the fetch contract
// ─────────────────────────────────────────────────────────────────────────────

use crate::error::AppError;
use crate::models::catalog::{FeaturedPlaylists, NewReleases};
use crate::services::catalog::CatalogService;
use chrono::{DateTime, Duration, Utc};

/// How long a home feed snapshot stays fresh before a request kicks a
/// background refresh.
const HOME_FEED_TTL_SECS: i64 = 5 * 60;

/// Dashboard browse data, fetched as one unit.
#[derive(Debug, Clone, Serialize)]
pub struct HomeFeed {
    pub new_releases: NewReleases,
    pub featured_playlists: FeaturedPlaylists,
    pub fetched_at: String,
}

/// Cached home feed behind a [`FetchController`].
pub struct HomeFeedCache {
    controller: Arc<FetchController<HomeFeed>>,
    last_fetched: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl Default for HomeFeedCache {
    fn default() -> Self {
        Self {
            controller: Arc::new(FetchController::new()),
            last_fetched: Arc::new(Mutex::new(None)),
        }
    }
}

impl HomeFeedCache {
    /// Return the current snapshot, spawning a background refresh when the
    /// data is missing or stale. At most one refresh is in flight; stale
    /// completions are discarded by the controller.
    pub fn snapshot_and_refresh(&self, catalog: CatalogService) -> FetchState<HomeFeed> {
        let now = Utc::now();
        let needs_refresh = {
            let mut last = self.last_fetched.lock().expect("home feed lock poisoned");
            let stale = match *last {
                Some(at) => now - at > Duration::seconds(HOME_FEED_TTL_SECS),
                None => true,
            };
            if stale && !self.controller.is_loading() {
                *last = Some(now);
                true
            } else {
                false
            }
        };

        if needs_refresh {
            let controller = Arc::clone(&self.controller);
            let last_fetched = Arc::clone(&self.last_fetched);
            let generation = controller.begin();
            tokio::spawn(async move {
                let result = fetch_home_feed(&catalog).await.map_err(|e| e.to_string());
                if result.is_err() {
                    // A failed refresh must not hold the stamp for the full
                    // TTL; clear it so the next request retries right away.
                    *last_fetched.lock().expect("home feed lock poisoned") = None;
                }
                controller.complete(generation, result);
            });
        }

        self.controller.snapshot()
    }
}

async fn fetch_home_feed(catalog: &CatalogService) -> Result<HomeFeed, AppError> {
    let new_releases = catalog.new_releases().await?;
    let featured_playlists = catalog.featured_playlists().await?;
    Ok(HomeFeed {
        new_releases,
        featured_playlists,
        fetched_at: Utc::now().to_rfc3339(),
    })
}

//! Incremental post-list pagination.
//!
//! A [`PostPage`] is the accumulated listing; loading more follows its
//! `next_page` cursor once and appends the fetched results behind the ones
//! already held. Appending never reorders or deduplicates earlier pages.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tracing::debug;

use crate::{
    application::content::{ContentError, PageFetcher},
    domain::posts::PostPage,
};

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("no further pages are available")]
    Exhausted,
    #[error("a page fetch is already in flight")]
    InFlight,
    #[error("page token `{0}` does not belong to the content source")]
    ForeignToken(String),
    #[error("failed to fetch the next page")]
    Fetch(#[from] ContentError),
}

/// Starting state of a listing: the prefetched page, or an empty one.
pub fn initialize(seed: Option<PostPage>) -> PostPage {
    seed.unwrap_or_default()
}

/// Fetch the page behind `current.next_page` and append it.
///
/// `current` is left untouched; on failure the caller keeps its state.
pub async fn load_more<F>(current: &PostPage, fetcher: &F) -> Result<PostPage, PaginationError>
where
    F: PageFetcher + ?Sized,
{
    let token = current
        .next_page
        .as_deref()
        .ok_or(PaginationError::Exhausted)?;

    let response = fetcher.fetch_page(token).await?;

    debug!(
        target = "spacetraveling::application::pagination",
        held = current.results.len(),
        fetched = response.results.len(),
        has_more = response.next_page.is_some(),
        "page appended"
    );

    let mut results = Vec::with_capacity(current.results.len() + response.results.len());
    results.extend(current.results.iter().cloned());
    results.extend(response.results);

    Ok(PostPage {
        next_page: response.next_page,
        results,
    })
}

/// Owned listing state with at most one page fetch in flight.
#[derive(Debug)]
pub struct Paginator {
    state: Mutex<PostPage>,
    in_flight: AtomicBool,
}

impl Paginator {
    pub fn new(seed: Option<PostPage>) -> Self {
        Self {
            state: Mutex::new(initialize(seed)),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> PostPage {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_more(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Advance the listing by one page.
    ///
    /// A call made while another is pending is rejected with
    /// [`PaginationError::InFlight`]. State only changes on success.
    pub async fn load_more<F>(&self, fetcher: &F) -> Result<PostPage, PaginationError>
    where
        F: PageFetcher + ?Sized,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PaginationError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let current = self.snapshot();
        let next = load_more(&current, fetcher).await?;

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next.clone();
        metrics::counter!("spacetraveling_pagination_loads_total").increment(1);
        Ok(next)
    }

    pub fn into_page(self) -> PostPage {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

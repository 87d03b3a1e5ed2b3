//! Remote collection access.
//!
//! A [`RemoteFetcher`] retrieves one page at a time. [`fetch_pages`] and
//! [`fetch_all`] turn it into a lazy sequence that follows continuation links
//! from a starting locator until a page has none.

use crate::{error::Result, Error, RemoteRecord};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One unit of remote retrieval.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    /// Records in the order the remote returned them
    pub records: Vec<RemoteRecord>,
    /// Locator of the following page, if any
    pub next: Option<String>,
}

impl Page {
    pub fn new(records: Vec<RemoteRecord>) -> Self {
        Self {
            records,
            next: None,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

/// Retrieves pages of a remote collection.
///
/// Implementations may suspend on network I/O. A failed fetch should be
/// reported as [`Error::Transport`].
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fetch the page named by `locator`.
    async fn fetch_page(&self, locator: &str) -> Result<Page>;
}

#[async_trait]
impl<F: RemoteFetcher + ?Sized> RemoteFetcher for std::sync::Arc<F> {
    async fn fetch_page(&self, locator: &str) -> Result<Page> {
        (**self).fetch_page(locator).await
    }
}

struct Cursor {
    next: Option<String>,
    visited: HashSet<String>,
}

/// Lazily enumerate pages starting at `start`.
///
/// Each call starts a fresh enumeration. The stream ends after the first
/// page without a continuation, or after the first error.
pub fn fetch_pages<'a, F>(fetcher: &'a F, start: &str) -> BoxStream<'a, Result<Page>>
where
    F: RemoteFetcher + ?Sized,
{
    let cursor = Cursor {
        next: Some(start.to_string()),
        visited: HashSet::new(),
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        let Some(locator) = cursor.next.take() else {
            return Ok(None);
        };
        if !cursor.visited.insert(locator.clone()) {
            return Err(Error::ContinuationLoop(locator));
        }

        tracing::debug!(%locator, "fetching page");
        let mut page = fetcher.fetch_page(&locator).await?;
        cursor.next = page.next.take();
        page.next = cursor.next.clone();
        Ok(Some((page, cursor)))
    })
    .boxed()
}

/// Lazily enumerate every record reachable from `start`, page by page.
pub fn fetch_all<'a, F>(fetcher: &'a F, start: &str) -> BoxStream<'a, Result<RemoteRecord>>
where
    F: RemoteFetcher + ?Sized,
{
    fetch_pages(fetcher, start)
        .map_ok(|page| stream::iter(page.records.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
}

/// A scripted in-memory fetcher.
///
/// Pages built with [`MemoryFetcher::from_pages`] get the locators
/// `memory://page/0`, `memory://page/1`, ... and are chained by `next` links.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, Page>,
    failures: Mutex<HashMap<String, String>>,
    requests: AtomicUsize,
}

impl MemoryFetcher {
    /// Locator of the first page built by [`MemoryFetcher::from_pages`].
    pub const START: &'static str = "memory://page/0";

    /// Create a fetcher with no pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain `pages` behind [`MemoryFetcher::START`].
    ///
    /// An empty list still yields one empty page.
    pub fn from_pages(pages: Vec<Vec<RemoteRecord>>) -> Self {
        let mut fetcher = Self::new();
        let count = pages.len().max(1);
        let mut pages = pages.into_iter();
        for index in 0..count {
            let records = pages.next().unwrap_or_default();
            let mut page = Page::new(records);
            if index + 1 < count {
                page = page.with_next(Self::locator(index + 1));
            }
            fetcher.pages.insert(Self::locator(index), page);
        }
        fetcher
    }

    /// Locator of the page at `index`.
    pub fn locator(index: usize) -> String {
        format!("memory://page/{}", index)
    }

    /// Register a page under an explicit locator.
    pub fn insert_page(&mut self, locator: impl Into<String>, page: Page) {
        self.pages.insert(locator.into(), page);
    }

    /// Make every fetch of page `index` fail with a transport error.
    pub fn fail_at(&self, index: usize, message: impl Into<String>) {
        self.failures
            .lock()
            .insert(Self::locator(index), message.into());
    }

    /// Stop failing page `index`.
    pub fn heal(&self, index: usize) {
        self.failures.lock().remove(&Self::locator(index));
    }

    /// Total number of page requests served or refused so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFetcher for MemoryFetcher {
    async fn fetch_page(&self, locator: &str) -> Result<Page> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.failures.lock().get(locator) {
            return Err(Error::transport(locator, message));
        }

        self.pages
            .get(locator)
            .cloned()
            .ok_or_else(|| Error::transport(locator, "no such page"))
    }
}

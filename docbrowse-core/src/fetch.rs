//! Fetch capabilities: locator in, document text out
//!
//! The store never knows where text comes from. A [`Fetcher`] maps a locator
//! (`manifest.txt`, `docs/api.md`) to its contents or a [`DocError`]; timeouts
//! are a property of the fetcher, not the store.
use std::{
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use ahash::AHashMap;
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::{
    config::FetchConfig,
    error::{DocError, DocResult},
    index::path_index::SEPARATOR,
};

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> DocResult<String>;
}

pub type SharedFetcher = Arc<dyn Fetcher>;

/// Locator for the document shown at `route`: `/` is the root document,
/// anything else is the route without its leading separator.
#[must_use]
pub fn document_locator<'a>(route: &'a str, root_document: &'a str) -> &'a str {
    match route.trim_start_matches(SEPARATOR) {
        "" => root_document,
        path => path,
    }
}

/// Reads locators as files below a root directory.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(&config.root)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> DocResult<PathBuf> {
        let relative = Path::new(locator);

        if locator.is_empty() {
            return Err(DocError::invalid_input("locator", "empty locator"));
        }

        // locators stay inside the root
        if relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir))
        {
            return Err(DocError::invalid_input(
                "locator",
                "must be a relative path without '..'",
            ));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Fetcher for FsFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, locator: &str) -> DocResult<String> {
        let path = self.resolve(locator)?;
        let started = Instant::now();

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocError::not_found(locator));
            }
            Err(error) => return Err(DocError::fetch_failed(locator, error)),
        };

        debug!(
            marker = "FETCH_OPERATION",
            operation_type = "fs_read",
            locator = locator,
            bytes = text.len(),
            elapsed_us = started.elapsed().as_micros(),
            "Fetched document"
        );

        Ok(text)
    }
}

/// In-memory documents, mostly for tests and demos.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: AHashMap<String, String>,
    latency: Duration,
    calls: AtomicUsize,
}

impl StaticFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, locator: &str, text: &str) -> Self {
        self.documents.insert(locator.to_owned(), text.to_owned());
        self
    }

    /// Delay every fetch by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of fetches served so far, found or not.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, locator: &str) -> DocResult<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.documents
            .get(locator)
            .cloned()
            .ok_or_else(|| DocError::not_found(locator))
    }
}

/// Bounds every fetch of the wrapped fetcher. A zero timeout disables it.
#[derive(Debug, Clone)]
pub struct TimeoutFetcher<F> {
    inner: F,
    timeout: Duration,
}

impl<F> TimeoutFetcher<F>
where
    F: Fetcher,
{
    #[must_use]
    pub const fn new(inner: F, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<F> Fetcher for TimeoutFetcher<F>
where
    F: Fetcher,
{
    async fn fetch(&self, locator: &str) -> DocResult<String> {
        if self.timeout.is_zero() {
            return self.inner.fetch(locator).await;
        }

        match tokio::time::timeout(self.timeout, self.inner.fetch(locator)).await {
            Ok(result) => result,
            Err(_) => {
                #[expect(clippy::cast_possible_truncation, reason = "Expected accuracy")]
                let timeout_ms = self.timeout.as_millis() as u64;

                warn!(
                    marker = "FETCH_OPERATION",
                    operation_type = "fetch_timeout",
                    locator = locator,
                    timeout_ms = timeout_ms,
                    "Fetch timed out"
                );
                Err(DocError::fetch_timeout(locator, timeout_ms))
            }
        }
    }
}

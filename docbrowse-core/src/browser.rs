//! `src/browser.rs`
//! ============================================================================
//! # DocBrowser: one store, one fetcher, and the views derived from them
//!
//! The manifest and every document live in the same [`ResourceStore`] under
//! `"manifest"` and `"markdown-<route>"`. Search and tree are recomputed from
//! the manifest's [`PathIndex`] on demand and never cached.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    config::Config,
    error::DocError,
    fetch::{SharedFetcher, document_locator},
    index::path_index::PathIndex,
    search::fuzzy::{FuzzySearch, SearchResult},
    store::{
        entry::{Entry, ResourceKey},
        resource_store::{Dispatch, ResourceStore},
        stats::StoreStatsSnapshot,
    },
    tree::{
        builder::{Child, TreeBuilder},
        view::{TreeRow, TreeView},
    },
};

/// Value stored per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Manifest(PathIndex),
    Document(Arc<str>),
}

pub struct DocBrowser {
    config: Config,
    fetcher: SharedFetcher,
    store: ResourceStore<Payload>,
    search: FuzzySearch,
}

impl std::fmt::Debug for DocBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocBrowser")
            .field("store", &self.store)
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

impl DocBrowser {
    #[must_use]
    pub fn new(config: Config, fetcher: SharedFetcher) -> Self {
        let store = ResourceStore::new(config.store.clone());
        let search = FuzzySearch::from_config(&config.search);

        info!(
            marker = "BROWSER_INIT",
            operation_type = "browser_init",
            root = %config.fetch.root.display(),
            manifest = %config.fetch.manifest,
            search_limit = search.limit(),
            "Document browser created"
        );

        Self {
            config,
            fetcher,
            store,
            search,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &ResourceStore<Payload> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Fetch the manifest unless it is loaded or loading.
    pub async fn ensure_manifest(&self) -> Dispatch {
        self.store
            .ensure(&ResourceKey::manifest(), || self.load_manifest())
            .await
    }

    /// Fetch the manifest again, whatever its state.
    pub async fn reload_manifest(&self) -> Dispatch {
        self.store
            .dispatch(&ResourceKey::manifest(), || self.load_manifest())
            .await
    }

    /// Fetch the document at `route` unless it is loaded or loading.
    #[instrument(level = "debug", skip(self))]
    pub async fn ensure_document(&self, route: &str) -> Dispatch {
        self.store
            .ensure(&ResourceKey::document(route), || self.load_document(route))
            .await
    }

    pub async fn reload_document(&self, route: &str) -> Dispatch {
        self.store
            .dispatch(&ResourceKey::document(route), || self.load_document(route))
            .await
    }

    /// First page view: manifest and the opened document, side by side.
    pub async fn open(&self, route: &str) -> (Dispatch, Dispatch) {
        futures::join!(self.ensure_manifest(), self.ensure_document(route))
    }

    async fn load_manifest(&self) -> Result<Payload, DocError> {
        let text = self.fetcher.fetch(&self.config.fetch.manifest).await?;
        Ok(Payload::Manifest(PathIndex::from_manifest(&text)))
    }

    async fn load_document(&self, route: &str) -> Result<Payload, DocError> {
        let locator = document_locator(route, &self.config.fetch.root_document);
        let text = self.fetcher.fetch(locator).await?;
        Ok(Payload::Document(Arc::from(text)))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    #[must_use]
    pub fn manifest_entry(&self) -> Option<Entry<Payload>> {
        self.store.get(ResourceKey::MANIFEST)
    }

    #[must_use]
    pub fn document_entry(&self, route: &str) -> Option<Entry<Payload>> {
        self.store.get(ResourceKey::document(route).as_str())
    }

    /// Paths from the manifest; `None` until it has loaded once.
    #[must_use]
    pub fn path_index(&self) -> Option<PathIndex> {
        match self.manifest_entry()?.value? {
            Payload::Manifest(index) => Some(index),
            Payload::Document(_) => None,
        }
    }

    /// Raw markdown for `route`, if it has loaded.
    #[must_use]
    pub fn document(&self, route: &str) -> Option<Arc<str>> {
        match self.document_entry(route)?.value? {
            Payload::Document(text) => Some(text),
            Payload::Manifest(_) => None,
        }
    }

    /// Ranked manifest paths for `query`; empty until the manifest loads.
    #[must_use]
    pub fn search(&self, query: &str) -> SearchResult {
        self.path_index()
            .map(|index| self.search.search(&index, query))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn tree(&self) -> TreeBuilder {
        self.path_index()
            .map(|index| TreeBuilder::new(&index))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn tree_children(&self, prefix: &str) -> Vec<Child> {
        self.tree().children(prefix)
    }

    #[must_use]
    pub fn tree_rows(&self, view: &TreeView) -> Vec<TreeRow> {
        view.visible_rows(&self.tree())
    }

    /// True while any fetch is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.store.any_loading()
    }

    #[must_use]
    pub fn stats(&self) -> StoreStatsSnapshot {
        self.store.stats()
    }
}

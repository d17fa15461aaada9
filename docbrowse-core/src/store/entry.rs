//! Per-key state held by the resource store
use std::{borrow::Borrow, fmt, sync::Arc};

use crate::error::DocError;

/// Logical resource identifier: `"manifest"` or `"markdown-<route>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(Arc<str>);

impl ResourceKey {
    pub const MANIFEST: &'static str = "manifest";

    pub const DOCUMENT_PREFIX: &'static str = "markdown-";

    #[must_use]
    pub fn manifest() -> Self {
        Self(Arc::from(Self::MANIFEST))
    }

    /// Key for the document shown at `route` (`/`, `/docs/api.md`, ...).
    #[must_use]
    pub fn document(route: &str) -> Self {
        Self(Arc::from(format!("{}{route}", Self::DOCUMENT_PREFIX)))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl From<&ResourceKey> for ResourceKey {
    fn from(key: &ResourceKey) -> Self {
        key.clone()
    }
}

/// Loading/error/value triple for one key.
///
/// Each transition touches only its own fields: starting a fetch flips
/// `loading` and keeps the previous `value`/`error`; success clears `error`;
/// failure leaves `value` as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    pub loading: bool,
    pub error: Option<DocError>,
    pub value: Option<T>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            value: None,
        }
    }
}

impl<T> Entry<T> {
    /// No fetch running and no value to show. A failed entry qualifies.
    #[must_use]
    pub const fn needs_fetch(&self) -> bool {
        !self.loading && self.value.is_none()
    }

    pub(crate) fn start(&mut self) {
        self.loading = true;
    }

    pub(crate) fn resolve(&mut self, value: T) {
        self.loading = false;
        self.value = Some(value);
        self.error = None;
    }

    pub(crate) fn reject(&mut self, error: DocError) {
        self.loading = false;
        self.error = Some(error);
    }

    pub(crate) fn abandon(&mut self) {
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert_eq!(ResourceKey::manifest().as_str(), "manifest");
        assert_eq!(ResourceKey::document("/").as_str(), "markdown-/");
        assert_eq!(
            ResourceKey::document("/docs/api.md").to_string(),
            "markdown-/docs/api.md"
        );
        assert_eq!(ResourceKey::from("manifest"), ResourceKey::manifest());
    }

    #[test]
    fn transitions_touch_only_their_fields() {
        let mut entry: Entry<u32> = Entry::default();
        assert!(entry.needs_fetch());

        entry.start();
        entry.resolve(1);
        entry.start();
        assert_eq!(entry.value, Some(1));
        assert!(entry.loading);

        entry.reject(DocError::fetch_failed("x", "boom"));
        assert_eq!(entry.value, Some(1));
        assert!(!entry.loading);

        entry.start();
        assert!(entry.error.is_some());
        entry.resolve(2);
        assert_eq!(entry.error, None);
        assert_eq!(entry.value, Some(2));
    }

    #[test]
    fn failed_entry_without_value_needs_fetch() {
        let mut entry: Entry<u32> = Entry::default();
        entry.start();
        assert!(!entry.needs_fetch());

        entry.reject(DocError::fetch_failed("x", "boom"));
        assert!(entry.needs_fetch());
    }

    #[test]
    fn failed_refresh_keeps_value_and_skips_fetch() {
        let mut entry: Entry<u32> = Entry::default();
        entry.start();
        entry.resolve(1);
        entry.start();
        entry.reject(DocError::fetch_failed("x", "boom"));

        assert!(!entry.needs_fetch());
    }
}

//! Fuzzy file-name search over the path index
//!
//! Every path is ranked by Levenshtein distance to the query. Equal
//! distances keep index order, so results are deterministic and repeatable
//! on every keystroke.
use std::time::Instant;

use smallvec::SmallVec;
use tracing::{debug, instrument};

use crate::{config::SearchConfig, index::path_index::PathIndex};

pub const DEFAULT_LIMIT: usize = 10;

/// Minimum number of single-character insertions, deletions and
/// substitutions turning `a` into `b`. Counts `char`s, not bytes.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let b_chars: SmallVec<[char; 64]> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    // single rolling row: row[j] = distance(a[..i], b[..j])
    let mut row: SmallVec<[usize; 65]> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;

        for (j, &cb) in b_chars.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            let deletion = row[j + 1] + 1;
            let insertion = row[j] + 1;

            diagonal = row[j + 1];
            row[j + 1] = substitution.min(deletion).min(insertion);
        }
    }

    row[b_chars.len()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    pub distance: usize,
}

/// Ranked candidates, nearest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResult {
    hits: Vec<SearchHit>,
}

impl SearchResult {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|hit| hit.path.as_str())
    }

    #[must_use]
    pub fn into_paths(self) -> Vec<String> {
        self.hits.into_iter().map(|hit| hit.path).collect()
    }
}

/// Ranking policy. Stateless apart from its knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzySearch {
    limit: usize,
    max_distance: Option<usize>,
}

impl Default for FuzzySearch {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl FuzzySearch {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            max_distance: None,
        }
    }

    #[must_use]
    pub const fn from_config(config: &SearchConfig) -> Self {
        Self {
            limit: config.limit,
            max_distance: config.max_distance,
        }
    }

    /// Drop candidates farther than `max_distance` from the query.
    #[must_use]
    pub const fn with_max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Rank `index` against `query`. An empty query yields no results.
    #[instrument(level = "debug", skip(self, index), fields(candidates = index.len()))]
    pub fn search(&self, index: &PathIndex, query: &str) -> SearchResult {
        if query.is_empty() || self.limit == 0 {
            return SearchResult::default();
        }

        let started = Instant::now();

        // (distance, position) orders like a stable sort on distance
        let mut ranked: Vec<(usize, usize)> = index
            .iter()
            .enumerate()
            .map(|(position, path)| (levenshtein(query, path), position))
            .filter(|&(distance, _)| self.max_distance.is_none_or(|max| distance <= max))
            .collect();

        if ranked.len() > self.limit {
            ranked.select_nth_unstable(self.limit);
            ranked.truncate(self.limit);
        }
        ranked.sort_unstable();

        let paths = index.as_slice();
        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .map(|(distance, position)| SearchHit {
                path: paths[position].clone(),
                distance,
            })
            .collect();

        debug!(
            marker = "SEARCH_OPERATION",
            operation_type = "fuzzy_rank",
            results = hits.len(),
            elapsed_us = started.elapsed().as_micros(),
            "Ranked paths"
        );

        SearchResult { hits }
    }
}

/// Top `limit` paths of `index` nearest to `query`.
#[must_use]
pub fn search(index: &PathIndex, query: &str, limit: usize) -> SearchResult {
    FuzzySearch::new(limit).search(index, query)
}

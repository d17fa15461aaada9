pub mod error;

pub mod config;

pub mod logging;
pub use logging::Logger;

pub mod fetch;

pub mod index {
    pub mod path_index;
    pub use path_index::PathIndex;
}

pub mod search {
    pub mod fuzzy;
    pub use fuzzy::{FuzzySearch, SearchHit, SearchResult, levenshtein};
}

pub mod tree {
    pub mod builder;
    pub use builder::{Child, ChildKind, TreeBuilder, children_of};

    pub mod view;
    pub use view::{TreeRow, TreeView};
}

pub mod store {
    pub mod entry;
    pub use entry::{Entry, ResourceKey};

    pub mod stats;
    pub use stats::{StoreStats, StoreStatsSnapshot};

    pub mod resource_store;
    pub use resource_store::{Dispatch, ResourceStore, StoreSnapshot};
}

pub mod browser;
pub use browser::{DocBrowser, Payload};

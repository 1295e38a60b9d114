//! Per-collection resource caches with scope-aware lazy loading.

mod collection;

pub use collection::CollectionCache;

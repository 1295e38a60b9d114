//! Per-collection write buffers coalescing pending mutations until a flush.

mod collection;

pub use collection::{CollectionBuffer, Pending};

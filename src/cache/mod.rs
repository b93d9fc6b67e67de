//! Local cache of the watched collection.
//!
//! The cache is written only by the event handler, always before the
//! corresponding key is enqueued, and read by workers.

mod indexer;

pub use indexer::*;

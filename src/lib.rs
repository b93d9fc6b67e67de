//! Level-triggered reconciliation engine.
//!
//! An [`EventSource`] feeds list+watch notifications into a local
//! [`Indexer`] and a deduplicating, rate-limited work queue. A pool of
//! workers pulls keys from the queue and hands the current cached state
//! (or `None` after a delete) to a [`Reconciler`], retrying failures with
//! per-key exponential backoff.

mod cache;
mod config;
mod controller;
mod errors;
mod key;
mod metrics;
mod object;
mod queue;
mod source;
pub(crate) mod utils;

pub use cache::*;
pub use config::*;
pub use controller::*;
pub use errors::*;
pub use key::*;
pub use metrics::*;
pub use object::*;
pub use queue::*;
pub use source::*;

#[cfg(test)]
pub(crate) mod test_utils;

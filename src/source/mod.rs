//! Event source abstraction.
//!
//! A source delivers list+watch notifications for a collection of remote
//! objects. Delivery is a synchronous call into an [`EventHandler`]: when
//! [`EventHandler::on_event`] returns, the handler has applied the change to
//! its cache and enqueued the key, so flipping [`EventSource::has_synced`]
//! after the initial listing guarantees a warm cache.
//!
//! How objects are fetched (long-lived watch connections, credentials,
//! decoding) is the source implementation's business. [`ChannelEventSource`]
//! is an in-memory implementation driven through a [`SourceHandle`].

mod channel_source;

pub use channel_source::*;


use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::Object;
use crate::Result;

/// A delete notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletedObject<T> {
    /// The source observed the delete and knows the final state
    Final(T),

    /// The delete was missed (e.g. during a relist); `last_known` may be stale
    Tombstone { key: String, last_known: T },
}

impl<T> DeletedObject<T> {
    /// The last state of the object the source knew about.
    pub fn object(&self) -> &T {
        match self {
            DeletedObject::Final(obj) => obj,
            DeletedObject::Tombstone { last_known, .. } => last_known,
        }
    }
}

/// Notification delivered by an [`EventSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    Added(T),
    Updated { old: T, new: T },
    Deleted(DeletedObject<T>),
}

/// Receiver of source notifications.
///
/// Called from the source's task; implementations must be safe to call
/// concurrently with cache reads from worker tasks.
pub trait EventHandler<T>: Send + Sync + 'static {
    fn on_event(
        &self,
        event: WatchEvent<T>,
    );
}

#[async_trait]
pub trait EventSource<T: Object>: Send + Sync + 'static {
    /// Lists, then watches, delivering every notification to `handler` until
    /// `shutdown` fires.
    async fn run(
        &self,
        handler: Arc<dyn EventHandler<T>>,
        shutdown: watch::Receiver<()>,
    ) -> Result<()>;

    /// True once the complete initial listing has been delivered.
    fn has_synced(&self) -> bool;
}

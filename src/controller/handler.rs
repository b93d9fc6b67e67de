use std::sync::Arc;

use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::DeletedObject;
use crate::EventHandler;
use crate::Indexer;
use crate::KeyError;
use crate::Object;
use crate::RateLimitingQueue;
use crate::WatchEvent;

/// Bridges source notifications into the cache and the work queue.
///
/// The cache write always happens before the key is enqueued, so any worker
/// that picks the key up observes at least this notification's state.
pub struct ResourceEventHandler<T> {
    indexer: Arc<Indexer<T>>,
    queue: Arc<RateLimitingQueue<String>>,
}

impl<T: Object> ResourceEventHandler<T> {
    pub fn new(
        indexer: Arc<Indexer<T>>,
        queue: Arc<RateLimitingQueue<String>>,
    ) -> Self {
        Self { indexer, queue }
    }

    fn on_add(
        &self,
        obj: T,
    ) {
        match self.indexer.add(obj) {
            Ok(key) => {
                debug!("Queued Add event {}", key);
                self.queue.add(key);
            }
            Err(e) => drop_notification("add", e),
        }
    }

    fn on_update(
        &self,
        old: T,
        new: T,
    ) {
        // Only payload changes are worth a reconcile; metadata-only updates
        // and resyncs refresh the cache silently.
        let changed = old.payload() != new.payload();
        match self.indexer.update(new) {
            Ok(key) if changed => {
                debug!("Queued Update event {}", key);
                self.queue.add(key);
            }
            Ok(key) => trace!("Update for {} without payload change", key),
            Err(e) => drop_notification("update", e),
        }
    }

    fn on_delete(
        &self,
        deleted: DeletedObject<T>,
    ) {
        match self.indexer.delete(&deleted) {
            Ok(key) => {
                debug!("Queued Delete event {}", key);
                self.queue.add(key);
            }
            Err(e) => drop_notification("delete", e),
        }
    }
}

impl<T: Object> EventHandler<T> for ResourceEventHandler<T> {
    fn on_event(
        &self,
        event: WatchEvent<T>,
    ) {
        match event {
            WatchEvent::Added(obj) => self.on_add(obj),
            WatchEvent::Updated { old, new } => self.on_update(old, new),
            WatchEvent::Deleted(deleted) => self.on_delete(deleted),
        }
    }
}

/// A notification without a usable key cannot be retried: the key is the
/// thing that is missing.
fn drop_notification(
    kind: &str,
    e: KeyError,
) {
    warn!("dropping {} notification: {}", kind, e);
}

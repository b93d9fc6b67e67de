use std::collections::HashSet;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use crate::QUEUE_ADDS_METRIC;
use crate::QUEUE_DEPTH_METRIC;

/// Anything usable as a queue item.
pub trait QueueKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<K> QueueKey for K where K: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

struct QueueState<K> {
    /// Keys ready to be handed out, in FIFO order
    queue: VecDeque<K>,
    /// Keys that need processing: everything in `queue`, plus in-flight keys
    /// re-added since they were handed out
    dirty: HashSet<K>,
    /// Keys handed out by `get` and not yet `done`
    processing: HashSet<K>,
    shutting_down: bool,
}

/// Deduplicating FIFO work queue.
///
/// A key is held at most once across pending and in-flight: adding a pending
/// key is a no-op, adding an in-flight key marks it dirty so it resurfaces
/// once when the current holder calls [`WorkQueue::done`]. This is what keeps
/// two workers from ever holding the same key.
pub struct WorkQueue<K> {
    name: String,
    state: Mutex<QueueState<K>>,
    item_available: Notify,
    processing_idle: Notify,
}

impl<K: QueueKey> WorkQueue<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            item_available: Notify::new(),
            processing_idle: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks `key` as needing processing. Ignored after shut down.
    pub fn add(
        &self,
        key: K,
    ) {
        let mut state = self.state.lock();
        if state.shutting_down {
            trace!("[{}] add {:?} after shut down ignored", self.name, key);
            return;
        }
        if !state.dirty.insert(key.clone()) {
            trace!("[{}] {:?} already queued", self.name, key);
            return;
        }

        QUEUE_ADDS_METRIC.with_label_values(&[self.name.as_str()]).inc();
        if state.processing.contains(&key) {
            trace!("[{}] {:?} in flight; will resurface on done", self.name, key);
            return;
        }

        state.queue.push_back(key);
        QUEUE_DEPTH_METRIC
            .with_label_values(&[self.name.as_str()])
            .set(state.queue.len() as i64);
        drop(state);

        self.item_available.notify_one();
    }

    /// Waits for the next key and marks it in flight.
    ///
    /// Returns `None` once the queue is shutting down; callers must then
    /// exit. Every `Some(key)` must be paired with a [`WorkQueue::done`].
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.item_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    QUEUE_DEPTH_METRIC
                        .with_label_values(&[self.name.as_str()])
                        .set(state.queue.len() as i64);
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Ends processing of `key`. If it was re-added meanwhile it becomes
    /// pending again.
    pub fn done(
        &self,
        key: &K,
    ) {
        let mut state = self.state.lock();
        state.processing.remove(key);

        let requeue = !state.shutting_down && state.dirty.contains(key);
        if requeue {
            state.queue.push_back(key.clone());
            QUEUE_DEPTH_METRIC
                .with_label_values(&[self.name.as_str()])
                .set(state.queue.len() as i64);
        }
        let idle = state.processing.is_empty();
        drop(state);

        if requeue {
            self.item_available.notify_one();
        }
        if idle {
            self.processing_idle.notify_waiters();
        }
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Stops handing out keys and wakes every blocked [`WorkQueue::get`].
    ///
    /// Pending keys are discarded; in-flight holders still call `done`.
    pub fn shut_down(&self) {
        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        state.shutting_down = true;
        let discarded = state.queue.len();
        state.queue.clear();
        state.dirty.clear();
        QUEUE_DEPTH_METRIC.with_label_values(&[self.name.as_str()]).set(0);
        drop(state);

        debug!("[{}] shut down, {} pending keys discarded", self.name, discarded);
        self.item_available.notify_waiters();
    }

    /// Shuts down, then waits until every in-flight key is `done`.
    pub async fn shut_down_with_drain(&self) {
        self.shut_down();
        loop {
            let idle = self.processing_idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            let drained = self.state.lock().processing.is_empty();
            if drained {
                return;
            }
            idle.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().processing.len()
    }
}

use std::time::Duration;

use tracing::trace;

use super::DelayingQueue;
use super::QueueKey;
use super::RateLimiter;
use crate::QUEUE_RETRIES_METRIC;

/// Work queue whose re-adds are delayed by a [`RateLimiter`].
pub struct RateLimitingQueue<K> {
    queue: DelayingQueue<K>,
    limiter: Box<dyn RateLimiter<K>>,
}

impl<K: QueueKey> RateLimitingQueue<K> {
    /// Must be called from within a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        limiter: Box<dyn RateLimiter<K>>,
    ) -> Self {
        Self {
            queue: DelayingQueue::new(name),
            limiter,
        }
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    pub fn add(
        &self,
        key: K,
    ) {
        self.queue.add(key);
    }

    pub fn add_after(
        &self,
        key: K,
        delay: Duration,
    ) {
        self.queue.add_after(key, delay);
    }

    /// Re-adds `key` after the delay its failure history calls for.
    pub fn add_rate_limited(
        &self,
        key: K,
    ) {
        let delay = self.limiter.when(&key);
        trace!("[{}] requeue {:?} in {:?}", self.name(), key, delay);
        QUEUE_RETRIES_METRIC.with_label_values(&[self.name()]).inc();
        self.queue.add_after(key, delay);
    }

    /// Drops the failure history of `key`. Does not remove it from the queue.
    pub fn forget(
        &self,
        key: &K,
    ) {
        self.limiter.forget(key);
    }

    pub fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.limiter.num_requeues(key)
    }

    pub async fn get(&self) -> Option<K> {
        self.queue.get().await
    }

    pub fn done(
        &self,
        key: &K,
    ) {
        self.queue.done(key);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_shutting_down()
    }

    pub fn shut_down(&self) {
        self.queue.shut_down();
    }

    pub async fn shut_down_with_drain(&self) {
        self.queue.shut_down_with_drain().await;
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.queue.work_queue().in_flight()
    }
}

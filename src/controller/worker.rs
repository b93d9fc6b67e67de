use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use super::Reconciler;
use crate::utils::runtime::handle_error;
use crate::utils::runtime::panic_message;
use crate::Error;
use crate::Indexer;
use crate::Object;
use crate::RateLimitingQueue;
use crate::ReconcileError;
use crate::DROPPED_KEYS_METRIC;
use crate::RECONCILE_DURATION_METRIC;
use crate::RECONCILE_TOTAL_METRIC;

/// Calls `done` for its key however the processing of that key ends.
struct DoneGuard<'a> {
    queue: &'a RateLimitingQueue<String>,
    key: &'a String,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(self.key);
    }
}

/// One worker loop: pulls keys one at a time until the queue shuts down.
pub(crate) struct Worker<T, R> {
    pub(crate) id: usize,
    pub(crate) name: String,
    pub(crate) indexer: Arc<Indexer<T>>,
    pub(crate) queue: Arc<RateLimitingQueue<String>>,
    pub(crate) reconciler: Arc<R>,
    pub(crate) max_retries: u32,
    pub(crate) reconcile_timeout: Option<Duration>,
}

impl<T, R> Worker<T, R>
where
    T: Object,
    R: Reconciler<T>,
{
    pub(crate) async fn run(self) -> crate::Result<()> {
        debug!("[{}] worker {} started", self.name, self.id);
        while self.process_next_item().await {}
        debug!("[{}] worker {} stopped", self.name, self.id);
        Ok(())
    }

    /// Returns false once the queue is shutting down.
    pub(crate) async fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        let _done = DoneGuard {
            queue: &self.queue,
            key: &key,
        };

        let result = self.process_item(&key).await;
        self.handle_err(result, &key);
        true
    }

    async fn process_item(
        &self,
        key: &str,
    ) -> Result<(), ReconcileError> {
        let object = self.indexer.get_by_key(key);
        if object.is_none() {
            debug!("[{}] {} no longer cached, reconciling as deleted", self.name, key);
        }

        let started = Instant::now();
        let pass = AssertUnwindSafe(self.reconciler.reconcile(key, object)).catch_unwind();
        let outcome = match self.reconcile_timeout {
            Some(limit) => match tokio::time::timeout(limit, pass).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(ReconcileError::Timeout(limit))),
            },
            None => pass.await,
        };
        let result = outcome.unwrap_or_else(|payload| {
            Err(ReconcileError::Panicked(panic_message(payload.as_ref())))
        });

        RECONCILE_DURATION_METRIC
            .with_label_values(&[self.name.as_str()])
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        let label = if result.is_ok() { "success" } else { "error" };
        RECONCILE_TOTAL_METRIC
            .with_label_values(&[self.name.as_str(), label])
            .inc();
        result
    }

    /// Success forgets the key's history; failures are retried with backoff
    /// until `max_retries` re-queues, then the key is dropped until the next
    /// notification for it.
    fn handle_err(
        &self,
        result: Result<(), ReconcileError>,
        key: &String,
    ) {
        let e = match result {
            Ok(()) => {
                self.queue.forget(key);
                return;
            }
            Err(e) => e,
        };

        let requeues = self.queue.num_requeues(key);
        if requeues < self.max_retries {
            warn!("[{}] Error syncing {} (retry {}): {}", self.name, key, requeues + 1, e);
            self.queue.add_rate_limited(key.clone());
            return;
        }

        self.queue.forget(key);
        DROPPED_KEYS_METRIC
            .with_label_values(&[self.name.as_str()])
            .inc();
        handle_error(&self.name, &Error::Reconcile(e));
        warn!("[{}] Dropping {:?} out of the queue after {} retries", self.name, key, requeues);
    }
}

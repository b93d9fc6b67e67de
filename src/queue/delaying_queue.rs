use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::QueueKey;
use super::WorkQueue;

struct WaitFor<K> {
    key: K,
    ready_at: Instant,
}

/// Heap entry, ordered so that the earliest `ready_at` sits on top.
struct Waiting<K> {
    ready_at: Instant,
    seq: u64,
    key: K,
}

impl<K> PartialEq for Waiting<K> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl<K> Eq for Waiting<K> {}

impl<K> PartialOrd for Waiting<K> {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Waiting<K> {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A [`WorkQueue`] that can hold keys back for a while before adding them.
///
/// Delays are served by one background timer task rather than a sleeping
/// task per key. A key waiting more than once keeps its earliest ready time.
pub struct DelayingQueue<K> {
    queue: Arc<WorkQueue<K>>,
    waiting_tx: mpsc::UnboundedSender<WaitFor<K>>,
    cancel: CancellationToken,
}

impl<K: QueueKey> DelayingQueue<K> {
    /// Must be called from within a tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        let queue = Arc::new(WorkQueue::new(name));
        let (waiting_tx, waiting_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(waiting_loop(queue.clone(), waiting_rx, cancel.clone()));

        Self {
            queue,
            waiting_tx,
            cancel,
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

    /// Adds `key` once `delay` has elapsed; a zero delay adds immediately.
    pub fn add_after(
        &self,
        key: K,
        delay: Duration,
    ) {
        if self.queue.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.queue.add(key);
            return;
        }

        let wait_for = WaitFor {
            key,
            ready_at: Instant::now() + delay,
        };
        if let Err(e) = self.waiting_tx.send(wait_for) {
            trace!("[{}] waiting loop gone, dropping {:?}", self.name(), e.0.key);
        }
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

    /// Stops the timer task and shuts the underlying queue down. Keys still
    /// waiting for their delay are discarded.
    pub fn shut_down(&self) {
        self.cancel.cancel();
        self.queue.shut_down();
    }

    pub async fn shut_down_with_drain(&self) {
        self.cancel.cancel();
        self.queue.shut_down_with_drain().await;
    }

    #[cfg(test)]
    pub(crate) fn work_queue(&self) -> &WorkQueue<K> {
        &self.queue
    }
}

impl<K> Drop for DelayingQueue<K> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn waiting_loop<K: QueueKey>(
    queue: Arc<WorkQueue<K>>,
    mut waiting_rx: mpsc::UnboundedReceiver<WaitFor<K>>,
    cancel: CancellationToken,
) {
    let mut heap: BinaryHeap<Waiting<K>> = BinaryHeap::new();
    // earliest ready time per key; heap entries that disagree are stale
    let mut ready_at_by_key: HashMap<K, Instant> = HashMap::new();
    let mut seq: u64 = 0;

    loop {
        let next_ready = heap.peek().map(|w| w.ready_at);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("[{}] waiting loop stopped with {} keys waiting", queue.name(), ready_at_by_key.len());
                return;
            }
            msg = waiting_rx.recv() => {
                let Some(WaitFor { key, ready_at }) = msg else {
                    return;
                };
                if ready_at <= Instant::now() {
                    queue.add(key);
                    continue;
                }
                match ready_at_by_key.get(&key) {
                    Some(existing) if *existing <= ready_at => {}
                    _ => {
                        ready_at_by_key.insert(key.clone(), ready_at);
                        seq = seq.wrapping_add(1);
                        heap.push(Waiting { ready_at, seq, key });
                    }
                }
            }
            _ = sleep_until(next_ready) => {}
        }

        let now = Instant::now();
        while heap.peek().is_some_and(|w| w.ready_at <= now) {
            let Some(Waiting { ready_at, key, .. }) = heap.pop() else {
                break;
            };
            if ready_at_by_key.get(&key) == Some(&ready_at) {
                ready_at_by_key.remove(&key);
                queue.add(key);
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

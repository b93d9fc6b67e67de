//! The dispatcher: owns the cache and the work queue, runs the event source
//! and the worker pool.
//!
//! ## Example Usage
//! ```rust,no_run
//! # use reconcile_engine::*;
//! # async fn demo() -> Result<()> {
//! let config = EngineConfig::new()?.validate()?;
//! let (source, _handle) = ChannelEventSource::<ConfigMap>::new(vec![], None);
//! let controller: Controller<ConfigMap, _, _> =
//!     Controller::new(&config, source, LoggingReconciler);
//!
//! let (_stop_tx, stop_rx) = tokio::sync::watch::channel(());
//! controller.run(config.controller.workers, stop_rx).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::error;
use tracing::info;

use super::worker::Worker;
use super::Reconciler;
use super::ResourceEventHandler;
use crate::default_controller_rate_limiter;
use crate::utils::async_task::spawn_task;
use crate::utils::runtime::handle_error;
use crate::ControllerConfig;
use crate::EngineConfig;
use crate::Error;
use crate::EventHandler;
use crate::EventSource;
use crate::Indexer;
use crate::Object;
use crate::RateLimiter;
use crate::RateLimitingQueue;
use crate::Result;

pub struct Controller<T, S, R> {
    config: ControllerConfig,
    indexer: Arc<Indexer<T>>,
    queue: Arc<RateLimitingQueue<String>>,
    source: Arc<S>,
    reconciler: Arc<R>,
}

impl<T, S, R> Controller<T, S, R>
where
    T: Object,
    S: EventSource<T>,
    R: Reconciler<T>,
{
    /// Builds a controller with the default rate limiter of `config.retry`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &EngineConfig,
        source: S,
        reconciler: R,
    ) -> Self {
        Self::with_rate_limiter(
            config.controller.clone(),
            Box::new(default_controller_rate_limiter(&config.retry)),
            source,
            reconciler,
        )
    }

    pub fn with_rate_limiter(
        config: ControllerConfig,
        limiter: Box<dyn RateLimiter<String>>,
        source: S,
        reconciler: R,
    ) -> Self {
        let queue = Arc::new(RateLimitingQueue::new(config.name.clone(), limiter));
        Self {
            config,
            indexer: Arc::new(Indexer::new()),
            queue,
            source: Arc::new(source),
            reconciler: Arc::new(reconciler),
        }
    }

    pub fn indexer(&self) -> Arc<Indexer<T>> {
        self.indexer.clone()
    }

    pub fn queue(&self) -> Arc<RateLimitingQueue<String>> {
        self.queue.clone()
    }

    pub fn event_handler(&self) -> Arc<ResourceEventHandler<T>> {
        Arc::new(ResourceEventHandler::new(self.indexer.clone(), self.queue.clone()))
    }

    /// Runs until `shutdown` fires (or its sender is dropped).
    ///
    /// 1. Starts the event source in the background
    /// 2. Waits for the initial listing; gives up on stop or timeout without
    ///    starting any worker
    /// 3. Starts `workers` worker loops
    /// 4. On stop, shuts the queue down and waits for in-flight passes
    pub async fn run(
        &self,
        workers: usize,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        if workers == 0 {
            return Err(Error::InvalidConfig("worker count must be at least 1".into()));
        }
        info!("Starting {} controller", self.config.name);

        let mut source_handles = Vec::with_capacity(1);
        let source = self.source.clone();
        let handler: Arc<dyn EventHandler<T>> = self.event_handler();
        let source_shutdown = shutdown.clone();
        spawn_task(
            "event_source",
            move || async move { source.run(handler, source_shutdown).await },
            Some(&mut source_handles),
        );

        if let Err(e) = self.wait_for_cache_sync(&mut shutdown, &source_handles).await {
            handle_error(&self.config.name, &e);
            self.queue.shut_down();
            for handle in &source_handles {
                handle.abort();
            }
            return Err(e);
        }

        info!("[{}] cache synced, starting {} workers", self.config.name, workers);
        let mut worker_handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker {
                id,
                name: self.config.name.clone(),
                indexer: self.indexer.clone(),
                queue: self.queue.clone(),
                reconciler: self.reconciler.clone(),
                max_retries: self.config.max_retries,
                reconcile_timeout: self.config.reconcile_timeout(),
            };
            spawn_task(&format!("worker-{id}"), move || worker.run(), Some(&mut worker_handles));
        }

        let _ = shutdown.changed().await;
        info!("Stopping {} controller", self.config.name);

        self.queue.shut_down();
        for result in join_all(worker_handles).await {
            if let Err(e) = result {
                error!("[{}] worker task failed: {:?}", self.config.name, e);
            }
        }
        for result in join_all(source_handles).await {
            if let Err(e) = result {
                error!("[{}] event source task failed: {:?}", self.config.name, e);
            }
        }

        info!("{} controller stopped", self.config.name);
        Ok(())
    }

    async fn wait_for_cache_sync(
        &self,
        shutdown: &mut watch::Receiver<()>,
        source_handles: &[JoinHandle<()>],
    ) -> Result<()> {
        let timeout = self.config.cache_sync_timeout();
        let deadline = Instant::now() + timeout;
        let period = self.config.cache_sync_poll_interval().max(Duration::from_millis(1));
        let mut poll = tokio::time::interval(period);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if self.source.has_synced() {
                return Ok(());
            }
            if source_handles.iter().any(|handle| handle.is_finished()) {
                return Err(Error::CacheSyncFailed {
                    reason: "event source stopped before the initial listing completed".into(),
                });
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    return Err(Error::CacheSyncFailed {
                        reason: "stopped while waiting for caches to sync".into(),
                    });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::CacheSyncFailed {
                        reason: format!("timed out after {:?} waiting for caches to sync", timeout),
                    });
                }
                _ = poll.tick() => {}
            }
        }
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reconcile_engine::ChannelEventSource;
use reconcile_engine::ConfigMap;
use reconcile_engine::Controller;
use reconcile_engine::EngineConfig;
use reconcile_engine::ReconcileError;
use reconcile_engine::Reconciler;
use reconcile_engine::SourceHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub type Observed = (String, Option<BTreeMap<String, String>>);

/// Records what it is called with; fails for keys listed in `failing`.
#[derive(Clone, Default)]
pub struct Recorder {
    pub seen: Arc<Mutex<Vec<Observed>>>,
    pub failing: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Reconciler<ConfigMap> for Recorder {
    async fn reconcile(
        &self,
        key: &str,
        object: Option<Arc<ConfigMap>>,
    ) -> Result<(), ReconcileError> {
        self.seen
            .lock()
            .push((key.to_string(), object.map(|cm| cm.data.clone())));
        if self.failing.lock().iter().any(|k| k == key) {
            return Err(ReconcileError::failed(format!("{key} rejected")));
        }
        Ok(())
    }
}

impl Recorder {
    pub fn seen(&self) -> Vec<Observed> {
        self.seen.lock().clone()
    }

    pub fn count(
        &self,
        key: &str,
    ) -> usize {
        self.seen.lock().iter().filter(|(k, _)| k == key).count()
    }

    /// Polls until `n` calls were seen or `within` elapses.
    pub async fn wait_for(
        &self,
        n: usize,
        within: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if self.seen.lock().len() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

pub fn cm(
    namespace: &str,
    name: &str,
    value: &str,
) -> ConfigMap {
    ConfigMap::new(namespace, name).with_data("k", value)
}

pub fn payload(value: &str) -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from([("k".to_string(), value.to_string())]))
}

/// Engine settings with millisecond backoff so retries finish quickly.
pub fn fast_config(max_retries: u32) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.controller.name = "it".to_string();
    config.controller.max_retries = max_retries;
    config.controller.cache_sync_timeout_ms = 2_000;
    config.controller.cache_sync_poll_interval_ms = 5;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 20;
    config
}

pub struct Running {
    pub handle: SourceHandle<ConfigMap>,
    pub recorder: Recorder,
    pub stop_tx: watch::Sender<()>,
    pub task: JoinHandle<reconcile_engine::Result<()>>,
}

pub fn start(
    config: EngineConfig,
    initial: Vec<ConfigMap>,
    recorder: Recorder,
) -> Running {
    let (source, handle) = ChannelEventSource::new(initial, None);
    let controller: Controller<ConfigMap, _, _> =
        Controller::new(&config, source, recorder.clone());
    let (stop_tx, stop_rx) = watch::channel(());
    let workers = config.controller.workers;
    let task = tokio::spawn(async move { controller.run(workers, stop_rx).await });

    Running {
        handle,
        recorder,
        stop_tx,
        task,
    }
}

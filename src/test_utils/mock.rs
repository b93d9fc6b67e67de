use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::ConfigMap;
use crate::Reconciler;
use crate::ReconcileError;

/// One observed reconcile call: the key and the payload seen, if any.
pub(crate) type Call = (String, Option<BTreeMap<String, String>>);

/// Records every call; can be told to fail or panic for given keys.
#[derive(Default)]
pub(crate) struct RecordingReconciler {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<String, usize>>,
    panics: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
    called: Notify,
}

impl RecordingReconciler {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `times` calls for `key` return an error.
    pub(crate) fn fail(
        &self,
        key: &str,
        times: usize,
    ) {
        self.failures.lock().insert(key.to_string(), times);
    }

    /// The next `times` calls for `key` panic.
    pub(crate) fn panic_on(
        &self,
        key: &str,
        times: usize,
    ) {
        self.panics.lock().insert(key.to_string(), times);
    }

    pub(crate) fn set_delay(
        &self,
        delay: Duration,
    ) {
        *self.delay.lock() = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_for(
        &self,
        key: &str,
    ) -> usize {
        self.calls.lock().iter().filter(|(k, _)| k == key).count()
    }

    /// Waits until at least `n` calls were recorded.
    pub(crate) async fn wait_for_calls(
        &self,
        n: usize,
    ) {
        loop {
            let notified = self.called.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.calls.lock().len() >= n {
                return;
            }
            notified.await;
        }
    }

    fn take(
        map: &Mutex<HashMap<String, usize>>,
        key: &str,
    ) -> bool {
        let mut map = map.lock();
        match map.get_mut(key) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Reconciler<ConfigMap> for Arc<RecordingReconciler> {
    async fn reconcile(
        &self,
        key: &str,
        object: Option<Arc<ConfigMap>>,
    ) -> Result<(), ReconcileError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .push((key.to_string(), object.map(|obj| obj.data.clone())));
        self.called.notify_waiters();

        if RecordingReconciler::take(&self.panics, key) {
            panic!("reconcile of {key} blew up");
        }
        if RecordingReconciler::take(&self.failures, key) {
            return Err(ReconcileError::failed(format!("{key} not ready")));
        }
        Ok(())
    }
}

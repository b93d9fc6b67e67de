use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio::time::Interval;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::DeletedObject;
use super::EventHandler;
use super::EventSource;
use super::WatchEvent;
use crate::meta_namespace_key;
use crate::Error;
use crate::Object;
use crate::Result;

#[derive(Debug)]
pub(crate) enum SourceCommand<T> {
    Apply(T),
    Remove(String),
    Relist(Vec<T>),
}

/// Cloneable producer side of a [`ChannelEventSource`].
///
/// Models the remote collection: callers describe what the remote state now
/// looks like, the source turns that into add/update/delete notifications.
#[derive(Debug)]
pub struct SourceHandle<T> {
    tx: mpsc::UnboundedSender<SourceCommand<T>>,
}

impl<T> Clone for SourceHandle<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Object> SourceHandle<T> {
    /// Creates or replaces an object.
    pub fn apply(
        &self,
        obj: T,
    ) -> Result<()> {
        self.send(SourceCommand::Apply(obj))
    }

    /// Removes the object stored under `key`.
    pub fn remove(
        &self,
        key: impl Into<String>,
    ) -> Result<()> {
        self.send(SourceCommand::Remove(key.into()))
    }

    /// Replaces the whole collection, as a fresh list after a broken watch
    /// would. Objects that vanished are reported as tombstones.
    pub fn relist(
        &self,
        objs: Vec<T>,
    ) -> Result<()> {
        self.send(SourceCommand::Relist(objs))
    }

    fn send(
        &self,
        cmd: SourceCommand<T>,
    ) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| Error::SourceFailed("event source is no longer running".to_string()))
    }
}

/// In-memory list+watch source.
pub struct ChannelEventSource<T> {
    initial: Mutex<Option<Vec<T>>>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<SourceCommand<T>>>>,
    synced: AtomicBool,
    resync_period: Option<Duration>,
}

impl<T: Object> ChannelEventSource<T> {
    /// `initial` is the first listing. A zero or absent `resync_period`
    /// disables periodic resync.
    pub fn new(
        initial: Vec<T>,
        resync_period: Option<Duration>,
    ) -> (Self, SourceHandle<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            initial: Mutex::new(Some(initial)),
            command_rx: Mutex::new(Some(rx)),
            synced: AtomicBool::new(false),
            resync_period: resync_period.filter(|p| !p.is_zero()),
        };
        (source, SourceHandle { tx })
    }
}

#[async_trait]
impl<T: Object> EventSource<T> for ChannelEventSource<T> {
    async fn run(
        &self,
        handler: Arc<dyn EventHandler<T>>,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .lock()
            .take()
            .ok_or_else(|| Error::SourceFailed("event source is already running".to_string()))?;
        let initial = self.initial.lock().take().unwrap_or_default();

        let mut state = RemoteState::default();
        info!("listing {} objects", initial.len());
        state.relist(initial, handler.as_ref());
        self.synced.store(true, Ordering::Release);

        let mut resync = self.resync_period.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval
        });
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("event source shutdown signal received.");
                    return Ok(());
                }
                cmd = command_rx.recv(), if commands_open => {
                    match cmd {
                        Some(SourceCommand::Apply(obj)) => state.apply(obj, handler.as_ref()),
                        Some(SourceCommand::Remove(key)) => state.remove(&key, handler.as_ref()),
                        Some(SourceCommand::Relist(objs)) => state.relist(objs, handler.as_ref()),
                        None => {
                            debug!("all source handles dropped; idling until shutdown");
                            commands_open = false;
                        }
                    }
                }
                _ = tick(&mut resync) => {
                    state.resync(handler.as_ref());
                }
            }
        }
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Last-known remote state, used to produce `old` objects and tombstones.
struct RemoteState<T> {
    known: HashMap<String, T>,
}

impl<T> Default for RemoteState<T> {
    fn default() -> Self {
        Self { known: HashMap::new() }
    }
}

impl<T: Object> RemoteState<T> {
    fn apply(
        &mut self,
        obj: T,
        handler: &dyn EventHandler<T>,
    ) {
        let key = match meta_namespace_key(&obj) {
            Ok(key) => key,
            Err(e) => {
                warn!("dropping object without identity: {:?}", e);
                return;
            }
        };

        match self.known.insert(key.clone(), obj.clone()) {
            Some(old) => {
                let version = obj.resource_version();
                if !version.is_empty() && old.resource_version() == version {
                    trace!("replayed resource version {} for {}", version, key);
                    return;
                }
                handler.on_event(WatchEvent::Updated { old, new: obj });
            }
            None => handler.on_event(WatchEvent::Added(obj)),
        }
    }

    fn remove(
        &mut self,
        key: &str,
        handler: &dyn EventHandler<T>,
    ) {
        match self.known.remove(key) {
            Some(old) => handler.on_event(WatchEvent::Deleted(DeletedObject::Final(old))),
            None => debug!("remove for unknown key {}", key),
        }
    }

    fn relist(
        &mut self,
        objs: Vec<T>,
        handler: &dyn EventHandler<T>,
    ) {
        let mut listed = Vec::with_capacity(objs.len());
        for obj in objs {
            match meta_namespace_key(&obj) {
                Ok(key) => listed.push((key, obj)),
                Err(e) => warn!("dropping listed object without identity: {:?}", e),
            }
        }

        let listed_keys: HashSet<&str> = listed.iter().map(|(key, _)| key.as_str()).collect();
        let vanished: Vec<String> = self
            .known
            .keys()
            .filter(|key| !listed_keys.contains(key.as_str()))
            .cloned()
            .collect();
        for key in vanished {
            if let Some(last_known) = self.known.remove(&key) {
                handler.on_event(WatchEvent::Deleted(DeletedObject::Tombstone { key, last_known }));
            }
        }

        for (_, obj) in listed {
            self.apply(obj, handler);
        }
    }

    fn resync(
        &self,
        handler: &dyn EventHandler<T>,
    ) {
        trace!("resyncing {} objects", self.known.len());
        for obj in self.known.values() {
            handler.on_event(WatchEvent::Updated {
                old: obj.clone(),
                new: obj.clone(),
            });
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

#[cfg(test)]
use mockall::automock;

use crate::Object;
use crate::ReconcileError;

/// Business logic driven by the controller.
///
/// Invoked with the current cached object, or `None` when the key is no
/// longer in the cache (the object was deleted). Level-triggered: the call
/// says nothing about which notification caused it.
///
/// May run concurrently for different keys, never for the same key.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Reconciler<T: Object>: Send + Sync + 'static {
    async fn reconcile(
        &self,
        key: &str,
        object: Option<Arc<T>>,
    ) -> Result<(), ReconcileError>;
}

/// Placeholder reconciler that only reports what it sees.
#[derive(Debug, Default, Clone)]
pub struct LoggingReconciler;

#[async_trait]
impl<T: Object> Reconciler<T> for LoggingReconciler {
    async fn reconcile(
        &self,
        key: &str,
        object: Option<Arc<T>>,
    ) -> Result<(), ReconcileError> {
        match object {
            None => info!(">> {} deleted", key),
            Some(obj) => {
                info!(">> Add/Update for {}", obj.meta().name);
                info!("{:?}", obj);
            }
        }
        Ok(())
    }
}

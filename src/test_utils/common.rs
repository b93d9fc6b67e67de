use std::sync::Arc;
use std::time::Duration;

use crate::ConfigMap;
use crate::ControllerConfig;
use crate::ItemExponentialFailureRateLimiter;
use crate::RateLimiter;
use crate::RateLimitingQueue;

pub(crate) fn config_map(
    namespace: &str,
    name: &str,
    value: &str,
) -> ConfigMap {
    ConfigMap::new(namespace, name).with_data("k", value)
}

/// Short timeouts and a 1ms-base backoff so retries finish quickly.
pub(crate) fn test_controller_config(max_retries: u32) -> ControllerConfig {
    ControllerConfig {
        name: "test".to_string(),
        workers: 1,
        max_retries,
        cache_sync_timeout_ms: 1_000,
        cache_sync_poll_interval_ms: 5,
        ..Default::default()
    }
}

pub(crate) fn fast_rate_limiter() -> Box<dyn RateLimiter<String>> {
    Box::new(ItemExponentialFailureRateLimiter::new(
        Duration::from_millis(1),
        Duration::from_millis(10),
    ))
}

pub(crate) fn test_queue(name: &str) -> Arc<RateLimitingQueue<String>> {
    Arc::new(RateLimitingQueue::new(name, fast_rate_limiter()))
}

use std::num::NonZeroU32;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;
use governor::clock::Clock;
use governor::clock::DefaultClock;
use governor::Quota;
use parking_lot::Mutex;

use super::QueueKey;
use crate::BackoffPolicy;

/// Decides how long a key waits before it is handed out again.
pub trait RateLimiter<K>: Send + Sync + 'static {
    /// Records one more failure for `key` and returns the delay to apply.
    fn when(
        &self,
        key: &K,
    ) -> Duration;

    /// Clears the failure history of `key`.
    fn forget(
        &self,
        key: &K,
    );

    /// Consecutive failures recorded for `key` since the last `forget`.
    fn num_requeues(
        &self,
        key: &K,
    ) -> u32;
}

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
///
/// History lives only as long as a key keeps failing: `forget` removes the
/// entry, so the map holds at most the keys currently being retried.
pub struct ItemExponentialFailureRateLimiter<K> {
    failures: DashMap<K, u32>,
    base_delay: Duration,
    max_delay: Duration,
}

impl<K: QueueKey> ItemExponentialFailureRateLimiter<K> {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            failures: DashMap::new(),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub(crate) fn backoff(
        &self,
        failures: u32,
    ) -> Duration {
        2u32.checked_pow(failures)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.failures.len()
    }
}

impl<K: QueueKey> RateLimiter<K> for ItemExponentialFailureRateLimiter<K> {
    fn when(
        &self,
        key: &K,
    ) -> Duration {
        let mut failures = self.failures.entry(key.clone()).or_insert(0);
        let exp = *failures;
        *failures = failures.saturating_add(1);
        self.backoff(exp)
    }

    fn forget(
        &self,
        key: &K,
    ) {
        self.failures.remove(key);
    }

    fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.failures.get(key).map(|v| *v).unwrap_or(0)
    }
}

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    DefaultClock,
>;

/// Overall token bucket shared by all keys; keeps a burst of failures from
/// flooding the workers no matter how many distinct keys fail.
///
/// Once the bucket is empty every call reserves the next free slot, so
/// over-budget re-adds are spread `1/qps` apart instead of all waking up
/// when the next token arrives.
pub struct BucketRateLimiter {
    limiter: DirectRateLimiter,
    clock: DefaultClock,
    interval: Duration,
    /// End of the last reserved slot; `None` while nothing is reserved
    next_free: Mutex<Option<Instant>>,
}

impl BucketRateLimiter {
    pub fn new(
        qps: u32,
        burst: u32,
    ) -> Self {
        let qps = NonZeroU32::new(qps).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(qps).allow_burst(burst);
        Self {
            limiter: governor::RateLimiter::direct(quota),
            clock: DefaultClock::default(),
            interval: Duration::from_secs(1) / qps.get(),
            next_free: Mutex::new(None),
        }
    }
}

impl<K: QueueKey> RateLimiter<K> for BucketRateLimiter {
    fn when(
        &self,
        _key: &K,
    ) -> Duration {
        let mut next_free = self.next_free.lock();
        let now = Instant::now();

        let pending = next_free.map_or(Duration::ZERO, |at| at.saturating_duration_since(now));
        if !pending.is_zero() {
            // queue up behind earlier reservations
            *next_free = Some(now + pending + self.interval);
            return pending;
        }

        match self.limiter.check() {
            Ok(()) => {
                *next_free = None;
                Duration::ZERO
            }
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                *next_free = Some(now + wait + self.interval);
                wait
            }
        }
    }

    fn forget(
        &self,
        _key: &K,
    ) {
    }

    fn num_requeues(
        &self,
        _key: &K,
    ) -> u32 {
        0
    }
}

/// Applies the worst delay of all its members.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K: QueueKey> MaxOfRateLimiter<K> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K: QueueKey> RateLimiter<K> for MaxOfRateLimiter<K> {
    fn when(
        &self,
        key: &K,
    ) -> Duration {
        self.limiters
            .iter()
            .map(|limiter| limiter.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(
        &self,
        key: &K,
    ) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// Per-key exponential backoff combined with an overall token bucket.
pub fn default_controller_rate_limiter<K: QueueKey>(policy: &BackoffPolicy) -> MaxOfRateLimiter<K> {
    let limiters: Vec<Box<dyn RateLimiter<K>>> = vec![
        Box::new(ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(policy.base_delay_ms),
            Duration::from_millis(policy.max_delay_ms),
        )),
        Box::new(BucketRateLimiter::new(policy.bucket_qps, policy.bucket_burst)),
    ];
    MaxOfRateLimiter::new(limiters)
}

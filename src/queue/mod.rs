//! Deduplicating, rate-limited work queue.
//!
//! Layers, innermost first:
//! - [`WorkQueue`]: FIFO with dedup and in-flight tracking
//! - [`DelayingQueue`]: adds keys after a delay, driven by one timer task
//! - [`RateLimitingQueue`]: picks that delay from a [`RateLimiter`]

mod delaying_queue;
mod rate_limiter;
mod rate_limiting_queue;
mod work_queue;

pub use delaying_queue::*;
pub use rate_limiter::*;
pub use rate_limiting_queue::*;
pub use work_queue::*;

#[cfg(test)]
mod work_queue_test;

//! # Work queue and requeue rate limiting.
//!
//! - [`WorkQueue`] deduplicating FIFO of reconcile keys with in-flight and
//!   dirty tracking, delayed adds and rate-limited requeues
//! - [`RateLimiter`] and its implementations, which pick requeue delays
//!
//! ```text
//! watch handlers ──add──►┐
//!                        ├──► WorkQueue ──get──► workers ──done/forget──┐
//! delay loop ────add────►┘        ▲                                     │
//!                                 └────── add_rate_limited (on error) ──┘
//! ```

mod delay;
mod rate_limit;
mod work_queue;

pub use rate_limit::{
    BucketRateLimiter, ItemBackoffLimiter, MaxOfRateLimiter, RateLimiter,
    default_controller_limiter,
};
pub use work_queue::WorkQueue;

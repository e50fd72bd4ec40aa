//! Retry delay policies.
//!
//! These knobs control **how long** a failed key waits before it is handed
//! to a worker again.
//!
//! ## Contents
//! - [`BackoffPolicy`] how per-key delays grow (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization applied on top of the computed delay
//!
//! ## Quick wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► queue::ItemBackoffLimiter uses:
//!           - backoff.next(failures) to pick the requeue delay of a key
//!           - failures reset to 0 on WorkQueue::forget(key)
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=5ms, factor=2.0, max=1000s, jitter=None.
//! - `JitterPolicy::None` keeps successive delays non-decreasing; the other
//!   variants trade that for spreading retries of many keys apart.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;

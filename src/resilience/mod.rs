//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed apply during reconciliation:
//!     → backoff.rs (exponential delay with jitter)
//!     → next attempt after the delay, reset on success
//! ```
//!
//! # Design Decisions
//! - Reload invokers never retry; retry policy lives with the caller
//! - Jitter keeps several daemons from reloading in lockstep

pub mod backoff;

pub use backoff::{calculate_backoff, BackoffPolicy};

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → metrics → store → driver → initial apply
//!     → reconciler task → admin API
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → reconciler exits → admin API drains → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the store is open and HAProxy converged before the
//!   admin API accepts mutations
//! - A failed initial apply is logged, not fatal; the reconciler retries

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;

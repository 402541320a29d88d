//! HAProxy load-balancer-as-a-service.
//!
//! Listeners and members live in a transactional [`store::Store`]. The
//! [`driver::HaproxyDriver`] renders the stored state into a complete
//! HAProxy configuration, replaces the config file atomically and asks
//! HAProxy to reload. The [`coordinator::Coordinator`] ties each mutation
//! to an apply, and its reconciler heals any divergence left behind by a
//! failed apply.

// Domain and persistence
pub mod error;
pub mod model;
pub mod store;

// Config synthesis and HAProxy control
pub mod apply;
pub mod coordinator;
pub mod driver;

// Outer surfaces
pub mod admin;
pub mod config;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use error::{LbaasError, LbaasResult};

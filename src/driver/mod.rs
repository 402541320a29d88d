//! Load balancer driver subsystem.
//!
//! # Data Flow
//! ```text
//! create/update/delete (listener | member)
//!     → store transaction (validate, persist, revision + 1)
//!     → entity returned with its commit revision, HAProxy untouched
//!
//! apply_changes()
//!     → apply gate (one apply at a time)
//!     → store snapshot → build_config → atomic write → reload
//!     → Ok:  mark_applied(snapshot revision), outbox drained
//!     → Err: status records the error, store stays ahead of HAProxy
//! ```
//!
//! # Design Decisions
//! - Mutations never reload; callers decide when to apply
//! - The driver is a trait so other balancers can sit behind the same surface
//! - Apply never mutates listeners or members

pub mod haproxy;

pub use haproxy::HaproxyDriver;

use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;

use crate::apply::ReloadOutput;
use crate::error::LbaasResult;
use crate::model::{
    Listener, ListenerSpec, ListenerUpdate, Member, MemberSpec, MemberUpdate,
};
use crate::store::{PendingChange, Revisioned, Store};

/// Outcome of a successful apply.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    /// Store revision that is now live.
    pub revision: u64,
    pub config_path: PathBuf,
    pub output: ReloadOutput,
    pub duration_ms: u64,
    /// True when no new apply ran because a finished one already covered
    /// the requested revision.
    pub coalesced: bool,
}

/// Convergence status between the store and the running balancer.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyStatus {
    pub store_revision: u64,
    pub applied_revision: Option<u64>,
    pub diverged: bool,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<u64>,
    pub last_success_at: Option<u64>,
    pub pending: Vec<PendingChange>,
}

/// Capability surface every load balancer backend provides.
pub trait LoadBalancerDriver: Send + Sync + 'static {
    /// Underlying resource store.
    fn store(&self) -> &Store;

    fn create_listener(&self, spec: ListenerSpec) -> LbaasResult<Revisioned<Listener>>;
    fn update_listener(
        &self,
        name: &str,
        update: ListenerUpdate,
    ) -> LbaasResult<Revisioned<Listener>>;
    fn delete_listener(&self, name: &str) -> LbaasResult<Revisioned<()>>;

    fn create_member(
        &self,
        listener_name: &str,
        spec: MemberSpec,
    ) -> LbaasResult<Revisioned<Member>>;
    fn update_member(&self, name: &str, update: MemberUpdate) -> LbaasResult<Revisioned<Member>>;
    fn delete_member(&self, name: &str) -> LbaasResult<Revisioned<()>>;

    /// Render the current store, replace the artifact and reload.
    fn apply_changes(&self) -> impl Future<Output = LbaasResult<ApplyResult>> + Send;

    /// Make sure everything up to `revision` is live.
    ///
    /// Backends that can tell an earlier apply already covered `revision`
    /// may skip the work.
    fn apply_through(&self, revision: u64) -> impl Future<Output = LbaasResult<ApplyResult>> + Send {
        let _ = revision;
        self.apply_changes()
    }

    fn status(&self) -> LbaasResult<ApplyStatus>;

    fn get_listener(&self, name: &str) -> LbaasResult<Listener> {
        self.store().get_listener(name)
    }

    fn get_listeners(&self) -> LbaasResult<Vec<Listener>> {
        self.store().get_listeners()
    }

    fn get_member(&self, name: &str) -> LbaasResult<Member> {
        self.store().get_member(name)
    }

    fn get_members(&self) -> LbaasResult<Vec<Member>> {
        self.store().get_members()
    }
}

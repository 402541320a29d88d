//! Consistency coordination between the store and the running balancer.
//!
//! # Data Flow
//! ```text
//! create/update/delete
//!     → driver mutation (store transaction, committed at revision N)
//!     → apply_through(N)
//!         → already covered by a finished apply? return it (coalesced)
//!         → otherwise snapshot → build → write → reload
//!     → Committed { value, revision: N, apply }
//!
//! reconciler.rs (background)
//!     → every tick: status().diverged? → apply_changes()
//! ```
//!
//! # Design Decisions
//! - A failed apply never undoes the committed mutation; the caller sees both
//! - Persistence errors surface as `Err` before any apply is attempted
//! - Divergence is healed by the reconciler, not by retrying inline

pub mod reconciler;

pub use reconciler::Reconciler;

use std::sync::Arc;

use crate::driver::{ApplyResult, ApplyStatus, LoadBalancerDriver};
use crate::error::LbaasResult;
use crate::model::{
    Listener, ListenerSpec, ListenerUpdate, Member, MemberSpec, MemberUpdate,
};
use crate::store::Revisioned;

/// A committed mutation together with the outcome of the apply that followed.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    /// Store revision this mutation committed at.
    pub revision: u64,
    pub apply: LbaasResult<ApplyResult>,
}

/// Mutate-then-apply front door shared by the admin API and the reconciler.
pub struct Coordinator<D> {
    driver: Arc<D>,
}

impl<D> Clone for Coordinator<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
        }
    }
}

impl<D: LoadBalancerDriver> Coordinator<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub async fn create_listener(&self, spec: ListenerSpec) -> LbaasResult<Committed<Listener>> {
        self.finish(self.driver.create_listener(spec)?).await
    }

    pub async fn update_listener(
        &self,
        name: &str,
        update: ListenerUpdate,
    ) -> LbaasResult<Committed<Listener>> {
        self.finish(self.driver.update_listener(name, update)?).await
    }

    pub async fn delete_listener(&self, name: &str) -> LbaasResult<Committed<()>> {
        self.finish(self.driver.delete_listener(name)?).await
    }

    pub async fn create_member(
        &self,
        listener_name: &str,
        spec: MemberSpec,
    ) -> LbaasResult<Committed<Member>> {
        self.finish(self.driver.create_member(listener_name, spec)?).await
    }

    pub async fn update_member(
        &self,
        name: &str,
        update: MemberUpdate,
    ) -> LbaasResult<Committed<Member>> {
        self.finish(self.driver.update_member(name, update)?).await
    }

    pub async fn delete_member(&self, name: &str) -> LbaasResult<Committed<()>> {
        self.finish(self.driver.delete_member(name)?).await
    }

    /// Unconditional apply of the current store.
    pub async fn apply_changes(&self) -> LbaasResult<ApplyResult> {
        self.driver.apply_changes().await
    }

    /// Apply only when HAProxy lags behind the store.
    pub async fn reconcile(&self) -> LbaasResult<Option<ApplyResult>> {
        let status = self.driver.status()?;
        if !status.diverged {
            return Ok(None);
        }
        tracing::info!(
            store_revision = status.store_revision,
            applied_revision = ?status.applied_revision,
            pending = status.pending.len(),
            "Store ahead of HAProxy, re-applying"
        );
        self.driver.apply_changes().await.map(Some)
    }

    pub fn status(&self) -> LbaasResult<ApplyStatus> {
        self.driver.status()
    }

    async fn finish<T>(&self, committed: Revisioned<T>) -> LbaasResult<Committed<T>> {
        let Revisioned { value, revision } = committed;
        let apply = self.driver.apply_through(revision).await;
        if let Err(e) = &apply {
            tracing::warn!(revision, error = %e, "Mutation committed but not applied");
        }
        Ok(Committed {
            value,
            revision,
            apply,
        })
    }
}

//! HAProxy-backed driver.
//!
//! # Responsibilities
//! - Route mutations through store transactions
//! - Serialize applies: snapshot → build → atomic write → reload
//! - Track the last apply attempt for status reporting

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::apply::{build_config, AtomicWriter, BuildOptions, Invoker, ReloadInvoker};
use crate::config::LbaasConfig;
use crate::driver::{ApplyResult, ApplyStatus, LoadBalancerDriver};
use crate::error::LbaasResult;
use crate::model::{
    now_secs, Listener, ListenerSpec, ListenerUpdate, Member, MemberSpec, MemberUpdate,
};
use crate::observability::metrics;
use crate::store::{Revisioned, Store};

/// Bookkeeping about apply attempts. Only written while the gate is held.
#[derive(Debug, Clone, Default)]
struct ApplyRecord {
    last_error: Option<String>,
    last_attempt_at: Option<u64>,
    last_success_at: Option<u64>,
    last_result: Option<ApplyResult>,
}

/// Drives a single HAProxy instance through its config file.
pub struct HaproxyDriver<R: ReloadInvoker = Invoker> {
    store: Store,
    writer: AtomicWriter,
    invoker: R,
    options: BuildOptions,
    gate: Mutex<()>,
    record: ArcSwap<ApplyRecord>,
}

impl HaproxyDriver<Invoker> {
    /// Wire the driver from configuration around an opened store.
    pub fn from_config(config: &LbaasConfig, store: Store) -> LbaasResult<Self> {
        let invoker = Invoker::from_config(&config.reload)?;
        let options = BuildOptions {
            group: config.haproxy.group.clone(),
        };
        Ok(Self::new(
            store,
            AtomicWriter::new(&config.haproxy.config_path),
            invoker,
            options,
        ))
    }
}

impl<R: ReloadInvoker> HaproxyDriver<R> {
    pub fn new(store: Store, writer: AtomicWriter, invoker: R, options: BuildOptions) -> Self {
        tracing::info!(
            config_path = %writer.path().display(),
            reload = %invoker.describe(),
            group = %options.group,
            "HAProxy driver ready"
        );
        Self {
            store,
            writer,
            invoker,
            options,
            gate: Mutex::new(()),
            record: ArcSwap::from_pointee(ApplyRecord::default()),
        }
    }

    pub fn invoker(&self) -> &R {
        &self.invoker
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.writer.path()
    }

    /// One apply attempt. Caller holds the gate.
    async fn apply_locked(&self) -> LbaasResult<ApplyResult> {
        let started = Instant::now();
        let attempt_at = now_secs();
        let outcome = self.render_and_reload(started).await;

        let mut record = ApplyRecord::clone(&self.record.load_full());
        record.last_attempt_at = Some(attempt_at);
        match &outcome {
            Ok(result) => {
                tracing::info!(
                    revision = result.revision,
                    duration_ms = result.duration_ms,
                    "Apply succeeded"
                );
                metrics::record_apply("success", started);
                record.last_error = None;
                record.last_success_at = Some(now_secs());
                record.last_result = Some(result.clone());
            }
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Apply failed");
                metrics::record_apply("failure", started);
                record.last_error = Some(e.to_string());
            }
        }
        self.record.store(Arc::new(record));
        outcome
    }

    async fn render_and_reload(&self, started: Instant) -> LbaasResult<ApplyResult> {
        let snapshot = self.store.snapshot()?;
        let text = build_config(&snapshot, &self.options)?;
        self.writer.write(&text)?;
        tracing::debug!(
            revision = snapshot.revision,
            listeners = snapshot.listeners.len(),
            path = %self.writer.path().display(),
            "Config written"
        );

        let output = self.invoker.reload().await?;
        self.store.mark_applied(snapshot.revision)?;
        metrics::record_revisions(snapshot.revision, Some(snapshot.revision));

        Ok(ApplyResult {
            revision: snapshot.revision,
            config_path: self.writer.path().to_path_buf(),
            output,
            duration_ms: started.elapsed().as_millis() as u64,
            coalesced: false,
        })
    }

    fn committed(&self, entity: &'static str, op: &'static str) {
        metrics::record_mutation(entity, op);
        if let Ok(progress) = self.store.progress() {
            metrics::record_revisions(progress.revision, progress.applied_revision);
        }
    }
}

impl<R: ReloadInvoker> LoadBalancerDriver for HaproxyDriver<R> {
    fn store(&self) -> &Store {
        &self.store
    }

    fn create_listener(&self, spec: ListenerSpec) -> LbaasResult<Revisioned<Listener>> {
        let created = self.store.transaction(|t| t.create_listener(spec))?;
        self.committed("listener", "create");
        let listener = &created.value;
        tracing::info!(
            listener = %listener.name,
            protocol = %listener.protocol,
            port = listener.port,
            algorithm = %listener.algorithm,
            revision = created.revision,
            "Listener created"
        );
        Ok(created)
    }

    fn update_listener(
        &self,
        name: &str,
        update: ListenerUpdate,
    ) -> LbaasResult<Revisioned<Listener>> {
        let updated = self.store.transaction(|t| t.update_listener(name, update))?;
        self.committed("listener", "update");
        tracing::info!(
            listener = %name,
            port = updated.value.port,
            revision = updated.revision,
            "Listener updated"
        );
        Ok(updated)
    }

    fn delete_listener(&self, name: &str) -> LbaasResult<Revisioned<()>> {
        let deleted = self.store.transaction(|t| t.delete_listener(name))?;
        self.committed("listener", "delete");
        tracing::info!(listener = %name, revision = deleted.revision, "Listener deleted");
        Ok(deleted)
    }

    fn create_member(
        &self,
        listener_name: &str,
        spec: MemberSpec,
    ) -> LbaasResult<Revisioned<Member>> {
        let created = self
            .store
            .transaction(|t| t.create_member(listener_name, spec))?;
        self.committed("member", "create");
        let member = &created.value;
        tracing::info!(
            member = %member.name,
            listener = %listener_name,
            address = %member.address,
            port = member.port,
            revision = created.revision,
            "Member created"
        );
        Ok(created)
    }

    fn update_member(&self, name: &str, update: MemberUpdate) -> LbaasResult<Revisioned<Member>> {
        let updated = self.store.transaction(|t| t.update_member(name, update))?;
        self.committed("member", "update");
        tracing::info!(
            member = %name,
            address = %updated.value.address,
            port = updated.value.port,
            revision = updated.revision,
            "Member updated"
        );
        Ok(updated)
    }

    fn delete_member(&self, name: &str) -> LbaasResult<Revisioned<()>> {
        let deleted = self.store.transaction(|t| t.delete_member(name))?;
        self.committed("member", "delete");
        tracing::info!(member = %name, revision = deleted.revision, "Member deleted");
        Ok(deleted)
    }

    async fn apply_changes(&self) -> LbaasResult<ApplyResult> {
        let _gate = self.gate.lock().await;
        self.apply_locked().await
    }

    async fn apply_through(&self, revision: u64) -> LbaasResult<ApplyResult> {
        let _gate = self.gate.lock().await;

        // Another caller may have applied our revision while we waited.
        let applied = self.store.applied_revision()?;
        let last = self.record.load_full().last_result.clone();
        if let (Some(applied), Some(mut last)) = (applied, last) {
            if applied >= revision && last.revision >= revision {
                tracing::debug!(revision, applied, "Apply coalesced");
                last.coalesced = true;
                last.duration_ms = 0;
                return Ok(last);
            }
        }

        self.apply_locked().await
    }

    fn status(&self) -> LbaasResult<ApplyStatus> {
        let progress = self.store.progress()?;
        let record = self.record.load();
        Ok(ApplyStatus {
            store_revision: progress.revision,
            applied_revision: progress.applied_revision,
            diverged: progress.applied_revision != Some(progress.revision),
            last_error: record.last_error.clone(),
            last_attempt_at: record.last_attempt_at,
            last_success_at: record.last_success_at,
            pending: progress.pending,
        })
    }
}

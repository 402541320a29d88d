//! Resource store for listeners and members.
//!
//! # Data Flow
//! ```text
//! transaction(|tables| ...)
//!     → clone current tables (read lock, released)
//!     → run the mutation on the draft
//!     → Err: draft dropped (rollback)
//!     → Ok:  bump revision → persist draft (atomic file replace) → swap in
//!     → Revisioned { value, revision } (revision of this commit)
//!
//! snapshot()
//!     → read lock → listeners + members + revision copied → lock released
//! ```
//!
//! # Design Decisions
//! - Writers are serialized by a commit mutex; readers only ever take the read lock
//! - Every committed mutation appends to an outbox; `mark_applied` drains it
//! - The applied marker is persisted so divergence survives restarts

pub mod tables;

pub use tables::{ChangeOp, EntityKind, PendingChange, Tables};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use crate::apply::writer::AtomicWriter;
use crate::error::{LbaasError, LbaasResult};
use crate::model::{ConfigSnapshot, Listener, Member};

/// Consistent view of how far the applied state lags behind the store.
#[derive(Debug, Clone)]
pub struct Progress {
    pub revision: u64,
    pub applied_revision: Option<u64>,
    pub pending: Vec<PendingChange>,
}

/// Result of a transaction, tagged with the revision it committed.
///
/// A transaction that recorded no change reports the revision it read.
#[derive(Debug, Clone, PartialEq)]
pub struct Revisioned<T> {
    pub value: T,
    pub revision: u64,
}

/// Shared, thread-safe resource store.
#[derive(Clone)]
pub struct Store {
    tables: Arc<RwLock<Tables>>,
    commit_lock: Arc<Mutex<()>>,
    persist: Option<AtomicWriter>,
}

impl Store {
    /// Ephemeral store (tests, dry runs).
    pub fn in_memory() -> Self {
        Self::from_tables(Tables::default(), None)
    }

    /// Open (or create) a store persisted as JSON at `path`.
    pub fn open(path: &Path) -> LbaasResult<Self> {
        let tables = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| LbaasError::Store(format!("read {}: {}", path.display(), e)))?;
            serde_json::from_str(&content)
                .map_err(|e| LbaasError::Store(format!("parse {}: {}", path.display(), e)))?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    LbaasError::Store(format!("create {}: {}", parent.display(), e))
                })?;
            }
            Tables::default()
        };

        tracing::info!(
            path = %path.display(),
            revision = tables.revision,
            applied_revision = ?tables.applied_revision,
            listeners = tables.listeners.len(),
            members = tables.members.len(),
            "Store opened"
        );
        Ok(Self::from_tables(tables, Some(AtomicWriter::new(path))))
    }

    fn from_tables(tables: Tables, persist: Option<AtomicWriter>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(tables)),
            commit_lock: Arc::new(Mutex::new(())),
            persist,
        }
    }

    /// Location of the state file, if persistent.
    pub fn path(&self) -> Option<PathBuf> {
        self.persist.as_ref().map(|w| w.path().to_path_buf())
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub fn get_listener(&self, name: &str) -> LbaasResult<Listener> {
        self.read()?.get_listener(name)
    }

    pub fn get_listeners(&self) -> LbaasResult<Vec<Listener>> {
        Ok(self.read()?.get_listeners())
    }

    pub fn get_member(&self, name: &str) -> LbaasResult<Member> {
        self.read()?.get_member(name)
    }

    pub fn get_members(&self) -> LbaasResult<Vec<Member>> {
        Ok(self.read()?.get_members())
    }

    /// Consistent view of all committed state.
    pub fn snapshot(&self) -> LbaasResult<ConfigSnapshot> {
        Ok(self.read()?.snapshot())
    }

    /// Revision of the latest commit.
    pub fn revision(&self) -> LbaasResult<u64> {
        Ok(self.read()?.revision)
    }

    /// Revision last applied to HAProxy, if any.
    pub fn applied_revision(&self) -> LbaasResult<Option<u64>> {
        Ok(self.read()?.applied_revision)
    }

    /// Committed changes not yet applied.
    pub fn pending(&self) -> LbaasResult<Vec<PendingChange>> {
        Ok(self.read()?.outbox.clone())
    }

    /// Revision, applied marker and outbox read under one lock.
    pub fn progress(&self) -> LbaasResult<Progress> {
        let tables = self.read()?;
        Ok(Progress {
            revision: tables.revision,
            applied_revision: tables.applied_revision,
            pending: tables.outbox.clone(),
        })
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Run `f` against a draft of the tables and commit it atomically.
    ///
    /// If `f` fails, or persisting the draft fails, nothing is visible.
    /// The revision is taken while the commit lock is still held, so it
    /// always belongs to this transaction.
    pub fn transaction<T, F>(&self, f: F) -> LbaasResult<Revisioned<T>>
    where
        F: FnOnce(&mut Tables) -> LbaasResult<T>,
    {
        let _commit = self
            .commit_lock
            .lock()
            .map_err(|_| LbaasError::Store("commit lock poisoned".to_string()))?;

        let mut draft = self.read()?.clone();
        let queued = draft.outbox_len();

        let value = f(&mut draft)?;

        if draft.outbox_len() > queued {
            draft.revision += 1;
        }
        let revision = draft.revision;
        self.commit(draft)?;
        Ok(Revisioned { value, revision })
    }

    /// Record that the snapshot at `revision` is live.
    pub fn mark_applied(&self, revision: u64) -> LbaasResult<()> {
        let _commit = self
            .commit_lock
            .lock()
            .map_err(|_| LbaasError::Store("commit lock poisoned".to_string()))?;

        let mut draft = self.read()?.clone();
        draft.mark_applied(revision);
        self.commit(draft)
    }

    /// Persist then publish. Caller holds the commit lock.
    fn commit(&self, draft: Tables) -> LbaasResult<()> {
        if let Some(writer) = &self.persist {
            let json = serde_json::to_string_pretty(&draft)
                .map_err(|e| LbaasError::Store(format!("encode state: {}", e)))?;
            writer
                .write(&json)
                .map_err(|e| LbaasError::Store(e.to_string()))?;
        }

        let revision = draft.revision;
        *self
            .tables
            .write()
            .map_err(|_| LbaasError::Store("store lock poisoned".to_string()))? = draft;
        tracing::debug!(revision, "Store commit");
        Ok(())
    }

    fn read(&self) -> LbaasResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| LbaasError::Store("store lock poisoned".to_string()))
    }
}

//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lbaas::apply::{AtomicWriter, BuildOptions, ReloadInvoker, ReloadOutput};
use lbaas::driver::HaproxyDriver;
use lbaas::error::{LbaasError, LbaasResult};
use lbaas::store::Store;

#[derive(Default)]
struct FakeState {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail: AtomicBool,
    delay_ms: AtomicU64,
    watch: Mutex<Option<PathBuf>>,
    observed: Mutex<Vec<String>>,
}

/// Reload invoker that records calls and can be told to fail.
///
/// On every reload it captures the config file it is watching, so tests can
/// check what HAProxy would have loaded.
#[derive(Clone, Default)]
pub struct FakeInvoker {
    state: Arc<FakeState>,
}

impl FakeInvoker {
    pub fn watching(path: &Path) -> Self {
        let invoker = Self::default();
        *invoker.state.watch.lock().unwrap() = Some(path.to_path_buf());
        invoker
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Config text seen by each reload, oldest first.
    pub fn observed(&self) -> Vec<String> {
        self.state.observed.lock().unwrap().clone()
    }
}

impl ReloadInvoker for FakeInvoker {
    async fn reload(&self) -> LbaasResult<ReloadOutput> {
        let state = &self.state;
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        state.calls.fetch_add(1, Ordering::SeqCst);

        let watched = state.watch.lock().unwrap().clone();
        if let Some(path) = watched {
            let text = fs::read_to_string(&path).unwrap_or_default();
            state.observed.lock().unwrap().push(text);
        }

        let delay = state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        state.in_flight.fetch_sub(1, Ordering::SeqCst);

        if state.fail.load(Ordering::SeqCst) {
            Err(LbaasError::Apply {
                reason: "injected failure".to_string(),
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "[ALERT] config invalid".to_string(),
            })
        } else {
            Ok(ReloadOutput {
                exit_code: Some(0),
                stdout: "reloaded".to_string(),
                stderr: String::new(),
            })
        }
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join("haproxy.cfg")
}

/// Driver writing `haproxy.cfg` into `dir`, backed by an in-memory store.
pub fn fake_driver(dir: &Path) -> (Arc<HaproxyDriver<FakeInvoker>>, FakeInvoker) {
    let path = config_path(dir);
    let invoker = FakeInvoker::watching(&path);
    let driver = HaproxyDriver::new(
        Store::in_memory(),
        AtomicWriter::new(path),
        invoker.clone(),
        BuildOptions::default(),
    );
    (Arc::new(driver), invoker)
}

pub fn read_config(dir: &Path) -> String {
    fs::read_to_string(config_path(dir)).unwrap()
}

/// Lines of the `listen <name>` block, header included.
pub fn listen_block(config: &str, name: &str) -> Option<Vec<String>> {
    let header = format!("listen {} ", name);
    let mut lines = config.lines().skip_while(|l| !l.starts_with(&header));
    let first = lines.next()?;
    let mut block = vec![first.to_string()];
    block.extend(
        lines
            .take_while(|l| l.starts_with('\t'))
            .map(str::to_string),
    );
    Some(block)
}

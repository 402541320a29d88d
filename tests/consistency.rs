//! Store/HAProxy convergence under failures and concurrency.

use std::sync::Arc;
use std::time::Duration;

use lbaas::apply::{AtomicWriter, BuildOptions};
use lbaas::coordinator::{Coordinator, Reconciler};
use lbaas::driver::{HaproxyDriver, LoadBalancerDriver};
use lbaas::error::LbaasError;
use lbaas::lifecycle::Shutdown;
use lbaas::model::{ListenerSpec, MemberSpec, Protocol};
use lbaas::resilience::BackoffPolicy;
use lbaas::store::{ChangeOp, EntityKind, Store};

mod common;
use common::FakeInvoker;

#[tokio::test]
async fn test_failed_reload_diverges_then_converges() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, invoker) = common::fake_driver(dir.path());
    let coordinator = Coordinator::new(Arc::clone(&driver));

    invoker.set_failing(true);
    let committed = coordinator
        .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
        .await
        .unwrap();
    assert_eq!(committed.revision, 1);
    match committed.apply {
        Err(LbaasError::Apply { exit_code, stderr, .. }) => {
            assert_eq!(exit_code, Some(1));
            assert!(stderr.contains("config invalid"));
        }
        other => panic!("expected apply failure, got {:?}", other),
    }

    // The mutation stays committed.
    assert!(driver.get_listener("web").is_ok());
    let status = driver.status().unwrap();
    assert!(status.diverged);
    assert_eq!(status.store_revision, 1);
    assert_eq!(status.applied_revision, None);
    assert!(status.last_error.unwrap().contains("injected failure"));
    assert_eq!(status.pending.len(), 1);
    assert_eq!(status.pending[0].entity, EntityKind::Listener);
    assert_eq!(status.pending[0].op, ChangeOp::Create);

    invoker.set_failing(false);
    let result = coordinator.reconcile().await.unwrap().unwrap();
    assert_eq!(result.revision, 1);

    let status = driver.status().unwrap();
    assert!(!status.diverged);
    assert!(status.pending.is_empty());
    assert!(status.last_error.is_none());
    assert!(coordinator.reconcile().await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_applies_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, invoker) = common::fake_driver(dir.path());
    invoker.set_delay(Duration::from_millis(20));
    driver
        .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let driver = Arc::clone(&driver);
        handles.push(tokio::spawn(async move { driver.apply_changes().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(invoker.calls(), 8);
    assert_eq!(invoker.max_in_flight(), 1);
}

#[tokio::test]
async fn test_concurrent_mutations_coalesce() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, invoker) = common::fake_driver(dir.path());
    invoker.set_delay(Duration::from_millis(20));
    let coordinator = Coordinator::new(Arc::clone(&driver));
    coordinator
        .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
        .await
        .unwrap()
        .apply
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .create_member(
                    "web",
                    MemberSpec::new(format!("m{}", i), format!("10.0.0.{}", i + 1), 80),
                )
                .await
        }));
    }
    for handle in handles {
        let committed = handle.await.unwrap().unwrap();
        let applied = committed.apply.unwrap();
        assert!(applied.revision >= committed.revision);
    }

    assert_eq!(invoker.max_in_flight(), 1);
    assert!(invoker.calls() <= 11);
    let status = driver.status().unwrap();
    assert!(!status.diverged);
    assert_eq!(status.store_revision, 11);

    // The live file has every member.
    let config = common::read_config(dir.path());
    let block = common::listen_block(&config, "web").unwrap();
    assert_eq!(block.iter().filter(|l| l.starts_with("\tserver")).count(), 10);
}

#[tokio::test]
async fn test_concurrent_mutations_report_their_own_revision() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, invoker) = common::fake_driver(dir.path());
    // Failed reloads keep every change in the outbox for comparison.
    invoker.set_failing(true);
    invoker.set_delay(Duration::from_millis(5));
    let coordinator = Coordinator::new(Arc::clone(&driver));
    coordinator
        .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("m{}", i);
            let committed = coordinator
                .create_member("web", MemberSpec::new(name.as_str(), "10.0.0.1", 80 + i))
                .await
                .unwrap();
            (name, committed.revision)
        }));
    }
    let mut seen = Vec::new();
    for handle in handles {
        seen.push(handle.await.unwrap());
    }

    let mut revisions: Vec<u64> = seen.iter().map(|(_, r)| *r).collect();
    revisions.sort_unstable();
    assert_eq!(revisions, (2..=11).collect::<Vec<u64>>());

    let pending = driver.status().unwrap().pending;
    for (name, revision) in &seen {
        let change = pending
            .iter()
            .find(|c| c.entity == EntityKind::Member && &c.name == name)
            .unwrap();
        assert_eq!(change.revision, *revision, "{} reported a foreign revision", name);
    }
}

#[tokio::test]
async fn test_divergence_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let config_path = common::config_path(dir.path());

    {
        let invoker = FakeInvoker::watching(&config_path);
        invoker.set_failing(true);
        let driver = HaproxyDriver::new(
            Store::open(&state).unwrap(),
            AtomicWriter::new(&config_path),
            invoker,
            BuildOptions::default(),
        );
        driver
            .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
            .unwrap();
        assert!(driver.apply_changes().await.is_err());
    }

    let invoker = FakeInvoker::watching(&config_path);
    let driver = HaproxyDriver::new(
        Store::open(&state).unwrap(),
        AtomicWriter::new(&config_path),
        invoker.clone(),
        BuildOptions::default(),
    );
    let status = driver.status().unwrap();
    assert!(status.diverged);
    assert_eq!(status.pending.len(), 1);

    driver.apply_changes().await.unwrap();
    assert!(!driver.status().unwrap().diverged);
    assert!(invoker.observed()[0].contains("listen web 0.0.0.0:80"));
}

#[tokio::test]
async fn test_reconciler_retries_until_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, invoker) = common::fake_driver(dir.path());
    invoker.set_failing(true);
    driver
        .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
        .unwrap();

    let shutdown = Shutdown::new();
    let reconciler = Reconciler::new(
        Coordinator::new(Arc::clone(&driver)),
        Duration::from_millis(10),
        BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(20)),
    );
    let task = tokio::spawn(reconciler.run(shutdown.subscribe()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while invoker.calls() < 3 {
        assert!(tokio::time::Instant::now() < deadline, "reconciler stalled");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(driver.status().unwrap().diverged);

    invoker.set_failing(false);
    while driver.status().unwrap().diverged {
        assert!(tokio::time::Instant::now() < deadline, "reconciler never converged");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}

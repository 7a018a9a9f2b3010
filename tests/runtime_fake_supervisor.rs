// tests/runtime_fake_supervisor.rs

mod common;
use crate::common::{eventually, init_tracing, write_file};

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use devloop::engine::{RebuildReason, RebuildRequester, Runtime, RuntimeEvent};
use devloop::errors::DevloopError;
use devloop::exec::CycleOutcome;
use devloop::watch::{ChangeWatcher, WatchRuleSet, enumerate_directories, spawn_watcher};
use devloop_test_utils::builders::ConfigFileBuilder;
use devloop_test_utils::fake_supervisor::{FakeSupervisor, SupervisorLog};
use devloop_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn requests_are_served_one_at_a_time() -> TestResult {
    init_tracing();
    let log = Arc::new(Mutex::new(SupervisorLog::default()));
    let supervisor = FakeSupervisor::new(Arc::clone(&log))
        .with_outcome(Ok(CycleOutcome::BuildFailed))
        .with_rebuild_time(Duration::from_millis(50));

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let runtime = tokio::spawn(Runtime::new(rx, supervisor).run());
    let requester = RebuildRequester::new(tx.clone());

    assert!(requester.request_and_wait(RebuildReason::Startup).await);

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let requester = requester.clone();
        waiters.push(tokio::spawn(async move {
            requester.request_and_wait(RebuildReason::FileChange).await
        }));
    }
    for waiter in waiters {
        assert!(waiter.await?);
    }

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(runtime).await??;

    let log = log.lock().unwrap();
    assert_eq!(log.rebuilds, 4);
    assert_eq!(log.max_concurrent, 1);
    assert_eq!(log.shutdowns, 1);
    Ok(())
}

#[tokio::test]
async fn runtime_stops_when_every_sender_is_gone() -> TestResult {
    init_tracing();
    let log = Arc::new(Mutex::new(SupervisorLog::default()));
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(4);
    let runtime = tokio::spawn(Runtime::new(rx, FakeSupervisor::new(Arc::clone(&log))).run());

    RebuildRequester::new(tx.clone())
        .request(RebuildReason::Startup)
        .await;
    drop(tx);

    with_timeout(runtime).await??;
    let log = log.lock().unwrap();
    assert_eq!(log.rebuilds, 1);
    assert_eq!(log.shutdowns, 1);
    Ok(())
}

#[tokio::test]
async fn fatal_cycle_error_ends_the_runtime() -> TestResult {
    init_tracing();
    let log = Arc::new(Mutex::new(SupervisorLog::default()));
    let supervisor = FakeSupervisor::new(Arc::clone(&log)).with_outcome(Err(
        DevloopError::PortExhaustion {
            preferred: 3811,
            source: std::io::Error::other("no ports left"),
        },
    ));

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(4);
    let runtime = tokio::spawn(Runtime::new(rx, supervisor).run());

    // The requester still hears back, even though the cycle failed.
    assert!(
        RebuildRequester::new(tx.clone())
            .request_and_wait(RebuildReason::Startup)
            .await
    );

    let err = with_timeout(runtime).await?.unwrap_err();
    assert!(matches!(err, DevloopError::PortExhaustion { preferred: 3811, .. }));
    assert_eq!(log.lock().unwrap().shutdowns, 1);
    Ok(())
}

/// Changes made while a rebuild is running must not queue another one.
#[tokio::test]
async fn watcher_stays_paused_for_the_whole_rebuild() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().canonicalize()?;
    write_file(&root.join("main.go"), "package main\n");

    let log = Arc::new(Mutex::new(SupervisorLog::default()));
    let supervisor =
        FakeSupervisor::new(Arc::clone(&log)).with_rebuild_time(Duration::from_millis(800));

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let runtime = tokio::spawn(Runtime::new(rx, supervisor).run());

    let watcher = Arc::new(ChangeWatcher::with_debounce(
        WatchRuleSet::default(),
        Arc::new(RebuildRequester::new(tx.clone())),
        Duration::from_millis(100),
    ));
    let paths = enumerate_directories(&root)?;
    let watch = {
        let watcher = Arc::clone(&watcher);
        tokio::spawn(async move { watcher.watch(paths).await })
    };
    assert!(eventually(Duration::from_secs(2), || !watcher.watched_dirs().is_empty()).await);

    write_file(&root.join("main.go"), "package main // 1\n");
    assert!(eventually(Duration::from_secs(2), || log.lock().unwrap().in_flight).await);

    // Simulate the build writing files while the cycle runs.
    for i in 0..5 {
        write_file(&root.join(format!("gen_{i}.go")), "package main\n");
        sleep(Duration::from_millis(50)).await;
    }
    assert!(eventually(Duration::from_secs(3), || !log.lock().unwrap().in_flight).await);
    sleep(Duration::from_millis(400)).await;
    assert_eq!(log.lock().unwrap().rebuilds, 1);

    // Once resumed, a new change rebuilds again.
    write_file(&root.join("main.go"), "package main // 2\n");
    assert!(eventually(Duration::from_secs(3), || log.lock().unwrap().rebuilds == 2).await);

    watcher.stop();
    with_timeout(watch).await??;
    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(runtime).await??;
    Ok(())
}

#[tokio::test]
async fn watcher_that_cannot_start_shuts_the_runtime_down() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let cfg = ConfigFileBuilder::new(tmp.path().join("missing")).build();

    let log = Arc::new(Mutex::new(SupervisorLog::default()));
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let runtime = tokio::spawn(Runtime::new(rx, FakeSupervisor::new(Arc::clone(&log))).run());

    // `tx` stays alive, so only an explicit shutdown can end the runtime.
    let watcher = spawn_watcher(&cfg, tx.clone());
    with_timeout(runtime).await??;
    assert_eq!(log.lock().unwrap().shutdowns, 1);
    assert_eq!(log.lock().unwrap().rebuilds, 0);

    let err = with_timeout(watcher.stop()).await.unwrap_err();
    assert!(matches!(err, DevloopError::Walk { .. }), "got {err:?}");
    drop(tx);
    Ok(())
}

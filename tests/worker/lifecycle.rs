use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::support::helpers::{
    completed, echo, init_tracing, wait_for, wait_for_job, TEST_PORT,
};
use anyhow::Result;
use testworker::{
    start_worker, worker_fn, JobFailure, JobStatus, MemoryJobServer, SetupStage, WorkerConfig,
    WorkerError, WorkerHandle, WorkerOptions, WorkerState,
};

#[test]
fn echo_worker_starts_serves_and_stops() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);

    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "echo",
        echo(),
        None,
        WorkerOptions::NONE,
    )?;
    assert_eq!(handle.state(), WorkerState::Running);
    assert_eq!(server.active_connections(), 1);

    let job = server.submit("echo", "hello");
    let report = wait_for_job(&server, &job)?;
    assert_eq!(report.status, completed("hello"));
    assert_eq!(report.worker.as_deref(), Some("worker-echo"));

    let stopped = handle.stop()?;
    assert_eq!(stopped.function_name, "echo");
    assert_eq!(stopped.state, WorkerState::Stopped);
    assert_eq!(stopped.stats.jobs_completed, 1);
    assert_eq!(server.active_connections(), 0);
    Ok(())
}

#[test]
fn every_started_worker_is_joined_on_stop() -> Result<()> {
    init_tracing();

    for count in [1usize, 3, 8] {
        let server = MemoryJobServer::new(TEST_PORT);
        let handles = (0..count)
            .map(|index| {
                start_worker(
                    server.clone(),
                    TEST_PORT,
                    &format!("function-{index}"),
                    echo(),
                    None,
                    WorkerOptions::NONE,
                )
            })
            .collect::<Result<Vec<WorkerHandle>>>()?;
        assert_eq!(server.active_connections(), count);

        let reports = handles
            .into_iter()
            .map(WorkerHandle::stop)
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(reports.len(), count);
        assert!(reports
            .iter()
            .all(|report| report.state == WorkerState::Stopped));
        assert_eq!(server.active_connections(), 0);
    }
    Ok(())
}

#[test]
fn stop_returns_within_one_poll_timeout() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "idle",
        echo(),
        None,
        WorkerOptions::NONE,
    )?;
    thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    let report = handle.stop_timeout(Duration::from_secs(2))?;
    assert!(
        started.elapsed() < Duration::from_millis(600),
        "stop took {:?}",
        started.elapsed()
    );
    assert_eq!(report.state, WorkerState::Stopped);
    assert!(report.stats.idle_cycles >= 1);
    Ok(())
}

#[test]
fn failing_callback_keeps_being_invoked() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "always-fails",
        worker_fn(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(JobFailure::Fail)
        }),
        None,
        WorkerOptions::NONE,
    )?;

    let jobs: Vec<String> = (0..5)
        .map(|index| server.submit("always-fails", format!("job-{index}")))
        .collect();
    for job in &jobs {
        assert_eq!(wait_for_job(&server, job)?.status, JobStatus::Failed);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(handle.state(), WorkerState::Running);

    let report = handle.stop()?;
    assert_eq!(report.stats.jobs_failed, 5);
    assert_eq!(report.stats.jobs_completed, 0);
    Ok(())
}

#[test]
fn unreachable_port_fails_to_start() {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);

    let err = start_worker(
        server.clone(),
        TEST_PORT + 1,
        "echo",
        echo(),
        None,
        WorkerOptions::NONE,
    )
    .unwrap_err();

    let worker_error = err
        .downcast_ref::<WorkerError>()
        .expect("setup failure is a WorkerError");
    assert_eq!(worker_error.stage(), Some(SetupStage::Connect));
    assert_eq!(server.active_connections(), 0);
}

#[test]
fn server_shutdown_does_not_end_the_loop() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "echo",
        echo(),
        None,
        WorkerOptions::NONE,
    )?;

    server.shutdown();
    wait_for(Duration::from_secs(2), || handle.stats().cycle_errors >= 2)?;
    assert_eq!(handle.state(), WorkerState::Running);

    let report = handle.stop()?;
    assert_eq!(report.state, WorkerState::Stopped);
    assert_eq!(server.active_connections(), 0);
    Ok(())
}

#[test]
fn dropped_handle_releases_its_connection() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "echo",
        echo(),
        None,
        WorkerOptions::NONE,
    )?;
    assert_eq!(server.active_connections(), 1);

    drop(handle);
    assert_eq!(server.active_connections(), 0);
    Ok(())
}

#[test]
fn unbounded_poll_timeout_keeps_serving() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let config = WorkerConfig::builder()
        .port(TEST_PORT)
        .function_name("echo")
        .function(echo())
        .poll_timeout(Duration::MAX)
        .build()?;
    let handle = WorkerHandle::spawn(server.clone(), config)?;

    for payload in ["first", "second"] {
        let job = server.submit("echo", payload);
        assert_eq!(wait_for_job(&server, &job)?.status, completed(payload));
    }
    assert_eq!(handle.state(), WorkerState::Running);

    // An idle cycle without a deadline only returns once the server closes.
    handle.cancellation_token().cancel();
    server.shutdown();
    let report = handle.stop()?;
    assert_eq!(report.state, WorkerState::Stopped);
    assert_eq!(report.stats.jobs_completed, 2);
    Ok(())
}

#[test]
fn unbounded_stop_limit_behaves_like_stop() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "echo",
        echo(),
        None,
        WorkerOptions::NONE,
    )?;

    let report = handle.stop_timeout(Duration::MAX)?;
    assert_eq!(report.state, WorkerState::Stopped);
    assert_eq!(server.active_connections(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_async_joins_without_blocking_the_runtime() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let starter = server.clone();
    let handle = tokio::task::spawn_blocking(move || {
        start_worker(starter, TEST_PORT, "echo", echo(), None, WorkerOptions::NONE)
    })
    .await??;

    let job = server.submit("echo", "async");
    let waiter = server.clone();
    let report = tokio::task::spawn_blocking(move || wait_for_job(&waiter, &job)).await??;
    assert_eq!(report.status, completed("async"));

    let stopped = handle.stop_async().await?;
    assert_eq!(stopped.state, WorkerState::Stopped);
    assert_eq!(server.active_connections(), 0);
    Ok(())
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::support::helpers::{completed, echo, init_tracing, reverse, wait_for_job, TEST_PORT};
use anyhow::Result;
use bytes::Bytes;
use testworker::{
    aggregator_fn, start_worker, start_worker_with_reducer, worker_fn, FunctionArg, JobFailure,
    JobStatus, MemoryJobServer, Reducer, RegistrationKind, WorkerOptions,
};

#[test]
fn workers_on_one_port_only_receive_their_own_jobs() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let echo_worker = start_worker(
        server.clone(),
        TEST_PORT,
        "echo",
        echo(),
        None,
        WorkerOptions::NONE,
    )?;
    let reverse_worker = start_worker(
        server.clone(),
        TEST_PORT,
        "reverse",
        reverse(),
        None,
        WorkerOptions::NONE,
    )?;

    let reversed = server.submit("reverse", "abc");
    let echoed = server.submit("echo", "abc");

    let reversed = wait_for_job(&server, &reversed)?;
    assert_eq!(reversed.status, completed("cba"));
    assert_eq!(reversed.worker.as_deref(), Some("worker-reverse"));

    let echoed = wait_for_job(&server, &echoed)?;
    assert_eq!(echoed.status, completed("abc"));
    assert_eq!(echoed.worker.as_deref(), Some("worker-echo"));

    let echo_report = echo_worker.stop()?;
    let reverse_report = reverse_worker.stop()?;
    assert_eq!(echo_report.stats.jobs_completed, 1);
    assert_eq!(reverse_report.stats.jobs_completed, 1);

    let kinds: Vec<_> = server
        .registrations()
        .into_iter()
        .map(|registration| (registration.function, registration.kind))
        .collect();
    assert!(kinds.contains(&("echo".to_string(), RegistrationKind::Plain)));
    assert!(kinds.contains(&("reverse".to_string(), RegistrationKind::Plain)));
    Ok(())
}

#[test]
fn aggregator_selects_map_registration_and_reducer_runs() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let partials = Arc::new(AtomicUsize::new(0));
    let finals = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&partials);
    let recorded = Arc::clone(&finals);
    let reducer = Reducer::new(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .with_final(move |result, _| {
        recorded.lock().unwrap().push(result.clone());
    });

    let handle = start_worker_with_reducer(
        server.clone(),
        TEST_PORT,
        "length",
        worker_fn(|job, _| Ok(Bytes::from(job.workload().len().to_string()))),
        None,
        WorkerOptions::NONE,
        reducer,
        Some(aggregator_fn(|parts, _| {
            let mut merged = b"len=".to_vec();
            merged.extend(parts.concat());
            Ok(Bytes::from(merged))
        })),
    )?;

    let job = server.submit("length", "four");
    assert_eq!(wait_for_job(&server, &job)?.status, completed("len=4"));
    handle.stop()?;

    assert_eq!(partials.load(Ordering::SeqCst), 1);
    assert_eq!(
        finals.lock().unwrap().as_slice(),
        &[Ok::<_, JobFailure>(Bytes::from_static(b"len=4"))]
    );
    assert_eq!(server.registrations()[0].kind, RegistrationKind::Map);
    Ok(())
}

#[test]
fn worker_forwards_exception_messages() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "explode",
        worker_fn(|_, _| Err(JobFailure::exception("boom"))),
        None,
        WorkerOptions::NONE,
    )?;

    let job = server.submit("explode", "");
    assert_eq!(
        wait_for_job(&server, &job)?.status,
        JobStatus::Exception("boom".into())
    );
    handle.stop()?;
    Ok(())
}

#[test]
fn grab_uniq_delivers_unique_ids() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "unique",
        worker_fn(|job, _| Ok(Bytes::from(job.unique().unwrap_or_default().to_owned()))),
        None,
        WorkerOptions::GRAB_UNIQ,
    )?;

    let job = server.submit_unique("unique", "order-42", "payload");
    assert_eq!(wait_for_job(&server, &job)?.status, completed("order-42"));
    handle.stop()?;
    Ok(())
}

#[test]
fn function_argument_reaches_the_callback() -> Result<()> {
    init_tracing();
    let server = MemoryJobServer::new(TEST_PORT);
    let prefix: FunctionArg = Arc::new(String::from("greeting: "));

    let handle = start_worker(
        server.clone(),
        TEST_PORT,
        "greet",
        worker_fn(|job, arg| {
            let prefix = arg
                .and_then(|arg| arg.downcast_ref::<String>())
                .ok_or_else(|| JobFailure::exception("missing prefix"))?;
            let mut out = prefix.as_bytes().to_vec();
            out.extend_from_slice(job.workload());
            Ok(Bytes::from(out))
        }),
        Some(prefix),
        WorkerOptions::NONE,
    )?;

    let job = server.submit("greet", "hi");
    assert_eq!(wait_for_job(&server, &job)?.status, completed("greeting: hi"));
    handle.stop()?;
    Ok(())
}

// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cross-thread context propagation through a wrapped executor.

mod common;

use std::sync::mpsc;

use instrumentation_core::scope;
use instrumentation_propagation::{Executor, TracedExecutor};

use common::{tracer_with_sink, WorkerExecutor};

#[test]
fn submitted_work_runs_under_the_submitters_context() {
    let (tracer, _sink) = tracer_with_sink();

    // The worker thread has its own ambient context, as pooled threads do.
    let worker_span = tracer.start_span("worker.ambient");
    let worker_span_id = worker_span.context().span_id;
    let (worker, worker_handle) = WorkerExecutor::spawn(Some(worker_span));
    let executor = TracedExecutor::new(worker);

    let submit_span = tracer.start_span("submit.op");
    let submit_span_id = submit_span.context().span_id;
    let (result_tx, result_rx) = mpsc::channel();
    {
        let _scope = tracer.activate(&submit_span);
        executor
            .execute(Box::new(move || {
                let _ = result_tx.send(scope::current().map(|s| s.context().span_id));
            }))
            .expect("submission should succeed");
    }

    // Inside the job, the submitter's context is active on the worker.
    let active_in_job = result_rx.recv().expect("job should run");
    assert_eq!(active_in_job, Some(submit_span_id));

    // After the job, the worker's own ambient context is back.
    drop(executor);
    let ambient_after = worker_handle.join().expect("worker should exit cleanly");
    assert_eq!(ambient_after, vec![Some(worker_span_id)]);
}

#[test]
fn unrelated_later_jobs_see_no_leaked_context() {
    let (tracer, _sink) = tracer_with_sink();
    let (worker, worker_handle) = WorkerExecutor::spawn(None);
    let executor = TracedExecutor::new(worker);

    let span = tracer.start_span("submit.op");
    let (first_tx, first_rx) = mpsc::channel();
    {
        let _scope = tracer.activate(&span);
        executor
            .execute(Box::new(move || {
                let _ = first_tx.send(scope::current().is_some());
            }))
            .expect("submission should succeed");
    }
    assert!(first_rx.recv().expect("first job should run"));

    // Submitted with no context active: must not inherit the first job's.
    let (second_tx, second_rx) = mpsc::channel();
    executor
        .execute(Box::new(move || {
            let _ = second_tx.send(scope::current().is_none());
        }))
        .expect("submission should succeed");
    assert!(
        second_rx.recv().expect("second job should run"),
        "a pooled worker must not keep a previous job's context"
    );

    drop(executor);
    let ambient_after = worker_handle.join().expect("worker should exit cleanly");
    assert_eq!(ambient_after, vec![None, None]);
}

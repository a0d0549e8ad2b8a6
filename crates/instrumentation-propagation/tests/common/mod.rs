// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities: an isolated tracer and a single-thread worker
//! pool with an observable ambient context.

#![allow(dead_code)]

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use instrumentation_core::{scope, Config, MemorySink, Span, Tracer};
use instrumentation_propagation::{Executor, Job, SubmitError};

pub fn tracer_with_sink() -> (Tracer, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    (
        Tracer::new(Arc::new(Config::default()), sink.clone()),
        sink,
    )
}

/// Runs jobs on one dedicated worker thread, optionally under the worker's
/// own ambient context. After each job the worker records which context is
/// active, so tests can assert the job did not permanently overwrite it;
/// the records are returned when the executor is dropped.
pub struct WorkerExecutor {
    tx: mpsc::Sender<Job>,
}

impl WorkerExecutor {
    pub fn spawn(ambient: Option<Span>) -> (Self, JoinHandle<Vec<Option<u64>>>) {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = std::thread::spawn(move || {
            let _scope = ambient.map(scope::activate);
            let mut ambient_after_each_job = Vec::new();
            for job in rx {
                job();
                ambient_after_each_job.push(scope::current().map(|s| s.context().span_id));
            }
            ambient_after_each_job
        });
        (Self { tx }, handle)
    }
}

impl Executor for WorkerExecutor {
    fn execute(&self, job: Job) -> Result<(), SubmitError> {
        self.tx
            .send(job)
            .map_err(|_| SubmitError("worker stopped".to_string()))
    }
}

//! Execution observers: tracing and profiling hooks around every job.
//!
//! Callbacks are invoked on the thread that runs the operation, so observer
//! implementations keep their state behind locks.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use serde::Serialize;

use crate::compiler::TracingCtx;
use crate::error::ExecError;
use crate::exec::exec_time::ExecTime;
use crate::exec::JobMeta;
use crate::ir::OperationIndex;

pub trait ExecutionObserver: Send + Sync {
    fn job_begin(&self, job: &JobMeta, ctx: &TracingCtx);

    fn job_end(&self, job: &JobMeta, ctx: &TracingCtx);

    fn subgraph_begin(&self, _ctx: &TracingCtx) {}

    fn subgraph_end(&self, _ctx: &TracingCtx) {}

    /// Reported once before a kernel failure propagates out of `run()`.
    fn execution_error(&self, _job: &JobMeta, _error: &ExecError, _ctx: &TracingCtx) {}
}

/// The observers attached to one executor, shared with its worker threads.
#[derive(Default)]
pub struct ObserverList {
    observers: RwLock<Vec<Box<dyn ExecutionObserver>>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Box<dyn ExecutionObserver>) {
        self.observers
            .write()
            .expect("observer list poisoned")
            .push(observer);
    }

    pub fn job_begin(&self, job: &JobMeta, ctx: &TracingCtx) {
        for observer in self.observers.read().expect("observer list poisoned").iter() {
            observer.job_begin(job, ctx);
        }
    }

    pub fn job_end(&self, job: &JobMeta, ctx: &TracingCtx) {
        for observer in self.observers.read().expect("observer list poisoned").iter() {
            observer.job_end(job, ctx);
        }
    }

    pub fn subgraph_begin(&self, ctx: &TracingCtx) {
        for observer in self.observers.read().expect("observer list poisoned").iter() {
            observer.subgraph_begin(ctx);
        }
    }

    pub fn subgraph_end(&self, ctx: &TracingCtx) {
        for observer in self.observers.read().expect("observer list poisoned").iter() {
            observer.subgraph_end(ctx);
        }
    }

    pub fn execution_error(&self, job: &JobMeta, error: &ExecError, ctx: &TracingCtx) {
        for observer in self.observers.read().expect("observer list poisoned").iter() {
            observer.execution_error(job, error, ctx);
        }
    }
}

static NEXT_TRACE_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static TRACE_THREAD_ID: u64 = NEXT_TRACE_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

fn current_trace_thread_id() -> u64 {
    TRACE_THREAD_ID.with(|tid| *tid)
}

#[derive(Debug, Clone, Serialize)]
struct TraceEventArgs {
    backend: String,
    session: u32,
    subgraph: u32,
}

#[derive(Debug, Clone, Serialize)]
struct TraceEvent {
    name: String,
    cat: &'static str,
    ph: &'static str,
    ts: u64,
    pid: u32,
    tid: u64,
    args: TraceEventArgs,
}

/// Writes a Chrome-trace JSON array with a begin/end event pair per executed
/// operation, each tagged with the backend that ran it.
///
/// Events accumulate across runs; the file is rewritten whole at the end of
/// each run and once more when the observer is dropped.
pub struct TracingObserver {
    path: PathBuf,
    epoch: Instant,
    events: Mutex<Vec<TraceEvent>>,
}

impl TracingObserver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            epoch: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, job: &JobMeta, ctx: &TracingCtx, ph: &'static str) {
        let ts = self.epoch.elapsed().as_micros() as u64;
        let event = TraceEvent {
            name: format!("{} {}", job.op_name, job.op_index),
            cat: "operation",
            ph,
            ts,
            pid: 1,
            tid: current_trace_thread_id(),
            args: TraceEventArgs {
                backend: job.backend.to_string(),
                session: ctx.session,
                subgraph: ctx.subgraph.0,
            },
        };
        self.events
            .lock()
            .expect("trace event buffer poisoned")
            .push(event);
    }

    fn flush(&self) {
        let events = self.events.lock().expect("trace event buffer poisoned");
        if events.is_empty() {
            return;
        }
        match serde_json::to_string(&*events) {
            Ok(json) => {
                if let Err(err) = fs::write(&self.path, json) {
                    eprintln!("failed to write trace file {}: {err}", self.path.display());
                }
            }
            Err(err) => eprintln!("failed to serialize trace events: {err}"),
        }
    }
}

impl ExecutionObserver for TracingObserver {
    fn job_begin(&self, job: &JobMeta, ctx: &TracingCtx) {
        self.record(job, ctx, "B");
    }

    fn job_end(&self, job: &JobMeta, ctx: &TracingCtx) {
        self.record(job, ctx, "E");
    }

    fn subgraph_end(&self, _ctx: &TracingCtx) {
        self.flush();
    }
}

impl Drop for TracingObserver {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Feeds measured per-operation durations into an `ExecTime` table.
pub struct ProfileObserver {
    exec_time: Arc<ExecTime>,
    started: Mutex<HashMap<OperationIndex, Instant>>,
}

impl ProfileObserver {
    pub fn new(exec_time: Arc<ExecTime>) -> Self {
        Self {
            exec_time,
            started: Mutex::new(HashMap::new()),
        }
    }
}

impl ExecutionObserver for ProfileObserver {
    fn job_begin(&self, job: &JobMeta, _ctx: &TracingCtx) {
        self.started
            .lock()
            .expect("profile observer poisoned")
            .insert(job.op_index, Instant::now());
    }

    fn job_end(&self, job: &JobMeta, _ctx: &TracingCtx) {
        let started = self
            .started
            .lock()
            .expect("profile observer poisoned")
            .remove(&job.op_index);
        if let Some(started) = started {
            self.exec_time
                .update(job.backend.clone(), job.op_name, started.elapsed());
        }
    }
}

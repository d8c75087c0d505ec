use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Condvar, Mutex};
use std::thread;

use crate::error::{ExecError, ExecResult};
use crate::exec::base::{run_job, ExecutorBase};
use crate::exec::dataflow::Readiness;
use crate::exec::observers::ExecutionObserver;
use crate::exec::{CodeEntry, CodeMap, Executor};
use crate::ir::Graph;

/// Dataflow executor that dispatches ready operations onto a worker pool.
///
/// Two operations run simultaneously only when neither consumes an operand
/// the other produces; the readiness counters enforce exactly that, so
/// workers never race on a tensor buffer. Within one operation the function
/// sequence runs sequentially on a single worker.
pub struct ParallelExecutor {
    base: ExecutorBase,
    jobs: Vec<Mutex<CodeEntry>>,
    pending_init: Vec<u32>,
    consumers_by_job: Vec<Vec<usize>>,
    workers: NonZeroUsize,
}

struct PoolState {
    pending: Vec<u32>,
    ready: VecDeque<usize>,
    running: usize,
    remaining: usize,
    failure: Option<ExecError>,
}

impl ParallelExecutor {
    pub fn new(base: ExecutorBase, code_map: CodeMap, workers: NonZeroUsize) -> Self {
        let readiness = Readiness::build(base.graph());
        let mut job_of_op = BTreeMap::new();
        let mut jobs = Vec::with_capacity(code_map.len());
        let mut op_indices = Vec::with_capacity(code_map.len());
        for (op_index, entry) in code_map {
            job_of_op.insert(op_index, jobs.len());
            op_indices.push(op_index);
            jobs.push(Mutex::new(entry));
        }
        let pending_init = op_indices
            .iter()
            .map(|op_index| readiness.pending.get(op_index).copied().unwrap_or(0))
            .collect();
        let consumers_by_job = op_indices
            .iter()
            .map(|op_index| {
                readiness
                    .consumers
                    .get(op_index)
                    .map(|consumers| {
                        consumers
                            .iter()
                            .filter_map(|consumer| job_of_op.get(consumer).copied())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();
        Self {
            base,
            jobs,
            pending_init,
            consumers_by_job,
            workers,
        }
    }

    fn worker_loop(&self, state: &Mutex<PoolState>, cond: &Condvar) {
        loop {
            let job_id = {
                let mut guard = state.lock().expect("worker pool poisoned");
                loop {
                    if guard.failure.is_some() || guard.remaining == 0 {
                        return;
                    }
                    if let Some(id) = guard.ready.pop_front() {
                        guard.running += 1;
                        break id;
                    }
                    if guard.running == 0 {
                        // Nothing runnable and nothing in flight: the graph
                        // cannot make progress.
                        guard.failure = Some(ExecError::state(format!(
                            "{} operations never became ready",
                            guard.remaining
                        )));
                        cond.notify_all();
                        return;
                    }
                    guard = cond.wait(guard).expect("worker pool poisoned");
                }
            };

            let result = {
                let mut entry = self.jobs[job_id].lock().expect("job entry poisoned");
                run_job(&self.base, &mut entry)
            };

            let mut guard = state.lock().expect("worker pool poisoned");
            guard.running -= 1;
            guard.remaining -= 1;
            match result {
                Ok(()) => {
                    for &consumer in &self.consumers_by_job[job_id] {
                        guard.pending[consumer] -= 1;
                        if guard.pending[consumer] == 0 {
                            guard.ready.push_back(consumer);
                            cond.notify_one();
                        }
                    }
                }
                Err(err) => {
                    guard.failure.get_or_insert(err);
                }
            }
            if guard.remaining == 0 || guard.failure.is_some() {
                cond.notify_all();
            }
        }
    }
}

impl Executor for ParallelExecutor {
    fn graph(&self) -> &Graph {
        self.base.graph()
    }

    fn run(&mut self) -> ExecResult<()> {
        self.base.observers().subgraph_begin(self.base.tracing_ctx());

        let ready: VecDeque<usize> = self
            .pending_init
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id)
            .collect();
        let state = Mutex::new(PoolState {
            pending: self.pending_init.clone(),
            ready,
            running: 0,
            remaining: self.jobs.len(),
            failure: None,
        });
        let cond = Condvar::new();

        let worker_count = self.workers.get().min(self.jobs.len().max(1));
        let this = &*self;
        thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| this.worker_loop(&state, &cond));
            }
        });

        let state = state.into_inner().expect("worker pool poisoned");
        if let Some(failure) = state.failure {
            return Err(failure);
        }
        self.base.observers().subgraph_end(self.base.tracing_ctx());
        Ok(())
    }

    fn add_observer(&mut self, observer: Box<dyn ExecutionObserver>) {
        self.base.add_observer(observer);
    }

    fn set_input(&mut self, io_index: usize, data: &[u8]) -> ExecResult<()> {
        self.base.set_input(io_index, data)
    }

    fn get_output(&self, io_index: usize) -> ExecResult<Vec<u8>> {
        self.base.get_output(io_index)
    }
}

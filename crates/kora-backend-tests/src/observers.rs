use std::sync::{Arc, Mutex};
use std::time::Instant;

use kora::compiler::TracingCtx;
use kora::exec::{ExecutionObserver, JobMeta};
use kora::ir::OperationIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    End,
}

#[derive(Clone)]
pub struct RecordedEvent {
    pub op_index: OperationIndex,
    pub op_name: &'static str,
    pub backend: String,
    pub phase: Phase,
    pub at: Instant,
}

/// Observer that records every job begin/end with a timestamp; tests assert
/// ordering and duration properties on the recorded stream.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("recording observer poisoned").clone()
    }

    /// Begin/end instants of each completed operation.
    pub fn spans(&self) -> Vec<(OperationIndex, Instant, Instant)> {
        let events = self.events();
        let mut spans = Vec::new();
        for event in events.iter().filter(|event| event.phase == Phase::Begin) {
            if let Some(end) = events.iter().find(|candidate| {
                candidate.phase == Phase::End && candidate.op_index == event.op_index
            }) {
                spans.push((event.op_index, event.at, end.at));
            }
        }
        spans
    }

    fn record(&self, job: &JobMeta, phase: Phase) {
        self.events
            .lock()
            .expect("recording observer poisoned")
            .push(RecordedEvent {
                op_index: job.op_index,
                op_name: job.op_name,
                backend: job.backend.to_string(),
                phase,
                at: Instant::now(),
            });
    }
}

impl ExecutionObserver for RecordingObserver {
    fn job_begin(&self, job: &JobMeta, _ctx: &TracingCtx) {
        self.record(job, Phase::Begin);
    }

    fn job_end(&self, job: &JobMeta, _ctx: &TracingCtx) {
        self.record(job, Phase::End);
    }
}

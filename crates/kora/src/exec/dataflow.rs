use std::collections::{BTreeMap, VecDeque};

use crate::error::{ExecError, ExecResult};
use crate::exec::base::{run_job, ExecutorBase};
use crate::exec::observers::ExecutionObserver;
use crate::exec::{CodeMap, Executor};
use crate::ir::{Graph, OperationIndex};

/// Readiness bookkeeping shared by the dataflow and parallel executors.
///
/// `pending[op]` counts the input operands of `op` that some other operation
/// still has to produce; `consumers[op]` lists, once per produced operand
/// and consumer, who to notify when `op` finishes.
pub(crate) struct Readiness {
    pub(crate) pending: BTreeMap<OperationIndex, u32>,
    pub(crate) consumers: BTreeMap<OperationIndex, Vec<OperationIndex>>,
}

impl Readiness {
    pub(crate) fn build(graph: &Graph) -> Self {
        let mut pending: BTreeMap<OperationIndex, u32> = BTreeMap::new();
        let mut consumers: BTreeMap<OperationIndex, Vec<OperationIndex>> = BTreeMap::new();
        for (op_index, operation) in graph.operations().iter() {
            let mut count = 0;
            for input in operation.distinct_inputs() {
                let producer = graph.operand(input).and_then(|operand| operand.def());
                if let Some(producer) = producer {
                    count += 1;
                    consumers.entry(producer).or_default().push(op_index);
                }
            }
            pending.insert(op_index, count);
        }
        Self { pending, consumers }
    }

    /// Operations that are ready immediately, in ascending index order.
    pub(crate) fn initially_ready(&self) -> VecDeque<OperationIndex> {
        self.pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(op_index, _)| *op_index)
            .collect()
    }
}

/// Runs operations as their producers finish, one at a time.
///
/// A ready queue holds operations with no unresolved inputs; the executor
/// pops in FIFO order, runs the operation synchronously, then decrements its
/// consumers' counters, enqueueing any that reach zero.
pub struct DataflowExecutor {
    base: ExecutorBase,
    code_map: CodeMap,
    readiness: Readiness,
}

impl DataflowExecutor {
    pub fn new(base: ExecutorBase, code_map: CodeMap) -> Self {
        let readiness = Readiness::build(base.graph());
        Self {
            base,
            code_map,
            readiness,
        }
    }
}

impl Executor for DataflowExecutor {
    fn graph(&self) -> &Graph {
        self.base.graph()
    }

    fn run(&mut self) -> ExecResult<()> {
        self.base.observers().subgraph_begin(self.base.tracing_ctx());
        let mut pending = self.readiness.pending.clone();
        let mut ready = self.readiness.initially_ready();
        let mut remaining = pending.len();
        while let Some(op_index) = ready.pop_front() {
            let entry = self
                .code_map
                .get_mut(&op_index)
                .ok_or_else(|| ExecError::state(format!("no code for operation {op_index}")))?;
            run_job(&self.base, entry)?;
            remaining -= 1;
            if let Some(consumers) = self.readiness.consumers.get(&op_index) {
                for consumer in consumers {
                    let count = pending
                        .get_mut(consumer)
                        .expect("consumer missing from pending map");
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*consumer);
                    }
                }
            }
        }
        if remaining != 0 {
            return Err(ExecError::state(format!(
                "{remaining} operations never became ready"
            )));
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

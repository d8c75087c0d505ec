use crate::error::{ExecError, ExecResult};
use crate::exec::base::{run_job, ExecutorBase};
use crate::exec::observers::ExecutionObserver;
use crate::exec::{CodeMap, Executor};
use crate::ir::{Graph, OperationIndex};

/// Executes function sequences strictly in the precomputed order.
///
/// The order is a topological sort and migrant tensors are read-only aliases
/// of already-computed natives, so in-order execution respects every data
/// dependency. Two runs from the same inputs execute the same sequence.
pub struct LinearExecutor {
    base: ExecutorBase,
    code_map: CodeMap,
    order: Vec<OperationIndex>,
}

impl LinearExecutor {
    pub fn new(base: ExecutorBase, code_map: CodeMap, order: Vec<OperationIndex>) -> Self {
        Self {
            base,
            code_map,
            order,
        }
    }
}

impl Executor for LinearExecutor {
    fn graph(&self) -> &Graph {
        self.base.graph()
    }

    fn run(&mut self) -> ExecResult<()> {
        self.base.observers().subgraph_begin(self.base.tracing_ctx());
        for op_index in &self.order {
            let entry = self
                .code_map
                .get_mut(op_index)
                .ok_or_else(|| ExecError::state(format!("no code for operation {op_index}")))?;
            run_job(&self.base, entry)?;
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

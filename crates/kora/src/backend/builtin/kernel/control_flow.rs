use std::sync::{Arc, Weak};

use crate::error::{ExecError, ExecResult};
use crate::exec::{Executor, ExecutorMap, Function};
use crate::ir::{IfSpec, WhileSpec};
use crate::tensor::Tensor;

fn feed_inputs(executor: &mut dyn Executor, values: &[Vec<u8>]) -> ExecResult<()> {
    for (io_index, value) in values.iter().enumerate() {
        executor.set_input(io_index, value)?;
    }
    Ok(())
}

fn collect_outputs(executor: &dyn Executor, count: usize) -> ExecResult<Vec<Vec<u8>>> {
    (0..count).map(|io_index| executor.get_output(io_index)).collect()
}

fn snapshot(tensors: &[Arc<dyn Tensor>]) -> ExecResult<Vec<Vec<u8>>> {
    tensors.iter().map(|tensor| tensor.buffer().to_vec()).collect()
}

fn write_back(tensors: &[Arc<dyn Tensor>], values: &[Vec<u8>]) -> ExecResult<()> {
    if tensors.len() != values.len() {
        return Err(ExecError::invalid_io(format!(
            "subgraph produced {} outputs, expected {}",
            values.len(),
            tensors.len()
        )));
    }
    for (tensor, value) in tensors.iter().zip(values) {
        tensor.buffer().ensure_allocated(value.len());
        tensor.buffer().copy_from_slice(value)?;
    }
    Ok(())
}

/// Reads the condition, then runs the chosen subgraph's executor with the
/// remaining inputs; the subgraph's outputs are copied back through its IO
/// tensors into this operation's outputs.
pub struct IfKernel {
    spec: IfSpec,
    cond: Arc<dyn Tensor>,
    inputs: Vec<Arc<dyn Tensor>>,
    outputs: Vec<Arc<dyn Tensor>>,
    executor_map: Weak<ExecutorMap>,
}

impl IfKernel {
    pub fn new(
        spec: IfSpec,
        cond: Arc<dyn Tensor>,
        inputs: Vec<Arc<dyn Tensor>>,
        outputs: Vec<Arc<dyn Tensor>>,
        executor_map: Weak<ExecutorMap>,
    ) -> Self {
        Self {
            spec,
            cond,
            inputs,
            outputs,
            executor_map,
        }
    }
}

impl Function for IfKernel {
    fn run(&mut self) -> ExecResult<()> {
        let executor_map = self
            .executor_map
            .upgrade()
            .ok_or_else(|| ExecError::state("executor map is gone"))?;
        let cond = crate::tensor::read_scalar_bool(self.cond.as_ref())?;
        let subgraph = if cond {
            self.spec.then_subgraph
        } else {
            self.spec.else_subgraph
        };
        let arguments = snapshot(&self.inputs)?;
        let results = executor_map.with_executor(subgraph, |executor| {
            feed_inputs(executor, &arguments)?;
            executor.run()?;
            collect_outputs(executor, self.outputs.len())
        })?;
        write_back(&self.outputs, &results)
    }
}

/// Runs the cond subgraph on the carried values; while it yields true, runs
/// the body subgraph and carries its outputs into the next iteration. The
/// final carried values become this operation's outputs.
pub struct WhileKernel {
    spec: WhileSpec,
    inputs: Vec<Arc<dyn Tensor>>,
    outputs: Vec<Arc<dyn Tensor>>,
    executor_map: Weak<ExecutorMap>,
}

impl WhileKernel {
    pub fn new(
        spec: WhileSpec,
        inputs: Vec<Arc<dyn Tensor>>,
        outputs: Vec<Arc<dyn Tensor>>,
        executor_map: Weak<ExecutorMap>,
    ) -> Self {
        Self {
            spec,
            inputs,
            outputs,
            executor_map,
        }
    }
}

impl Function for WhileKernel {
    fn run(&mut self) -> ExecResult<()> {
        let executor_map = self
            .executor_map
            .upgrade()
            .ok_or_else(|| ExecError::state("executor map is gone"))?;
        let mut carried = snapshot(&self.inputs)?;
        loop {
            let cond = executor_map.with_executor(self.spec.cond_subgraph, |executor| {
                feed_inputs(executor, &carried)?;
                executor.run()?;
                executor.get_output(0)
            })?;
            let proceed = cond.first().map(|byte| *byte != 0).unwrap_or(false);
            if !proceed {
                break;
            }
            carried = executor_map.with_executor(self.spec.body_subgraph, |executor| {
                feed_inputs(executor, &carried)?;
                executor.run()?;
                collect_outputs(executor, carried.len())
            })?;
        }
        write_back(&self.outputs, &carried)
    }
}

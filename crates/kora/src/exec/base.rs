use std::sync::Arc;

use crate::backend::builtin::IoTensor;
use crate::backend::{BackendContexts, TensorRegistries};
use crate::compiler::{LoweredGraph, TracingCtx};
use crate::error::{CompileError, CompileResult, ExecError, ExecResult};
use crate::exec::observers::{ExecutionObserver, ObserverList};
use crate::exec::CodeEntry;
use crate::ir::Graph;
use crate::tensor::Tensor;

/// State common to every executor flavor.
///
/// Owns the lowered graph and the backend contexts for the executor's whole
/// lifetime; migrant tensor aliases stay valid because no context is torn
/// down before the executor.
pub struct ExecutorBase {
    lowered_graph: LoweredGraph,
    #[allow(dead_code)]
    backend_contexts: BackendContexts,
    tensor_regs: TensorRegistries,
    input_tensors: Vec<Arc<IoTensor>>,
    output_tensors: Vec<Arc<IoTensor>>,
    observers: Arc<ObserverList>,
    tracing_ctx: TracingCtx,
}

impl ExecutorBase {
    pub fn new(
        lowered_graph: LoweredGraph,
        backend_contexts: BackendContexts,
        tensor_regs: TensorRegistries,
        tracing_ctx: TracingCtx,
    ) -> CompileResult<Self> {
        let builtin = tensor_regs.builtin()?;
        let mut input_tensors = Vec::new();
        for index in lowered_graph.graph().inputs() {
            let tensor = builtin.io_tensor(*index).ok_or_else(|| {
                CompileError::config(format!("graph input {index} has no io tensor"))
            })?;
            input_tensors.push(tensor);
        }
        let mut output_tensors = Vec::new();
        for index in lowered_graph.graph().outputs() {
            let tensor = builtin.io_tensor(*index).ok_or_else(|| {
                CompileError::config(format!("graph output {index} has no io tensor"))
            })?;
            output_tensors.push(tensor);
        }
        Ok(Self {
            lowered_graph,
            backend_contexts,
            tensor_regs,
            input_tensors,
            output_tensors,
            observers: Arc::new(ObserverList::new()),
            tracing_ctx,
        })
    }

    pub fn graph(&self) -> &Graph {
        self.lowered_graph.graph()
    }

    pub fn tensor_registries(&self) -> &TensorRegistries {
        &self.tensor_regs
    }

    pub fn observers(&self) -> &Arc<ObserverList> {
        &self.observers
    }

    pub fn tracing_ctx(&self) -> &TracingCtx {
        &self.tracing_ctx
    }

    pub fn add_observer(&mut self, observer: Box<dyn ExecutionObserver>) {
        self.observers.add(observer);
    }

    pub fn set_input(&self, io_index: usize, data: &[u8]) -> ExecResult<()> {
        let tensor = self.input_tensors.get(io_index).ok_or_else(|| {
            ExecError::invalid_io(format!(
                "graph input {io_index} out of range ({} inputs)",
                self.input_tensors.len()
            ))
        })?;
        if data.len() != tensor.byte_len() {
            return Err(ExecError::invalid_io(format!(
                "graph input {io_index} expects {} bytes, got {}",
                tensor.byte_len(),
                data.len()
            )));
        }
        tensor.buffer().copy_from_slice(data)
    }

    pub fn get_output(&self, io_index: usize) -> ExecResult<Vec<u8>> {
        let tensor = self.output_tensors.get(io_index).ok_or_else(|| {
            ExecError::invalid_io(format!(
                "graph output {io_index} out of range ({} outputs)",
                self.output_tensors.len()
            ))
        })?;
        tensor.buffer().to_vec()
    }
}

/// Runs one job with observer notifications; a kernel failure is reported to
/// observers, wrapped with the operation and backend identity, and returned.
pub(crate) fn run_job(base: &ExecutorBase, entry: &mut CodeEntry) -> ExecResult<()> {
    base.observers().job_begin(&entry.meta, base.tracing_ctx());
    match entry.fn_seq.run() {
        Ok(()) => {
            base.observers().job_end(&entry.meta, base.tracing_ctx());
            Ok(())
        }
        Err(err) => {
            let wrapped = ExecError::kernel(
                entry.meta.op_index,
                entry.meta.backend.clone(),
                err.to_string(),
            );
            base.observers()
                .execution_error(&entry.meta, &wrapped, base.tracing_ctx());
            Err(wrapped)
        }
    }
}

use std::any::Any;
use std::sync::{Arc, Weak};

use crate::backend::builtin::kernel::{IfKernel, PermuteKernel, WhileKernel};
use crate::backend::builtin::CONFIG_ID;
use crate::backend::{BackendContext, BackendId, ContextData, TensorRegistries, TensorRegistry};
use crate::error::{CompileError, CompileResult};
use crate::exec::{ExecutorMap, FunctionSequence};
use crate::ir::{OpKind, OperandIndex, OperationIndex};
use crate::tensor::{HostTensor, Tensor};

/// Builtin backend context.
///
/// Kernel generation needs two runtime objects that only exist once every
/// backend context has been created: the union registry view and the shared
/// executor map. The factory injects both before any `gen_kernels` call;
/// the executor map is held as a non-owning view because the map in turn
/// owns executors that hold this context.
pub struct BuiltinContext {
    data: ContextData,
    registry: Arc<TensorRegistry>,
    tensor_regs: Option<TensorRegistries>,
    executor_map: Weak<ExecutorMap>,
}

impl BuiltinContext {
    pub fn new(data: ContextData) -> Self {
        Self {
            data,
            registry: Arc::new(TensorRegistry::new()),
            tensor_regs: None,
            executor_map: Weak::new(),
        }
    }

    pub fn set_tensor_registries(&mut self, tensor_regs: TensorRegistries) {
        self.tensor_regs = Some(tensor_regs);
    }

    pub fn set_executor_map(&mut self, executor_map: Weak<ExecutorMap>) {
        self.executor_map = executor_map;
    }

    fn resolve_tensor(&self, index: OperandIndex) -> CompileResult<Arc<dyn Tensor>> {
        if let Some(tensor) = self.registry.get(index) {
            return Ok(tensor);
        }
        self.tensor_regs
            .as_ref()
            .and_then(|regs| regs.get(index))
            .ok_or_else(|| {
                CompileError::tensor(format!(
                    "builtin kernel generator cannot resolve operand {index}"
                ))
            })
    }

    fn gen_kernel(&self, op_index: OperationIndex) -> CompileResult<FunctionSequence> {
        let operation = self
            .data
            .graph
            .operation(op_index)
            .ok_or_else(|| {
                CompileError::kernel_gen(format!("operation {op_index} missing from partial graph"))
            })?;
        let kernel: Box<dyn crate::exec::Function> = match operation.kind() {
            OpKind::Permute(permute_type) => {
                let input = self.resolve_tensor(operation.inputs()[0])?;
                let output = self.resolve_tensor(operation.outputs()[0])?;
                Box::new(PermuteKernel::new(input, output, *permute_type))
            }
            OpKind::If(spec) => {
                let cond = self.resolve_tensor(operation.inputs()[0])?;
                let inputs = operation.inputs()[1..]
                    .iter()
                    .map(|index| self.resolve_tensor(*index))
                    .collect::<CompileResult<Vec<_>>>()?;
                let outputs = operation
                    .outputs()
                    .iter()
                    .map(|index| self.resolve_tensor(*index))
                    .collect::<CompileResult<Vec<_>>>()?;
                Box::new(IfKernel::new(
                    *spec,
                    cond,
                    inputs,
                    outputs,
                    self.executor_map.clone(),
                ))
            }
            OpKind::While(spec) => {
                let inputs = operation
                    .inputs()
                    .iter()
                    .map(|index| self.resolve_tensor(*index))
                    .collect::<CompileResult<Vec<_>>>()?;
                let outputs = operation
                    .outputs()
                    .iter()
                    .map(|index| self.resolve_tensor(*index))
                    .collect::<CompileResult<Vec<_>>>()?;
                Box::new(WhileKernel::new(
                    *spec,
                    inputs,
                    outputs,
                    self.executor_map.clone(),
                ))
            }
            other => {
                return Err(CompileError::unsupported_op(
                    other.name(),
                    BackendId::new(CONFIG_ID),
                ))
            }
        };
        Ok(FunctionSequence::from_function(kernel))
    }
}

impl BackendContext for BuiltinContext {
    fn data(&self) -> &ContextData {
        &self.data
    }

    fn tensor_registry(&self) -> &Arc<TensorRegistry> {
        &self.registry
    }

    fn gen_tensors(&mut self) -> CompileResult<()> {
        for (index, operand) in self.data.graph.operands().iter() {
            if self.data.external_operands.contains(&index) {
                continue;
            }
            let layout = self
                .data
                .operand_layouts
                .get(&index)
                .copied()
                .unwrap_or_else(|| self.data.graph.layout());
            let tensor = HostTensor::new(operand.info().clone(), layout);
            if let Some(data) = operand.data() {
                tensor
                    .buffer()
                    .copy_from_slice(data)
                    .map_err(|err| CompileError::tensor(err.to_string()))?;
            }
            self.registry.set_native_tensor(index, Arc::new(tensor))?;
        }
        Ok(())
    }

    fn gen_kernels(&mut self) -> CompileResult<Vec<(OperationIndex, FunctionSequence)>> {
        let mut codes = Vec::with_capacity(self.data.op_order.len());
        for op_index in self.data.op_order.clone() {
            codes.push((op_index, self.gen_kernel(op_index)?));
        }
        Ok(codes)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

use std::any::Any;
use std::sync::Arc;

use kora::backend::{
    BackendContext, BackendId, ContextData, CustomKernelArgs, TensorRegistry,
};
use kora::error::{CompileError, CompileResult};
use kora::exec::{Function, FunctionSequence};
use kora::ir::{OpKind, OperandIndex, OperationIndex};
use kora::tensor::Tensor;

use crate::kernels::{
    BinaryKernel, CompareKernel, ConcatKernel, Conv2dKernel, ReshapeKernel, UnaryKernel,
};
use crate::tensor::CpuTensor;

pub struct CpuBackendContext {
    backend_id: BackendId,
    data: ContextData,
    registry: Arc<TensorRegistry>,
}

impl CpuBackendContext {
    pub fn new(backend_id: BackendId, data: ContextData) -> Self {
        Self {
            backend_id,
            data,
            registry: Arc::new(TensorRegistry::new()),
        }
    }

    fn resolve_tensor(&self, index: OperandIndex) -> CompileResult<Arc<dyn Tensor>> {
        self.registry.get(index).ok_or_else(|| {
            CompileError::tensor(format!(
                "backend '{}' cannot resolve operand {index}",
                self.backend_id
            ))
        })
    }

    fn resolve_many(&self, indices: &[OperandIndex]) -> CompileResult<Vec<Arc<dyn Tensor>>> {
        indices.iter().map(|index| self.resolve_tensor(*index)).collect()
    }

    fn gen_kernel(&self, op_index: OperationIndex) -> CompileResult<FunctionSequence> {
        let operation = self.data.graph.operation(op_index).ok_or_else(|| {
            CompileError::kernel_gen(format!("operation {op_index} missing from partial graph"))
        })?;
        let inputs = operation.inputs();
        let outputs = operation.outputs();
        let kernel: Box<dyn Function> = match operation.kind() {
            OpKind::ElementwiseBinary(op) => Box::new(BinaryKernel::new(
                *op,
                self.resolve_tensor(inputs[0])?,
                self.resolve_tensor(inputs[1])?,
                self.resolve_tensor(outputs[0])?,
            )),
            OpKind::ElementwiseUnary(op) => Box::new(UnaryKernel::new(
                *op,
                self.resolve_tensor(inputs[0])?,
                self.resolve_tensor(outputs[0])?,
            )),
            OpKind::Compare(op) => Box::new(CompareKernel::new(
                *op,
                self.resolve_tensor(inputs[0])?,
                self.resolve_tensor(inputs[1])?,
                self.resolve_tensor(outputs[0])?,
            )),
            OpKind::Conv2d(spec) => {
                let bias = match inputs.get(2) {
                    Some(index) => Some(self.resolve_tensor(*index)?),
                    None => None,
                };
                Box::new(Conv2dKernel::new(
                    spec.clone(),
                    self.resolve_tensor(inputs[0])?,
                    self.resolve_tensor(inputs[1])?,
                    bias,
                    self.resolve_tensor(outputs[0])?,
                ))
            }
            OpKind::Concat(spec) => Box::new(ConcatKernel::new(
                spec.axis,
                self.resolve_many(inputs)?,
                self.resolve_tensor(outputs[0])?,
            )),
            OpKind::Reshape => Box::new(ReshapeKernel::new(
                self.resolve_tensor(inputs[0])?,
                self.resolve_tensor(outputs[0])?,
            )),
            OpKind::Custom(spec) => {
                let builder = self.data.custom_kernel_builder.as_ref().ok_or_else(|| {
                    CompileError::kernel_gen(format!(
                        "custom operation {op_index} but the graph has no kernel builder"
                    ))
                })?;
                let args = CustomKernelArgs {
                    inputs: self.resolve_many(inputs)?,
                    outputs: self.resolve_many(outputs)?,
                };
                builder.build_kernel(&spec.id, args)?
            }
            other => {
                return Err(CompileError::unsupported_op(
                    other.name(),
                    self.backend_id.clone(),
                ))
            }
        };
        Ok(FunctionSequence::from_function(kernel))
    }
}

impl BackendContext for CpuBackendContext {
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
            let tensor = CpuTensor::new(operand.info().clone(), layout);
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

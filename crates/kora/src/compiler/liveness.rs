//! Last-use analysis over a linearized schedule.
//!
//! The linear executor frees dynamic intermediate buffers as soon as their
//! final consumer has run; this module computes, per operation, which
//! operands die there.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::backend::TensorRegistries;
use crate::error::{CompileError, CompileResult};
use crate::ir::{Graph, OperandIndex, OperationIndex};
use crate::tensor::Tensor;

/// Tensors to release after each operation of a linear schedule.
pub type DeallocMap = BTreeMap<OperationIndex, Vec<Arc<dyn Tensor>>>;

/// Computes, for each operation in `order`, the operands whose last use in
/// the schedule is that operation.
///
/// Variables, constants and graph inputs/outputs never appear: their
/// buffers outlive the run. Each dying operand appears in exactly one list.
pub fn last_use_operands(
    graph: &Graph,
    order: &[OperationIndex],
) -> BTreeMap<OperationIndex, Vec<OperandIndex>> {
    let mut remaining_uses: BTreeMap<OperandIndex, u32> = BTreeMap::new();
    let mut constants: Vec<OperandIndex> = Vec::new();
    let model_io: BTreeSet<OperandIndex> = graph.io_indices().into_iter().collect();

    for (index, operand) in graph.operands().iter() {
        remaining_uses.insert(index, operand.uses().len() as u32);
        if operand.is_constant() {
            constants.push(index);
        }
    }
    // Pin constants so the walk can never retire them.
    for index in &constants {
        if let Some(count) = remaining_uses.get_mut(index) {
            *count += 1;
        }
    }

    let mut dying: BTreeMap<OperationIndex, Vec<OperandIndex>> = BTreeMap::new();
    for op_index in order {
        let operation = match graph.operation(*op_index) {
            Some(operation) => operation,
            None => continue,
        };
        for input in operation.distinct_inputs() {
            let count = remaining_uses
                .get_mut(&input)
                .expect("input operand missing from use counts");
            debug_assert!(*count > 0);
            *count -= 1;
            let operand = graph.operand(input).expect("operand missing from graph");
            if *count == 0 && !operand.info().is_variable && !model_io.contains(&input) {
                dying.entry(*op_index).or_default().push(input);
            }
        }
    }

    for index in &constants {
        if let Some(count) = remaining_uses.get_mut(index) {
            *count -= 1;
        }
    }
    debug_assert!(
        remaining_uses.values().all(|count| *count == 0),
        "liveness walk left unresolved uses"
    );

    dying
}

/// Resolves the dying operands of each operation to their runtime tensors.
pub fn plan_deallocations(
    graph: &Graph,
    order: &[OperationIndex],
    tensor_regs: &TensorRegistries,
) -> CompileResult<DeallocMap> {
    let mut dealloc_map = DeallocMap::new();
    for (op_index, operands) in last_use_operands(graph, order) {
        let mut tensors = Vec::with_capacity(operands.len());
        for index in operands {
            let tensor = tensor_regs.get(index).ok_or_else(|| {
                CompileError::tensor(format!(
                    "operand {index} scheduled for deallocation has no tensor"
                ))
            })?;
            tensors.push(tensor);
        }
        dealloc_map.insert(op_index, tensors);
    }
    Ok(dealloc_map)
}

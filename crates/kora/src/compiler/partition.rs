//! Slicing a lowered graph into one partial graph per backend.
//!
//! Every operand and operation keeps its whole-graph index inside the
//! partial graphs, so the per-backend registries, the generated code map and
//! the whole-graph schedule all speak the same indices.

use std::collections::BTreeMap;

use crate::backend::{BackendContexts, BackendId, BackendSet, ContextData};
use crate::compiler::LoweredGraph;
use crate::env;
use crate::error::{CompileError, CompileResult};
use crate::ir::Graph;

/// Builds a `BackendContext` for every backend in the set.
///
/// Each backend receives its partial graph, the operands it references but
/// does not produce, the chosen layouts, and the whole-graph topological
/// order restricted to its operations. Backends without any operation still
/// get a context: the builtin backend for one owns the graph-IO tensors
/// even when no control-flow operation landed on it.
pub fn create_backend_contexts(
    lowered_graph: &LoweredGraph,
    backends: &BackendSet,
    is_linear_executor: bool,
) -> CompileResult<BackendContexts> {
    let whole_graph = lowered_graph.graph();
    let mut data_map: BTreeMap<BackendId, ContextData> = backends
        .iter()
        .map(|(id, _)| {
            (
                id.clone(),
                ContextData {
                    graph: Graph::new(whole_graph.layout()),
                    external_operands: Default::default(),
                    operand_layouts: BTreeMap::new(),
                    op_order: Vec::new(),
                    is_linear_executor,
                    custom_kernel_builder: whole_graph.kernel_builder().cloned(),
                },
            )
        })
        .collect();

    // Separate operands into partial graphs by their chosen backend.
    for (operand_index, operand) in whole_graph.operands().iter() {
        let lower_info = match lowered_graph.operand_lower_info(operand_index) {
            Some(info) if !info.def_factors().is_empty() => info,
            // Unused operand.
            _ => continue,
        };
        let def_factor = lower_info.only_factor()?;
        let data = data_map.get_mut(&def_factor.backend).ok_or_else(|| {
            CompileError::config(format!(
                "operand {operand_index} is assigned to unregistered backend '{}'",
                def_factor.backend
            ))
        })?;
        data.operand_layouts.insert(operand_index, def_factor.layout);
        let mut copy = operand.clone();
        copy.clear_def_use();
        data.graph.add_operand_at(operand_index, copy)?;
    }

    // Separate operations, pulling in externally produced operands.
    for (op_index, operation) in whole_graph.operations().iter() {
        let backend = lowered_graph
            .operation_lower_info(op_index)
            .map(|info| info.backend.clone())
            .ok_or_else(|| {
                CompileError::config(format!("operation {op_index} has no backend assigned"))
            })?;
        let data = data_map.get_mut(&backend).ok_or_else(|| {
            CompileError::config(format!(
                "operation {op_index} is assigned to unregistered backend '{backend}'"
            ))
        })?;

        for operand_index in operation.io_operands() {
            if data.graph.operands().contains(operand_index) {
                continue;
            }
            let operand = whole_graph.operand(operand_index).ok_or_else(|| {
                CompileError::partition(format!(
                    "operation {op_index} references missing operand {operand_index}"
                ))
            })?;
            let layout = lowered_graph
                .operand_lower_info(operand_index)
                .ok_or_else(|| {
                    CompileError::config(format!("operand {operand_index} has no lower info"))
                })?
                .only_factor()?
                .layout;
            let mut copy = operand.clone();
            copy.clear_def_use();
            data.graph.add_operand_at(operand_index, copy)?;
            data.operand_layouts.insert(operand_index, layout);
            data.external_operands.insert(operand_index);
        }

        data.graph.add_operation_at(op_index, operation.clone())?;
    }

    // Finalize each slice: graph IO is always external, and the slice's own
    // IO lists are derived from what landed in it.
    let whole_op_order = whole_graph.topological_order();
    let mut contexts = BackendContexts::new();
    for (backend_id, mut data) in data_map {
        let operand_indices: Vec<_> = data.graph.operands().keys().collect();
        for index in operand_indices {
            let is_whole_input = whole_graph.inputs().contains(&index);
            let is_whole_output = whole_graph.outputs().contains(&index);
            if is_whole_input || is_whole_output {
                data.external_operands.insert(index);
            }
            let operand = data
                .graph
                .operand(index)
                .expect("operand listed but missing");
            let no_local_def = operand.def().is_none() && !operand.is_constant();
            let no_local_use = operand.uses().is_empty();
            if is_whole_input || no_local_def {
                data.graph.add_input(index);
            }
            if is_whole_output || no_local_use {
                data.graph.add_output(index);
            }
        }

        data.op_order = whole_op_order
            .iter()
            .copied()
            .filter(|index| data.graph.operations().contains(*index))
            .collect();

        if env::dump_graphs_enabled() {
            eprintln!("partial graph for backend '{backend_id}':\n{}", data.graph);
        }

        let backend = backends
            .get(&backend_id)
            .expect("backend listed but missing");
        contexts.insert(backend_id, backend.new_context(data)?);
    }
    Ok(contexts)
}

//! Linearization of a lowered graph into a single execution order.

use crate::compiler::LoweredGraph;
use crate::env;
use crate::ir::OperationIndex;

/// Produces the schedule the linear executor runs: a topological order over
/// all operations of the whole graph.
pub fn linearize(lowered_graph: &LoweredGraph) -> Vec<OperationIndex> {
    lowered_graph.graph().topological_order()
}

/// Dumps the schedule to stderr when graph dumping is enabled.
pub fn dump(lowered_graph: &LoweredGraph, order: &[OperationIndex]) {
    if !env::dump_graphs_enabled() {
        return;
    }
    eprintln!("linearized order:");
    for op_index in order {
        let name = lowered_graph
            .graph()
            .operation(*op_index)
            .map(|operation| operation.kind().name())
            .unwrap_or("?");
        let backend = lowered_graph
            .operation_lower_info(*op_index)
            .map(|info| info.backend.to_string())
            .unwrap_or_default();
        eprintln!("  {op_index} {name} [{backend}]");
    }
}

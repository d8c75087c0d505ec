use std::collections::BTreeMap;

use crate::backend::BackendId;
use crate::error::{CompileError, CompileResult};
use crate::ir::{Graph, Layout, OperandIndex, OperationIndex};

/// Which backend produces an operand, and in which layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefFactor {
    pub backend: BackendId,
    pub layout: Layout,
}

impl DefFactor {
    pub fn new(backend: BackendId, layout: Layout) -> Self {
        Self { backend, layout }
    }
}

/// Lowering annotation of one operand: the set of def factors producing it.
///
/// A fully lowered graph has exactly one factor per used operand; more than
/// one means layout/backend conflicts that the lowering stage resolves by
/// inserting explicit permute operations.
#[derive(Debug, Clone, Default)]
pub struct OperandLowerInfo {
    def_factors: Vec<DefFactor>,
}

impl OperandLowerInfo {
    pub fn new(factor: DefFactor) -> Self {
        Self {
            def_factors: vec![factor],
        }
    }

    pub fn add_def_factor(&mut self, factor: DefFactor) {
        if !self.def_factors.contains(&factor) {
            self.def_factors.push(factor);
        }
    }

    pub fn def_factors(&self) -> &[DefFactor] {
        &self.def_factors
    }

    /// The single chosen factor; an error when the choice is still ambiguous.
    pub fn only_factor(&self) -> CompileResult<&DefFactor> {
        match self.def_factors.as_slice() {
            [factor] => Ok(factor),
            factors => Err(CompileError::config(format!(
                "operand has {} def factors, expected exactly one",
                factors.len()
            ))),
        }
    }
}

/// Lowering annotation of one operation: the backend chosen to run it.
#[derive(Debug, Clone)]
pub struct OperationLowerInfo {
    pub backend: BackendId,
    pub layout: Layout,
}

impl OperationLowerInfo {
    pub fn new(backend: BackendId, layout: Layout) -> Self {
        Self { backend, layout }
    }
}

/// A graph annotated with a chosen backend and layout for every operation
/// and every used operand. Produced by the lowering stage; sole input of
/// executor construction, which takes ownership for the executor's lifetime.
pub struct LoweredGraph {
    graph: Graph,
    operand_lower_info: BTreeMap<OperandIndex, OperandLowerInfo>,
    operation_lower_info: BTreeMap<OperationIndex, OperationLowerInfo>,
}

impl LoweredGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            operand_lower_info: BTreeMap::new(),
            operation_lower_info: BTreeMap::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn set_operand_lower_info(&mut self, index: OperandIndex, info: OperandLowerInfo) {
        self.operand_lower_info.insert(index, info);
    }

    pub fn operand_lower_info(&self, index: OperandIndex) -> Option<&OperandLowerInfo> {
        self.operand_lower_info.get(&index)
    }

    pub fn set_operation_lower_info(&mut self, index: OperationIndex, info: OperationLowerInfo) {
        self.operation_lower_info.insert(index, info);
    }

    pub fn operation_lower_info(&self, index: OperationIndex) -> Option<&OperationLowerInfo> {
        self.operation_lower_info.get(&index)
    }

    /// Convenience for hosts: assigns one backend and layout to everything.
    pub fn lower_all_to(&mut self, backend: &BackendId, layout: Layout) {
        let operand_indices: Vec<OperandIndex> = self.graph.operands().keys().collect();
        for index in operand_indices {
            self.operand_lower_info.insert(
                index,
                OperandLowerInfo::new(DefFactor::new(backend.clone(), layout)),
            );
        }
        let operation_indices: Vec<OperationIndex> = self.graph.operations().keys().collect();
        for index in operation_indices {
            self.operation_lower_info
                .insert(index, OperationLowerInfo::new(backend.clone(), layout));
        }
    }

    /// Checks that the lowering is complete: every used operand has exactly
    /// one def factor and every operation has a backend.
    pub fn validate(&self) -> CompileResult<()> {
        for (index, operand) in self.graph.operands().iter() {
            let unused = operand.def().is_none() && operand.uses().is_empty();
            if unused {
                continue;
            }
            let info = self.operand_lower_info.get(&index).ok_or_else(|| {
                CompileError::config(format!("operand {index} has no lower info"))
            })?;
            info.only_factor().map_err(|_| {
                CompileError::config(format!(
                    "operand {index} has {} def factors, expected exactly one",
                    info.def_factors().len()
                ))
            })?;
        }
        for (index, _) in self.graph.operations().iter() {
            if !self.operation_lower_info.contains_key(&index) {
                return Err(CompileError::config(format!(
                    "operation {index} has no backend assigned"
                )));
            }
        }
        Ok(())
    }
}

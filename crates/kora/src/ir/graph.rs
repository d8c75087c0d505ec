use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::backend::CustomKernelBuilder;
use crate::error::{CompileError, CompileResult};
use crate::ir::{Layout, Operand, OperandIndex, OperandInfo, Operation, OperationIndex};
use crate::util::IndexMap;

/// Indexed collections of operands and operations plus the graph's IO lists.
///
/// Operand and operation indices are stable: a graph built by the importer
/// and the per-backend slices cut from it all refer to entities by the same
/// indices.
#[derive(Clone)]
pub struct Graph {
    operands: IndexMap<OperandIndex, Operand>,
    operations: IndexMap<OperationIndex, Operation>,
    inputs: Vec<OperandIndex>,
    outputs: Vec<OperandIndex>,
    layout: Layout,
    kernel_builder: Option<Arc<dyn CustomKernelBuilder>>,
}

impl Graph {
    pub fn new(layout: Layout) -> Self {
        Self {
            operands: IndexMap::new(),
            operations: IndexMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            layout,
            kernel_builder: None,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn kernel_builder(&self) -> Option<&Arc<dyn CustomKernelBuilder>> {
        self.kernel_builder.as_ref()
    }

    pub fn set_kernel_builder(&mut self, builder: Arc<dyn CustomKernelBuilder>) {
        self.kernel_builder = Some(builder);
    }

    // Operands

    pub fn operands(&self) -> &IndexMap<OperandIndex, Operand> {
        &self.operands
    }

    pub fn operand(&self, index: OperandIndex) -> Option<&Operand> {
        self.operands.get(index)
    }

    /// Appends a fresh operand at the next free index.
    pub fn add_operand(&mut self, info: OperandInfo) -> OperandIndex {
        self.operands.push(Operand::new(info))
    }

    /// Appends a fresh constant operand carrying `data`.
    pub fn add_constant(&mut self, info: OperandInfo, data: Arc<[u8]>) -> OperandIndex {
        self.operands.push(Operand::new(info).with_data(data))
    }

    /// Inserts an operand at an explicit index, preserving it exactly.
    pub fn add_operand_at(&mut self, index: OperandIndex, operand: Operand) -> CompileResult<()> {
        self.operands.insert_at(index, operand).map_err(|collision| {
            CompileError::partition(format!(
                "operand index %{} inserted twice into the same graph",
                collision.0
            ))
        })?;
        Ok(())
    }

    // Operations

    pub fn operations(&self) -> &IndexMap<OperationIndex, Operation> {
        &self.operations
    }

    pub fn operation(&self, index: OperationIndex) -> Option<&Operation> {
        self.operations.get(index)
    }

    /// Appends an operation at the next free index and wires the def/use
    /// links of every referenced operand.
    pub fn push_operation(&mut self, operation: Operation) -> CompileResult<OperationIndex> {
        let index = self.operations.next_index();
        self.add_operation_at(index, operation)?;
        Ok(index)
    }

    /// Inserts an operation at an explicit index and wires def/use links.
    pub fn add_operation_at(
        &mut self,
        index: OperationIndex,
        operation: Operation,
    ) -> CompileResult<()> {
        if self.operations.contains(index) {
            return Err(CompileError::partition(format!(
                "operation index {index} inserted twice into the same graph"
            )));
        }
        for operand_index in operation.io_operands() {
            if !self.operands.contains(operand_index) {
                return Err(CompileError::partition(format!(
                    "operation {index} references missing operand {operand_index}"
                )));
            }
        }
        for input in operation.distinct_inputs() {
            if let Some(operand) = self.operands.get_mut(input) {
                operand.insert_use(index);
            }
        }
        for output in operation.outputs() {
            let operand = self
                .operands
                .get_mut(*output)
                .ok_or_else(|| CompileError::partition(format!("missing operand {output}")))?;
            if operand.def().is_some() {
                return Err(CompileError::partition(format!(
                    "operand {output} defined by more than one operation"
                )));
            }
            operand.set_def(index);
        }
        self.operations
            .insert_at(index, operation)
            .expect("collision checked above");
        Ok(())
    }

    // Graph IO

    pub fn inputs(&self) -> &[OperandIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperandIndex] {
        &self.outputs
    }

    pub fn add_input(&mut self, index: OperandIndex) {
        if !self.inputs.contains(&index) {
            self.inputs.push(index);
        }
    }

    pub fn add_output(&mut self, index: OperandIndex) {
        if !self.outputs.contains(&index) {
            self.outputs.push(index);
        }
    }

    /// Graph inputs and outputs, deduplicated.
    pub fn io_indices(&self) -> Vec<OperandIndex> {
        let mut indices = Vec::with_capacity(self.inputs.len() + self.outputs.len());
        for index in self.inputs.iter().chain(self.outputs.iter()) {
            if !indices.contains(index) {
                indices.push(*index);
            }
        }
        indices
    }

    /// Topological order over all operations.
    ///
    /// Depth-first over producer links; ties resolve in ascending operation
    /// index, so the order is deterministic for a given graph.
    pub fn topological_order(&self) -> Vec<OperationIndex> {
        let mut order = Vec::with_capacity(self.operations.len());
        let mut visited = BTreeSet::new();
        for (index, _) in self.operations.iter() {
            self.visit_producers(index, &mut visited, &mut order);
        }
        order
    }

    fn visit_producers(
        &self,
        index: OperationIndex,
        visited: &mut BTreeSet<OperationIndex>,
        order: &mut Vec<OperationIndex>,
    ) {
        if !visited.insert(index) {
            return;
        }
        if let Some(operation) = self.operations.get(index) {
            for input in operation.distinct_inputs() {
                if let Some(def) = self.operands.get(input).and_then(|operand| operand.def()) {
                    self.visit_producers(def, visited, order);
                }
            }
        }
        order.push(index);
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph (layout = {}) {{", self.layout)?;
        for (index, operand) in self.operands.iter() {
            let mut tags = Vec::new();
            if operand.is_constant() {
                tags.push("const");
            }
            if operand.info().is_variable {
                tags.push("var");
            }
            if operand.info().is_dynamic {
                tags.push("dyn");
            }
            let tags = if tags.is_empty() {
                String::new()
            } else {
                format!(" ({})", tags.join(", "))
            };
            writeln!(
                f,
                "  {index} : {} {}{tags}",
                operand.info().dtype,
                operand.info().shape,
            )?;
        }
        for (index, operation) in self.operations.iter() {
            write!(f, "  {index} = {}(", operation.kind().name())?;
            for (i, input) in operation.inputs().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{input}")?;
            }
            write!(f, ") -> (")?;
            for (i, output) in operation.outputs().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{output}")?;
            }
            writeln!(f, ")")?;
        }
        write!(f, "  inputs: [")?;
        for (i, index) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{index}")?;
        }
        write!(f, "]  outputs: [")?;
        for (i, index) in self.outputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{index}")?;
        }
        writeln!(f, "]")?;
        write!(f, "}}")
    }
}

pub mod dtype;
pub mod graph;
pub mod layout;
pub mod operand;
pub mod operation;

pub use dtype::DType;
pub use graph::Graph;
pub use layout::Layout;
pub use operand::{Operand, OperandIndex, OperandInfo, Shape};
pub use operation::{
    ComparisonOp, ConcatSpec, Conv2dSpec, CustomSpec, ElementwiseBinaryOp, ElementwiseUnaryOp,
    IfSpec, OpKind, Operation, OperationIndex, PermuteType, WhileSpec,
};

use std::fmt;

use crate::util::index_map::EntityIndex;

/// Identifies a subgraph within a model; control-flow kernels dispatch into
/// nested subgraphs through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SubgraphIndex(pub u32);

impl fmt::Display for SubgraphIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl EntityIndex for SubgraphIndex {
    fn from_raw(raw: u32) -> Self {
        SubgraphIndex(raw)
    }

    fn raw(self) -> u32 {
        self.0
    }
}

use std::fmt;

use smallvec::SmallVec;

use crate::ir::{OperandIndex, SubgraphIndex};
use crate::util::index_map::EntityIndex;

/// Stable identifier of an operation within a model graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationIndex(pub u32);

impl fmt::Display for OperationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl EntityIndex for OperationIndex {
    fn from_raw(raw: u32) -> Self {
        OperationIndex(raw)
    }

    fn raw(self) -> u32 {
        self.0
    }
}

/// Elementwise binary ops over same-shape operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementwiseBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Elementwise unary ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementwiseUnaryOp {
    Relu,
    Neg,
    Abs,
    Exp,
    Tanh,
}

/// Comparator used by `compare`; the result dtype is `Bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
}

/// Attribute payload for `conv2d`.
///
/// Feature maps are NHWC; the filter operand is OHWI. Padding is symmetric
/// per spatial axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conv2dSpec {
    pub strides: [usize; 2],
    pub padding: [usize; 2],
}

/// Attribute payload for `concat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatSpec {
    pub axis: usize,
}

/// Direction of a layout conversion between two tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermuteType {
    NhwcToNchw,
    NchwToNhwc,
    Copy,
}

/// Control-flow payload for `if`: input 0 is the condition, the remaining
/// inputs are forwarded to the selected subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfSpec {
    pub then_subgraph: SubgraphIndex,
    pub else_subgraph: SubgraphIndex,
}

/// Control-flow payload for `while`: inputs are the initial carried values,
/// outputs the final ones. The cond subgraph maps carried values to a single
/// boolean; the body subgraph maps carried values to their next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhileSpec {
    pub cond_subgraph: SubgraphIndex,
    pub body_subgraph: SubgraphIndex,
}

/// Attribute payload for `custom`: resolved through the graph's kernel
/// builder at kernel-generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSpec {
    pub id: String,
}

/// Closed family of operation kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    ElementwiseBinary(ElementwiseBinaryOp),
    ElementwiseUnary(ElementwiseUnaryOp),
    Compare(ComparisonOp),
    Conv2d(Conv2dSpec),
    Concat(ConcatSpec),
    Reshape,
    Permute(PermuteType),
    If(IfSpec),
    While(WhileSpec),
    Custom(CustomSpec),
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Add) => "add",
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Sub) => "sub",
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Mul) => "mul",
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Div) => "div",
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Relu) => "relu",
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Neg) => "neg",
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Abs) => "abs",
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Exp) => "exp",
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Tanh) => "tanh",
            OpKind::Compare(_) => "compare",
            OpKind::Conv2d(_) => "conv2d",
            OpKind::Concat(_) => "concat",
            OpKind::Reshape => "reshape",
            OpKind::Permute(_) => "permute",
            OpKind::If(_) => "if",
            OpKind::While(_) => "while",
            OpKind::Custom(_) => "custom",
        }
    }
}

/// A single operation: a kind plus ordered input and output operand lists.
#[derive(Clone)]
pub struct Operation {
    kind: OpKind,
    inputs: SmallVec<[OperandIndex; 4]>,
    outputs: SmallVec<[OperandIndex; 2]>,
}

impl Operation {
    pub fn new(
        kind: OpKind,
        inputs: impl IntoIterator<Item = OperandIndex>,
        outputs: impl IntoIterator<Item = OperandIndex>,
    ) -> Self {
        Self {
            kind,
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[OperandIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperandIndex] {
        &self.outputs
    }

    /// Inputs and outputs, deduplicated, in input-then-output order.
    pub fn io_operands(&self) -> SmallVec<[OperandIndex; 8]> {
        let mut operands: SmallVec<[OperandIndex; 8]> = SmallVec::new();
        for index in self.inputs.iter().chain(self.outputs.iter()) {
            if !operands.contains(index) {
                operands.push(*index);
            }
        }
        operands
    }

    /// Inputs, deduplicated, preserving first-occurrence order.
    pub fn distinct_inputs(&self) -> SmallVec<[OperandIndex; 4]> {
        let mut operands: SmallVec<[OperandIndex; 4]> = SmallVec::new();
        for index in &self.inputs {
            if !operands.contains(index) {
                operands.push(*index);
            }
        }
        operands
    }
}

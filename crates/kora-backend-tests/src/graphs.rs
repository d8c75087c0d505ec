//! Lowered-graph builders shared by the executor test suites.
//!
//! Builders play the role of the importer/lowering collaborators: they
//! produce small graphs with every operand and operation already assigned
//! to a backend.

use std::sync::Arc;

use kora::backend::BackendId;
use kora::compiler::{DefFactor, LoweredGraph, OperandLowerInfo, OperationLowerInfo};
use kora::ir::{
    ComparisonOp, ConcatSpec, Conv2dSpec, DType, ElementwiseBinaryOp, ElementwiseUnaryOp, Graph,
    IfSpec, Layout, OpKind, OperandIndex, OperandInfo, Operation, OperationIndex, Shape,
    SubgraphIndex, WhileSpec,
};

fn assign_operand(lowered: &mut LoweredGraph, index: OperandIndex, backend: &BackendId) {
    lowered.set_operand_lower_info(
        index,
        OperandLowerInfo::new(DefFactor::new(backend.clone(), Layout::Nhwc)),
    );
}

fn assign_operation(lowered: &mut LoweredGraph, index: OperationIndex, backend: &BackendId) {
    lowered.set_operation_lower_info(index, OperationLowerInfo::new(backend.clone(), Layout::Nhwc));
}

fn f32_payload(values: &[f32]) -> Arc<[u8]> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    Arc::from(bytes)
}

/// `In(a) -> add(a, a) -> Out(b)`, everything on one backend.
pub fn single_add_graph(backend: &BackendId) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Add),
            [a, a],
            [b],
        ))
        .expect("add operation");
    graph.add_input(a);
    graph.add_output(b);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(backend, Layout::Nhwc);
    lowered
}

/// `In(a) -> conv2d[acc](a, w) -> relu[cpu](c) -> Out(d)`.
///
/// The convolution runs on `acc`, the activation on `cpu`, so operand `c`
/// crosses backends and must be wired as a migrant. The filter is all ones:
/// each output value is the sum of the valid taps across both channels.
pub fn conv_relu_graph(acc: &BackendId, cpu: &BackendId) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1, 4, 4, 2])));
    let w = graph.add_constant(
        OperandInfo::new(DType::F32, Shape::new(vec![1, 3, 3, 2])),
        f32_payload(&[1.0; 18]),
    );
    let c = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1, 4, 4, 1])));
    let d = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1, 4, 4, 1])));
    let conv = graph
        .push_operation(Operation::new(
            OpKind::Conv2d(Conv2dSpec {
                strides: [1, 1],
                padding: [1, 1],
            }),
            [a, w],
            [c],
        ))
        .expect("conv operation");
    let relu = graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Relu),
            [c],
            [d],
        ))
        .expect("relu operation");
    graph.add_input(a);
    graph.add_output(d);

    let mut lowered = LoweredGraph::new(graph);
    assign_operand(&mut lowered, a, acc);
    assign_operand(&mut lowered, w, acc);
    assign_operand(&mut lowered, c, acc);
    assign_operand(&mut lowered, d, cpu);
    assign_operation(&mut lowered, conv, acc);
    assign_operation(&mut lowered, relu, cpu);
    lowered
}

/// Diamond: `In(a) -> relu[b1] / neg[b2] -> concat[b1] -> Out(c)`.
///
/// The two branches have no dependency on each other, so a parallel
/// executor may run them simultaneously; concat must wait for both.
pub fn diamond_graph(b1: &BackendId, b2: &BackendId) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let left = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let right = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let c = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![8])));
    let relu = graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Relu),
            [a],
            [left],
        ))
        .expect("relu operation");
    let neg = graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Neg),
            [a],
            [right],
        ))
        .expect("neg operation");
    let concat = graph
        .push_operation(Operation::new(
            OpKind::Concat(ConcatSpec { axis: 0 }),
            [left, right],
            [c],
        ))
        .expect("concat operation");
    graph.add_input(a);
    graph.add_output(c);

    let mut lowered = LoweredGraph::new(graph);
    assign_operand(&mut lowered, a, b1);
    assign_operand(&mut lowered, left, b1);
    assign_operand(&mut lowered, right, b2);
    assign_operand(&mut lowered, c, b1);
    assign_operation(&mut lowered, relu, b1);
    assign_operation(&mut lowered, neg, b2);
    assign_operation(&mut lowered, concat, b1);
    lowered
}

/// `In(a) -> relu -> b(dynamic) -> neg -> Out(c)`: the intermediate operand
/// allocates at run time and dies after its final use.
pub fn dynamic_chain_graph(backend: &BackendId) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])).dynamic());
    let c = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Relu),
            [a],
            [b],
        ))
        .expect("relu operation");
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Neg),
            [b],
            [c],
        ))
        .expect("neg operation");
    graph.add_input(a);
    graph.add_output(c);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(backend, Layout::Nhwc);
    lowered
}

/// Single-unary-op subgraph `In(x) -> op -> Out(y)`, for control-flow tests.
pub fn unary_subgraph(op: ElementwiseUnaryOp, backend: &BackendId) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let x = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let y = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    graph
        .push_operation(Operation::new(OpKind::ElementwiseUnary(op), [x], [y]))
        .expect("unary operation");
    graph.add_input(x);
    graph.add_output(y);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(backend, Layout::Nhwc);
    lowered
}

/// `if(cond) { then_subgraph } else { else_subgraph }` over one argument.
pub fn if_graph(then_subgraph: SubgraphIndex, else_subgraph: SubgraphIndex) -> LoweredGraph {
    let builtin = BackendId::new("builtin");
    let mut graph = Graph::new(Layout::Nhwc);
    let cond = graph.add_operand(OperandInfo::new(DType::Bool, Shape::new(vec![1])));
    let x = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let y = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    graph
        .push_operation(Operation::new(
            OpKind::If(IfSpec {
                then_subgraph,
                else_subgraph,
            }),
            [cond, x],
            [y],
        ))
        .expect("if operation");
    graph.add_input(cond);
    graph.add_input(x);
    graph.add_output(y);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(&builtin, Layout::Nhwc);
    lowered
}

/// Cond subgraph for `while`: carried value less than `limit`.
pub fn less_than_subgraph(limit: f32, backend: &BackendId) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let x = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1])));
    let bound = graph.add_constant(
        OperandInfo::new(DType::F32, Shape::new(vec![1])),
        f32_payload(&[limit]),
    );
    let verdict = graph.add_operand(OperandInfo::new(DType::Bool, Shape::new(vec![1])));
    graph
        .push_operation(Operation::new(
            OpKind::Compare(ComparisonOp::Less),
            [x, bound],
            [verdict],
        ))
        .expect("compare operation");
    graph.add_input(x);
    graph.add_output(verdict);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(backend, Layout::Nhwc);
    lowered
}

/// Body subgraph for `while`: carried value plus one.
pub fn increment_subgraph(backend: &BackendId) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let x = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1])));
    let one = graph.add_constant(
        OperandInfo::new(DType::F32, Shape::new(vec![1])),
        f32_payload(&[1.0]),
    );
    let next = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1])));
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Add),
            [x, one],
            [next],
        ))
        .expect("add operation");
    graph.add_input(x);
    graph.add_output(next);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(backend, Layout::Nhwc);
    lowered
}

/// `while(cond_subgraph) { body_subgraph }` over one carried value.
pub fn while_graph(cond_subgraph: SubgraphIndex, body_subgraph: SubgraphIndex) -> LoweredGraph {
    let builtin = BackendId::new("builtin");
    let mut graph = Graph::new(Layout::Nhwc);
    let x = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1])));
    let y = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1])));
    graph
        .push_operation(Operation::new(
            OpKind::While(WhileSpec {
                cond_subgraph,
                body_subgraph,
            }),
            [x],
            [y],
        ))
        .expect("while operation");
    graph.add_input(x);
    graph.add_output(y);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(&builtin, Layout::Nhwc);
    lowered
}

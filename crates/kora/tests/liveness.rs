use std::collections::BTreeSet;
use std::sync::Arc;

use kora::compiler::liveness::last_use_operands;
use kora::ir::{
    ConcatSpec, DType, ElementwiseBinaryOp, ElementwiseUnaryOp, Graph, Layout, OpKind,
    OperandInfo, Operation, Shape,
};

fn f32_info() -> OperandInfo {
    OperandInfo::new(DType::F32, Shape::new(vec![4]))
}

fn payload() -> Arc<[u8]> {
    Arc::from(vec![0u8; 16])
}

#[test]
fn intermediate_dies_at_its_final_consumer() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(f32_info());
    let b = graph.add_operand(f32_info());
    let c = graph.add_operand(f32_info());
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Relu),
            [a],
            [b],
        ))
        .unwrap();
    let neg = graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Neg),
            [b],
            [c],
        ))
        .unwrap();
    graph.add_input(a);
    graph.add_output(c);

    let order = graph.topological_order();
    let dying = last_use_operands(&graph, &order);

    // Only `b` dies, and it dies at the neg operation. Graph inputs and
    // outputs never appear.
    assert_eq!(dying.len(), 1);
    assert_eq!(dying.get(&neg), Some(&vec![b]));
}

#[test]
fn every_dying_operand_appears_exactly_once() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(f32_info());
    let left = graph.add_operand(f32_info());
    let right = graph.add_operand(f32_info());
    let out = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![8])));
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Relu),
            [a],
            [left],
        ))
        .unwrap();
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Neg),
            [a],
            [right],
        ))
        .unwrap();
    let concat = graph
        .push_operation(Operation::new(
            OpKind::Concat(ConcatSpec { axis: 0 }),
            [left, right],
            [out],
        ))
        .unwrap();
    graph.add_input(a);
    graph.add_output(out);

    let order = graph.topological_order();
    let dying = last_use_operands(&graph, &order);

    let all: Vec<_> = dying.values().flatten().copied().collect();
    let distinct: BTreeSet<_> = all.iter().copied().collect();
    assert_eq!(all.len(), distinct.len(), "an operand died twice");

    // Both branch results die at the concat, their single consumer.
    let at_concat = dying.get(&concat).cloned().unwrap_or_default();
    assert!(at_concat.contains(&left));
    assert!(at_concat.contains(&right));
}

#[test]
fn constants_and_variables_never_die() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(f32_info());
    let k = graph.add_constant(f32_info(), payload());
    let v = graph.add_operand(f32_info().variable());
    let b = graph.add_operand(f32_info());
    let c = graph.add_operand(f32_info());
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Add),
            [a, k],
            [b],
        ))
        .unwrap();
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Mul),
            [b, v],
            [c],
        ))
        .unwrap();
    graph.add_input(a);
    graph.add_output(c);

    let order = graph.topological_order();
    let dying = last_use_operands(&graph, &order);

    let all: Vec<_> = dying.values().flatten().copied().collect();
    assert!(!all.contains(&k), "constant was scheduled for deallocation");
    assert!(!all.contains(&v), "variable was scheduled for deallocation");
    assert!(all.contains(&b));
}

#[test]
fn operand_read_twice_by_one_operation_dies_once() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(f32_info());
    let b = graph.add_operand(f32_info());
    let c = graph.add_operand(f32_info());
    graph
        .push_operation(Operation::new(
            OpKind::ElementwiseUnary(ElementwiseUnaryOp::Relu),
            [a],
            [b],
        ))
        .unwrap();
    let square = graph
        .push_operation(Operation::new(
            OpKind::ElementwiseBinary(ElementwiseBinaryOp::Mul),
            [b, b],
            [c],
        ))
        .unwrap();
    graph.add_input(a);
    graph.add_output(c);

    let order = graph.topological_order();
    let dying = last_use_operands(&graph, &order);
    assert_eq!(dying.get(&square), Some(&vec![b]));
}

use kora::ir::{
    DType, ElementwiseUnaryOp, Graph, Layout, OpKind, OperandInfo, Operation, OperationIndex,
    Shape,
};

fn unary(op: ElementwiseUnaryOp) -> OpKind {
    OpKind::ElementwiseUnary(op)
}

#[test]
fn def_use_links_are_wired_by_operation_insertion() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let relu = graph
        .push_operation(Operation::new(unary(ElementwiseUnaryOp::Relu), [a], [b]))
        .unwrap();

    assert_eq!(graph.operand(a).unwrap().uses(), &[relu]);
    assert_eq!(graph.operand(a).unwrap().def(), None);
    assert_eq!(graph.operand(b).unwrap().def(), Some(relu));
    assert!(graph.operand(b).unwrap().uses().is_empty());
}

#[test]
fn duplicate_output_definition_is_rejected() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    graph
        .push_operation(Operation::new(unary(ElementwiseUnaryOp::Relu), [a], [b]))
        .unwrap();
    let result = graph.push_operation(Operation::new(unary(ElementwiseUnaryOp::Neg), [a], [b]));
    assert!(result.is_err());
}

#[test]
fn topological_order_follows_producers_not_insertion_order() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let c = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));

    // Insert the consumer first: it reads `b`, which the second insertion
    // produces.
    let consumer = graph
        .push_operation(Operation::new(unary(ElementwiseUnaryOp::Neg), [b], [c]))
        .unwrap();
    let producer = graph
        .push_operation(Operation::new(unary(ElementwiseUnaryOp::Relu), [a], [b]))
        .unwrap();

    let order = graph.topological_order();
    assert_eq!(order, vec![producer, consumer]);
}

#[test]
fn topological_order_is_deterministic() {
    let build = || {
        let mut graph = Graph::new(Layout::Nhwc);
        let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
        let mut previous = a;
        for _ in 0..5 {
            let next = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
            graph
                .push_operation(Operation::new(
                    unary(ElementwiseUnaryOp::Relu),
                    [previous],
                    [next],
                ))
                .unwrap();
            previous = next;
        }
        graph
    };
    assert_eq!(build().topological_order(), build().topological_order());
}

#[test]
fn explicit_indices_are_preserved() {
    let mut graph = Graph::new(Layout::Nhwc);
    let info = OperandInfo::new(DType::F32, Shape::new(vec![4]));
    let a = graph.add_operand(info.clone());
    let b = graph.add_operand(info.clone());
    graph
        .add_operation_at(
            OperationIndex(7),
            Operation::new(unary(ElementwiseUnaryOp::Relu), [a], [b]),
        )
        .unwrap();

    assert!(graph.operation(OperationIndex(7)).is_some());
    assert_eq!(graph.operand(b).unwrap().def(), Some(OperationIndex(7)));
    // The next fresh index continues past the explicit one.
    let c = graph.add_operand(info);
    let next = graph
        .push_operation(Operation::new(unary(ElementwiseUnaryOp::Neg), [b], [c]))
        .unwrap();
    assert_eq!(next, OperationIndex(8));
}

#[test]
fn graph_dump_names_operations() {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![2, 2])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![2, 2])));
    graph
        .push_operation(Operation::new(unary(ElementwiseUnaryOp::Tanh), [a], [b]))
        .unwrap();
    graph.add_input(a);
    graph.add_output(b);

    let dump = graph.to_string();
    assert!(dump.contains("tanh"));
    assert!(dump.contains("%0"));
    assert!(dump.contains("[2x2]"));
}

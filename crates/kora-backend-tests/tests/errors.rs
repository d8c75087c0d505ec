use std::sync::Arc;

use kora::backend::{BackendId, BackendSet, CustomKernelArgs, CustomKernelBuilder};
use kora::compiler::{
    create_executor, CompilerOptions, DefFactor, LoweredGraph, OperandLowerInfo,
};
use kora::error::{CompileError, ExecError, ExecResult};
use kora::exec::{ExecutorMap, Function};
use kora::ir::{
    CustomSpec, DType, Graph, Layout, OpKind, OperandInfo, Operation, OperationIndex, PermuteType,
    Shape,
};
use kora_backend_ref_cpu::CpuBackend;
use kora_backend_tests::graphs;
use kora_backend_tests::f32_bytes;

fn cpu_set() -> (BackendSet, BackendId) {
    let mut backends = BackendSet::new();
    backends.register(Arc::new(CpuBackend::new()));
    (backends, BackendId::new("cpu"))
}

#[test]
fn executor_kind_parses_only_known_names() {
    use kora::compiler::ExecutorKind;
    assert_eq!(
        "Parallel".parse::<ExecutorKind>().unwrap(),
        ExecutorKind::Parallel
    );
    assert_eq!(
        "Linear".parse::<ExecutorKind>().unwrap(),
        ExecutorKind::Linear
    );
    assert!(matches!(
        "Eager".parse::<ExecutorKind>(),
        Err(CompileError::Config(_))
    ));
}

#[test]
fn unregistered_backend_fails_construction() {
    let (backends, _) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let lowered = graphs::single_add_graph(&BackendId::new("npu"));

    let result = create_executor(lowered, &CompilerOptions::default(), &executor_map, &backends);
    assert!(matches!(result, Err(CompileError::Config(_))));
}

#[test]
fn ambiguous_operand_lowering_fails_construction() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let mut lowered = graphs::single_add_graph(&cpu);

    // Give the graph input a second def factor: the lowering is no longer
    // settled and the partitioner must refuse it.
    let input = lowered.graph().inputs()[0];
    let mut info = OperandLowerInfo::new(DefFactor::new(cpu.clone(), Layout::Nhwc));
    info.add_def_factor(DefFactor::new(cpu, Layout::Nchw));
    lowered.set_operand_lower_info(input, info);

    let result = create_executor(lowered, &CompilerOptions::default(), &executor_map, &backends);
    assert!(matches!(result, Err(CompileError::Config(_))));
}

#[test]
fn cpu_backend_rejects_permute_operations() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());

    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1, 2, 2, 1])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![1, 1, 2, 2])));
    graph
        .push_operation(Operation::new(
            OpKind::Permute(PermuteType::NhwcToNchw),
            [a],
            [b],
        ))
        .unwrap();
    graph.add_input(a);
    graph.add_output(b);
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(&cpu, Layout::Nhwc);

    let result = create_executor(lowered, &CompilerOptions::default(), &executor_map, &backends);
    assert!(matches!(
        result,
        Err(CompileError::UnsupportedOp { op: "permute", .. })
    ));
}

struct FailingKernel;

impl Function for FailingKernel {
    fn run(&mut self) -> ExecResult<()> {
        Err(ExecError::state("injected kernel failure"))
    }
}

struct FailingKernelBuilder;

impl CustomKernelBuilder for FailingKernelBuilder {
    fn build_kernel(
        &self,
        _id: &str,
        _args: CustomKernelArgs,
    ) -> kora::CompileResult<Box<dyn Function>> {
        Ok(Box::new(FailingKernel))
    }
}

fn custom_op_graph(cpu: &BackendId, with_builder: bool) -> LoweredGraph {
    let mut graph = Graph::new(Layout::Nhwc);
    let a = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    let b = graph.add_operand(OperandInfo::new(DType::F32, Shape::new(vec![4])));
    graph
        .push_operation(Operation::new(
            OpKind::Custom(CustomSpec {
                id: "external-op".to_string(),
            }),
            [a],
            [b],
        ))
        .unwrap();
    graph.add_input(a);
    graph.add_output(b);
    if with_builder {
        graph.set_kernel_builder(Arc::new(FailingKernelBuilder));
    }
    let mut lowered = LoweredGraph::new(graph);
    lowered.lower_all_to(cpu, Layout::Nhwc);
    lowered
}

#[test]
fn kernel_failure_surfaces_with_operation_and_backend() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());

    let mut executor = create_executor(
        custom_op_graph(&cpu, true),
        &CompilerOptions::default(),
        &executor_map,
        &backends,
    )
    .unwrap();
    executor
        .set_input(0, &f32_bytes(&[1.0, 2.0, 3.0, 4.0]))
        .unwrap();

    match executor.run() {
        Err(ExecError::Kernel { op, backend, message }) => {
            assert_eq!(op, OperationIndex(0));
            assert_eq!(backend.as_str(), "cpu");
            assert!(message.contains("injected kernel failure"));
        }
        other => panic!("expected a kernel failure, got {other:?}"),
    }
}

#[test]
fn custom_op_without_a_builder_fails_kernel_generation() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());

    let result = create_executor(
        custom_op_graph(&cpu, false),
        &CompilerOptions::default(),
        &executor_map,
        &backends,
    );
    assert!(matches!(result, Err(CompileError::KernelGen(_))));
}

#[test]
fn observers_see_the_failure_before_it_propagates() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());

    let mut executor = create_executor(
        custom_op_graph(&cpu, true),
        &CompilerOptions::default(),
        &executor_map,
        &backends,
    )
    .unwrap();
    let observer = kora_backend_tests::RecordingObserver::new();
    executor.add_observer(Box::new(observer.clone()));
    executor
        .set_input(0, &f32_bytes(&[1.0, 2.0, 3.0, 4.0]))
        .unwrap();

    assert!(executor.run().is_err());
    // The job began but never completed.
    let events = observer.events();
    assert!(events
        .iter()
        .any(|event| event.phase == kora_backend_tests::Phase::Begin));
    assert!(!events
        .iter()
        .any(|event| event.phase == kora_backend_tests::Phase::End));
}

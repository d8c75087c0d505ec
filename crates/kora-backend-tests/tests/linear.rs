use std::sync::Arc;

use kora::backend::{BackendId, BackendSet};
use kora::compiler::{create_executor, CompilerOptions};
use kora::error::ExecError;
use kora::exec::ExecutorMap;
use kora_backend_ref_cpu::CpuBackend;
use kora_backend_tests::graphs;
use kora_backend_tests::{f32_bytes, f32_from_bytes, RecordingObserver};

fn cpu_set() -> (BackendSet, BackendId) {
    let mut backends = BackendSet::new();
    backends.register(Arc::new(CpuBackend::new()));
    (backends, BackendId::new("cpu"))
}

#[test]
fn add_graph_doubles_its_input() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let options = CompilerOptions::default();

    let mut executor = create_executor(
        graphs::single_add_graph(&cpu),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();

    executor
        .set_input(0, &f32_bytes(&[1.0, 2.0, -3.0, 4.0]))
        .unwrap();
    executor.run().unwrap();
    let output = f32_from_bytes(&executor.get_output(0).unwrap());
    assert_eq!(output, vec![2.0, 4.0, -6.0, 8.0]);
}

#[test]
fn linear_runs_execute_the_same_sequence_every_time() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let options = CompilerOptions::default();

    let mut executor = create_executor(
        graphs::dynamic_chain_graph(&cpu),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();
    let observer = RecordingObserver::new();
    executor.add_observer(Box::new(observer.clone()));

    let input = f32_bytes(&[1.0, -2.0, 3.0, -4.0]);
    executor.set_input(0, &input).unwrap();
    executor.run().unwrap();
    let first_output = executor.get_output(0).unwrap();
    let first_ops: Vec<_> = observer.events().iter().map(|e| e.op_index).collect();

    executor.set_input(0, &input).unwrap();
    executor.run().unwrap();
    let second_output = executor.get_output(0).unwrap();
    let all_ops: Vec<_> = observer.events().iter().map(|e| e.op_index).collect();

    assert_eq!(first_output, second_output);
    assert_eq!(&all_ops[..first_ops.len()], &first_ops[..]);
    assert_eq!(&all_ops[first_ops.len()..], &first_ops[..]);
}

#[test]
fn dynamic_intermediate_survives_deallocation_between_runs() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let options = CompilerOptions::default();

    let mut executor = create_executor(
        graphs::dynamic_chain_graph(&cpu),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();

    // relu then neg: [1,-2,3,-4] -> [1,0,3,0] -> [-1,0,-3,0]. The dynamic
    // intermediate buffer is released after its final use and must come
    // back on the next run.
    for _ in 0..2 {
        executor
            .set_input(0, &f32_bytes(&[1.0, -2.0, 3.0, -4.0]))
            .unwrap();
        executor.run().unwrap();
        let output = f32_from_bytes(&executor.get_output(0).unwrap());
        assert_eq!(output, vec![-1.0, 0.0, -3.0, 0.0]);
    }
}

#[test]
fn backends_can_be_resolved_through_the_global_registry() {
    kora_backend_ref_cpu::register_cpu_backend();
    assert!(kora::backend::registry::has_backend("cpu"));
    let backends = BackendSet::from_registry(&["cpu"]).unwrap();
    let executor_map = Arc::new(ExecutorMap::new());

    let mut executor = create_executor(
        graphs::single_add_graph(&BackendId::new("cpu")),
        &CompilerOptions::default(),
        &executor_map,
        &backends,
    )
    .unwrap();
    executor
        .set_input(0, &f32_bytes(&[0.5, 1.5, 2.5, 3.5]))
        .unwrap();
    executor.run().unwrap();
    let output = f32_from_bytes(&executor.get_output(0).unwrap());
    assert_eq!(output, vec![1.0, 3.0, 5.0, 7.0]);
}

#[test]
fn wrong_input_size_is_rejected() {
    let (backends, cpu) = cpu_set();
    let executor_map = Arc::new(ExecutorMap::new());
    let options = CompilerOptions::default();

    let mut executor = create_executor(
        graphs::single_add_graph(&cpu),
        &options,
        &executor_map,
        &backends,
    )
    .unwrap();

    let result = executor.set_input(0, &[0u8; 3]);
    assert!(matches!(result, Err(ExecError::InvalidIo(_))));
    let result = executor.set_input(5, &f32_bytes(&[0.0; 4]));
    assert!(matches!(result, Err(ExecError::InvalidIo(_))));
}
